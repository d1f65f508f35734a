use std::fmt::{Display, Formatter};

/// The one error kind of the Solis Cloud client.
///
/// Transport failures, unexpected HTTP statuses, non-zero response codes, and
/// malformed payloads are all normalized into it.
#[must_use]
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{message}{}{}", StatusCodeSuffix(.status_code), ResponseCodeSuffix(.response_code))]
pub struct ApiError {
    message: String,
    status_code: Option<u16>,
    response_code: Option<String>,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), status_code: None, response_code: None }
    }

    pub const fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_response_code(mut self, response_code: impl Into<String>) -> Self {
        self.response_code = Some(response_code.into());
        self
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    #[must_use]
    pub fn response_code(&self) -> Option<&str> {
        self.response_code.as_deref()
    }
}

struct StatusCodeSuffix<'a>(&'a Option<u16>);

impl Display for StatusCodeSuffix<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(status_code) => write!(f, " (HTTP status code: {status_code})"),
            None => Ok(()),
        }
    }
}

struct ResponseCodeSuffix<'a>(&'a Option<String>);

impl Display for ResponseCodeSuffix<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(response_code) => write!(f, " (API response code: {response_code})"),
            None => Ok(()),
        }
    }
}
