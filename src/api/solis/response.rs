use serde::Deserialize;
use serde_json::Value;

use crate::api::solis::{ApiError, models::string_or_number};

/// Generic `{code, msg, data}` envelope of every Solis Cloud response.
///
/// `data` is kept as raw JSON because its shape differs per endpoint.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    /// `"0"` on success. Some endpoints send it as a number.
    #[serde(default, deserialize_with = "string_or_number")]
    code: Option<String>,

    #[serde(default)]
    msg: Option<String>,

    #[serde(default)]
    data: Option<Value>,
}

impl From<Envelope> for Result<Option<Value>, ApiError> {
    fn from(envelope: Envelope) -> Self {
        match envelope.code.as_deref() {
            Some("0") => Ok(envelope.data.filter(|data| !data.is_null())),
            code => {
                let message = envelope.msg.as_deref().unwrap_or("Unknown error");
                Err(ApiError::new(format!("API operation failed: {message}"))
                    .with_response_code(code.unwrap_or("Unknown code")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: Value) -> Result<Option<Value>, ApiError> {
        serde_json::from_value::<Envelope>(value).unwrap().into()
    }

    #[test]
    fn success_ok() {
        let data = parse(json!({"code": "0", "msg": "success", "data": {"msg": "1"}})).unwrap();
        assert_eq!(data, Some(json!({"msg": "1"})));
    }

    #[test]
    fn numeric_code_ok() {
        assert_eq!(parse(json!({"code": 0, "data": []})).unwrap(), Some(json!([])));
    }

    #[test]
    fn null_data_is_none() {
        assert_eq!(parse(json!({"code": "0", "data": null})).unwrap(), None);
    }

    #[test]
    fn error_code() {
        let error = parse(json!({"code": "100", "msg": "API Error"})).unwrap_err();
        assert_eq!(error.to_string(), "API operation failed: API Error (API response code: 100)");
    }

    #[test]
    fn missing_code() {
        let error = parse(json!({"data": {}})).unwrap_err();
        assert_eq!(error.response_code(), Some("Unknown code"));
    }
}
