mod error;
mod models;
mod registers;
mod response;
pub mod signature;

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use bon::bon;
use chrono::Utc;
use itertools::Itertools;
use reqwest::{Client, StatusCode, header};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;

pub use self::{
    error::ApiError,
    models::{InverterDetails, InverterRecord},
    registers::Registers,
    signature::Credentials,
};
use self::{
    models::{
        BatchItem,
        ControlRequest,
        ControlStatus,
        InverterDetailsRequest,
        InverterListData,
        InverterListRequest,
        ReadBatchRequest,
        ReadData,
        ReadRequest,
    },
    response::Envelope,
    signature::SignedHeaders,
};
use crate::{
    clock::{Clock, TokioClock},
    core::cid::Cid,
    prelude::*,
    retry::{RetryPolicy, retry},
};

pub const DEFAULT_BASE_URL: &str = "https://www.soliscloud.com:13333";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONCURRENT_REQUESTS: usize = 2;

const READ_PATH: &str = "/v2/api/atRead";
const READ_BATCH_PATH: &str = "/v2/api/atReadBatch";
const CONTROL_PATH: &str = "/v2/api/control";
const INVERTER_LIST_PATH: &str = "/v1/api/inverterList";
const INVERTER_DETAILS_PATH: &str = "/v1/api/inverterDetail";

/// Signed Solis Cloud client.
///
/// All requests, whatever the endpoint, share one gate which bounds the number of
/// requests in flight. Excess requests wait for a free slot.
pub struct Api {
    client: Client,
    base_url: String,
    credentials: Credentials,
    timeout: Duration,
    gate: Semaphore,
    retry_policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

#[bon]
impl Api {
    #[builder]
    pub fn new(
        credentials: Credentials,

        #[builder(into, default = DEFAULT_BASE_URL.to_owned())] base_url: String,

        // Applies to a single request including the wait for a free slot.
        #[builder(default = DEFAULT_TIMEOUT)]
        timeout: Duration,

        #[builder(default = DEFAULT_CONCURRENT_REQUESTS)] concurrent_requests: usize,

        // Used when the caller has no specific retry budget.
        #[builder(default)]
        retry_policy: RetryPolicy,

        #[builder(default = Arc::new(TokioClock) as Arc<dyn Clock>)] clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        ensure!(concurrent_requests != 0, "at least one concurrent request must be allowed");
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build the HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            credentials,
            timeout,
            gate: Semaphore::new(concurrent_requests),
            retry_policy,
            clock,
        })
    }
}

impl Api {
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    #[instrument(skip_all, fields(serial_number = serial_number, cid = %cid))]
    pub async fn read(&self, serial_number: &str, cid: Cid, retry_policy: &RetryPolicy) -> Result<String, ApiError> {
        debug!("reading…");
        let value = retry(retry_policy, self.clock.as_ref(), || self.read_once(serial_number, cid)).await?;
        debug!(%value, "read");
        Ok(value)
    }

    #[instrument(skip_all, fields(serial_number = serial_number, n_cids = cids.len()))]
    pub async fn read_batch(
        &self,
        serial_number: &str,
        cids: &[Cid],
        retry_policy: &RetryPolicy,
    ) -> Result<BTreeMap<Cid, String>, ApiError> {
        debug!("reading…");
        let values =
            retry(retry_policy, self.clock.as_ref(), || self.read_batch_once(serial_number, cids)).await?;
        debug!(n_values = values.len(), "read");
        Ok(values)
    }

    /// Write `value` to the register.
    ///
    /// `old_value` is forwarded to the provider as the previous value hint.
    #[instrument(skip_all, fields(serial_number = serial_number, cid = %cid, value = value))]
    pub async fn control(
        &self,
        serial_number: &str,
        cid: Cid,
        value: &str,
        old_value: Option<&str>,
        retry_policy: &RetryPolicy,
    ) -> Result<(), ApiError> {
        debug!(?old_value, "writing…");
        retry(retry_policy, self.clock.as_ref(), || self.control_once(serial_number, cid, value, old_value))
            .await
    }

    #[instrument(skip_all)]
    pub async fn inverter_list(&self, retry_policy: &RetryPolicy) -> Result<Vec<InverterRecord>, ApiError> {
        debug!("listing…");
        retry(retry_policy, self.clock.as_ref(), || self.inverter_list_once()).await
    }

    #[instrument(skip_all, fields(serial_number = serial_number))]
    pub async fn inverter_details(
        &self,
        serial_number: &str,
        retry_policy: &RetryPolicy,
    ) -> Result<InverterDetails, ApiError> {
        debug!("fetching…");
        retry(retry_policy, self.clock.as_ref(), || self.inverter_details_once(serial_number)).await
    }

    async fn read_once(&self, serial_number: &str, cid: Cid) -> Result<String, ApiError> {
        let data = self
            .post(READ_PATH, &ReadRequest { serial_number, cid })
            .await?
            .ok_or_else(|| ApiError::new("Read failed: missing 'data' field"))?;
        serde_json::from_value::<ReadData>(data)
            .map_err(|error| ApiError::new(format!("Read failed: {error}")))?
            .msg
            .ok_or_else(|| ApiError::new("Read failed: missing 'msg' field"))
    }

    async fn read_batch_once(&self, serial_number: &str, cids: &[Cid]) -> Result<BTreeMap<Cid, String>, ApiError> {
        let request = ReadBatchRequest { serial_number, cids: cids.iter().join(",") };
        let data = self
            .post(READ_BATCH_PATH, &request)
            .await?
            .ok_or_else(|| ApiError::new("ReadBatch failed: missing 'data' field"))?;
        let Value::Array(groups) = data else {
            return Err(ApiError::new("ReadBatch failed: 'data' field is not an array"));
        };
        let mut values = BTreeMap::new();
        for group in groups {
            let Value::Array(items) = group else {
                return Err(ApiError::new("ReadBatch failed: 'data' field element is not an array"));
            };
            for item in items {
                let item = serde_json::from_value::<BatchItem>(item)
                    .map_err(|error| ApiError::new(format!("ReadBatch failed: {error}")))?;
                let value = item.msg.ok_or_else(|| ApiError::new("ReadBatch failed: missing 'msg' field"))?;
                let cid = item.cid.ok_or_else(|| ApiError::new("ReadBatch failed: missing 'cid' field"))?;
                values.insert(Cid(cid), value);
            }
        }
        Ok(values)
    }

    async fn control_once(
        &self,
        serial_number: &str,
        cid: Cid,
        value: &str,
        old_value: Option<&str>,
    ) -> Result<(), ApiError> {
        let request = ControlRequest { serial_number, cid, value, old_value };

        // Some firmware answers a successful write without any statuses at all.
        let Some(data) = self.post(CONTROL_PATH, &request).await? else {
            return Ok(());
        };
        let Value::Array(items) = data else {
            return Err(ApiError::new("Control failed: 'data' field is not an array"));
        };
        for item in items {
            let status = serde_json::from_value::<ControlStatus>(item)
                .map_err(|error| ApiError::new(format!("Control failed: {error}")))?;
            if let Some(code) = status.code
                && code != "0"
            {
                let message = status.msg.as_deref().unwrap_or("Unknown error");
                return Err(ApiError::new(format!("Control failed: {message}")).with_response_code(code));
            }
        }
        Ok(())
    }

    async fn inverter_list_once(&self) -> Result<Vec<InverterRecord>, ApiError> {
        let data = self
            .post(INVERTER_LIST_PATH, &InverterListRequest { page_size: "100" })
            .await?
            .ok_or_else(|| ApiError::new("InverterList failed: missing 'data' field"))?;
        let data = serde_json::from_value::<InverterListData>(data)
            .map_err(|error| ApiError::new(format!("InverterList failed: {error}")))?;
        Ok(data.page.records)
    }

    async fn inverter_details_once(&self, serial_number: &str) -> Result<InverterDetails, ApiError> {
        let data = self
            .post(INVERTER_DETAILS_PATH, &InverterDetailsRequest { serial_number })
            .await?
            .ok_or_else(|| ApiError::new("InverterDetails failed: missing 'data' field"))?;
        serde_json::from_value(data).map_err(|error| ApiError::new(format!("InverterDetails failed: {error}")))
    }

    /// Sign and send one request, and unwrap the response envelope.
    #[instrument(skip_all, level = Level::DEBUG, fields(path = path))]
    async fn post<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<Option<Value>, ApiError> {
        let url = format!("{}{path}", self.base_url);
        let body = serde_json::to_string(body)
            .map_err(|error| ApiError::new(format!("failed to serialize the request: {error}")))?;
        let headers = self.credentials.sign(&body, Utc::now(), path)?;
        debug!(%body, "posting…");
        tokio::time::timeout(self.timeout, self.send(&url, body, headers))
            .await
            .map_err(|_| ApiError::new(format!("Timeout accessing {url}")))?
    }

    async fn send(&self, url: &str, body: String, headers: SignedHeaders) -> Result<Option<Value>, ApiError> {
        let _permit = self.gate.acquire().await.map_err(|_| ApiError::new("the request gate is closed"))?;
        let response = self
            .client
            .post(url)
            .header("Content-MD5", headers.content_md5)
            .header(header::CONTENT_TYPE, signature::CONTENT_TYPE)
            .header(header::DATE, headers.date)
            .header(header::AUTHORIZATION, headers.authorization)
            .body(body)
            .send()
            .await
            .map_err(|error| ApiError::new(format!("Error accessing {url}: {error}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|error| ApiError::new(format!("Error accessing {url}: {error}")))?;
        if status != StatusCode::OK {
            return Err(ApiError::new(text).with_status_code(status.as_u16()));
        }
        debug!(response = %text, "received");
        serde_json::from_str::<Envelope>(&text)
            .map_err(|error| ApiError::new(format!("Error accessing {url}: {error}")))?
            .into()
    }
}
