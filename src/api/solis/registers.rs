use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::{
    api::solis::{Api, ApiError},
    core::cid::Cid,
    retry::RetryPolicy,
};

/// Register access the coordinator is built on.
#[async_trait]
pub trait Registers: Send + Sync {
    async fn read(&self, serial_number: &str, cid: Cid, retry_policy: &RetryPolicy) -> Result<String, ApiError>;

    async fn read_batch(
        &self,
        serial_number: &str,
        cids: &[Cid],
        retry_policy: &RetryPolicy,
    ) -> Result<BTreeMap<Cid, String>, ApiError>;

    async fn control(
        &self,
        serial_number: &str,
        cid: Cid,
        value: &str,
        old_value: Option<&str>,
        retry_policy: &RetryPolicy,
    ) -> Result<(), ApiError>;
}

#[async_trait]
impl Registers for Api {
    async fn read(&self, serial_number: &str, cid: Cid, retry_policy: &RetryPolicy) -> Result<String, ApiError> {
        Self::read(self, serial_number, cid, retry_policy).await
    }

    async fn read_batch(
        &self,
        serial_number: &str,
        cids: &[Cid],
        retry_policy: &RetryPolicy,
    ) -> Result<BTreeMap<Cid, String>, ApiError> {
        Self::read_batch(self, serial_number, cids, retry_policy).await
    }

    async fn control(
        &self,
        serial_number: &str,
        cid: Cid,
        value: &str,
        old_value: Option<&str>,
        retry_policy: &RetryPolicy,
    ) -> Result<(), ApiError> {
        Self::control(self, serial_number, cid, value, old_value, retry_policy).await
    }
}
