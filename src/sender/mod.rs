//! Transport adapters: the only place the SDK performs HTTP.
//!
//! The delivery pipeline and the polling client talk to the service through
//! [`Transport`] (blocking) or [`AsyncTransport`] (async), so tests can swap in
//! recording doubles.

pub mod client;
pub mod payload;

pub use client::{
    BlockingHttpClient, ClientConfig, ClientError, ClientStats, ConnectionStats, HttpClient,
};
pub use payload::strip_nulls;

use serde_json::Value;
use std::future::Future;

#[cfg(test)]
use mockall::automock;

/// Blocking transport used by the worker thread and the sync resources.
#[cfg_attr(test, automock)]
pub trait Transport: Send + Sync {
    fn post(&self, path: &str, body: &Value) -> Result<Value, ClientError>;
    fn get(&self, path: &str, params: &[(String, String)]) -> Result<Value, ClientError>;
}

/// Async transport used by delivery tasks and the async resources.
pub trait AsyncTransport: Send + Sync {
    fn post(
        &self,
        path: &str,
        body: &Value,
    ) -> impl Future<Output = Result<Value, ClientError>> + Send;
    fn get(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> impl Future<Output = Result<Value, ClientError>> + Send;
}
