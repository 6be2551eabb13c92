use serde::Deserialize;

use crate::error::{Error, Result};

/// Envelope the proxy passes through from the vendor cloud.
#[derive(Deserialize, Debug, Clone)]
pub struct TuyaResponse<T> {
    pub success: Option<bool>,
    pub result: Option<T>,
    pub msg: Option<String>,
    pub code: Option<i64>,
    pub t: Option<i64>,
    pub tid: Option<String>,
}

impl<T> TuyaResponse<T> {
    /// Checks the `success` flag without requiring a result, for writes.
    pub fn check(self, method: &'static str, path: &str) -> Result<Option<T>> {
        if self.success == Some(false) {
            let reason = match (self.code, self.msg) {
                (Some(code), Some(msg)) => format!("vendor error {code}: {msg}"),
                (None, Some(msg)) => msg,
                (Some(code), None) => format!("vendor error {code}"),
                (None, None) => "request was not successful".to_string(),
            };
            return Err(Error::transport(method, path, None, reason));
        }

        Ok(self.result)
    }

    pub fn into_result(self, method: &'static str, path: &str) -> Result<T> {
        self.check(method, path)?
            .ok_or_else(|| Error::transport(method, path, None, "response has no result"))
    }
}
