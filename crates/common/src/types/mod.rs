use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Outer result envelope: `{success, data}` or `{success: false, error}`.
///
/// Services return `Result`; this is only built where a caller wants the
/// flattened shape (script output, logging).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ApiResult<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResult<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(msg.into()) }
    }
}

impl<T, E: Display> From<Result<T, E>> for ApiResult<T> {
    fn from(res: Result<T, E>) -> Self {
        match res {
            Ok(v) => Self::ok(v),
            Err(e) => Self::err(e.to_string()),
        }
    }
}
