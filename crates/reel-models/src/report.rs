//! Uniform stage response envelope.
//!
//! Stage entry points surface `{success, data | error}` at the process
//! boundary; collaborators must treat any `success: false` as a
//! user-visible failure without assuming partial state was rolled back.

use serde::{Deserialize, Serialize};

/// Uniform `{success, data | error}` envelope returned by stage commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> StageResponse<T> {
    /// Successful response carrying a payload.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed response carrying a message.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Build from a `Result`, flattening the error to its display form.
    pub fn from_result<E: std::fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_shape() {
        let resp = StageResponse::ok(3u32);
        assert!(resp.success);
        assert_eq!(resp.data, Some(3));
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_err_shape() {
        let resp: StageResponse<u32> = StageResponse::err("no scenes");
        assert!(!resp.success);
        assert!(resp.data.is_none());
        assert_eq!(resp.error.as_deref(), Some("no scenes"));
    }

    #[test]
    fn test_from_result() {
        let ok: Result<u32, std::io::Error> = Ok(1);
        assert!(StageResponse::from_result(ok).success);

        let err: Result<u32, std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let resp = StageResponse::from_result(err);
        assert!(!resp.success);
        assert!(resp.error.unwrap().contains("gone"));
    }
}
