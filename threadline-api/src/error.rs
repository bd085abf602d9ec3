use anyhow::{anyhow, Context};
use serde_json::json;

/// Errors the server may answer a gateway call with
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Not found")]
    NotFound,

    #[error("Text must not be empty")]
    EmptyText,

    #[error("Null byte in string is not allowed {0:?}")]
    NullByteInString(String),

    #[error("Replies cannot be nested deeper than sub-replies")]
    TooDeep,
}

impl Error {
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::PermissionDenied => StatusCode::FORBIDDEN,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::EmptyText => StatusCode::BAD_REQUEST,
            Error::NullByteInString(_) => StatusCode::BAD_REQUEST,
            Error::TooDeep => StatusCode::BAD_REQUEST,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({
                "message": msg,
                "type": "unknown",
            }),
            Error::PermissionDenied => json!({
                "message": "permission denied",
                "type": "permission-denied",
            }),
            Error::NotFound => json!({
                "message": "not found",
                "type": "not-found",
            }),
            Error::EmptyText => json!({
                "message": "text must not be empty",
                "type": "empty-text",
            }),
            Error::NullByteInString(s) => json!({
                "message": "there was a null byte in argument string",
                "type": "null-byte",
                "string": s,
            }),
            Error::TooDeep => json!({
                "message": "replies cannot be nested this deep",
                "type": "too-deep",
            }),
        })
        .expect("serializing error")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        Ok(
            match data
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| anyhow!("error type is not a string"))?
            {
                "unknown" => Error::Unknown(String::from(
                    data.get("message")
                        .and_then(|msg| msg.as_str())
                        .unwrap_or(""),
                )),
                "permission-denied" => Error::PermissionDenied,
                "not-found" => Error::NotFound,
                "empty-text" => Error::EmptyText,
                "null-byte" => Error::NullByteInString(String::from(
                    data.get("string").and_then(|s| s.as_str()).ok_or_else(|| {
                        anyhow!("error is a null-byte-in-string without a string")
                    })?,
                )),
                "too-deep" => Error::TooDeep,
                _ => return Err(anyhow!("error contents has unknown type")),
            },
        )
    }
}

/// Ways a gateway call can fail to produce a usable response
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum GatewayError {
    /// The call could not complete
    #[error("network failure: {0}")]
    Network(String),

    /// The call completed with a non-success status
    #[error("rejected by server: {0}")]
    Rejected(#[from] Error),

    /// The call completed but its body could not be understood
    #[error("malformed response body: {0}")]
    Malformed(String),
}

impl GatewayError {
    /// Build the error for a completed call from its status and body
    pub fn from_response(status: http::StatusCode, body: &[u8]) -> GatewayError {
        match Error::parse(body) {
            Ok(err) => GatewayError::Rejected(err),
            Err(e) => GatewayError::Malformed(format!("status {status}: {e:#}")),
        }
    }
}
