use std::error::Error as _;

use thiserror::Error;

/// Failures of a single txt2img round trip, classified the way callers
/// report them.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No connection was established within the connect timeout. A timeout
    /// after connecting is `Unexpected`: the server is up, just slow.
    #[error("Connection timed out! Check if the Stable Diffusion server is running. ({detail})")]
    ConnectTimeout { detail: String },

    #[error("HTTP error {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        let detail = chain(&err);
        if err.is_connect() && err.is_timeout() {
            Self::ConnectTimeout { detail }
        } else {
            Self::Unexpected(detail)
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Unexpected(format!("malformed response body: {err}"))
    }
}

// reqwest's Display leaves out the cause (e.g. "connection refused")
fn chain(err: &reqwest::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
