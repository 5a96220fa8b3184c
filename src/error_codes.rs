use std::fmt;

use anyhow::Error;
use serde::Serialize;
use serde_json::Value;

pub const INPUT_NOT_FOUND: &str = "INPUT_NOT_FOUND";
pub const INPUT_NOT_A_FILE: &str = "INPUT_NOT_A_FILE";
pub const INVALID_SIZE: &str = "INVALID_SIZE";
pub const INVALID_FRAME_RATE: &str = "INVALID_FRAME_RATE";
pub const INVALID_BUFFER_CAPACITY: &str = "INVALID_BUFFER_CAPACITY";
pub const DECODER_SPAWN_FAILED: &str = "DECODER_SPAWN_FAILED";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodedErrorKind {
    /// Bad input or configuration, detected before any task starts.
    Usage,
    /// An external process could not be started.
    Lifecycle,
}

#[derive(Debug, Clone)]
pub struct CodedError {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
    pub kind: CodedErrorKind,
}

impl CodedError {
    pub fn usage(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            kind: CodedErrorKind::Usage,
        }
    }

    pub fn lifecycle(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            kind: CodedErrorKind::Lifecycle,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn exit_code(&self) -> i32 {
        match self.kind {
            CodedErrorKind::Usage => 2,
            CodedErrorKind::Lifecycle => 1,
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            ok: false,
            error: ErrorEnvelopeBody {
                code: self.code.to_owned(),
                message: self.message.clone(),
                details: self.details.clone(),
            },
        }
    }
}

impl fmt::Display for CodedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CodedError {}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub error: ErrorEnvelopeBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelopeBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

pub fn find_coded_error(error: &Error) -> Option<&CodedError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<CodedError>())
}

/// Envelope for any fatal error; uncoded errors are reported as `INTERNAL`.
pub fn envelope_for(error: &Error) -> ErrorEnvelope {
    match find_coded_error(error) {
        Some(coded) => coded.envelope(),
        None => ErrorEnvelope {
            ok: false,
            error: ErrorEnvelopeBody {
                code: "INTERNAL".to_owned(),
                message: format!("{error:#}"),
                details: None,
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use anyhow::{anyhow, Context};
    use serde_json::json;

    use super::*;

    #[test]
    fn coded_error_is_found_through_context_layers() {
        let error = Err::<(), _>(anyhow!(CodedError::usage(INVALID_SIZE, "bad size")))
            .context("while preparing playback")
            .unwrap_err();
        let coded = find_coded_error(&error).expect("coded error should be in the chain");
        assert_eq!(coded.code, INVALID_SIZE);
        assert_eq!(coded.exit_code(), 2);
    }

    #[test]
    fn envelope_serializes_details_only_when_present() {
        let plain = CodedError::lifecycle(DECODER_SPAWN_FAILED, "no ffmpeg").envelope();
        let value = serde_json::to_value(&plain).expect("envelope should serialize");
        assert_eq!(value["ok"], json!(false));
        assert!(value["error"].get("details").is_none());

        let detailed = CodedError::usage(INPUT_NOT_FOUND, "missing")
            .with_details(json!({ "path": "a.mp4" }))
            .envelope();
        let value = serde_json::to_value(&detailed).expect("envelope should serialize");
        assert_eq!(value["error"]["details"]["path"], json!("a.mp4"));
    }

    #[test]
    fn uncoded_errors_map_to_internal() {
        let envelope = envelope_for(&anyhow!("boom"));
        assert_eq!(envelope.error.code, "INTERNAL");
        assert_eq!(envelope.error.message, "boom");
    }
}
