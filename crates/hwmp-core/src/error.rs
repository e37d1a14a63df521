//! Core error types.

use crate::types::InvalidLength;

#[derive(Debug, thiserror::Error)]
pub enum ElementError {
    #[error("{0}")]
    InvalidLength(#[from] InvalidLength),

    #[error("proactive PREQ must carry exactly one broadcast destination with DO and RF set")]
    MalformedProactivePreq,
}
