// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use probesim_config::ConfigError;
use probesim_streaming::{OracleError, StreamingError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("streaming error: {0}")]
    Streaming(#[from] StreamingError),
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;
