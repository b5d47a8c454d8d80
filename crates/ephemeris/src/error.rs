//! Error types for Ephemeris operations.
//!
//! This module provides the main error type [`EphemerisError`] which wraps
//! the error conditions that can abort a pipeline stage. Merge and deploy
//! problems are accumulated in their stage results instead of thrown; see
//! [`crate::merge::MergeOutcome`] and [`crate::deploy::DeploySummary`].

use std::io;

use thiserror::Error;

use ephemeris_parser::error::ParseError;

use crate::group::GroupError;

/// The main error type for Ephemeris operations.
///
/// The `Parse` variant carries the offending source text alongside the
/// structured diagnostics so callers can render rich reports.
#[derive(Debug, Error)]
pub enum EphemerisError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{err}")]
    Parse { err: ParseError, src: String },

    #[error("grouping error: {0}")]
    Group(#[from] GroupError),
}

impl EphemerisError {
    /// Create a new `Parse` error with the associated source code.
    pub fn new_parse_error(err: ParseError, src: impl Into<String>) -> Self {
        Self::Parse {
            err,
            src: src.into(),
        }
    }
}
