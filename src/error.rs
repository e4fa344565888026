//! Typed errors for persisted pattern records.

use thiserror::Error;

/// Errors raised while decoding a persisted pattern record.
///
/// Store backends treat any of these as record corruption: `load` degrades
/// to "not found" so the pipeline falls back to fresh learning instead of
/// propagating the fault.
#[derive(Debug, Error)]
pub enum PatternError {
    /// A locator string matched neither the `class:` nor the `nth:` form.
    #[error("invalid locator: {0:?}")]
    InvalidLocator(String),
}
