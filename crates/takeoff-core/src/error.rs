//! Error types for the takeoff engine.

use crate::items::ItemId;
use crate::storage::StorageError;
use crate::template::TemplateId;
use thiserror::Error;

/// Reasons a draft or edit is refused at the commit boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RejectReason {
    #[error("segment has zero length")]
    ZeroLengthSegment,
    #[error("area needs at least 3 points, got {0}")]
    TooFewAreaPoints(usize),
    #[error("area encloses no surface")]
    ZeroArea,
    #[error("{kind} expects {expected} points, got {got}")]
    PointCount {
        kind: &'static str,
        expected: &'static str,
        got: usize,
    },
    #[error("calibration distance must be positive, got {0}")]
    NonPositiveDistance(f64),
    #[error("could not parse length {0:?}")]
    UnparsableLength(String),
    #[error("geometry kind does not match item kind")]
    KindMismatch,
    #[error("no calibration is waiting for a distance")]
    NoPendingCalibration,
}

/// Errors raised by the engine.
#[derive(Debug, Error)]
pub enum TakeoffError {
    #[error("Input rejected: {0}")]
    InputRejected(#[from] RejectReason),
    #[error("No render snapshot for page {0}")]
    RenderUnavailable(u32),
    #[error("Persistence failed: {0}")]
    Persistence(#[from] StorageError),
    #[error("Stale result for {0}")]
    StaleResult(String),
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),
    #[error("Template not found: {0}")]
    TemplateNotFound(TemplateId),
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for engine operations.
pub type TakeoffResult<T> = Result<T, TakeoffError>;

impl TakeoffError {
    /// The rejection reason, if this error is an input rejection.
    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            TakeoffError::InputRejected(reason) => Some(reason),
            _ => None,
        }
    }
}
