//! Permission request latch.

use serde::{Deserialize, Serialize};

/// Whether a selector has asked its collaborator for device access.
///
/// Moves from `NotRequested` to `Requested` at most once and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionRequest {
    #[default]
    NotRequested,
    Requested,
}

impl PermissionRequest {
    pub fn from_flag(request: bool) -> Self {
        if request {
            PermissionRequest::Requested
        } else {
            PermissionRequest::NotRequested
        }
    }

    pub fn is_requested(&self) -> bool {
        matches!(self, PermissionRequest::Requested)
    }

    /// Latch to `Requested`. Returns true only on the actual transition.
    pub fn latch(&mut self) -> bool {
        match self {
            PermissionRequest::NotRequested => {
                *self = PermissionRequest::Requested;
                true
            }
            PermissionRequest::Requested => false,
        }
    }
}
