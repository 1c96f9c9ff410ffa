//! Collaborator seams - services the governance core consults but does not own
//!
//! Team directories, name indexes and audit sinks are injected behind these
//! traits. The core never retries or times out a collaborator call; failures are
//! surfaced as [`CollaboratorError`] and the caller decides what to do.

use thiserror::Error;

use crate::core::audit::AuditEvent;

/// Failure of an injected collaborator
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{collaborator} is unavailable: {message}")]
    Unavailable {
        collaborator: &'static str,
        message: String,
    },

    #[error("{collaborator} failed: {source}")]
    Failed {
        collaborator: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CollaboratorError {
    pub fn unavailable(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            collaborator,
            message: message.into(),
        }
    }

    pub fn failed(
        collaborator: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Failed {
            collaborator,
            source: Box::new(source),
        }
    }

    /// Name of the collaborator that failed
    pub fn collaborator(&self) -> &'static str {
        match self {
            Self::Unavailable { collaborator, .. } | Self::Failed { collaborator, .. } => {
                collaborator
            }
        }
    }
}

/// Team membership lookup
pub trait TeamDirectory: Send + Sync {
    /// Whether `team` is a known team
    fn is_known_team(&self, team: &str) -> Result<bool, CollaboratorError>;
}

/// Result of claiming a name in a [`NameIndex`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The name was free and is now owned by the claimant
    Claimed,
    /// The claimant already owned the name
    AlreadyOwned,
    /// Someone else owns the name
    Conflict { owner: String },
}

/// Index of claimed names, keyed by uniqueness scope
///
/// Consistency across processes is whatever the implementation provides; the
/// validator treats answers as best-effort.
pub trait NameIndex: Send + Sync {
    /// Current owner of `name` within `scope`, if claimed
    fn owner_of(&self, scope: &str, name: &str) -> Result<Option<String>, CollaboratorError>;

    /// Claim `name` within `scope` for `owner`
    fn claim(&self, scope: &str, name: &str, owner: &str) -> Result<ClaimOutcome, CollaboratorError>;
}

/// Destination for audit events
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent) -> Result<(), CollaboratorError>;
}
