//! Core module - collaborators, configuration and project plumbing

pub mod audit;
pub mod collaborator;
pub mod config;
pub mod identity;
pub mod name_index;
pub mod project;
pub mod team;

pub use audit::{AuditEvent, AuditOutcome, JsonlAuditSink, NullAuditSink};
pub use collaborator::{AuditSink, ClaimOutcome, CollaboratorError, NameIndex, TeamDirectory};
pub use config::{Config, ConfigError};
pub use identity::{IdParseError, RequestId, RequestPrefix};
pub use name_index::{MemoryNameIndex, SqliteNameIndex, UnavailableNameIndex};
pub use project::{Project, ProjectError};
pub use team::{Team, TeamRoster};
