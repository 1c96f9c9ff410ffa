//! Command errors and exit codes
//!
//! | code | meaning                                      |
//! |------|----------------------------------------------|
//! | 0    | success / name valid                         |
//! | 1    | name invalid, request refused                |
//! | 2    | invalid arguments                            |
//! | 3    | configuration or policy error                |
//! | 4    | collaborator or storage failure              |

use miette::Diagnostic;
use thiserror::Error;

use crate::core::{CollaboratorError, ConfigError, IdParseError, ProjectError};
use crate::naming::{GenerateError, PolicyError};
use crate::workflow::{RequestError, StoreError, TableError, TransitionError};
use crate::yaml::YamlError;

/// What a successful command concluded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// The command ran but the subject failed its checks
    Invalid,
}

impl Outcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Success => 0,
            Outcome::Invalid => 1,
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum CommandError {
    #[error(transparent)]
    #[diagnostic(code(ngt::policy), help("check the pattern documents in the patterns directory"))]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    #[diagnostic(code(ngt::config))]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(code(ngt::project))]
    Project(#[from] ProjectError),

    #[error(transparent)]
    #[diagnostic(code(ngt::workflow::table))]
    Table(#[from] TableError),

    #[error(transparent)]
    #[diagnostic(code(ngt::generate))]
    Generate(#[from] GenerateError),

    #[error(transparent)]
    #[diagnostic(code(ngt::workflow::transition))]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    #[diagnostic(code(ngt::request))]
    Request(#[from] RequestError),

    #[error(transparent)]
    #[diagnostic(code(ngt::request::id))]
    Id(#[from] IdParseError),

    #[error(transparent)]
    #[diagnostic(code(ngt::collaborator))]
    Collaborator(#[from] CollaboratorError),

    #[error(transparent)]
    #[diagnostic(code(ngt::store))]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(code(ngt::yaml))]
    Yaml(#[from] YamlError),

    #[error("{0}")]
    #[diagnostic(code(ngt::usage))]
    Usage(String),

    #[error("IO error: {0}")]
    #[diagnostic(code(ngt::io))]
    Io(#[from] std::io::Error),
}

impl CommandError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            CommandError::Transition(_) | CommandError::Request(_) => 1,
            CommandError::Usage(_) | CommandError::Id(_) => 2,
            // An unknown type/environment pair is a bad argument, not a broken policy
            CommandError::Policy(PolicyError::PatternNotFound { .. })
            | CommandError::Generate(GenerateError::Policy(PolicyError::PatternNotFound { .. })) => 2,
            CommandError::Generate(GenerateError::Policy(_)) => 3,
            CommandError::Generate(GenerateError::InvariantViolated { .. }) => 3,
            CommandError::Generate(_) => 2,
            CommandError::Policy(_)
            | CommandError::Config(_)
            | CommandError::Project(_)
            | CommandError::Table(_) => 3,
            CommandError::Store(StoreError::NotFound(_) | StoreError::WrongKind { .. }) => 2,
            CommandError::Collaborator(_)
            | CommandError::Store(_)
            | CommandError::Yaml(_)
            | CommandError::Io(_) => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RequestId, RequestPrefix};

    #[test]
    fn test_exit_codes() {
        assert_eq!(Outcome::Invalid.exit_code(), 1);
        assert_eq!(
            CommandError::from(TransitionError::GuardFailed { guard: "g" }).exit_code(),
            1
        );
        assert_eq!(CommandError::usage("bad").exit_code(), 2);
        assert_eq!(
            CommandError::from(PolicyError::PatternNotFound {
                resource_type: "x".into(),
                environment: "y".into()
            })
            .exit_code(),
            2
        );
        assert_eq!(
            CommandError::from(GenerateError::Policy(PolicyError::PatternNotFound {
                resource_type: "mainframe".into(),
                environment: "prod".into()
            }))
            .exit_code(),
            2
        );
        assert_eq!(
            CommandError::from(PolicyError::MalformedTemplate {
                id: "bad".into(),
                reason: "empty".into()
            })
            .exit_code(),
            3
        );
        assert_eq!(
            CommandError::from(CollaboratorError::unavailable("name index", "down")).exit_code(),
            4
        );
        assert_eq!(
            CommandError::from(StoreError::NotFound(RequestId::new(RequestPrefix::Chg, 2026, 1)))
                .exit_code(),
            2
        );
    }
}
