//! Request workflows - one generic state machine, one transition table per request type

/// Enum with a fixed snake_case label per variant, used for states, events and
/// request attributes that appear in YAML documents and on the command line.
macro_rules! labeled_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $( $(#[$vmeta])* #[serde(rename = $label)] $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $label ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_lowercase().replace('-', "_");
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| {
                        let labels: Vec<&str> = $name::ALL.iter().map(|v| v.as_str()).collect();
                        format!("'{}' is not one of: {}", s, labels.join(", "))
                    })
            }
        }
    };
}

pub mod actions;
pub mod change;
pub mod engine;
pub mod exception;
pub mod lock;
pub mod store;

pub use actions::LoggingActionHandler;
pub use change::{change_table, ChangeEvent, ChangeRequest, ChangeState, ChangeType, RiskLevel};
pub use engine::{
    ActionContext, ActionFailure, ActionHandler, ApprovalRecord, FireOutcome, Guard, Payload,
    RejectionRecord, SharedInstance, TableError, Transition, TransitionError, TransitionRecord,
    TransitionTable, Workflow, WorkflowEngine,
};
pub use exception::{
    exception_table, expired_exceptions, ExceptionDuration, ExceptionEvent, ExceptionRequest,
    ExceptionState, ExceptionType,
};
pub use lock::RequestLock;
pub use store::{Request, RequestError, RequestStore, StoreError, YamlRequestStore};
