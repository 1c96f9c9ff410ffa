//! Generic workflow engine
//!
//! A [`TransitionTable`] declares, per request type, which `(state, event)`
//! pairs are allowed, the guards that must hold and the actions to run. The
//! engine holds no request-specific logic.
//!
//! Firing an event is evaluate-then-commit: every guard is checked against the
//! untouched instance first, and the instance is only mutated once all pass.
//! Actions run after the commit; their failures are reported in the
//! [`FireOutcome`] and never undo the transition.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use thiserror::Error;

use crate::core::collaborator::CollaboratorError;

/// A request type driven by the engine
pub trait Workflow {
    type State: Copy + Eq + Hash + fmt::Debug + fmt::Display;
    type Event: Copy + Eq + Hash + fmt::Debug + fmt::Display;

    /// Workflow name used in logs and action contexts, e.g. `change`
    const KIND: &'static str;

    fn id(&self) -> String;

    fn state(&self) -> Self::State;

    /// Apply a transition whose guards have already passed
    fn commit(&mut self, record: TransitionRecord<Self::State, Self::Event>, payload: &Payload);
}

/// Who fires an event, when, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub at: DateTime<Utc>,
}

impl Payload {
    pub fn new(actor: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            actor: actor.into(),
            comment: None,
            at,
        }
    }

    pub fn now(actor: impl Into<String>) -> Self {
        Self::new(actor, Utc::now())
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// One committed transition in an instance's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord<S, E> {
    pub from: S,
    pub to: S,
    pub event: E,
    pub actor: String,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// An approval given on a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub approver: String,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// A rejection or denial of a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionRecord {
    pub actor: String,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Named precondition on a transition
pub struct Guard<W> {
    pub name: &'static str,
    pub check: fn(&W, &Payload) -> bool,
}

impl<W> Clone for Guard<W> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<W> Copy for Guard<W> {}

impl<W> fmt::Debug for Guard<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Guard").field(&self.name).finish()
    }
}

/// One row of a transition table
pub struct Transition<W: Workflow> {
    pub from: W::State,
    pub event: W::Event,
    pub to: W::State,
    pub guards: Vec<Guard<W>>,
    pub actions: Vec<&'static str>,
}

impl<W: Workflow> Transition<W> {
    pub fn new(from: W::State, event: W::Event, to: W::State) -> Self {
        Self {
            from,
            event,
            to,
            guards: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn guard(mut self, name: &'static str, check: fn(&W, &Payload) -> bool) -> Self {
        self.guards.push(Guard { name, check });
        self
    }

    pub fn action(mut self, name: &'static str) -> Self {
        self.actions.push(name);
        self
    }
}

/// Declarative description of a workflow
pub struct TransitionTable<W: Workflow> {
    transitions: Vec<Transition<W>>,
    terminal: Vec<W::State>,
}

impl<W: Workflow> TransitionTable<W> {
    pub fn new() -> Self {
        Self {
            transitions: Vec::new(),
            terminal: Vec::new(),
        }
    }

    pub fn terminal(mut self, states: impl IntoIterator<Item = W::State>) -> Self {
        self.terminal.extend(states);
        self
    }

    pub fn transition(mut self, transition: Transition<W>) -> Self {
        self.transitions.push(transition);
        self
    }

    pub fn transitions(&self) -> &[Transition<W>] {
        &self.transitions
    }
}

impl<W: Workflow> Default for TransitionTable<W> {
    fn default() -> Self {
        Self::new()
    }
}

/// A transition table that cannot be executed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("Duplicate transition for state '{state}' on event '{event}'")]
    DuplicateTransition { state: String, event: String },

    #[error("Terminal state '{state}' has an outgoing transition on event '{event}'")]
    TransitionFromTerminal { state: String, event: String },
}

/// Why an event could not be applied
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Guard failed: {guard}")]
    GuardFailed { guard: &'static str },

    #[error("Event '{event}' is not allowed in state '{state}'")]
    InvalidTransition { state: String, event: String },

    #[error("{id} is in terminal state '{state}'; no further transitions are allowed")]
    WorkflowTerminated { id: String, state: String },

    #[error("{id} changed concurrently: expected state '{expected}', found '{actual}'")]
    StaleState {
        id: String,
        expected: String,
        actual: String,
    },
}

/// What an action handler is told about a committed transition
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    pub workflow: &'static str,
    pub id: &'a str,
    pub from: &'a str,
    pub to: &'a str,
    pub event: &'a str,
    pub payload: &'a Payload,
}

/// Runs named side effects after a transition commits
pub trait ActionHandler: Send + Sync {
    fn run(&self, action: &str, ctx: &ActionContext<'_>) -> Result<(), CollaboratorError>;
}

/// A post-commit action that failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionFailure {
    pub action: &'static str,
    pub error: String,
}

/// Result of a committed transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FireOutcome<S> {
    pub from: S,
    pub to: S,
    pub action_failures: Vec<ActionFailure>,
}

impl<S> FireOutcome<S> {
    pub fn actions_succeeded(&self) -> bool {
        self.action_failures.is_empty()
    }
}

/// Executes a validated transition table
pub struct WorkflowEngine<W: Workflow> {
    table: TransitionTable<W>,
}

impl<W: Workflow> WorkflowEngine<W> {
    /// Check the table and build an engine for it
    pub fn new(table: TransitionTable<W>) -> Result<Self, TableError> {
        for (i, t) in table.transitions.iter().enumerate() {
            if table.terminal.contains(&t.from) {
                return Err(TableError::TransitionFromTerminal {
                    state: t.from.to_string(),
                    event: t.event.to_string(),
                });
            }
            if table.transitions[..i]
                .iter()
                .any(|other| other.from == t.from && other.event == t.event)
            {
                return Err(TableError::DuplicateTransition {
                    state: t.from.to_string(),
                    event: t.event.to_string(),
                });
            }
        }
        Ok(Self { table })
    }

    pub fn is_terminal(&self, state: W::State) -> bool {
        self.table.terminal.contains(&state)
    }

    /// Events that have a transition out of `state`
    pub fn available_events(&self, state: W::State) -> Vec<W::Event> {
        self.table
            .transitions
            .iter()
            .filter(|t| t.from == state)
            .map(|t| t.event)
            .collect()
    }

    fn lookup(&self, state: W::State, event: W::Event) -> Option<&Transition<W>> {
        self.table
            .transitions
            .iter()
            .find(|t| t.from == state && t.event == event)
    }

    /// Names of the guards that would currently block `event`, without committing
    pub fn failing_guards(&self, instance: &W, event: W::Event, payload: &Payload) -> Vec<&'static str> {
        self.lookup(instance.state(), event)
            .map(|t| {
                t.guards
                    .iter()
                    .filter(|g| !(g.check)(instance, payload))
                    .map(|g| g.name)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Apply `event` to `instance`
    pub fn fire(
        &self,
        instance: &mut W,
        event: W::Event,
        payload: &Payload,
        handler: &dyn ActionHandler,
    ) -> Result<FireOutcome<W::State>, TransitionError> {
        let from = instance.state();

        if self.is_terminal(from) {
            return Err(TransitionError::WorkflowTerminated {
                id: instance.id(),
                state: from.to_string(),
            });
        }

        let transition = self
            .lookup(from, event)
            .ok_or_else(|| TransitionError::InvalidTransition {
                state: from.to_string(),
                event: event.to_string(),
            })?;

        if let Some(guard) = transition
            .guards
            .iter()
            .find(|g| !(g.check)(&*instance, payload))
        {
            tracing::debug!(
                workflow = W::KIND,
                id = %instance.id(),
                guard = guard.name,
                "transition blocked"
            );
            return Err(TransitionError::GuardFailed { guard: guard.name });
        }

        let to = transition.to;
        instance.commit(
            TransitionRecord {
                from,
                to,
                event,
                actor: payload.actor.clone(),
                at: payload.at,
                comment: payload.comment.clone(),
            },
            payload,
        );

        let id = instance.id();
        tracing::info!(workflow = W::KIND, id = %id, %from, %to, %event, "transition committed");

        let (from_label, to_label, event_label) = (from.to_string(), to.to_string(), event.to_string());
        let ctx = ActionContext {
            workflow: W::KIND,
            id: &id,
            from: &from_label,
            to: &to_label,
            event: &event_label,
            payload,
        };

        let mut action_failures = Vec::new();
        for &action in &transition.actions {
            if let Err(e) = handler.run(action, &ctx) {
                tracing::warn!(workflow = W::KIND, id = %id, action, error = %e, "action failed");
                action_failures.push(ActionFailure {
                    action,
                    error: e.to_string(),
                });
            }
        }

        Ok(FireOutcome {
            from,
            to,
            action_failures,
        })
    }
}

/// An instance guarded for single-writer access
pub struct SharedInstance<W> {
    inner: Mutex<W>,
}

impl<W: Workflow + Clone> SharedInstance<W> {
    pub fn new(instance: W) -> Self {
        Self {
            inner: Mutex::new(instance),
        }
    }

    /// Copy of the instance as it is right now
    pub fn snapshot(&self) -> W {
        self.inner.lock().clone()
    }

    pub fn state(&self) -> W::State {
        self.inner.lock().state()
    }

    /// Fire under the instance lock; concurrent callers are serialized
    pub fn fire(
        &self,
        engine: &WorkflowEngine<W>,
        event: W::Event,
        payload: &Payload,
        handler: &dyn ActionHandler,
    ) -> Result<FireOutcome<W::State>, TransitionError> {
        let mut instance = self.inner.lock();
        engine.fire(&mut instance, event, payload, handler)
    }

    /// Fire only if the instance is still in `expected`
    pub fn fire_expecting(
        &self,
        engine: &WorkflowEngine<W>,
        expected: W::State,
        event: W::Event,
        payload: &Payload,
        handler: &dyn ActionHandler,
    ) -> Result<FireOutcome<W::State>, TransitionError> {
        let mut instance = self.inner.lock();
        let actual = instance.state();
        if actual != expected {
            return Err(TransitionError::StaleState {
                id: instance.id(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        engine.fire(&mut instance, event, payload, handler)
    }

    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    labeled_enum! {
        enum Light {
            Off => "off",
            On => "on",
            Broken => "broken",
        }
    }

    labeled_enum! {
        enum Switch {
            Flip => "flip",
            Smash => "smash",
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Lamp {
        state: Light,
        locked: bool,
        history: Vec<TransitionRecord<Light, Switch>>,
    }

    impl Workflow for Lamp {
        type State = Light;
        type Event = Switch;
        const KIND: &'static str = "lamp";

        fn id(&self) -> String {
            "LAMP-1".to_string()
        }

        fn state(&self) -> Light {
            self.state
        }

        fn commit(&mut self, record: TransitionRecord<Light, Switch>, _payload: &Payload) {
            self.state = record.to;
            self.history.push(record);
        }
    }

    fn lamp() -> Lamp {
        Lamp {
            state: Light::Off,
            locked: false,
            history: Vec::new(),
        }
    }

    fn table() -> TransitionTable<Lamp> {
        TransitionTable::new()
            .terminal([Light::Broken])
            .transition(
                Transition::new(Light::Off, Switch::Flip, Light::On)
                    .guard("not_locked", |lamp: &Lamp, _| !lamp.locked)
                    .action("announce"),
            )
            .transition(Transition::new(Light::On, Switch::Flip, Light::Off))
            .transition(Transition::new(Light::On, Switch::Smash, Light::Broken))
    }

    struct Recording(parking_lot::Mutex<Vec<String>>);

    impl ActionHandler for Recording {
        fn run(&self, action: &str, ctx: &ActionContext<'_>) -> Result<(), CollaboratorError> {
            self.0.lock().push(format!("{}:{}->{}", action, ctx.from, ctx.to));
            Ok(())
        }
    }

    struct Failing;

    impl ActionHandler for Failing {
        fn run(&self, _action: &str, _ctx: &ActionContext<'_>) -> Result<(), CollaboratorError> {
            Err(CollaboratorError::unavailable("notifier", "offline"))
        }
    }

    #[test]
    fn test_fire_commits_and_runs_actions() {
        let engine = WorkflowEngine::new(table()).unwrap();
        let handler = Recording(parking_lot::Mutex::new(Vec::new()));
        let mut lamp = lamp();

        let outcome = engine
            .fire(&mut lamp, Switch::Flip, &Payload::now("alice"), &handler)
            .unwrap();
        assert_eq!(outcome.to, Light::On);
        assert!(outcome.actions_succeeded());
        assert_eq!(lamp.history.len(), 1);
        assert_eq!(lamp.history[0].actor, "alice");
        assert_eq!(handler.0.lock().as_slice(), ["announce:off->on"]);
    }

    #[test]
    fn test_guard_failure_leaves_instance_unchanged() {
        let engine = WorkflowEngine::new(table()).unwrap();
        let mut lamp = lamp();
        lamp.locked = true;
        let before = lamp.clone();

        let err = engine
            .fire(&mut lamp, Switch::Flip, &Payload::now("alice"), &Failing)
            .unwrap_err();
        assert_eq!(err, TransitionError::GuardFailed { guard: "not_locked" });
        assert_eq!(lamp, before);
        assert_eq!(
            engine.failing_guards(&lamp, Switch::Flip, &Payload::now("alice")),
            vec!["not_locked"]
        );
    }

    #[test]
    fn test_action_failure_does_not_roll_back() {
        let engine = WorkflowEngine::new(table()).unwrap();
        let mut lamp = lamp();

        let outcome = engine
            .fire(&mut lamp, Switch::Flip, &Payload::now("alice"), &Failing)
            .unwrap();
        assert_eq!(lamp.state, Light::On);
        assert_eq!(outcome.action_failures.len(), 1);
        assert_eq!(outcome.action_failures[0].action, "announce");
    }

    #[test]
    fn test_invalid_and_terminal_events() {
        let engine = WorkflowEngine::new(table()).unwrap();
        let mut lamp = lamp();

        assert!(matches!(
            engine.fire(&mut lamp, Switch::Smash, &Payload::now("a"), &Failing),
            Err(TransitionError::InvalidTransition { .. })
        ));

        lamp.state = Light::On;
        engine
            .fire(&mut lamp, Switch::Smash, &Payload::now("a"), &Failing)
            .unwrap();
        let before = lamp.clone();
        for event in Switch::ALL {
            assert!(matches!(
                engine.fire(&mut lamp, *event, &Payload::now("a"), &Failing),
                Err(TransitionError::WorkflowTerminated { .. })
            ));
        }
        assert_eq!(lamp, before);
    }

    #[test]
    fn test_table_validation() {
        let duplicate = table().transition(Transition::new(Light::Off, Switch::Flip, Light::Broken));
        assert!(matches!(
            WorkflowEngine::new(duplicate),
            Err(TableError::DuplicateTransition { .. })
        ));

        let from_terminal = table().transition(Transition::new(Light::Broken, Switch::Flip, Light::On));
        assert!(matches!(
            WorkflowEngine::new(from_terminal),
            Err(TableError::TransitionFromTerminal { .. })
        ));
    }

    #[test]
    fn test_available_events() {
        let engine = WorkflowEngine::new(table()).unwrap();
        assert_eq!(engine.available_events(Light::On), vec![Switch::Flip, Switch::Smash]);
        assert!(engine.available_events(Light::Broken).is_empty());
    }

    #[test]
    fn test_fire_expecting_detects_stale_state() {
        let engine = WorkflowEngine::new(table()).unwrap();
        let shared = SharedInstance::new(lamp());

        shared
            .fire_expecting(&engine, Light::Off, Switch::Flip, &Payload::now("a"), &Failing)
            .unwrap();
        let err = shared
            .fire_expecting(&engine, Light::Off, Switch::Flip, &Payload::now("b"), &Failing)
            .unwrap_err();
        assert!(matches!(err, TransitionError::StaleState { .. }));
        assert_eq!(shared.state(), Light::On);
    }

    #[test]
    fn test_concurrent_fires_are_serialized() {
        let engine = Arc::new(WorkflowEngine::new(table()).unwrap());
        let shared = Arc::new(SharedInstance::new(lamp()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = Arc::clone(&engine);
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || {
                    shared
                        .fire_expecting(
                            &engine,
                            Light::Off,
                            Switch::Flip,
                            &Payload::now(format!("user{}", i)),
                            &Failing,
                        )
                        .is_ok()
                })
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
        assert_eq!(shared.snapshot().history.len(), 1);
    }
}
