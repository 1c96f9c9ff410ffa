//! Exception requests - time-boxed or permanent waivers of naming violations
//!
//! `requested → under_review → {approved → active → {expired | revoked} | denied}`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::identity::{RequestId, RequestPrefix};
use crate::naming::validator::ViolationCode;
use crate::workflow::engine::{
    ApprovalRecord, Payload, RejectionRecord, Transition, TransitionRecord, TransitionTable,
    Workflow,
};
use crate::workflow::store::{Request, RequestError};

pub const REQUIRE_DURATION: &str = "require_duration_if_temporary";
pub const EXPIRY_REACHED: &str = "expiry_reached";

labeled_enum! {
    /// Exception request lifecycle state
    pub enum ExceptionState {
        Requested => "requested",
        UnderReview => "under_review",
        Approved => "approved",
        Active => "active",
        Expired => "expired",
        Revoked => "revoked",
        Denied => "denied",
    }
}

labeled_enum! {
    /// Events accepted by the exception workflow
    pub enum ExceptionEvent {
        Review => "review",
        Approve => "approve",
        Deny => "deny",
        Activate => "activate",
        Expire => "expire",
        Revoke => "revoke",
    }
}

labeled_enum! {
    /// How long an exception is meant to last
    pub enum ExceptionType {
        Temporary => "temporary",
        Standard => "standard",
        Permanent => "permanent",
    }
}

impl ExceptionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExceptionState::Expired | ExceptionState::Revoked | ExceptionState::Denied
        )
    }
}

/// Validity window of an exception
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionDuration {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ExceptionDuration {
    pub fn is_valid(&self) -> bool {
        self.end > self.start
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now >= self.end
    }
}

/// A request to waive naming violations for a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionRequest {
    pub id: RequestId,
    pub title: String,

    #[serde(rename = "type")]
    pub exception_type: ExceptionType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,

    /// Resource name the exception applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,

    /// Violation codes being waived
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub waived_codes: Vec<ViolationCode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<ExceptionDuration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_change_id: Option<RequestId>,

    pub state: ExceptionState,
    pub requester: String,
    pub created: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approvals: Vec<ApprovalRecord>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejections: Vec<RejectionRecord>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<TransitionRecord<ExceptionState, ExceptionEvent>>,
}

impl ExceptionRequest {
    pub fn new(
        id: RequestId,
        title: impl Into<String>,
        exception_type: ExceptionType,
        requester: impl Into<String>,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            exception_type,
            justification: None,
            resource_name: None,
            waived_codes: Vec::new(),
            duration: None,
            linked_change_id: None,
            state: ExceptionState::Requested,
            requester: requester.into(),
            created,
            approvals: Vec::new(),
            rejections: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn with_duration(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.duration = Some(ExceptionDuration { start, end });
        self
    }

    pub fn with_justification(mut self, justification: impl Into<String>) -> Self {
        self.justification = Some(justification.into());
        self
    }

    pub fn with_resource(mut self, name: impl Into<String>) -> Self {
        self.resource_name = Some(name.into());
        self
    }

    pub fn with_waived_codes(mut self, codes: Vec<ViolationCode>) -> Self {
        self.waived_codes = codes;
        self
    }

    pub fn linked_to(mut self, change: RequestId) -> Self {
        self.linked_change_id = Some(change);
        self
    }

    /// Temporary exceptions need a well-formed duration
    pub fn has_required_duration(&self) -> bool {
        self.exception_type != ExceptionType::Temporary
            || self.duration.is_some_and(|d| d.is_valid())
    }

    /// Whether the validity window has closed at `now`
    pub fn is_past_end(&self, now: DateTime<Utc>) -> bool {
        self.duration.is_some_and(|d| d.has_ended(now))
    }
}

impl Workflow for ExceptionRequest {
    type State = ExceptionState;
    type Event = ExceptionEvent;
    const KIND: &'static str = "exception";

    fn id(&self) -> String {
        self.id.to_string()
    }

    fn state(&self) -> ExceptionState {
        self.state
    }

    fn commit(&mut self, record: TransitionRecord<ExceptionState, ExceptionEvent>, payload: &Payload) {
        match record.event {
            ExceptionEvent::Approve => self.approvals.push(ApprovalRecord {
                approver: payload.actor.clone(),
                at: payload.at,
                comment: payload.comment.clone(),
            }),
            ExceptionEvent::Deny => self.rejections.push(RejectionRecord {
                actor: payload.actor.clone(),
                at: payload.at,
                reason: payload.comment.clone(),
            }),
            _ => {}
        }
        self.state = record.to;
        self.history.push(record);
    }
}

impl Request for ExceptionRequest {
    const PREFIX: RequestPrefix = RequestPrefix::Exc;

    fn request_id(&self) -> RequestId {
        self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn state_label(&self) -> &'static str {
        self.state.as_str()
    }

    fn requester(&self) -> &str {
        &self.requester
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }

    fn check(&self) -> Result<(), RequestError> {
        if self.title.trim().is_empty() {
            return Err(RequestError::EmptyTitle);
        }
        match (self.exception_type, self.duration) {
            (_, Some(d)) if !d.is_valid() => Err(RequestError::InvalidDuration {
                start: d.start,
                end: d.end,
            }),
            (ExceptionType::Temporary, None) => Err(RequestError::DurationRequired),
            _ => Ok(()),
        }
    }
}

fn duration_if_temporary(exception: &ExceptionRequest, _payload: &Payload) -> bool {
    exception.has_required_duration()
}

fn expiry_reached(exception: &ExceptionRequest, payload: &Payload) -> bool {
    exception.is_past_end(payload.at)
}

/// Transition table for exception requests
pub fn exception_table() -> TransitionTable<ExceptionRequest> {
    use ExceptionEvent as E;
    use ExceptionState as S;

    TransitionTable::new()
        .terminal([S::Expired, S::Revoked, S::Denied])
        .transition(
            Transition::new(S::Requested, E::Review, S::UnderReview).action("notify_approvers"),
        )
        .transition(
            Transition::new(S::UnderReview, E::Approve, S::Approved)
                .guard(REQUIRE_DURATION, duration_if_temporary)
                .action("notify_requester"),
        )
        .transition(
            Transition::new(S::UnderReview, E::Deny, S::Denied).action("notify_requester"),
        )
        .transition(
            Transition::new(S::Approved, E::Activate, S::Active)
                .guard(REQUIRE_DURATION, duration_if_temporary)
                .action("schedule_expiry"),
        )
        .transition(
            Transition::new(S::Active, E::Expire, S::Expired)
                .guard(EXPIRY_REACHED, expiry_reached)
                .action("notify_requester"),
        )
        .transition(
            Transition::new(S::Active, E::Revoke, S::Revoked).action("notify_requester"),
        )
}

/// IDs of live exceptions whose validity window has closed at `now`
///
/// Pure query: nothing is transitioned, and repeated calls with the same
/// inputs return the same IDs.
pub fn expired_exceptions<'a, I>(now: DateTime<Utc>, instances: I) -> Vec<RequestId>
where
    I: IntoIterator<Item = &'a ExceptionRequest>,
{
    instances
        .into_iter()
        .filter(|e| !e.state.is_terminal() && e.is_past_end(now))
        .map(|e| e.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::actions::LoggingActionHandler;
    use crate::workflow::engine::{TransitionError, WorkflowEngine};
    use chrono::Duration;

    fn exception(seq: u32, kind: ExceptionType) -> ExceptionRequest {
        ExceptionRequest::new(
            RequestId::new(RequestPrefix::Exc, 2026, seq),
            "Legacy bucket name",
            kind,
            "alice",
            Utc::now(),
        )
    }

    #[test]
    fn test_exception_table_is_valid() {
        assert!(WorkflowEngine::new(exception_table()).is_ok());
    }

    #[test]
    fn test_terminal_states_match_table() {
        for state in ExceptionState::ALL {
            let engine = WorkflowEngine::new(exception_table()).unwrap();
            assert_eq!(engine.is_terminal(*state), state.is_terminal());
        }
    }

    #[test]
    fn test_temporary_without_duration_cannot_be_approved() {
        let engine = WorkflowEngine::new(exception_table()).unwrap();
        let handler = LoggingActionHandler;
        let mut exc = exception(1, ExceptionType::Temporary);

        engine
            .fire(&mut exc, ExceptionEvent::Review, &Payload::now("bob"), &handler)
            .unwrap();
        let err = engine
            .fire(&mut exc, ExceptionEvent::Approve, &Payload::now("bob"), &handler)
            .unwrap_err();
        assert_eq!(err, TransitionError::GuardFailed { guard: REQUIRE_DURATION });
        assert_eq!(exc.state, ExceptionState::UnderReview);
        assert!(matches!(exc.check(), Err(RequestError::DurationRequired)));
    }

    #[test]
    fn test_expire_waits_for_end_of_window() {
        let engine = WorkflowEngine::new(exception_table()).unwrap();
        let handler = LoggingActionHandler;
        let now = Utc::now();
        let mut exc = exception(2, ExceptionType::Temporary)
            .with_duration(now - Duration::days(1), now + Duration::days(7));

        for event in [
            ExceptionEvent::Review,
            ExceptionEvent::Approve,
            ExceptionEvent::Activate,
        ] {
            engine
                .fire(&mut exc, event, &Payload::new("bob", now), &handler)
                .unwrap();
        }
        assert_eq!(exc.state, ExceptionState::Active);

        let err = engine
            .fire(&mut exc, ExceptionEvent::Expire, &Payload::new("system", now), &handler)
            .unwrap_err();
        assert_eq!(err, TransitionError::GuardFailed { guard: EXPIRY_REACHED });

        let later = now + Duration::days(8);
        engine
            .fire(&mut exc, ExceptionEvent::Expire, &Payload::new("system", later), &handler)
            .unwrap();
        assert_eq!(exc.state, ExceptionState::Expired);
        assert_eq!(exc.approvals.len(), 1);
    }

    #[test]
    fn test_expired_exceptions_query() {
        let now = Utc::now();
        let past = exception(1, ExceptionType::Temporary)
            .with_duration(now - Duration::days(10), now - Duration::days(1));
        let current = exception(2, ExceptionType::Temporary)
            .with_duration(now - Duration::days(1), now + Duration::days(1));
        let permanent = exception(3, ExceptionType::Permanent);
        let mut done = past.clone();
        done.id = RequestId::new(RequestPrefix::Exc, 2026, 4);
        done.state = ExceptionState::Revoked;

        let all = vec![past, current, permanent, done];
        let first = expired_exceptions(now, &all);
        assert_eq!(first, vec![RequestId::new(RequestPrefix::Exc, 2026, 1)]);
        assert_eq!(expired_exceptions(now, &all), first);
    }

    #[test]
    fn test_check_rejects_inverted_window() {
        let now = Utc::now();
        let exc = exception(1, ExceptionType::Standard).with_duration(now, now - Duration::hours(1));
        assert!(matches!(exc.check(), Err(RequestError::InvalidDuration { .. })));
        assert!(exception(2, ExceptionType::Permanent).check().is_ok());
    }

    #[test]
    fn test_waived_codes_serialize_as_codes() {
        let exc = exception(1, ExceptionType::Permanent)
            .with_waived_codes(vec![ViolationCode::MissingEnvironmentPrefix])
            .linked_to(RequestId::new(RequestPrefix::Chg, 2026, 9));
        let yaml = serde_yml::to_string(&exc).unwrap();
        assert!(yaml.contains("MISSING_ENVIRONMENT_PREFIX"));
        assert!(yaml.contains("linked_change_id: CHG-2026-009"));
        let back: ExceptionRequest = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(back, exc);
    }
}
