//! Change requests
//!
//! `draft → submitted → risk_assessed → {approved | rejected} → implemented → {closed | rolled_back}`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::identity::{RequestId, RequestPrefix};
use crate::workflow::engine::{
    ApprovalRecord, Payload, RejectionRecord, Transition, TransitionRecord, TransitionTable,
    Workflow,
};
use crate::workflow::store::{Request, RequestError};

/// Guard blocking progress of high-risk changes that have no rollback plan
pub const REQUIRE_ROLLBACK_PLAN: &str = "require_rollback_plan_if_risk_high";

labeled_enum! {
    /// Change request lifecycle state
    pub enum ChangeState {
        Draft => "draft",
        Submitted => "submitted",
        RiskAssessed => "risk_assessed",
        Approved => "approved",
        Rejected => "rejected",
        Implemented => "implemented",
        Closed => "closed",
        RolledBack => "rolled_back",
    }
}

labeled_enum! {
    /// Events accepted by the change workflow
    pub enum ChangeEvent {
        Submit => "submit",
        AssessRisk => "assess_risk",
        Approve => "approve",
        Reject => "reject",
        Implement => "implement",
        Close => "close",
        RollBack => "roll_back",
    }
}

labeled_enum! {
    /// Change category
    pub enum ChangeType {
        Standard => "standard",
        Normal => "normal",
        Emergency => "emergency",
    }
}

labeled_enum! {
    /// Assessed risk of a change
    pub enum RiskLevel {
        Critical => "critical",
        High => "high",
        Medium => "medium",
        Low => "low",
    }
}

impl RiskLevel {
    /// Critical and high risk changes need a rollback plan
    pub fn requires_rollback_plan(&self) -> bool {
        matches!(self, RiskLevel::Critical | RiskLevel::High)
    }
}

/// A request to rename, add or retire resource names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub id: RequestId,
    pub title: String,

    #[serde(rename = "type")]
    pub change_type: ChangeType,

    pub risk_level: RiskLevel,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_plan: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Resource names affected by the change
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,

    pub state: ChangeState,
    pub requester: String,
    pub created: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approvals: Vec<ApprovalRecord>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejections: Vec<RejectionRecord>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<TransitionRecord<ChangeState, ChangeEvent>>,
}

impl ChangeRequest {
    pub fn new(
        id: RequestId,
        title: impl Into<String>,
        change_type: ChangeType,
        risk_level: RiskLevel,
        requester: impl Into<String>,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            change_type,
            risk_level,
            rollback_plan: None,
            description: None,
            resources: Vec::new(),
            state: ChangeState::Draft,
            requester: requester.into(),
            created,
            approvals: Vec::new(),
            rejections: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn with_rollback_plan(mut self, plan: impl Into<String>) -> Self {
        self.rollback_plan = Some(plan.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_resources(mut self, resources: Vec<String>) -> Self {
        self.resources = resources;
        self
    }

    /// Whether the rollback-plan requirement is satisfied
    pub fn has_required_rollback_plan(&self) -> bool {
        !self.risk_level.requires_rollback_plan()
            || self
                .rollback_plan
                .as_deref()
                .is_some_and(|plan| !plan.trim().is_empty())
    }
}

impl Workflow for ChangeRequest {
    type State = ChangeState;
    type Event = ChangeEvent;
    const KIND: &'static str = "change";

    fn id(&self) -> String {
        self.id.to_string()
    }

    fn state(&self) -> ChangeState {
        self.state
    }

    fn commit(&mut self, record: TransitionRecord<ChangeState, ChangeEvent>, payload: &Payload) {
        match record.event {
            ChangeEvent::Approve => self.approvals.push(ApprovalRecord {
                approver: payload.actor.clone(),
                at: payload.at,
                comment: payload.comment.clone(),
            }),
            ChangeEvent::Reject => self.rejections.push(RejectionRecord {
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

impl Request for ChangeRequest {
    const PREFIX: RequestPrefix = RequestPrefix::Chg;

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
        Ok(())
    }
}

fn rollback_plan_if_risk_high(change: &ChangeRequest, _payload: &Payload) -> bool {
    change.has_required_rollback_plan()
}

/// Transition table for change requests
pub fn change_table() -> TransitionTable<ChangeRequest> {
    use ChangeEvent as E;
    use ChangeState as S;

    TransitionTable::new()
        .terminal([S::Rejected, S::Closed, S::RolledBack])
        .transition(
            Transition::new(S::Draft, E::Submit, S::Submitted)
                .guard(REQUIRE_ROLLBACK_PLAN, rollback_plan_if_risk_high)
                .action("notify_approvers"),
        )
        .transition(
            Transition::new(S::Submitted, E::AssessRisk, S::RiskAssessed)
                .guard(REQUIRE_ROLLBACK_PLAN, rollback_plan_if_risk_high),
        )
        .transition(
            Transition::new(S::RiskAssessed, E::Approve, S::Approved)
                .guard(REQUIRE_ROLLBACK_PLAN, rollback_plan_if_risk_high)
                .action("notify_requester"),
        )
        .transition(
            Transition::new(S::RiskAssessed, E::Reject, S::Rejected).action("notify_requester"),
        )
        .transition(Transition::new(S::Approved, E::Implement, S::Implemented))
        .transition(Transition::new(S::Implemented, E::Close, S::Closed))
        .transition(
            Transition::new(S::Implemented, E::RollBack, S::RolledBack).action("record_rollback"),
        )
}
