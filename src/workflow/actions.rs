//! Action handlers

use crate::core::collaborator::CollaboratorError;
use crate::workflow::engine::{ActionContext, ActionHandler};

/// Reports workflow actions as structured log events
///
/// Notification delivery and expiry scheduling live outside the toolkit; this
/// handler makes the intent visible to whatever collects the logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingActionHandler;

impl ActionHandler for LoggingActionHandler {
    fn run(&self, action: &str, ctx: &ActionContext<'_>) -> Result<(), CollaboratorError> {
        tracing::info!(
            target: "ngt::action",
            action,
            workflow = ctx.workflow,
            id = ctx.id,
            from = ctx.from,
            to = ctx.to,
            event = ctx.event,
            actor = %ctx.payload.actor,
            "workflow action"
        );
        Ok(())
    }
}
