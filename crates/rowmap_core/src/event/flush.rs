//! Listener for flush events.

use crate::error::CoreResult;
use crate::event::{FlushEvent, SessionContext};
use crate::write::Persister;

/// Drains the action queue in enqueue order.
#[derive(Debug)]
pub struct FlushListener {
    persister: Persister,
}

impl FlushListener {
    pub(crate) fn new(persister: Persister) -> Self {
        Self { persister }
    }

    /// Executes every queued action.
    ///
    /// # Errors
    ///
    /// Propagates the first failing action; see
    /// [`ActionQueue::execute_all`](crate::action::ActionQueue::execute_all)
    /// for what remains queued afterwards.
    pub fn on_flush(&self, _event: FlushEvent, ctx: &mut SessionContext<'_>) -> CoreResult<()> {
        ctx.queue.execute_all(&self.persister)
    }
}
