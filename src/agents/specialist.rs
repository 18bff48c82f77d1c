//! The contract shared by all specialist agents and the boundary that
//! isolates their failures.

use async_trait::async_trait;

use super::error::AgentResult;
use super::state::AgentState;
use super::supervisor::Task;

/// A single-purpose agent run by the supervisor.
///
/// Implementations write their outputs into the state only after every
/// fallible step has succeeded, so a failed run leaves earlier outputs intact.
#[async_trait]
pub trait Specialist: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, state: &mut AgentState) -> AgentResult<()>;
}

/// Run one specialist for `task`, converting any failure into an entry in
/// `state.errors`. Returns whether the specialist succeeded.
pub async fn invoke_specialist(task: Task, specialist: &dyn Specialist, state: &mut AgentState) -> bool {
    tracing::info!(
        request_id = %state.context.request_id,
        task = %task,
        specialist = specialist.name(),
        "Invoking specialist"
    );

    match specialist.run(state).await {
        Ok(()) => {
            state.log_step(format!("Completed: {}", task));
            true
        }
        Err(e) => {
            state.record_error(format!("{} failed: {}", task, e));
            false
        }
    }
}
