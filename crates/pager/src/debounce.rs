//! Trailing-edge task debouncing.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Default debounce window for interactive search input.
pub const DEBOUNCE_WAIT_DEFAULT: Duration = Duration::from_millis(700);

/// Collapses bursts of scheduled tasks into the most recent one.
///
/// At most one task is pending at a time; scheduling a new task discards
/// the previous one if its timer has not fired yet. Once the timer fires
/// the task runs to completion detached from the debouncer:
/// [`TaskDebouncer::cancel_pending`] only reaches tasks still inside the
/// wait window.
#[derive(Debug)]
pub struct TaskDebouncer {
	wait: Duration,
	pending: Option<CancellationToken>,
}

impl Default for TaskDebouncer {
	fn default() -> Self {
		Self::new(DEBOUNCE_WAIT_DEFAULT)
	}
}

impl TaskDebouncer {
	/// Creates a debouncer with the given wait window.
	pub fn new(wait: Duration) -> Self {
		Self { wait, pending: None }
	}

	/// Schedules `task` to run once the wait window elapses, discarding
	/// any previously scheduled task that has not fired yet.
	///
	/// The task is fire-and-forget; its result is not awaited here.
	/// Must be called from within a tokio runtime.
	pub fn schedule<F, Fut>(&mut self, task: F)
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		self.cancel_pending();
		let gate = CancellationToken::new();
		self.pending = Some(gate.clone());
		tracing::trace!(wait_ms = self.wait.as_millis() as u64, "pager.debounce.schedule");
		// deadline is fixed here, at schedule time, not at first poll
		let timer = tokio::time::sleep(self.wait);
		tokio::spawn(async move {
			tokio::select! {
				// cancellation wins when both are ready
				biased;
				_ = gate.cancelled() => {}
				_ = timer => task().await,
			}
		});
	}

	/// Discards the pending task if its timer has not fired yet;
	/// otherwise a no-op (a fired task is past the debouncer's reach).
	pub fn cancel_pending(&mut self) {
		if let Some(gate) = self.pending.take() {
			gate.cancel();
		}
	}
}
