//! Cancellable wrappers over in-flight calls.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use lode_primitives::FetchError;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Capability to suppress one wrapped call's settlement.
///
/// Cancelling is idempotent and advisory: the underlying operation keeps
/// executing, but its outcome is replaced by [`FetchError::Cancelled`].
#[derive(Debug, Clone)]
pub struct CancelHandle {
	token: CancellationToken,
}

impl CancelHandle {
	/// Requests cancellation.
	pub fn cancel(&self) {
		self.token.cancel();
	}

	/// True once cancellation has been requested.
	pub fn is_cancelled(&self) -> bool {
		self.token.is_cancelled()
	}
}

#[derive(Debug, Default)]
struct RegistryState {
	next_key: u64,
	handles: HashMap<u64, CancelHandle>,
}

/// Tracks a cancel handle for every in-flight wrapped call.
///
/// Handles deregister themselves when their call settles, so the set
/// stays bounded across a session of many fetches. Keys are never
/// reused: a stale settlement can never remove a successor's handle.
#[derive(Debug, Default, Clone)]
pub struct CancelRegistry {
	state: Arc<Mutex<RegistryState>>,
}

impl CancelRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of outstanding handles.
	pub fn len(&self) -> usize {
		self.state.lock().handles.len()
	}

	/// True when no calls are in flight.
	pub fn is_empty(&self) -> bool {
		self.state.lock().handles.is_empty()
	}

	/// Wraps `operation` so its settlement can be suppressed.
	///
	/// The operation starts executing immediately on its own task. The
	/// returned future settles with the operation's own outcome unless
	/// cancelled first, in which case it settles with
	/// [`FetchError::Cancelled`] while the operation keeps running
	/// detached. The registry drops its handle exactly once, whichever
	/// way the wrapped call settles.
	///
	/// Must be called from within a tokio runtime.
	pub fn wrap<R, F>(&self, operation: F) -> (impl Future<Output = Result<R, FetchError>>, CancelHandle)
	where
		R: Send + 'static,
		F: Future<Output = Result<R, FetchError>> + Send + 'static,
	{
		let handle = CancelHandle {
			token: CancellationToken::new(),
		};
		let key = {
			let mut state = self.state.lock();
			let key = state.next_key;
			state.next_key += 1;
			state.handles.insert(key, handle.clone());
			key
		};
		let state = Arc::clone(&self.state);
		let token = handle.token.clone();
		let mut task = tokio::spawn(operation);
		let derived = async move {
			let outcome = tokio::select! {
				biased;
				_ = token.cancelled() => Err(FetchError::Cancelled),
				joined = &mut task => match joined {
					Ok(outcome) => outcome,
					Err(join_err) => Err(FetchError::transport(join_err)),
				},
			};
			state.lock().handles.remove(&key);
			outcome
		};
		(derived, handle)
	}

	/// Cancels every outstanding handle and empties the set.
	///
	/// A registration racing with the drain either lands before it (and
	/// is cancelled) or after it (and is untouched); it is never dropped.
	pub fn cancel_all(&self) {
		let drained: Vec<CancelHandle> = {
			let mut state = self.state.lock();
			state.handles.drain().map(|(_, handle)| handle).collect()
		};
		if !drained.is_empty() {
			tracing::trace!(cancelled = drained.len(), "pager.cancel.cancel_all");
		}
		for handle in &drained {
			handle.cancel();
		}
	}
}
