//! Debounced, cancellable call dispatch with observer callbacks.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lode_primitives::{BoxError, FetchError};
use parking_lot::Mutex;

use crate::cancel::CancelRegistry;
use crate::debounce::TaskDebouncer;

/// Asynchronous transport seam for one request/response call.
#[async_trait]
pub trait ApiCall<Req, Resp>: Send + Sync {
	/// Performs the call. Failures are opaque transport errors.
	async fn call(&self, request: Req) -> Result<Resp, BoxError>;
}

#[async_trait]
impl<Req, Resp, F, Fut> ApiCall<Req, Resp> for F
where
	Req: Send + 'static,
	Resp: 'static,
	F: Fn(Req) -> Fut + Send + Sync,
	Fut: Future<Output = Result<Resp, BoxError>> + Send + 'static,
{
	async fn call(&self, request: Req) -> Result<Resp, BoxError> {
		self(request).await
	}
}

/// Loading-state change forwarded to the observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadingUpdate {
	/// Whether a call is (optimistically) in flight.
	pub loading: bool,
	/// True when the call is a background refresh of data already on
	/// screen, so consumers can skip spinner UI.
	pub periodic: bool,
}

/// Callbacks invoked as calls progress.
///
/// Implementations run synchronously inside the settlement continuation
/// and must be non-blocking and side-effect-light.
pub trait CallObserver<Resp>: Send + Sync {
	/// A call entered or left the loading state.
	fn on_loading(&self, update: LoadingUpdate);
	/// A call delivered its response. Never invoked for cancelled or
	/// superseded calls.
	fn on_response(&self, response: Resp);
	/// A call failed with an ordinary (non-cancelled) transport error.
	fn on_error(&self, error: &FetchError);
}

/// Monotonic clock stamping every issued call.
///
/// A settlement whose stamp is no longer the latest is dropped, closing
/// the window where a superseded call could race its successor.
#[derive(Debug, Default)]
struct CallClock {
	next: AtomicU64,
	latest: AtomicU64,
}

impl CallClock {
	/// Claims the next sequence number and marks it latest.
	fn issue(&self) -> u64 {
		let seq = self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
		self.latest.store(seq, Ordering::Release);
		seq
	}

	/// True while `seq` is still the most recently issued call.
	fn is_latest(&self, seq: u64) -> bool {
		self.latest.load(Ordering::Acquire) == seq
	}
}

struct ControllerInner<Req, Resp> {
	call: Arc<dyn ApiCall<Req, Resp>>,
	observer: Arc<dyn CallObserver<Resp>>,
	registry: CancelRegistry,
	debouncer: Mutex<TaskDebouncer>,
	clock: CallClock,
}

/// Debounced, cancellable call dispatcher.
///
/// Composes the task debouncer and the cancel registry into three
/// operations: call now, call after the debounce window, and cancel
/// everything outstanding. Per logical call the observer sees
/// `Loading → Delivered | Failed | silently dropped`; dropped covers
/// both cancelled and superseded settlements. Cheap to clone; clones
/// share state.
pub struct CallController<Req, Resp> {
	inner: Arc<ControllerInner<Req, Resp>>,
}

impl<Req, Resp> Clone for CallController<Req, Resp> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<Req, Resp> CallController<Req, Resp> {
	/// Creates a controller over `call` reporting to `observer`.
	pub fn new(
		call: impl ApiCall<Req, Resp> + 'static,
		observer: impl CallObserver<Resp> + 'static,
		debounce_wait: Duration,
	) -> Self {
		Self {
			inner: Arc::new(ControllerInner {
				call: Arc::new(call),
				observer: Arc::new(observer),
				registry: CancelRegistry::new(),
				debouncer: Mutex::new(TaskDebouncer::new(debounce_wait)),
				clock: CallClock::default(),
			}),
		}
	}

	/// Cancels the pending debounced call and every in-flight call.
	///
	/// Turns loading off first, compensating for the optimistic flag set
	/// by [`CallController::call_debounced`].
	pub fn cancel_all(&self) {
		self.inner.observer.on_loading(LoadingUpdate {
			loading: false,
			periodic: false,
		});
		self.inner.debouncer.lock().cancel_pending();
		self.inner.registry.cancel_all();
	}
}

impl<Req, Resp> CallController<Req, Resp>
where
	Req: Send + 'static,
	Resp: Send + 'static,
{
	/// Issues the call immediately.
	///
	/// Loading turns on synchronously before this returns; the response
	/// or error is delivered through the observer once the call settles,
	/// unless the call is cancelled or superseded first.
	///
	/// Must be called from within a tokio runtime.
	pub fn call_now(&self, request: Req, periodic: bool) {
		let inner = Arc::clone(&self.inner);
		let seq = inner.arm(periodic);
		tokio::spawn(async move {
			inner.run(seq, request).await;
		});
	}

	/// Issues the call once the debounce window elapses, collapsing
	/// bursts into the most recent request.
	///
	/// Loading turns on immediately for UI responsiveness even though
	/// the call itself is deferred; [`CallController::cancel_all`]
	/// compensates if the call never fires.
	pub fn call_debounced(&self, request: Req) {
		self.inner.observer.on_loading(LoadingUpdate {
			loading: true,
			periodic: false,
		});
		let inner = Arc::clone(&self.inner);
		self.inner.debouncer.lock().schedule(move || async move {
			let seq = inner.arm(false);
			inner.run(seq, request).await;
		});
	}
}

impl<Req, Resp> ControllerInner<Req, Resp>
where
	Req: Send + 'static,
	Resp: Send + 'static,
{
	/// Marks a call as started: loading on, sequence claimed.
	fn arm(&self, periodic: bool) -> u64 {
		self.observer.on_loading(LoadingUpdate { loading: true, periodic });
		self.clock.issue()
	}

	/// Runs one armed call to settlement and dispatches the outcome.
	async fn run(&self, seq: u64, request: Req) {
		let call = Arc::clone(&self.call);
		let operation = async move { call.call(request).await.map_err(FetchError::Transport) };
		let (settled, _handle) = self.registry.wrap(operation);
		match settled.await {
			Ok(response) => {
				if self.clock.is_latest(seq) {
					self.observer.on_response(response);
				} else {
					tracing::trace!(seq, "pager.call.stale_drop");
				}
			}
			Err(FetchError::Cancelled) => {
				// loading stays whatever a concurrent call set it to
				tracing::trace!(seq, "pager.call.cancelled");
			}
			Err(error) => {
				if self.clock.is_latest(seq) {
					self.observer.on_loading(LoadingUpdate {
						loading: false,
						periodic: false,
					});
					self.observer.on_error(&error);
				} else {
					tracing::trace!(seq, %error, "pager.call.stale_drop");
				}
			}
		}
	}
}
