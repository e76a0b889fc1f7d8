//! Debounced, cancellable, paginated fetching.
//!
//! The crate is layered leaves-first:
//!
//! - [`debounce`] collapses bursts of scheduled tasks into the most
//!   recent one.
//! - [`cancel`] wraps in-flight calls so their settlement can be made
//!   unobservable after the fact.
//! - [`controller`] composes the two into call-now / call-debounced /
//!   cancel-everything with loading/response/error callbacks.
//! - [`paginated`] is the search + pagination state machine driving the
//!   controller.
//!
//! Cancellation throughout is advisory: it suppresses observation of an
//! outcome, it does not abort the underlying transport work.

#![warn(missing_docs)]

pub mod cancel;
pub mod controller;
pub mod debounce;
pub mod paginated;

pub use cancel::{CancelHandle, CancelRegistry};
pub use controller::{ApiCall, CallController, CallObserver, LoadingUpdate};
pub use debounce::{DEBOUNCE_WAIT_DEFAULT, TaskDebouncer};
pub use lode_primitives as primitives;
pub use paginated::{FirstPageCache, NoFirstPageCache, PagerConfig, PaginatedFetcher};
