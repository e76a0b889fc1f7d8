//! Search + pagination state machine over the call controller.

use std::sync::Arc;
use std::time::Duration;

use lode_primitives::{
	FetchError, OrderParam, PageRequest, PageResponse, TOTAL_COUNT_UNKNOWN, error_message,
};
use parking_lot::Mutex;

use crate::controller::{ApiCall, CallController, CallObserver, LoadingUpdate};
use crate::debounce::DEBOUNCE_WAIT_DEFAULT;

#[cfg(test)]
mod tests;

/// Read-only lookup for a cached unfiltered first page, consulted when
/// the search query clears.
pub trait FirstPageCache<T>: Send + Sync {
	/// The cached first page, if one exists.
	fn first_page(&self) -> Option<Vec<T>>;
}

/// Cache that never has a first page.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFirstPageCache;

impl<T> FirstPageCache<T> for NoFirstPageCache {
	fn first_page(&self) -> Option<Vec<T>> {
		None
	}
}

/// Tuning for one paginated fetcher.
#[derive(Debug, Clone)]
pub struct PagerConfig {
	/// Rows per page; must be greater than zero.
	pub page_size: u32,
	/// Ordering criteria forwarded verbatim with every request.
	pub order_params: Vec<OrderParam>,
	/// Debounce window for search-triggered fetches.
	pub debounce_wait: Duration,
}

impl PagerConfig {
	/// Config with the default debounce window and no ordering.
	pub fn new(page_size: u32) -> Self {
		assert!(page_size > 0, "page size must be > 0");
		Self {
			page_size,
			order_params: Vec::new(),
			debounce_wait: DEBOUNCE_WAIT_DEFAULT,
		}
	}

	/// Replaces the ordering criteria.
	pub fn order_by(mut self, order_params: Vec<OrderParam>) -> Self {
		self.order_params = order_params;
		self
	}

	/// Replaces the debounce window.
	pub fn debounce_wait(mut self, wait: Duration) -> Self {
		self.debounce_wait = wait;
		self
	}
}

struct PagerState<T, E> {
	search_query: String,
	loading: bool,
	error: bool,
	last_error: Option<E>,
	results: Vec<T>,
	total_count: i64,
}

impl<T, E> Default for PagerState<T, E> {
	fn default() -> Self {
		Self {
			search_query: String::new(),
			loading: false,
			error: false,
			last_error: None,
			results: Vec::new(),
			total_count: TOTAL_COUNT_UNKNOWN,
		}
	}
}

/// Observer feeding call settlements into the shared pager state.
struct PagerObserver<T, E> {
	state: Arc<Mutex<PagerState<T, E>>>,
	map_error: Arc<dyn Fn(&FetchError) -> E + Send + Sync>,
}

impl<T, E> CallObserver<PageResponse<T>> for PagerObserver<T, E>
where
	T: Send,
	E: Send,
{
	fn on_loading(&self, update: LoadingUpdate) {
		self.state.lock().loading = update.loading;
	}

	fn on_response(&self, response: PageResponse<T>) {
		let PageResponse { page, results, total_count } = response;
		let mut state = self.state.lock();
		// a landed page ends the loading window; the controller only
		// flips the flag back off on the failure path
		state.loading = false;
		if page == 0 {
			state.results = results;
		} else {
			state.results.extend(results);
		}
		state.total_count = total_count;
		state.error = false;
		state.last_error = None;
		tracing::debug!(
			page,
			accumulated = state.results.len(),
			total = state.total_count,
			"pager.page.landed"
		);
	}

	fn on_error(&self, error: &FetchError) {
		let mut state = self.state.lock();
		state.error = true;
		state.last_error = Some((self.map_error)(error));
		tracing::debug!(%error, "pager.page.failed");
	}
}

/// Paginated, search-filtered fetch state machine.
///
/// Owns the search query, the loading and error flags, the accumulated
/// result rows, and the last-known total; drives the call controller to
/// fetch pages, debounced for search changes and immediate for
/// pagination. Dropping the fetcher cancels everything outstanding.
pub struct PaginatedFetcher<T, E = String> {
	config: PagerConfig,
	state: Arc<Mutex<PagerState<T, E>>>,
	controller: CallController<PageRequest, PageResponse<T>>,
	first_page_cache: Arc<dyn FirstPageCache<T>>,
}

impl<T> PaginatedFetcher<T, String>
where
	T: Send + 'static,
{
	/// Fetcher with the default error typing (message strings).
	pub fn new(
		config: PagerConfig,
		source: impl ApiCall<PageRequest, PageResponse<T>> + 'static,
	) -> Self {
		Self::with_error_mapper(config, source, error_message)
	}
}

impl<T, E> PaginatedFetcher<T, E>
where
	T: Send + 'static,
	E: Send + 'static,
{
	/// Fetcher with a custom error-typing function.
	pub fn with_error_mapper(
		config: PagerConfig,
		source: impl ApiCall<PageRequest, PageResponse<T>> + 'static,
		map_error: impl Fn(&FetchError) -> E + Send + Sync + 'static,
	) -> Self {
		let state = Arc::new(Mutex::new(PagerState::default()));
		let observer = PagerObserver {
			state: Arc::clone(&state),
			map_error: Arc::new(map_error),
		};
		let controller = CallController::new(source, observer, config.debounce_wait);
		Self {
			config,
			state,
			controller,
			first_page_cache: Arc::new(NoFirstPageCache),
		}
	}

	/// Replaces the first-page cache consulted when the query clears.
	pub fn with_first_page_cache(mut self, cache: impl FirstPageCache<T> + 'static) -> Self {
		self.first_page_cache = Arc::new(cache);
		self
	}

	/// Snapshot of the accumulated rows.
	pub fn results(&self) -> Vec<T>
	where
		T: Clone,
	{
		self.state.lock().results.clone()
	}

	/// Current search query.
	pub fn search_query(&self) -> String {
		self.state.lock().search_query.clone()
	}

	/// True while a call is (optimistically) in flight.
	pub fn is_loading(&self) -> bool {
		self.state.lock().loading
	}

	/// True after a transport failure, until the next successful page.
	pub fn error(&self) -> bool {
		self.state.lock().error
	}

	/// Typed mapping of the most recent transport failure.
	pub fn last_error(&self) -> Option<E>
	where
		E: Clone,
	{
		self.state.lock().last_error.clone()
	}

	/// Server-reported total for the current search, or
	/// [`TOTAL_COUNT_UNKNOWN`] before the first response arrives.
	pub fn total_count(&self) -> i64 {
		self.state.lock().total_count
	}

	/// Runs the initial load: adopt the cached first page when the query
	/// is empty and a snapshot exists, otherwise fetch page zero.
	pub fn start(&self) {
		self.apply_query_change();
	}

	/// Sets the search query and reloads from the first page.
	pub fn set_search_query(&self, query: impl Into<String>) {
		self.state.lock().search_query = query.into();
		self.apply_query_change();
	}

	/// Cancels outstanding work and fetches `page`, debounced or not.
	pub fn fetch_page(&self, page: u32, debounce: bool) {
		self.controller.cancel_all();
		let request = self.request_for(page);
		if debounce {
			self.controller.call_debounced(request);
		} else {
			self.controller.call_now(request, false);
		}
	}

	/// Fetches the next page when more rows remain and nothing is in
	/// flight; otherwise a no-op.
	///
	/// The unknown-total sentinel never counts as "more rows remain".
	pub fn on_end_reached(&self) {
		let (loading, have, total) = {
			let state = self.state.lock();
			(state.loading, state.results.len(), state.total_count)
		};
		if loading || (have as i64) >= total {
			return;
		}
		let next_page = self.current_page() + 1;
		self.fetch_page(next_page as u32, false);
	}

	/// Immediately re-fetches the first page as a background refresh.
	///
	/// The periodic tag lets consumers keep their current rows on screen
	/// without a spinner while the refresh runs.
	pub fn refresh(&self) {
		self.controller.cancel_all();
		self.controller.call_now(self.request_for(0), true);
	}

	fn apply_query_change(&self) {
		let query_is_empty = self.state.lock().search_query.is_empty();
		if query_is_empty {
			if let Some(snapshot) = self.first_page_cache.first_page() {
				tracing::debug!(rows = snapshot.len(), "pager.cache.adopt_first_page");
				self.state.lock().results = snapshot;
				return;
			}
		}
		self.fetch_page(0, true);
	}

	fn request_for(&self, page: u32) -> PageRequest {
		PageRequest {
			page,
			page_size: self.config.page_size,
			order_params: self.config.order_params.clone(),
			search: self.state.lock().search_query.clone(),
		}
	}

	/// Derived page index of the last accumulated row; -1 while empty,
	/// so the page after an empty accumulation is 0.
	fn current_page(&self) -> i64 {
		let have = self.state.lock().results.len();
		(have.div_ceil(self.config.page_size as usize) as i64) - 1
	}
}

impl<T, E> Drop for PaginatedFetcher<T, E> {
	fn drop(&mut self) {
		self.controller.cancel_all();
	}
}
