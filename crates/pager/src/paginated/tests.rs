use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use lode_primitives::BoxError;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::*;

/// Transport serving slices of a fixed row set, recording every request.
///
/// With a gate installed, each call waits for one `notify_one` permit
/// before answering, so tests can hold a fetch in flight.
struct FixedRows {
	rows: Vec<String>,
	requests: Arc<Mutex<Vec<PageRequest>>>,
	gate: Option<Arc<Notify>>,
	fail: Arc<AtomicBool>,
}

impl FixedRows {
	fn new(rows: Vec<String>, requests: &Arc<Mutex<Vec<PageRequest>>>) -> Self {
		Self {
			rows,
			requests: Arc::clone(requests),
			gate: None,
			fail: Arc::new(AtomicBool::new(false)),
		}
	}

	fn gated(mut self, gate: &Arc<Notify>) -> Self {
		self.gate = Some(Arc::clone(gate));
		self
	}

	fn failing(mut self, fail: &Arc<AtomicBool>) -> Self {
		self.fail = Arc::clone(fail);
		self
	}
}

#[async_trait::async_trait]
impl ApiCall<PageRequest, PageResponse<String>> for FixedRows {
	async fn call(&self, request: PageRequest) -> Result<PageResponse<String>, BoxError> {
		self.requests.lock().push(request.clone());
		if let Some(gate) = &self.gate {
			gate.notified().await;
		}
		if self.fail.load(Ordering::SeqCst) {
			return Err("backend unavailable".into());
		}
		let matching: Vec<String> = self
			.rows
			.iter()
			.filter(|row| row.contains(&request.search))
			.cloned()
			.collect();
		let start = (request.page * request.page_size) as usize;
		let results = matching
			.iter()
			.skip(start)
			.take(request.page_size as usize)
			.cloned()
			.collect();
		Ok(PageResponse {
			page: request.page,
			results,
			total_count: matching.len() as i64,
		})
	}
}

fn rows(n: usize) -> Vec<String> {
	(0..n).map(|i| format!("row-{i:02}")).collect()
}

async fn settle() {
	for _ in 0..16 {
		tokio::task::yield_now().await;
	}
}

#[tokio::test(flavor = "current_thread")]
async fn first_page_resets_and_next_page_appends() {
	let requests = Arc::new(Mutex::new(Vec::new()));
	let pager = PaginatedFetcher::new(PagerConfig::new(2), FixedRows::new(rows(5), &requests));

	pager.fetch_page(0, false);
	settle().await;
	assert_eq!(pager.results(), rows(5)[..2].to_vec());
	assert_eq!(pager.total_count(), 5);
	assert!(!pager.is_loading());

	pager.fetch_page(1, false);
	settle().await;
	assert_eq!(pager.results(), rows(5)[..4].to_vec());
}

#[tokio::test(flavor = "current_thread")]
async fn a_fresh_first_page_replaces_the_accumulation() {
	let requests = Arc::new(Mutex::new(Vec::new()));
	let pager = PaginatedFetcher::new(PagerConfig::new(2), FixedRows::new(rows(5), &requests));

	pager.fetch_page(0, false);
	settle().await;
	pager.fetch_page(1, false);
	settle().await;
	assert_eq!(pager.results().len(), 4);

	pager.fetch_page(0, false);
	settle().await;
	assert_eq!(pager.results(), rows(5)[..2].to_vec(), "page 0 starts over");
}

#[tokio::test(flavor = "current_thread")]
async fn end_reached_walks_pages_and_stops_at_the_total() {
	let requests = Arc::new(Mutex::new(Vec::new()));
	let pager = PaginatedFetcher::new(PagerConfig::new(2), FixedRows::new(rows(5), &requests));

	pager.fetch_page(0, false);
	settle().await;
	pager.on_end_reached();
	settle().await;
	pager.on_end_reached();
	settle().await;
	assert_eq!(pager.results(), rows(5));

	pager.on_end_reached();
	settle().await;
	let pages: Vec<u32> = requests.lock().iter().map(|request| request.page).collect();
	assert_eq!(pages, vec![0, 1, 2], "no fetch past the total");
}

#[tokio::test(flavor = "current_thread")]
async fn end_reached_before_any_response_is_a_noop() {
	let requests = Arc::new(Mutex::new(Vec::new()));
	let pager = PaginatedFetcher::new(PagerConfig::new(2), FixedRows::new(rows(5), &requests));

	// total is still the unknown sentinel
	pager.on_end_reached();
	settle().await;
	assert!(requests.lock().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn end_reached_while_loading_issues_at_most_one_fetch() {
	let requests = Arc::new(Mutex::new(Vec::new()));
	let gate = Arc::new(Notify::new());
	let pager = PaginatedFetcher::new(
		PagerConfig::new(2),
		FixedRows::new(rows(5), &requests).gated(&gate),
	);

	pager.fetch_page(0, false);
	settle().await;
	gate.notify_one();
	settle().await;
	assert_eq!(pager.results().len(), 2);

	pager.on_end_reached();
	settle().await;
	pager.on_end_reached();
	pager.on_end_reached();
	settle().await;
	assert_eq!(requests.lock().len(), 2, "repeat calls while loading are no-ops");

	gate.notify_one();
	settle().await;
	assert_eq!(pager.results().len(), 4);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn search_change_debounces_to_one_transport_call() {
	let requests = Arc::new(Mutex::new(Vec::new()));
	let pager = PaginatedFetcher::new(PagerConfig::new(10), FixedRows::new(rows(5), &requests));

	pager.set_search_query("row-0");
	pager.set_search_query("row-03");
	assert!(pager.is_loading(), "loading is optimistic, before the window elapses");
	assert!(requests.lock().is_empty());

	tokio::time::advance(Duration::from_millis(700)).await;
	settle().await;

	let recorded = requests.lock().clone();
	assert_eq!(recorded.len(), 1, "the burst collapses to the last query");
	assert_eq!(recorded[0].page, 0);
	assert_eq!(recorded[0].search, "row-03");
	assert_eq!(pager.results(), vec!["row-03".to_string()]);
	assert_eq!(pager.total_count(), 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn order_params_are_forwarded_verbatim() {
	let requests = Arc::new(Mutex::new(Vec::new()));
	let config = PagerConfig::new(10)
		.order_by(vec![OrderParam::desc("created_at"), OrderParam::asc("name")])
		.debounce_wait(Duration::from_millis(50));
	let pager = PaginatedFetcher::new(config, FixedRows::new(rows(3), &requests));

	pager.set_search_query("row");
	tokio::time::advance(Duration::from_millis(50)).await;
	settle().await;

	let recorded = requests.lock().clone();
	assert_eq!(
		recorded[0].order_params,
		vec![OrderParam::desc("created_at"), OrderParam::asc("name")]
	);
}

struct SnapshotCache(Vec<String>);

impl FirstPageCache<String> for SnapshotCache {
	fn first_page(&self) -> Option<Vec<String>> {
		Some(self.0.clone())
	}
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn clearing_the_query_adopts_the_cached_first_page() {
	let requests = Arc::new(Mutex::new(Vec::new()));
	let pager = PaginatedFetcher::new(PagerConfig::new(2), FixedRows::new(rows(5), &requests))
		.with_first_page_cache(SnapshotCache(vec!["x".to_string(), "y".to_string()]));

	pager.set_search_query("");
	settle().await;
	assert_eq!(pager.results(), vec!["x".to_string(), "y".to_string()]);
	assert!(!pager.is_loading());
	assert!(requests.lock().is_empty(), "the cache hit skips the transport");

	pager.set_search_query("row-01");
	tokio::time::advance(Duration::from_millis(700)).await;
	settle().await;
	let recorded = requests.lock().clone();
	assert_eq!(recorded.len(), 1, "a non-empty query always goes to the transport");
	assert_eq!(recorded[0].page, 0);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn start_without_a_cache_fetches_page_zero() {
	let requests = Arc::new(Mutex::new(Vec::new()));
	let pager = PaginatedFetcher::new(PagerConfig::new(2), FixedRows::new(rows(5), &requests));

	pager.start();
	tokio::time::advance(Duration::from_millis(700)).await;
	settle().await;

	let recorded = requests.lock().clone();
	assert_eq!(recorded.len(), 1);
	assert_eq!(recorded[0].page, 0);
	assert_eq!(recorded[0].search, "");
	assert_eq!(pager.results(), rows(5)[..2].to_vec());
}

#[tokio::test(flavor = "current_thread")]
async fn transport_failure_sets_the_error_flag_and_success_clears_it() {
	let requests = Arc::new(Mutex::new(Vec::new()));
	let fail = Arc::new(AtomicBool::new(true));
	let pager = PaginatedFetcher::new(
		PagerConfig::new(2),
		FixedRows::new(rows(5), &requests).failing(&fail),
	);

	pager.fetch_page(0, false);
	settle().await;
	assert!(pager.error());
	assert!(!pager.is_loading());
	assert_eq!(pager.last_error(), Some("backend unavailable".to_string()));
	assert!(pager.results().is_empty());

	fail.store(false, Ordering::SeqCst);
	pager.fetch_page(0, false);
	settle().await;
	assert!(!pager.error());
	assert_eq!(pager.last_error(), None);
	assert_eq!(pager.results(), rows(5)[..2].to_vec());
}

#[tokio::test(flavor = "current_thread")]
async fn a_cancelled_fetch_never_lands() {
	let requests = Arc::new(Mutex::new(Vec::new()));
	let gate = Arc::new(Notify::new());
	let pager = PaginatedFetcher::new(
		PagerConfig::new(2),
		FixedRows::new(rows(5), &requests).gated(&gate),
	);

	pager.fetch_page(0, false);
	settle().await;
	// supersede the in-flight page 0 before it answers
	pager.fetch_page(1, false);
	settle().await;

	gate.notify_one();
	gate.notify_one();
	settle().await;

	assert_eq!(
		pager.results(),
		rows(5)[2..4].to_vec(),
		"only the superseding page landed"
	);
	assert_eq!(requests.lock().len(), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn refresh_refetches_the_first_page_in_place() {
	let requests = Arc::new(Mutex::new(Vec::new()));
	let pager = PaginatedFetcher::new(PagerConfig::new(2), FixedRows::new(rows(5), &requests));

	pager.fetch_page(0, false);
	settle().await;
	pager.fetch_page(1, false);
	settle().await;
	assert_eq!(pager.results().len(), 4);

	pager.refresh();
	settle().await;
	assert_eq!(pager.results(), rows(5)[..2].to_vec(), "refresh starts over from page 0");
	assert_eq!(requests.lock().last().unwrap().page, 0);
}

#[tokio::test(flavor = "current_thread")]
async fn dropping_the_fetcher_mid_flight_is_clean() {
	let requests = Arc::new(Mutex::new(Vec::new()));
	let gate = Arc::new(Notify::new());
	let pager = PaginatedFetcher::new(
		PagerConfig::new(2),
		FixedRows::new(rows(5), &requests).gated(&gate),
	);

	pager.fetch_page(0, false);
	settle().await;
	drop(pager);

	gate.notify_one();
	settle().await;
	assert_eq!(requests.lock().len(), 1);
}
