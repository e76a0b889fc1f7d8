//! Paginated request/response wire types.
//!
//! These structs cross the transport boundary verbatim, so they carry
//! serde derives with the backend's camelCase field naming.

use serde::{Deserialize, Serialize};

/// Sentinel total count meaning "unknown until a real response arrives".
///
/// Any `results.len() < total_count` check fails against the sentinel by
/// construction, so it can never be mistaken for a valid bound on "more
/// pages exist".
pub const TOTAL_COUNT_UNKNOWN: i64 = -1;

/// Sort direction for one ordering criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
	/// Ascending.
	Asc,
	/// Descending.
	Desc,
}

/// One ordering criterion, passed through verbatim with every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderParam {
	/// Backend field to order by.
	pub field: String,
	/// Sort direction.
	pub direction: OrderDirection,
}

impl OrderParam {
	/// Ascending criterion on `field`.
	pub fn asc(field: impl Into<String>) -> Self {
		Self {
			field: field.into(),
			direction: OrderDirection::Asc,
		}
	}

	/// Descending criterion on `field`.
	pub fn desc(field: impl Into<String>) -> Self {
		Self {
			field: field.into(),
			direction: OrderDirection::Desc,
		}
	}
}

/// One paginated, search-filtered fetch request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
	/// Zero-based page index.
	pub page: u32,
	/// Rows per page; always greater than zero.
	pub page_size: u32,
	/// Ordering criteria, applied in sequence.
	pub order_params: Vec<OrderParam>,
	/// Search filter; empty means unfiltered.
	pub search: String,
}

/// One page of results plus the server-reported total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
	/// Page index this response answers.
	pub page: u32,
	/// Items for this page, in backend order.
	pub results: Vec<T>,
	/// Total rows matching the request's filter.
	pub total_count: i64,
}
