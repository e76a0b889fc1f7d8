//! Fetch error type and the default error-typing function.

use thiserror::Error;

/// Boxed opaque error accepted from transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

const UNKNOWN_ERROR_MESSAGE: &str = "unknown fetch error";

/// Failure surfaced by a wrapped fetch call.
#[derive(Debug, Error)]
pub enum FetchError {
	/// The call was cancelled before its outcome could be observed.
	///
	/// Never surfaced to the user and never sets the error flag;
	/// consumers recognize it via [`FetchError::is_cancelled`].
	#[error("fetch cancelled")]
	Cancelled,

	/// The transport failed with an ordinary error.
	#[error("transport error: {0}")]
	Transport(#[source] BoxError),
}

impl FetchError {
	/// Wraps an opaque transport failure.
	pub fn transport(err: impl Into<BoxError>) -> Self {
		Self::Transport(err.into())
	}

	/// True for the distinguished cancellation signal.
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled)
	}
}

/// Default error-typing function: the transport's own message, or a
/// generic fallback when it renders empty.
pub fn error_message(err: &FetchError) -> String {
	match err {
		FetchError::Cancelled => "fetch cancelled".to_string(),
		FetchError::Transport(source) => {
			let message = source.to_string();
			if message.is_empty() {
				UNKNOWN_ERROR_MESSAGE.to_string()
			} else {
				message
			}
		}
	}
}
