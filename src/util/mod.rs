use slog::Logger;

mod datetime;
pub use self::datetime::*;

mod file;
pub use self::file::*;

mod concurrency;
pub use self::concurrency::*;

/// Simple custom string error.
#[derive(Debug)]
pub struct Error(String);

/// Result using an [Error].
pub type Result<T> = std::result::Result<T, Error>;

/// Check the response status, returning an error if it is not successful.
pub fn check_response(log: &Logger, response: &reqwest::blocking::Response) -> Result<()> {
	let status = response.status();
	if status.is_success() {
		Ok(())
	} else {
		let msg = if let Some(reason) = status.canonical_reason() {
			format!("request failed with status {} ({})", status, reason)
		} else {
			format!("request failed with status {}", status)
		};
		warn!(log, "{}: {}", response.url(), msg);
		Err(msg.into())
	}
}

/// Normalizes whitespace in a string: trims, collapses runs of whitespace
/// to a single space.
pub fn normalize_whitespace(input: &str) -> String {
	input.split_whitespace().collect::<Vec<_>>().join(" ")
}

//
// Error implementation
//

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl Error {
	pub fn from<T: std::fmt::Display>(value: T) -> Error {
		Error(format!("{}", value))
	}
}

impl std::error::Error for Error {
	fn description(&self) -> &str {
		&self.0
	}
}

pub trait ToError {
	fn to_err(self) -> Error;
}

impl From<String> for Error {
	fn from(v: String) -> Self {
		Error(v)
	}
}

impl<'a> From<&'a str> for Error {
	fn from(v: &'a str) -> Self {
		Error(v.to_string())
	}
}

impl<T: Into<String>> ToError for T {
	fn to_err(self) -> Error {
		Error::from(self.into())
	}
}

macro_rules! error_from {
	($from: ty) => {
		impl From<$from> for Error {
			#[inline]
			fn from(v: $from) -> Self {
				Error::from(v)
			}
		}
	};
}

error_from!(reqwest::header::ToStrError);
error_from!(reqwest::Error);
error_from!(std::io::Error);
error_from!(uuid::parser::ParseError);
error_from!(serde_json::Error);
error_from!(std::fmt::Error);
error_from!(std::num::ParseIntError);

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_normalize_whitespace() {
		assert_eq!(normalize_whitespace("  Foo   BAR  "), "Foo BAR");
		assert_eq!(normalize_whitespace("a\tb\nc"), "a b c");
	}
}
