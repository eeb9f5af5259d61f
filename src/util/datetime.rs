use chrono::{Local, Utc};

#[derive(Clone, Serialize, Deserialize)]
pub struct DateTime(chrono::DateTime<Utc>);

#[derive(Clone)]
pub struct LocalDateTime(chrono::DateTime<Local>);

impl DateTime {
	pub fn now() -> DateTime {
		DateTime(Utc::now())
	}

	pub fn to_local(&self) -> LocalDateTime {
		LocalDateTime(self.0.with_timezone(&Local))
	}

	pub fn format(&self, fmt: &str) -> String {
		format!("{}", self.0.format(fmt))
	}

	/// Returns a value identifying the calendar day, in the local timezone.
	///
	/// Two timestamps on the same calendar day always return the same value.
	pub fn local_day(&self) -> i32 {
		use chrono::Datelike;
		let local = self.to_local();
		local.0.year() * 1000 + local.0.ordinal() as i32
	}
}

impl LocalDateTime {
	pub fn now() -> LocalDateTime {
		LocalDateTime(Local::now())
	}

	pub fn to_utc(&self) -> DateTime {
		DateTime(self.0.with_timezone(&Utc))
	}
}

impl std::fmt::Display for DateTime {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::fmt::Display for LocalDateTime {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::fmt::Debug for DateTime {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:?}", self.0)
	}
}

impl std::fmt::Debug for LocalDateTime {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:?}", self.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_local_day_is_stable() {
		let a = DateTime::now();
		let b = DateTime::now();
		assert_eq!(a.local_day(), b.local_day());
	}
}
