use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// Provides synchronization on a one-shot condition.
///
/// Until the condition is met, threads waiting on it are blocked.
///
/// Once the condition is triggered, all waiting threads are awaked and any
/// other waits on the condition will not block.
#[derive(Clone)]
pub struct Condition {
	condition: Arc<(Mutex<bool>, Condvar)>,
	completed: Arc<AtomicBool>,
}

impl Default for Condition {
	fn default() -> Condition {
		Condition {
			condition: Arc::new((Mutex::new(false), Condvar::new())),
			completed: Default::default(),
		}
	}
}

impl Condition {
	/// Wait on the condition.
	pub fn wait(&self) {
		if self.completed.load(Ordering::SeqCst) {
			return;
		}

		let condition = self.condition.clone();
		let &(ref mutex, ref condvar) = &*condition;
		let mut condition = mutex.lock().unwrap();
		while !*condition {
			condition = condvar.wait(condition).unwrap();
		}
	}

	/// Triggers the condition, waking all threads that are waiting on it.
	///
	/// After this, calls to [wait] will no longer block.
	pub fn trigger(&self) {
		self.completed.store(true, Ordering::SeqCst);

		let condition = self.condition.clone();
		let &(ref mutex, ref condvar) = &*condition;
		let mut condition = mutex.lock().unwrap();
		*condition = true;
		condvar.notify_all();
	}

	/// Reset the condition.
	///
	/// After this, calls to [wait] will block until [trigger] is called.
	#[allow(dead_code)]
	pub fn reset(&self) {
		let condition = self.condition.clone();
		let &(ref mutex, ref _condvar) = &*condition;
		let mut condition = mutex.lock().unwrap();
		*condition = false;

		self.completed.store(false, Ordering::SeqCst);
	}

	/// Returns true if the condition has already been triggered.
	pub fn is_done(&self) -> bool {
		self.completed.load(Ordering::SeqCst)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::sync::atomic::{AtomicU64, Ordering};
	use std::sync::{mpsc::channel, Arc};
	use std::thread::spawn;

	#[test]
	fn test_condition() {
		let cond = Condition::default();
		let value = Arc::new(AtomicU64::default());

		let (tx, rx) = channel();
		for _ in 0..5 {
			let cond = cond.clone();
			let tx = tx.clone();
			let value = value.clone();
			spawn(move || {
				cond.wait();
				let value = value.load(Ordering::SeqCst);
				tx.send(value).unwrap();
			});
		}
		drop(tx);

		value.store(42, Ordering::SeqCst);
		cond.trigger();
		cond.wait();

		let mut count = 0;
		for it in rx {
			count += 1;
			assert_eq!(it, 42);
		}
		assert_eq!(count, 5);
		assert!(cond.is_done());
	}
}
