use std::sync::{
	atomic::{AtomicU64, Ordering},
	Arc,
};

/// A cheaply cloneable counter that training code increments and a progress reporter reads.
#[derive(Clone, Debug)]
pub struct ProgressCounter {
	current: Arc<AtomicU64>,
	total: u64,
}

impl ProgressCounter {
	pub fn new(total: u64) -> Self {
		Self {
			current: Arc::new(AtomicU64::new(0)),
			total,
		}
	}

	pub fn total(&self) -> u64 {
		self.total
	}

	pub fn get(&self) -> u64 {
		self.current.load(Ordering::Relaxed)
	}

	pub fn inc(&self, amount: u64) {
		self.current.fetch_add(amount, Ordering::Relaxed);
	}
}

#[test]
fn test_progress_counter_is_shared_between_clones() {
	let counter = ProgressCounter::new(10);
	let clone = counter.clone();
	clone.inc(3);
	counter.inc(1);
	assert_eq!(counter.get(), 4);
	assert_eq!(clone.total(), 10);
}
