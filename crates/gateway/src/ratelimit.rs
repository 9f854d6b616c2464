//! Two distinct rate limiters live here: a global per-identity admission
//! limiter (fixed window, keyed by key prefix or source IP) that rejects
//! before quota admission ever touches persistence, and a per-upstream token
//! bucket acquired on every retry attempt so a long backoff never holds a
//! reserved slot.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use moka::future::Cache;
use tokio::sync::Mutex;

/// Fixed-window counter per identity. Moka evicts an entry `window` after
/// its first access, which gives each identity a fresh window automatically
/// without a background sweep task.
#[derive(Clone)]
pub struct AdmissionRateLimiter {
	cache: Cache<String, Arc<AtomicU32>>,
	max_per_window: u32,
}

impl AdmissionRateLimiter {
	pub fn new(max_per_window: u32, window: Duration) -> Self {
		let cache = Cache::builder().time_to_live(window).build();
		Self { cache, max_per_window }
	}

	/// Returns `true` if `identity` is still within its window's budget,
	/// incrementing the counter as a side effect.
	pub async fn check(&self, identity: &str) -> bool {
		let counter = self
			.cache
			.get_with(identity.to_string(), async { Arc::new(AtomicU32::new(0)) })
			.await;
		let prior = counter.fetch_add(1, Ordering::SeqCst);
		prior < self.max_per_window
	}
}

/// A conservative fixed-rate token bucket guarding calls to one upstream.
/// The spec for this doesn't wire a dedicated environment knob for the
/// per-upstream rate, so capacity/refill are fixed constants here rather
/// than configuration (see DESIGN.md).
pub struct TokenBucket {
	capacity: f64,
	refill_per_sec: f64,
	state: Mutex<(f64, Instant)>,
}

impl TokenBucket {
	pub fn new(capacity: f64, refill_per_sec: f64) -> Self {
		Self {
			capacity,
			refill_per_sec,
			state: Mutex::new((capacity, Instant::now())),
		}
	}

	pub async fn acquire(&self) {
		loop {
			let wait = {
				let mut state = self.state.lock().await;
				let now = Instant::now();
				let elapsed = now.duration_since(state.1).as_secs_f64();
				state.0 = (state.0 + elapsed * self.refill_per_sec).min(self.capacity);
				state.1 = now;
				if state.0 >= 1.0 {
					state.0 -= 1.0;
					None
				} else {
					Some(Duration::from_secs_f64((1.0 - state.0) / self.refill_per_sec))
				}
			};
			match wait {
				None => return,
				Some(d) => tokio::time::sleep(d).await,
			}
		}
	}
}
