use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

/// A millisecond timestamp on the event loop's monotonic clock.
///
/// Unlike a wall-clock timestamp, a `Tick` only has meaning relative to
/// other ticks produced by the same `Clock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tick(pub i64);

impl Tick {
  pub const ZERO: Tick = Tick(0);

  pub fn as_millis(self) -> i64 {
    self.0
  }
}

/// Adds a millisecond duration to a tick.
pub fn tick_add(t: Tick, ms: u64) -> Tick {
  Tick(t.0.saturating_add(ms as i64))
}

/// Returns the earlier of two optional deadlines. `None` means "no deadline",
/// so any `Some` deadline is considered earlier than `None`.
pub fn tick_first(a: Option<Tick>, b: Option<Tick>) -> Option<Tick> {
  match (a, b) {
    (Some(a), Some(b)) => Some(a.min(b)),
    (Some(a), None) => Some(a),
    (None, Some(b)) => Some(b),
    (None, None) => None,
  }
}

/// Returns the number of milliseconds remaining until `expire`, or 0 if it has
/// already passed.
pub fn tick_remain(now: Tick, expire: Tick) -> u64 {
  (expire.0 - now.0).max(0) as u64
}

/// The time collaborator named in the external-interfaces section: `now`,
/// `now_ms`, `tv_update_date`. The control plane never reads `SystemTime` or
/// `Instant` directly, only through this trait.
pub trait Clock: Send + Sync {
  fn now_ms(&self) -> Tick;
}

/// Production clock backed by a monotonic `Instant`, established the moment
/// the process wires up its `Registry`.
pub struct SystemClock {
  epoch: Instant,
}

impl Default for SystemClock {
  fn default() -> Self {
    Self::new()
  }
}

impl SystemClock {
  pub fn new() -> Self {
    Self { epoch: Instant::now() }
  }
}

impl Clock for SystemClock {
  fn now_ms(&self) -> Tick {
    Tick(self.epoch.elapsed().as_millis() as i64)
  }
}

/// A clock a test can drive by hand instead of relying on wall-clock time,
/// satisfying the "deterministic across repeated test runs" property.
#[derive(Default)]
pub struct ManualClock {
  now: AtomicI64,
}

impl ManualClock {
  pub fn new(start_ms: i64) -> Self {
    Self {
      now: AtomicI64::new(start_ms),
    }
  }

  pub fn advance(&self, ms: u64) {
    self.now.fetch_add(ms as i64, Ordering::Relaxed);
  }

  pub fn set(&self, ms: i64) {
    self.now.store(ms, Ordering::Relaxed);
  }
}

impl Clock for ManualClock {
  fn now_ms(&self) -> Tick {
    Tick(self.now.load(Ordering::Relaxed))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tick_add_accumulates_milliseconds() {
    assert_eq!(tick_add(Tick(1_000), 250), Tick(1_250));
  }

  #[test]
  fn tick_first_prefers_earlier_deadline_and_any_some_over_none() {
    assert_eq!(tick_first(Some(Tick(10)), Some(Tick(5))), Some(Tick(5)));
    assert_eq!(tick_first(Some(Tick(10)), None), Some(Tick(10)));
    assert_eq!(tick_first(None, None), None);
  }

  #[test]
  fn tick_remain_clamps_to_zero_once_expired() {
    assert_eq!(tick_remain(Tick(100), Tick(150)), 50);
    assert_eq!(tick_remain(Tick(200), Tick(150)), 0);
  }

  #[test]
  fn manual_clock_only_advances_when_told() {
    let clock = ManualClock::new(1_000);
    assert_eq!(clock.now_ms(), Tick(1_000));
    clock.advance(500);
    assert_eq!(clock.now_ms(), Tick(1_500));
  }
}
