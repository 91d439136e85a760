/// The rate-counter collaborator (`next_event_delay`), consulted by
/// `maintain_proxies` to decide whether a frontend's session rate limit
/// would be exceeded. The counter itself (a rolling events-per-second
/// tracker) is owned by the caller and threaded through by mutable
/// reference, the same shape as the original `&p->fe_sess_per_sec`.
pub trait RateCounter: Send + Sync {
  /// Returns 0 if admitting one more event now stays within `limit` per
  /// `unit` seconds; otherwise the number of milliseconds to wait before
  /// re-checking.
  fn next_event_delay(&self, counter: &mut u32, limit: u32, unit: u32) -> u64;
}
