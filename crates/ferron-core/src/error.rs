use bitflags::bitflags;

bitflags! {
  /// The wire-compatible error bitmask shared with the listener subsystem
  /// (§6/§9 of the design notes: "retained as-is"). Combined with `|` and
  /// tested with `&`/`contains`, same as the C `ERR_*` constants.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
  pub struct ErrorBits: u32 {
    const NONE      = 0;
    const RETRYABLE = 1 << 0;
    const FATAL     = 1 << 1;
    const ABORT     = 1 << 2;
    const ALERT     = 1 << 3;
    const WARN      = 1 << 4;
    const CODE      = 1 << 5;
  }
}

impl ErrorBits {
  /// True if this result should stop a `start_proxies` listener loop early.
  pub fn is_fatal_or_abort(self) -> bool {
    self.intersects(ErrorBits::FATAL | ErrorBits::ABORT)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bits_combine_with_bitwise_or() {
    let combined = ErrorBits::WARN | ErrorBits::CODE;
    assert!(combined.contains(ErrorBits::WARN));
    assert!(combined.contains(ErrorBits::CODE));
    assert!(!combined.contains(ErrorBits::FATAL));
  }

  #[test]
  fn fatal_or_abort_detection() {
    assert!(ErrorBits::FATAL.is_fatal_or_abort());
    assert!(ErrorBits::ABORT.is_fatal_or_abort());
    assert!(!ErrorBits::WARN.is_fatal_or_abort());
    assert!(!ErrorBits::NONE.is_fatal_or_abort());
  }
}
