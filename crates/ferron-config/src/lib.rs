mod duration;
mod keywords;

use std::sync::Arc;

use ferron_module_api::ConfigRegistry;

pub use duration::parse_duration_ms;
pub use keywords::{RateLimitKeywordParser, TimeoutKeywordParser};

/// The section every keyword here is registered under, mirroring
/// `CFG_LISTEN` — these are all listen-block-scoped keywords.
pub const LISTEN_SECTION: &str = "listen";

/// Registers every keyword this crate ships into `registry`, the way a
/// config loader would call `cfg_register_keywords` once at startup.
pub fn register_keywords(registry: &mut dyn ConfigRegistry) {
  let timeout = Arc::new(TimeoutKeywordParser);
  registry.register(LISTEN_SECTION, "timeout", timeout.clone());
  registry.register(LISTEN_SECTION, "clitimeout", timeout.clone());
  registry.register(LISTEN_SECTION, "contimeout", timeout.clone());
  registry.register(LISTEN_SECTION, "srvtimeout", timeout);

  registry.register(LISTEN_SECTION, "rate-limit", Arc::new(RateLimitKeywordParser));
}

#[cfg(test)]
mod tests {
  use ferron_module_api::KeywordTable;

  use super::*;

  #[test]
  fn every_shipped_keyword_is_registered_under_the_listen_section() {
    let mut table = KeywordTable::new();
    register_keywords(&mut table);

    assert!(table.find(LISTEN_SECTION, "timeout").is_some());
    assert!(table.find(LISTEN_SECTION, "clitimeout").is_some());
    assert!(table.find(LISTEN_SECTION, "contimeout").is_some());
    assert!(table.find(LISTEN_SECTION, "srvtimeout").is_some());
    assert!(table.find(LISTEN_SECTION, "rate-limit").is_some());
    assert!(table.find(LISTEN_SECTION, "unknown").is_none());
  }
}
