use std::sync::Arc;

use ferron_common::config::ServerConfigurationValue;
use ferron_core::ProxyRecord;

/// The non-error outcomes of a keyword parser, matching the `{OK=0, WARN=1}`
/// half of the original `{OK=0, WARN=1, ERR=-1}` trichotomy. The `ERR=-1`
/// case is the `Err` arm of the `Result` every parser returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
  Ok,
  /// Carries the formatted warning (capability mismatch, repeated
  /// override, ...) — value is still applied.
  Warn(String),
}

/// A single config keyword parser, registered under a section the same way
/// `cfg_register_keywords` takes a `{section, keyword, parser}` tuple.
pub trait KeywordParser: Send + Sync {
  /// `args[0]` is the keyword itself (or its legacy alias); the remaining
  /// tokens are its arguments. Typed as [`ServerConfigurationValue`] rather
  /// than `&str` so a KDL/YAML loader built on `ferron_common::config` can
  /// feed a parser its tokens directly, whether it tokenized a numeric
  /// argument as a string or as a typed number.
  fn parse(&self, proxy: &mut ProxyRecord, args: &[ServerConfigurationValue]) -> anyhow::Result<ParseOutcome>;
}

/// The config registry collaborator (`cfg_register_keywords`): a config
/// loader built on top of this crate calls `register` for every keyword
/// `ferron-config` ships, then dispatches parsed statements back through
/// `KeywordParser::parse`.
pub trait ConfigRegistry {
  fn register(&mut self, section: &str, keyword: &str, parser: Arc<dyn KeywordParser>);
}

/// A minimal in-memory `ConfigRegistry`, good enough for a config loader
/// that doesn't need section-scoped lookup beyond "give me the parser for
/// this keyword".
#[derive(Default)]
pub struct KeywordTable {
  entries: Vec<(String, String, Arc<dyn KeywordParser>)>,
}

impl KeywordTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn find(&self, section: &str, keyword: &str) -> Option<Arc<dyn KeywordParser>> {
    self
      .entries
      .iter()
      .find(|(s, k, _)| s == section && k == keyword)
      .map(|(_, _, parser)| parser.clone())
  }
}

impl ConfigRegistry for KeywordTable {
  fn register(&mut self, section: &str, keyword: &str, parser: Arc<dyn KeywordParser>) {
    self.entries.push((section.to_string(), keyword.to_string(), parser));
  }
}
