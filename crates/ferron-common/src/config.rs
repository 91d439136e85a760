use std::fmt;

/// A single configuration value, the shape a KDL/YAML loader hands a keyword
/// parser for each token after the keyword name itself. Trimmed to the
/// scalar cases a loader's tokenizer actually produces; the loader's own
/// document/section model lives outside this crate.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerConfigurationValue {
  String(String),
  Integer(i128),
  Float(f64),
  Bool(bool),
  Null,
}

impl ServerConfigurationValue {
  /// Renders the value as the plain-text token a string-oriented parser
  /// (duration suffixes, bare integers, keyword names) expects, regardless
  /// of whether the loader tokenized it as a string or a typed number.
  pub fn display_token(&self) -> String {
    match self {
      Self::String(s) => s.clone(),
      Self::Integer(i) => i.to_string(),
      Self::Float(f) => f.to_string(),
      Self::Bool(b) => b.to_string(),
      Self::Null => "null".to_string(),
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Self::String(s) => Some(s),
      _ => None,
    }
  }
}

impl fmt::Display for ServerConfigurationValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.display_token())
  }
}

impl From<&str> for ServerConfigurationValue {
  fn from(s: &str) -> Self {
    Self::String(s.to_string())
  }
}

impl From<i128> for ServerConfigurationValue {
  fn from(v: i128) -> Self {
    Self::Integer(v)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_token_renders_every_variant_as_plain_text() {
    assert_eq!(ServerConfigurationValue::String("client".into()).display_token(), "client");
    assert_eq!(ServerConfigurationValue::Integer(200).display_token(), "200");
    assert_eq!(ServerConfigurationValue::Bool(true).display_token(), "true");
    assert_eq!(ServerConfigurationValue::Null.display_token(), "null");
  }

  #[test]
  fn as_str_only_matches_the_string_variant() {
    assert_eq!(ServerConfigurationValue::String("a".into()).as_str(), Some("a"));
    assert_eq!(ServerConfigurationValue::Integer(1).as_str(), None);
  }
}
