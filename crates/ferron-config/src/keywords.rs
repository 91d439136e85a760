use ferron_common::config::ServerConfigurationValue;
use ferron_core::{Capability, ProxyRecord};
use ferron_module_api::{KeywordParser, ParseOutcome};

use crate::duration::parse_duration_ms;

/// Renders a loader-supplied argument list as plain tokens for matching,
/// regardless of whether a given token came in as a string or a typed
/// number (a KDL loader tokenizes `rate-limit sessions 200`'s last argument
/// as an integer, while `timeout client 5s` stays a string throughout).
fn tokens(args: &[ServerConfigurationValue]) -> Vec<String> {
  args.iter().map(ServerConfigurationValue::display_token).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeoutField {
  Client,
  Server,
  Connect,
  Check,
  Queue,
  Tarpit,
  HttpKeepAlive,
  HttpRequest,
}

impl TimeoutField {
  fn from_subcommand(name: &str) -> anyhow::Result<Self> {
    Ok(match name {
      "client" => TimeoutField::Client,
      "server" => TimeoutField::Server,
      "connect" => TimeoutField::Connect,
      "check" => TimeoutField::Check,
      "queue" => TimeoutField::Queue,
      "tarpit" => TimeoutField::Tarpit,
      "http-keep-alive" => TimeoutField::HttpKeepAlive,
      "http-request" => TimeoutField::HttpRequest,
      other => anyhow::bail!("'{other}' is not a recognized timeout"),
    })
  }

  /// The capability a proxy needs for this timeout to have any effect, per
  /// the field/cap table `proxy_parse_timeout` enforces. `client` only means
  /// anything on a frontend; `server`/`connect`/`check`/`queue`/`tarpit` only
  /// on a backend; the HTTP pair applies on either side.
  fn required_cap(self) -> Capability {
    match self {
      TimeoutField::Client => Capability::FE,
      TimeoutField::Server
      | TimeoutField::Connect
      | TimeoutField::Check
      | TimeoutField::Queue
      | TimeoutField::Tarpit => Capability::BE,
      TimeoutField::HttpKeepAlive | TimeoutField::HttpRequest => Capability::FE | Capability::BE,
    }
  }

  fn slot(self, timeouts: &mut ferron_core::Timeouts) -> &mut Option<u64> {
    match self {
      TimeoutField::Client => &mut timeouts.client,
      TimeoutField::Server => &mut timeouts.server,
      TimeoutField::Connect => &mut timeouts.connect,
      TimeoutField::Check => &mut timeouts.check,
      TimeoutField::Queue => &mut timeouts.queue,
      TimeoutField::Tarpit => &mut timeouts.tarpit,
      TimeoutField::HttpKeepAlive => &mut timeouts.http_keep_alive,
      TimeoutField::HttpRequest => &mut timeouts.http_request,
    }
  }
}

/// `timeout <name> <value>`, plus the legacy single-field aliases
/// `clitimeout`/`contimeout`/`srvtimeout` that were never generalized to a
/// subcommand. Grounded on `proxy_parse_timeout`: warns (without refusing)
/// when the timeout doesn't apply to this proxy's capability, and warns
/// again when it overrides a value already set, but always stores the
/// parsed value either way.
pub struct TimeoutKeywordParser;

impl TimeoutKeywordParser {
  fn apply(
    &self,
    proxy: &mut ProxyRecord,
    field: TimeoutField,
    value_token: &str,
  ) -> anyhow::Result<ParseOutcome> {
    let ms = parse_duration_ms(value_token)?;

    let mut warning = None;
    if !proxy.cap.intersects(field.required_cap()) {
      warning = Some(format!("a '{:?}' timeout has no effect on this proxy's capability", field));
    }
    let slot = field.slot(&mut proxy.timeouts);
    if slot.is_some() {
      warning = Some(match warning {
        Some(w) => format!("{w}; timeout is already set, overwriting it"),
        None => "timeout is already set, overwriting it".to_string(),
      });
    }
    *slot = Some(ms);

    Ok(match warning {
      Some(w) => ParseOutcome::Warn(w),
      None => ParseOutcome::Ok,
    })
  }
}

impl KeywordParser for TimeoutKeywordParser {
  fn parse(&self, proxy: &mut ProxyRecord, args: &[ServerConfigurationValue]) -> anyhow::Result<ParseOutcome> {
    let toks = tokens(args);
    match toks.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
      ["timeout", subcommand, value] => {
        let field = TimeoutField::from_subcommand(subcommand)?;
        self.apply(proxy, field, value)
      }
      ["timeout", ..] => anyhow::bail!("'timeout' expects a subcommand and a value"),
      ["clitimeout", value] => self.apply(proxy, TimeoutField::Client, value),
      ["contimeout", value] => self.apply(proxy, TimeoutField::Connect, value),
      ["srvtimeout", value] => self.apply(proxy, TimeoutField::Server, value),
      [other, ..] => anyhow::bail!("'{other}' is not a timeout keyword"),
      [] => anyhow::bail!("empty keyword statement"),
    }
  }
}

/// `rate-limit sessions <value>`. The original only ever grew the one
/// "sessions" subcommand; anything else is a hard parse error rather than a
/// warning, same as `proxy_parse_rate_limit`.
pub struct RateLimitKeywordParser;

impl KeywordParser for RateLimitKeywordParser {
  fn parse(&self, proxy: &mut ProxyRecord, args: &[ServerConfigurationValue]) -> anyhow::Result<ParseOutcome> {
    let toks = tokens(args);
    let value_token = match toks.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
      ["rate-limit", "sessions", value] => value.to_string(),
      ["rate-limit", "sessions", ..] => anyhow::bail!("'rate-limit sessions' expects exactly one value"),
      ["rate-limit", other, ..] => anyhow::bail!("'{other}' is not a recognized rate-limit subcommand"),
      _ => anyhow::bail!("'rate-limit' expects a subcommand and a value"),
    };
    let limit: u32 = value_token
      .parse()
      .map_err(|_| anyhow::anyhow!("'{value_token}' is not a valid session rate limit"))?;

    let mut warning = None;
    if !proxy.cap.contains(Capability::FE) {
      warning = Some("a session rate limit has no effect on a non-frontend proxy".to_string());
    }
    if proxy.fe_sps_lim != 0 {
      warning = Some(match warning {
        Some(w) => format!("{w}; rate limit is already set, overwriting it"),
        None => "rate limit is already set, overwriting it".to_string(),
      });
    }
    proxy.fe_sps_lim = limit;

    Ok(match warning {
      Some(w) => ParseOutcome::Warn(w),
      None => ParseOutcome::Ok,
    })
  }
}

#[cfg(test)]
mod tests {
  use ferron_core::{Mode, Tick};

  use super::*;

  fn frontend() -> ProxyRecord {
    ProxyRecord::new("fe", 1, Capability::FE, Mode::Tcp, Tick::ZERO)
  }

  fn backend() -> ProxyRecord {
    ProxyRecord::default_backend("be", 2, 2_000, 3, Tick::ZERO)
  }

  fn strs(tokens: &[&str]) -> Vec<ServerConfigurationValue> {
    tokens.iter().map(|t| ServerConfigurationValue::String(t.to_string())).collect()
  }

  #[test]
  fn timeout_client_applies_cleanly_on_a_frontend() {
    let mut fe = frontend();
    let outcome = TimeoutKeywordParser.parse(&mut fe, &strs(&["timeout", "client", "5s"])).unwrap();
    assert_eq!(outcome, ParseOutcome::Ok);
    assert_eq!(fe.timeouts.client, Some(5_000));
  }

  #[test]
  fn timeout_client_on_a_backend_warns_but_still_applies() {
    let mut be = backend();
    let outcome = TimeoutKeywordParser.parse(&mut be, &strs(&["timeout", "client", "5s"])).unwrap();
    assert!(matches!(outcome, ParseOutcome::Warn(_)));
    assert_eq!(be.timeouts.client, Some(5_000));
  }

  #[test]
  fn legacy_srvtimeout_sets_the_server_field() {
    let mut be = backend();
    let outcome = TimeoutKeywordParser.parse(&mut be, &strs(&["srvtimeout", "30000"])).unwrap();
    assert_eq!(outcome, ParseOutcome::Ok);
    assert_eq!(be.timeouts.server, Some(30_000));
  }

  #[test]
  fn re_setting_a_timeout_warns_but_keeps_the_newer_value() {
    let mut be = backend();
    TimeoutKeywordParser.parse(&mut be, &strs(&["timeout", "server", "1s"])).unwrap();
    let outcome = TimeoutKeywordParser.parse(&mut be, &strs(&["timeout", "server", "2s"])).unwrap();
    assert!(matches!(outcome, ParseOutcome::Warn(_)));
    assert_eq!(be.timeouts.server, Some(2_000));
  }

  #[test]
  fn rate_limit_sessions_applies_on_a_frontend() {
    let mut fe = frontend();
    let outcome = RateLimitKeywordParser.parse(&mut fe, &strs(&["rate-limit", "sessions", "200"])).unwrap();
    assert_eq!(outcome, ParseOutcome::Ok);
    assert_eq!(fe.fe_sps_lim, 200);
  }

  #[test]
  fn rate_limit_accepts_a_typed_integer_value_straight_from_a_kdl_loader() {
    let mut fe = frontend();
    let args = vec![
      ServerConfigurationValue::String("rate-limit".to_string()),
      ServerConfigurationValue::String("sessions".to_string()),
      ServerConfigurationValue::Integer(200),
    ];
    let outcome = RateLimitKeywordParser.parse(&mut fe, &args).unwrap();
    assert_eq!(outcome, ParseOutcome::Ok);
    assert_eq!(fe.fe_sps_lim, 200);
  }

  #[test]
  fn rate_limit_rejects_unknown_subcommands() {
    let mut fe = frontend();
    assert!(RateLimitKeywordParser.parse(&mut fe, &strs(&["rate-limit", "connections", "200"])).is_err());
  }
}
