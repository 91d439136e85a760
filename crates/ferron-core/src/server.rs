use std::net::SocketAddr;

use bitflags::bitflags;

use crate::time::Tick;

bitflags! {
  /// A server's health/maintenance state. Several bits can be set at once,
  /// e.g. a server freshly added by `addserver` starts as `MAINTAIN | CHECKED`.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
  pub struct ServerState: u8 {
    const RUNNING    = 1 << 0;
    const BACKUP     = 1 << 1;
    const MAINTAIN   = 1 << 2;
    const CHECKED    = 1 << 3;
    const GOINGDOWN  = 1 << 4;
  }
}

/// Scale applied to a user-configured weight to produce the effective weight
/// used by the (out-of-scope) load-balancing pick operation. Named
/// `BE_WEIGHT_SCALE` in the original implementation.
pub const EFFECTIVE_WEIGHT_SCALE: u32 = 16;

/// A reference to the scheduler-owned health-check task attached to a
/// server. The control plane never drives the clock itself: it only
/// remembers which opaque task it enqueued and when it is due, per the
/// "message-passing to a scheduler" design note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckTaskRef {
  pub task_id: u64,
  pub expire: Tick,
}

/// The template a backend uses to initialize newly added servers
/// (`defsrv` in the data model).
#[derive(Debug, Clone)]
pub struct DefaultServerTemplate {
  pub inter: u64,
  pub fastinter: u64,
  pub downinter: u64,
  pub rise: u32,
  pub fall: u32,
  pub maxqueue: u32,
  pub minconn: u32,
  pub slowstart: u64,
  pub consecutive_errors_limit: u32,
  pub iweight: u32,
  pub check_data_size: usize,
}

impl Default for DefaultServerTemplate {
  fn default() -> Self {
    Self {
      inter: 2_000,
      fastinter: 0,
      downinter: 0,
      rise: 2,
      fall: 3,
      maxqueue: 0,
      minconn: 0,
      slowstart: 0,
      consecutive_errors_limit: 10,
      iweight: 1,
      check_data_size: 16_384,
    }
  }
}

/// One backend target within a backend's pool.
#[derive(Debug, Clone)]
pub struct ServerRecord {
  pub id: String,
  pub puid: u32,
  pub addr: SocketAddr,
  pub cookie: String,

  pub uweight: u32,
  pub iweight: u32,
  pub eweight: u32,
  pub prev_eweight: u32,

  pub state: ServerState,
  pub health: u32,
  pub rise: u32,
  pub fall: u32,
  pub consecutive_errors_limit: u32,

  pub inter: u64,
  pub fastinter: u64,
  pub downinter: u64,
  pub slowstart: u64,
  pub last_change: Tick,
  pub check_start: Tick,

  pub pendconns: usize,
  pub maxqueue: u32,
  pub minconn: u32,
  pub maxconn: u32,

  pub check: Option<CheckTaskRef>,
  pub check_data: Vec<u8>,
}

impl ServerRecord {
  /// Builds a server from a backend's default template, mirroring
  /// `addserver`'s field-by-field copy in the original implementation
  /// (everything from `newsrv->inter = px->defsrv.inter;` through
  /// `newsrv->prev_eweight = newsrv->eweight = ...`), before the check task
  /// is wired up by the caller.
  pub fn from_template(
    id: impl Into<String>,
    puid: u32,
    addr: SocketAddr,
    cookie: impl Into<String>,
    template: &DefaultServerTemplate,
    backend_maxconn: u32,
  ) -> Self {
    let eweight = template.iweight * EFFECTIVE_WEIGHT_SCALE;
    Self {
      id: id.into(),
      puid,
      addr,
      cookie: cookie.into(),
      uweight: template.iweight,
      iweight: template.iweight,
      eweight,
      prev_eweight: eweight,
      state: ServerState::MAINTAIN,
      health: template.rise,
      rise: template.rise,
      fall: template.fall,
      consecutive_errors_limit: template.consecutive_errors_limit,
      inter: template.inter,
      fastinter: template.fastinter,
      downinter: template.downinter,
      slowstart: template.slowstart,
      last_change: Tick::ZERO,
      check_start: Tick::ZERO,
      pendconns: 0,
      maxqueue: template.maxqueue,
      minconn: template.minconn,
      maxconn: backend_maxconn,
      check: None,
      check_data: vec![0; template.check_data_size],
    }
  }

  /// Marks the server as checked and out of bare maintenance, the state left
  /// behind after `set_server_up` completes during `addserver`.
  pub fn mark_checked(&mut self) {
    self.state |= ServerState::CHECKED;
  }

  pub fn is_maintained(&self) -> bool {
    self.state.contains(ServerState::MAINTAIN)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn addr() -> SocketAddr {
    "10.0.0.1:8080".parse().unwrap()
  }

  #[test]
  fn from_template_computes_effective_weight_from_scale() {
    let template = DefaultServerTemplate { iweight: 3, ..Default::default() };
    let srv = ServerRecord::from_template("s1", 1, addr(), "c1", &template, 100);
    assert_eq!(srv.uweight, 3);
    assert_eq!(srv.eweight, 3 * EFFECTIVE_WEIGHT_SCALE);
    assert_eq!(srv.prev_eweight, srv.eweight);
  }

  #[test]
  fn fresh_server_starts_maintained() {
    let template = DefaultServerTemplate::default();
    let srv = ServerRecord::from_template("s1", 1, addr(), "c1", &template, 100);
    assert!(srv.is_maintained());
    assert!(!srv.state.contains(ServerState::CHECKED));
  }
}
