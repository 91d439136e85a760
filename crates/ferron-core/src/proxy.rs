use std::collections::HashMap;

use bitflags::bitflags;

use crate::capability::Capability;
use crate::server::{DefaultServerTemplate, ServerRecord};
use crate::time::Tick;

/// What protocol semantics a proxy's sessions are interpreted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
  Tcp,
  Http,
  Health,
}

/// The lifecycle state machine described in §4.7: `NEW -> IDLE -> RUNNING <->
/// PAUSED -> STOPPED/ERROR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
  New,
  Idle,
  Running,
  Paused,
  Stopped,
  Error,
}

/// Hash flavor for the `HI` (header/URL hash) load-balancing kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LbHashType {
  Consistent,
  Other,
}

/// Which lookup structure an external LB initializer should build for this
/// proxy's servers. The control plane only records which one was chosen; it
/// never builds the map/tree itself (that's `ferron_runtime::LbInitializer`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LbLookup {
  Map,
  RrTree,
  LcTree,
  ChTree,
}

/// The tagged variant described in the design notes as "a sum type with
/// per-variant initialization closures" — here, per-variant data instead,
/// since the closures themselves belong to the external LB initializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LbKind {
  RoundRobin { dynamic: bool },
  LeastConnections,
  HeaderHash { hash_type: LbHashType },
}

impl LbKind {
  /// True when this kind can only operate in HTTP mode (the L7 hash kind),
  /// matching `BE_LB_NEED_HTTP` in the original implementation.
  pub fn needs_http(self) -> bool {
    matches!(self, LbKind::HeaderHash { .. })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LbAlgorithm {
  pub kind: LbKind,
  pub lookup: LbLookup,
  pub wmult: u32,
  pub wdiv: u32,
  pub dynamic_propagation: bool,
}

impl LbAlgorithm {
  /// The `balance roundrobin` default `addbackend` applies to every runtime-created
  /// backend, with the lookup structure `init_server_map` would build for a
  /// static round-robin algorithm.
  pub fn round_robin_default() -> Self {
    Self {
      kind: LbKind::RoundRobin { dynamic: false },
      lookup: LbLookup::Map,
      wmult: 1,
      wdiv: 1,
      dynamic_propagation: false,
    }
  }

  /// Resolves `kind` into the lookup structure and propagation flag an
  /// external `LbInitializer` should build, per the table in §4.6.
  pub fn resolve_lookup(&mut self) {
    let (lookup, dynamic) = match self.kind {
      LbKind::RoundRobin { dynamic: false } => (LbLookup::Map, false),
      LbKind::RoundRobin { dynamic: true } => (LbLookup::RrTree, true),
      LbKind::LeastConnections => (LbLookup::LcTree, true),
      LbKind::HeaderHash { hash_type: LbHashType::Consistent } => (LbLookup::ChTree, true),
      LbKind::HeaderHash { hash_type: LbHashType::Other } => (LbLookup::Map, false),
    };
    self.lookup = lookup;
    self.dynamic_propagation = dynamic;
  }
}

bitflags! {
  /// Pluggable request/response pipeline stages, represented as bits so a
  /// backend's analyser set can be merged into a session's with `|=` while
  /// masking off ones the listener already performed (§4.8 step 8).
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
  pub struct AnalyserMask: u16 {
    const REQ_WAIT_HTTP        = 1 << 0;
    const REQ_HTTP_INNER       = 1 << 1;
    const REQ_HTTP_PROCESS_BE  = 1 << 2;
    const RES_WAIT_HTTP        = 1 << 3;
    const RES_HTTP_PROCESS_BE  = 1 << 4;
  }
}

impl AnalyserMask {
  pub const HTTP_BACKEND_REQUEST: AnalyserMask = AnalyserMask::REQ_WAIT_HTTP
    .union(AnalyserMask::REQ_HTTP_INNER)
    .union(AnalyserMask::REQ_HTTP_PROCESS_BE);
  pub const HTTP_BACKEND_RESPONSE: AnalyserMask =
    AnalyserMask::RES_WAIT_HTTP.union(AnalyserMask::RES_HTTP_PROCESS_BE);
}

#[derive(Debug, Clone, Default)]
pub struct Timeouts {
  pub client: Option<u64>,
  pub server: Option<u64>,
  pub connect: Option<u64>,
  pub check: Option<u64>,
  pub queue: Option<u64>,
  pub tarpit: Option<u64>,
  pub http_keep_alive: Option<u64>,
  pub http_request: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CookieConfig {
  pub name: String,
  pub len: usize,
  pub domain: Option<String>,
  pub maxidle: u64,
  pub maxlife: u64,
  pub insert: bool,
  pub indirect: bool,
  pub passive: bool,
}

impl CookieConfig {
  /// `SERVERID`-named insert+indirect cookie, the default `addbackend` applies.
  pub fn server_id_default() -> Self {
    let name = "SERVERID".to_string();
    Self {
      len: name.len(),
      name,
      domain: None,
      maxidle: 0,
      maxlife: 0,
      insert: true,
      indirect: true,
      passive: false,
    }
  }
}

/// A frontend's domain-keyed jump to a backend, installed by
/// `add_switch_entry`. Keys the target backend by `uuid`, a non-owning
/// reference, per the design note that back-edges are pure lookup.
#[derive(Debug, Clone)]
pub struct SwitchingRule {
  pub domain: String,
  pub backend_uuid: u32,
}

/// The central aggregate: a frontend, backend, ruleset, or combined listener.
#[derive(Debug, Clone)]
pub struct ProxyRecord {
  pub id: String,
  pub uuid: u32,
  pub cap: Capability,
  pub mode: Mode,
  pub state: ProxyState,

  pub timeouts: Timeouts,

  pub maxconn: u32,
  pub fullconn: Option<u32>,
  pub backlog: Option<u32>,
  pub conn_retries: u32,

  pub fe_sps_lim: u32,
  pub fe_sess_per_sec: u32,

  pub feconn: u32,
  pub beconn: u32,
  pub cum_feconn: u64,
  pub cum_beconn: u64,
  pub beconn_max: u32,

  pub lb_algorithm: LbAlgorithm,
  pub cookie: Option<CookieConfig>,

  /// Opaque listener handle IDs; `ferron-registry` resolves these through
  /// the `ferron_runtime::ListenerHandle` collaborator it was constructed
  /// with. `ferron-core` never names a socket type.
  pub listeners: Vec<u64>,
  pub servers: Vec<ServerRecord>,
  pub switching_rules: Vec<SwitchingRule>,
  pub switching_hashtbl: HashMap<String, u32>,

  pub nb_req_cap: usize,
  pub nb_rsp_cap: usize,
  pub hdr_idx_pool_id: Option<u64>,
  pub be_req_ana: AnalyserMask,
  pub be_rsp_ana: AnalyserMask,
  /// Request-analyser stages this proxy's listener already performs at
  /// accept time, masked off when a backend's own analyser mask is merged
  /// into a session (§4.8 step 8) so an already-run stage isn't scheduled
  /// twice.
  pub listener_ana: AnalyserMask,

  pub defsrv: DefaultServerTemplate,
  pub defbe: Option<u32>,

  pub independent_streams: bool,
  pub resp_bug_tolerant: bool,

  pub stop_time: Option<Tick>,
  pub last_change: Tick,
  pub grace: u64,
}

impl ProxyRecord {
  /// Builds a bare proxy with the given identity and capability, used for
  /// frontends and listeners a config loader registers directly (outside
  /// the `addbackend` runtime-mutation path, which always builds `BE | RS`).
  pub fn new(id: impl Into<String>, uuid: u32, cap: Capability, mode: Mode, now: Tick) -> Self {
    Self {
      id: id.into(),
      uuid,
      cap,
      mode,
      state: ProxyState::New,
      timeouts: Timeouts::default(),
      maxconn: 0,
      fullconn: None,
      backlog: None,
      conn_retries: 0,
      fe_sps_lim: 0,
      fe_sess_per_sec: 0,
      feconn: 0,
      beconn: 0,
      cum_feconn: 0,
      cum_beconn: 0,
      beconn_max: 0,
      lb_algorithm: LbAlgorithm::round_robin_default(),
      cookie: None,
      listeners: Vec::new(),
      servers: Vec::new(),
      switching_rules: Vec::new(),
      switching_hashtbl: HashMap::new(),
      nb_req_cap: 0,
      nb_rsp_cap: 0,
      hdr_idx_pool_id: None,
      be_req_ana: AnalyserMask::empty(),
      be_rsp_ana: AnalyserMask::empty(),
      listener_ana: AnalyserMask::empty(),
      defsrv: DefaultServerTemplate::default(),
      defbe: None,
      independent_streams: false,
      resp_bug_tolerant: false,
      stop_time: None,
      last_change: now,
      grace: 0,
    }
  }

  /// The `DEFAULT SETTINGS` block `addbackend` applies to every runtime-created
  /// backend: mode HTTP, `SERVERID` cookie, round-robin LB, `conn_retries`.
  /// `cfg_maxpconn`'s role is played by `default_maxconn`, a value the
  /// embedding process supplies from its own global tuning.
  pub fn default_backend(
    id: impl Into<String>,
    uuid: u32,
    default_maxconn: u32,
    conn_retries: u32,
    now: Tick,
  ) -> Self {
    let mut px = Self::new(id, uuid, Capability::BE | Capability::RS, Mode::Http, now);
    px.maxconn = default_maxconn;
    px.conn_retries = conn_retries;
    px.cookie = Some(CookieConfig::server_id_default());
    px.lb_algorithm = LbAlgorithm::round_robin_default();
    px.lb_algorithm.resolve_lookup();
    px
  }

  /// Applies the analyser bitmasks `addbackend` sets for an HTTP-mode
  /// backend; a no-op in TCP/HEALTH mode.
  pub fn apply_http_analysers(&mut self) {
    if self.mode == Mode::Http {
      self.be_req_ana |= AnalyserMask::HTTP_BACKEND_REQUEST;
      self.be_rsp_ana |= AnalyserMask::HTTP_BACKEND_RESPONSE;
    }
  }

  pub fn is_frontend(&self) -> bool {
    self.cap.contains(Capability::FE)
  }

  pub fn is_backend(&self) -> bool {
    self.cap.contains(Capability::BE)
  }
}
