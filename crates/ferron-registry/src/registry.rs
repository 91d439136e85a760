use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;

use ferron_core::{
  Capability, Clock, IdentityRegistry, LbKind, Mode, ProxyRecord, ServerRecord, ServerState,
  SwitchingRule, Tick,
};
use ferron_runtime::{
  ControlLog, HealthCheck, HeaderIndexPool, LbInitializer, ListenerHandle, RateCounter, Scheduler,
  StickyTable, TaskSpec,
};

pub(crate) struct RegistryState {
  pub(crate) proxies: Vec<ProxyRecord>,
  pub(crate) uuid_ids: IdentityRegistry,
  pub(crate) server_ids: HashMap<u32, IdentityRegistry>,
  pub(crate) listeners: HashMap<u64, Arc<dyn ListenerHandle>>,
  pub(crate) next_listener_id: u64,
}

impl RegistryState {
  fn new() -> Self {
    Self {
      proxies: Vec::new(),
      uuid_ids: IdentityRegistry::new(),
      server_ids: HashMap::new(),
      listeners: HashMap::new(),
      next_listener_id: 1,
    }
  }
}

/// Tuning the embedding process supplies once at startup, playing the role
/// `global.maxconn`/`global.tune.*` play for a freshly created backend.
pub struct RegistryConfig {
  pub default_maxconn: u32,
  pub conn_retries: u32,
  pub pause_backlog: u32,
  /// `global.maxconn`: the process-wide active-connection ceiling
  /// `maintain_proxies` checks before running its per-proxy admission gate.
  pub global_maxconn: u32,
}

/// The Proxy Registry & Mutation API, Lifecycle Controller, and Session
/// Binder combined into one owner of the process-wide proxy list, built
/// around the collaborator seams named in §6. Every collaborator is an
/// `Arc<dyn Trait>` so the embedding process can swap real I/O in without
/// this crate ever depending on a socket or scheduler implementation.
pub struct Registry {
  pub(crate) state: Mutex<RegistryState>,
  pub(crate) stopping: Mutex<bool>,
  pub(crate) clock: Arc<dyn Clock>,
  pub(crate) scheduler: Arc<dyn Scheduler>,
  pub(crate) healthcheck: Arc<dyn HealthCheck>,
  pub(crate) lb_init: Arc<dyn LbInitializer>,
  pub(crate) hdr_idx_pool: Arc<dyn HeaderIndexPool>,
  pub(crate) sticky_table: Arc<dyn StickyTable>,
  pub(crate) rate_counter: Arc<dyn RateCounter>,
  pub(crate) log: Arc<dyn ControlLog>,
  pub(crate) config: RegistryConfig,
}

impl Registry {
  #[allow(clippy::too_many_arguments)]
  pub fn new(
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    healthcheck: Arc<dyn HealthCheck>,
    lb_init: Arc<dyn LbInitializer>,
    hdr_idx_pool: Arc<dyn HeaderIndexPool>,
    sticky_table: Arc<dyn StickyTable>,
    rate_counter: Arc<dyn RateCounter>,
    log: Arc<dyn ControlLog>,
    config: RegistryConfig,
  ) -> Self {
    Self {
      state: Mutex::new(RegistryState::new()),
      stopping: Mutex::new(false),
      clock,
      scheduler,
      healthcheck,
      lb_init,
      hdr_idx_pool,
      sticky_table,
      rate_counter,
      log,
      config,
    }
  }

  /// Reserves a fresh proxy `uuid`, for a config loader building a static
  /// frontend outside the `addbackend` runtime-mutation path.
  pub fn allocate_uuid(&self) -> u32 {
    self.state.lock().uuid_ids.next_id(1)
  }

  /// Registers a fully built `ProxyRecord` (typically a config-loaded
  /// frontend) into the registry, assuming its `uuid` was obtained from
  /// `allocate_uuid`.
  pub fn register_proxy(&self, proxy: ProxyRecord) {
    self.state.lock().proxies.push(proxy);
  }

  /// Registers a bound listener and returns the opaque id a `ProxyRecord`
  /// threads through `listeners` to reach it later.
  pub fn register_listener(&self, handle: Arc<dyn ListenerHandle>) -> u64 {
    let mut state = self.state.lock();
    let id = state.next_listener_id;
    state.next_listener_id += 1;
    state.listeners.insert(id, handle);
    id
  }

  pub fn snapshot_proxies(&self) -> Vec<ProxyRecord> {
    self.state.lock().proxies.clone()
  }

  pub fn is_stopping(&self) -> bool {
    *self.stopping.lock()
  }

  pub(crate) fn set_proxy_state(&self, name: &str, new_state: ferron_core::ProxyState) {
    let now = self.clock.now_ms();
    let mut state = self.state.lock();
    if let Some(px) = state.proxies.iter_mut().find(|p| p.id == name) {
      px.state = new_state;
      px.last_change = now;
    }
  }

  pub(crate) fn listener_handle(&self, id: u64) -> Option<Arc<dyn ListenerHandle>> {
    self.state.lock().listeners.get(&id).cloned()
  }

  /// `findproxy_mode`: looks a proxy up by name among the proxies carrying
  /// `cap`. An ambiguous match (more than one proxy with the same name and
  /// capability) returns `None` and logs an alert. When `mode` is given, an
  /// HTTP-mode proxy still satisfies a TCP-mode request (but not the
  /// reverse); a mismatch also returns `None` and logs an alert.
  pub async fn findproxy_mode(&self, name: &str, mode: Option<Mode>, cap: Capability) -> Option<ProxyRecord> {
    let (first, ambiguous) = {
      let state = self.state.lock();
      let mut matches = state.proxies.iter().filter(|p| p.id == name && p.cap.intersects(cap));
      let first = matches.next().cloned();
      let ambiguous = first.is_some() && matches.next().is_some();
      (first, ambiguous)
    };

    let Some(found) = first else { return None };

    if ambiguous {
      self.log.alert(&format!("proxy name '{name}' matches more than one proxy, refusing to pick one")).await;
      return None;
    }

    if let Some(wanted) = mode {
      let satisfies = found.mode == wanted || (found.mode == Mode::Http && wanted == Mode::Tcp);
      if !satisfies {
        self
          .log
          .alert(&format!("proxy '{name}' is in mode {:?}, which doesn't satisfy the requested mode", found.mode))
          .await;
        return None;
      }
    }

    Some(found)
  }

  pub async fn findproxy(&self, name: &str, cap: Capability) -> Option<ProxyRecord> {
    self.findproxy_mode(name, None, cap).await
  }

  pub async fn findserver(&self, backend_name: &str, server_name: &str) -> Option<ServerRecord> {
    let (server, ambiguous) = {
      let state = self.state.lock();
      let backend = state.proxies.iter().find(|p| p.id == backend_name && p.cap.contains(Capability::BE))?;
      let mut matches = backend.servers.iter().filter(|s| s.id == server_name);
      let first = matches.next().cloned();
      let ambiguous = first.is_some() && matches.next().is_some();
      (first, ambiguous)
    };

    if ambiguous {
      self.log.alert(&format!("server '{server_name}' is ambiguous on backend '{backend_name}'")).await;
      return None;
    }

    server
  }

  /// `get_backend_server`: a `#`-prefixed reference is parsed as a numeric
  /// id (proxy `uuid` / server `puid`); anything else is matched by name.
  /// The backend half can come back `None` while a server is still found
  /// (or vice versa), same as the original's independent out-parameters.
  pub fn get_backend_server(&self, backend_ref: &str, server_ref: &str) -> (Option<ProxyRecord>, Option<ServerRecord>) {
    let state = self.state.lock();

    let backend = if let Some(digits) = backend_ref.strip_prefix('#') {
      let uuid: u32 = match digits.parse() {
        Ok(v) => v,
        Err(_) => return (None, None),
      };
      state.proxies.iter().find(|p| p.uuid == uuid && p.cap.contains(Capability::BE))
    } else {
      let mut matches = state.proxies.iter().filter(|p| p.id == backend_ref && p.cap.contains(Capability::BE));
      match (matches.next(), matches.next()) {
        (Some(p), None) => Some(p),
        _ => None,
      }
    };

    let Some(backend) = backend else {
      return (None, None);
    };

    let server = if let Some(digits) = server_ref.strip_prefix('#') {
      digits.parse::<u32>().ok().and_then(|puid| backend.servers.iter().find(|s| s.puid == puid))
    } else {
      backend.servers.iter().find(|s| s.id == server_ref)
    };

    (Some(backend.clone()), server.cloned())
  }

  /// `proxy_cfg_ensure_no_http`: warns about every HTTP-only feature found
  /// on a non-HTTP-mode proxy (cookie, L7 hash load-balancing) and
  /// auto-downgrades the ones that have a safe fallback — L7 hash LB to
  /// round-robin — rather than rejecting the config. Fatal errors are
  /// always 0; the return value is that count, kept for symmetry with the
  /// original's signature.
  pub async fn proxy_cfg_ensure_no_http(&self) -> usize {
    let mut cookie_warnings: Vec<String> = Vec::new();
    let mut lb_downgrades: Vec<String> = Vec::new();

    {
      let mut state = self.state.lock();
      for px in state.proxies.iter_mut().filter(|p| p.mode != Mode::Http) {
        if px.cookie.is_some() {
          cookie_warnings.push(px.id.clone());
        }
        if px.lb_algorithm.kind.needs_http() {
          px.lb_algorithm.kind = LbKind::RoundRobin { dynamic: false };
          px.lb_algorithm.resolve_lookup();
          lb_downgrades.push(px.id.clone());
        }
      }
    }

    for name in &cookie_warnings {
      self.log.warning(&format!("proxy '{name}' configures a cookie outside HTTP mode, ignoring it")).await;
    }
    for name in &lb_downgrades {
      self
        .log
        .warning(&format!("proxy '{name}' uses an HTTP-only load-balancing algorithm outside HTTP mode, downgrading to round-robin"))
        .await;
    }

    0
  }

  /// `addbackend`'s core: builds the `DEFAULT SETTINGS` backend (§4.6),
  /// allocates its header-index pool, initializes its load-balancing lookup
  /// structure and sticky table, and inserts it into the registry. Rejects
  /// an identifier with a disallowed character, and rejects a name already
  /// used by a proxy that cannot share it (§4.6, only `FE|RS` can coexist
  /// with `BE|RS`) — checked against every proxy sharing the name, not just
  /// the first, since a name legitimately shared by an `FE|RS` and a
  /// `BE|RS` proxy must still refuse a third claimant.
  pub async fn create_backend(&self, name: &str) -> anyhow::Result<u32> {
    if let Some(bad) = ferron_core::invalid_identifier_char(name) {
      anyhow::bail!("character '{bad}' is not permitted in backend name '{name}'");
    }

    {
      let state = self.state.lock();
      for existing in state.proxies.iter().filter(|p| p.id == name) {
        if !existing.cap.permits_name_collision_with(Capability::BE | Capability::RS) {
          anyhow::bail!("a proxy named '{name}' already exists");
        }
      }
    }

    let uuid = self.allocate_uuid();
    let now = self.clock.now_ms();
    let mut px = ProxyRecord::default_backend(name, uuid, self.config.default_maxconn, self.config.conn_retries, now);
    px.apply_http_analysers();
    if px.fullconn.is_none() {
      px.fullconn = Some(px.maxconn);
    }
    px.hdr_idx_pool_id = Some(self.hdr_idx_pool.create(px.nb_req_cap, px.nb_rsp_cap).await);
    self.lb_init.init_server_structure(&px, px.lb_algorithm.lookup);
    self.sticky_table.init(px.uuid).await;

    {
      let mut state = self.state.lock();
      state.server_ids.insert(uuid, IdentityRegistry::new());
      state.proxies.push(px);
    }

    self.log.info(&format!("new backend '{name}' created with uuid {uuid}")).await;
    Ok(uuid)
  }

  /// `delbackend`: refuses to remove a backend still referenced as a
  /// frontend's `defbe` or switching-rule target, draining every one of its
  /// servers first (mirroring the original's loop of `delserver` calls
  /// before the proxy itself is unlinked). Unlike the original, there is no
  /// explicit free step — the `ProxyRecord`'s fields are reclaimed by `Drop`
  /// once it falls out of the `Vec`.
  pub async fn delete_backend(&self, name: &str) -> anyhow::Result<()> {
    let (uuid, server_names): (u32, Vec<String>) = {
      let state = self.state.lock();
      let backend = state
        .proxies
        .iter()
        .find(|p| p.id == name && p.cap.contains(Capability::BE))
        .ok_or_else(|| anyhow::anyhow!("no such backend '{name}'"))?;

      let referenced = state.proxies.iter().any(|p| {
        p.defbe == Some(backend.uuid) || p.switching_rules.iter().any(|r| r.backend_uuid == backend.uuid)
      });
      if referenced {
        anyhow::bail!("backend '{name}' is still referenced by a frontend's default backend or switching rules");
      }
      (backend.uuid, backend.servers.iter().map(|s| s.id.clone()).collect())
    };

    for server_name in &server_names {
      self.delete_server(name, server_name).await?;
    }

    let mut state = self.state.lock();
    state.proxies.retain(|p| p.uuid != uuid);
    state.server_ids.remove(&uuid);
    state.uuid_ids.release(uuid);
    drop(state);

    self.log.info(&format!("backend '{name}' removed")).await;
    Ok(())
  }

  /// `addserver`: copies the backend's `defsrv` template into a new
  /// `ServerRecord`, prepends it to the server list (the original's
  /// `newsrv->next = px->srv; px->srv = newsrv;`, so `Vec::insert(0, ..)`
  /// rather than `push`), wires a health-check task, and finally calls
  /// `set_server_up`.
  pub async fn create_server(
    &self,
    backend_name: &str,
    server_name: &str,
    addr: SocketAddr,
    cookie: &str,
  ) -> anyhow::Result<u32> {
    let (backend_uuid, template, backend_maxconn) = {
      let state = self.state.lock();
      let backend = state
        .proxies
        .iter()
        .find(|p| p.id == backend_name && p.cap.contains(Capability::BE))
        .ok_or_else(|| anyhow::anyhow!("no such backend '{backend_name}'"))?;
      if backend.servers.iter().any(|s| s.id == server_name) {
        anyhow::bail!("server '{server_name}' already exists on backend '{backend_name}'");
      }
      (backend.uuid, backend.defsrv.clone(), backend.maxconn)
    };

    let puid = {
      let mut state = self.state.lock();
      state.server_ids.entry(backend_uuid).or_insert_with(IdentityRegistry::new).next_id(1)
    };

    let mut srv = ServerRecord::from_template(server_name, puid, addr, cookie, &template, backend_maxconn);

    let task = self.scheduler.task_new().await;
    let expire = ferron_core::tick_add(self.clock.now_ms(), self.healthcheck.check_interval_ms(puid));
    self.scheduler.task_queue(task, TaskSpec { context_puid: puid, expire }).await;
    srv.check = Some(ferron_core::CheckTaskRef { task_id: task.0, expire });

    {
      let mut state = self.state.lock();
      if let Some(backend) = state.proxies.iter_mut().find(|p| p.uuid == backend_uuid) {
        backend.servers.insert(0, srv);
      }
    }

    self.healthcheck.set_server_up(puid).await;
    {
      let mut state = self.state.lock();
      if let Some(backend) = state.proxies.iter_mut().find(|p| p.uuid == backend_uuid) {
        if let Some(s) = backend.servers.iter_mut().find(|s| s.puid == puid) {
          s.state.remove(ServerState::MAINTAIN);
          s.state.insert(ServerState::RUNNING | ServerState::CHECKED);
        }
      }
    }

    self.log.info(&format!("server '{server_name}' added to backend '{backend_name}'")).await;
    Ok(puid)
  }

  /// `delserver`: forces the server down before unlinking it (whether it
  /// sits at the head or mid-list), frees its check task, and releases its
  /// `puid` back to the backend's id pool.
  pub async fn delete_server(&self, backend_name: &str, server_name: &str) -> anyhow::Result<()> {
    let (backend_uuid, puid, task) = {
      let state = self.state.lock();
      let backend = state
        .proxies
        .iter()
        .find(|p| p.id == backend_name && p.cap.contains(Capability::BE))
        .ok_or_else(|| anyhow::anyhow!("no such backend '{backend_name}'"))?;
      let server = backend
        .servers
        .iter()
        .find(|s| s.id == server_name)
        .ok_or_else(|| anyhow::anyhow!("no such server '{server_name}' on backend '{backend_name}'"))?;
      (backend.uuid, server.puid, server.check)
    };

    self.healthcheck.set_server_down(puid).await;
    if let Some(task) = task {
      let handle = ferron_runtime::TaskHandle(task.task_id);
      self.scheduler.task_delete(handle).await;
      self.scheduler.task_free(handle).await;
    }

    let mut state = self.state.lock();
    if let Some(backend) = state.proxies.iter_mut().find(|p| p.uuid == backend_uuid) {
      backend.servers.retain(|s| s.id != server_name);
    }
    if let Some(ids) = state.server_ids.get_mut(&backend_uuid) {
      ids.release(puid);
    }
    drop(state);

    self.log.info(&format!("server '{server_name}' removed from backend '{backend_name}'")).await;
    Ok(())
  }

  /// `add_switch_entry`: installs a domain-keyed jump from a frontend to a
  /// backend. The backend is referenced by `uuid` only — a pure lookup, not
  /// an owning edge.
  pub async fn add_switch_entry(&self, frontend_name: &str, backend_name: &str, domain: &str) -> anyhow::Result<()> {
    let backend_uuid = {
      let state = self.state.lock();
      state
        .proxies
        .iter()
        .find(|p| p.id == backend_name && p.cap.contains(Capability::BE))
        .map(|p| p.uuid)
        .ok_or_else(|| anyhow::anyhow!("no such backend '{backend_name}'"))?
    };

    let mut state = self.state.lock();
    let frontend = state
      .proxies
      .iter_mut()
      .find(|p| p.id == frontend_name && p.cap.contains(Capability::FE))
      .ok_or_else(|| anyhow::anyhow!("no such frontend '{frontend_name}'"))?;
    frontend.switching_rules.push(SwitchingRule { domain: domain.to_string(), backend_uuid });
    frontend.switching_hashtbl.insert(domain.to_string(), backend_uuid);
    Ok(())
  }
}
