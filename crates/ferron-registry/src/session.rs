use ferron_core::{AnalyserMask, Capability, Mode, Timeouts};

use crate::registry::Registry;

/// A session's backend-binding state, the part of a full session object the
/// control plane is responsible for. Everything else (the byte stream
/// itself, request/response buffers) belongs to the out-of-scope I/O layer.
#[derive(Debug, Clone, Default)]
pub struct Session {
  pub frontend: String,
  pub backend: Option<String>,
  pub hdr_idx: Option<u64>,
  pub req_analysers: AnalyserMask,
  pub timeouts: Timeouts,
  pub conn_retries: u32,
  pub independent_streams: bool,
  pub resp_bug_tolerant: bool,
  pub(crate) assigned: bool,
}

impl Session {
  pub fn new(frontend: impl Into<String>) -> Self {
    Self {
      frontend: frontend.into(),
      backend: None,
      hdr_idx: None,
      req_analysers: AnalyserMask::empty(),
      timeouts: Timeouts::default(),
      conn_retries: 0,
      independent_streams: false,
      resp_bug_tolerant: false,
      assigned: false,
    }
  }

  pub fn is_assigned(&self) -> bool {
    self.assigned
  }
}

impl Registry {
  /// `session_set_backend`: idempotent via the `assigned` flag (the
  /// original's `SN_BE_ASSIGNED`). Bumps the backend's connection counters,
  /// copies its timeouts/retry count/streaming flags into the session, and
  /// — when the backend needs L7 analysis — allocates a header-index slot
  /// from the *frontend's* pool, not the backend's (§9: confirmed directly
  /// against `session_set_backend`, which reaches through `s->fe->hdr_idx_pool`
  /// even though it's the backend that requires the analyser).
  pub async fn session_set_backend(&self, session: &mut Session, backend_name: &str) -> anyhow::Result<bool> {
    if session.assigned {
      return Ok(true);
    }

    let frontend = self
      .findproxy(&session.frontend, Capability::FE)
      .await
      .ok_or_else(|| anyhow::anyhow!("unknown frontend '{}'", session.frontend))?;
    let backend = self
      .findproxy(backend_name, Capability::BE)
      .await
      .ok_or_else(|| anyhow::anyhow!("unknown backend '{backend_name}'"))?;

    {
      let mut state = self.state.lock();
      if let Some(be) = state.proxies.iter_mut().find(|p| p.uuid == backend.uuid) {
        be.beconn += 1;
        be.cum_beconn += 1;
        be.beconn_max = be.beconn_max.max(be.beconn);
      }
    }

    if backend.mode == Mode::Http {
      let pool_id = frontend
        .hdr_idx_pool_id
        .ok_or_else(|| anyhow::anyhow!("frontend '{}' has no header-index pool configured", frontend.id))?;
      let Some(idx) = self.hdr_idx_pool.alloc(pool_id).await else {
        return Ok(false);
      };
      session.hdr_idx = Some(idx);
    }

    session.timeouts = backend.timeouts.clone();
    session.conn_retries = backend.conn_retries;
    session.independent_streams = backend.independent_streams;
    session.resp_bug_tolerant = backend.resp_bug_tolerant;
    session.req_analysers |= backend.be_req_ana & !frontend.listener_ana;
    session.backend = Some(backend.id.clone());
    session.assigned = true;
    Ok(true)
  }
}
