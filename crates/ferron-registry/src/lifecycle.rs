use ferron_core::{tick_add, tick_first, tick_remain, Capability, ProxyState, Tick};

use crate::registry::Registry;

impl Registry {
  /// `start_proxies`: binds (but does not enable) every listener across
  /// every proxy, OR-accumulating the error bitmask returned by each
  /// `bind`. A fatal-or-abort bit breaks the whole pass early, same as the
  /// original's `if (err & ERR_ABORT) break`. A successfully bound proxy
  /// lands in IDLE, not RUNNING — `maintain_proxies` is the only place a
  /// listener is actually enabled, once the per-proxy admission gate has
  /// had a chance to run.
  pub async fn start_proxies(&self) -> ferron_core::ErrorBits {
    let mut err = ferron_core::ErrorBits::NONE;

    let entries: Vec<(String, Vec<u64>)> = {
      let proxies = self.snapshot_proxies();
      proxies.into_iter().map(|p| (p.id, p.listeners)).collect()
    };

    for (name, listener_ids) in entries {
      for id in listener_ids {
        let Some(handle) = self.listener_handle(id) else { continue };
        let bits = handle.bind().await;
        err |= bits;
        if bits.is_fatal_or_abort() {
          self.log.alert(&format!("listener for '{name}' failed to bind, aborting startup")).await;
          return err;
        }
      }
      self.set_proxy_state(&name, ProxyState::Idle);
    }

    err
  }

  /// `maintain_proxies`: the periodic admission gate. Global connection
  /// saturation (`global.maxconn`, summed across every frontend's `feconn`)
  /// is checked first and, when tripped, disables every RUNNING frontend's
  /// listeners outright — the per-proxy gate below never runs that pass,
  /// mirroring the original's `if (actconn >= global.maxconn) goto... ` full
  /// stop ahead of the per-proxy `feconn >= maxconn` check. Otherwise, for
  /// every frontend, blocks on `feconn >= maxconn` or an exhausted
  /// session-rate budget; a blocked RUNNING proxy has its listeners
  /// disabled and moves to IDLE, an unblocked IDLE proxy has them
  /// re-enabled and moves to RUNNING. Returns the next tick this method
  /// should be called again, if any collaborator has one.
  pub async fn maintain_proxies(&self) -> Option<Tick> {
    let now = self.clock.now_ms();
    let mut next_wakeup: Option<Tick> = None;

    let frontends: Vec<(String, u32, u32, u32, u32, ProxyState, Vec<u64>)> = {
      let proxies = self.snapshot_proxies();
      proxies
        .into_iter()
        .filter(|p| p.cap.contains(Capability::FE))
        .map(|p| (p.id, p.feconn, p.maxconn, p.fe_sps_lim, p.fe_sess_per_sec, p.state, p.listeners))
        .collect()
    };

    let global_saturated = self.config.global_maxconn > 0
      && frontends.iter().map(|(_, feconn, ..)| *feconn as u64).sum::<u64>() >= self.config.global_maxconn as u64;

    if global_saturated {
      for (name, _, _, _, _, current_state, listener_ids) in &frontends {
        if *current_state == ProxyState::Running {
          for id in listener_ids {
            if let Some(handle) = self.listener_handle(*id) {
              handle.disable().await;
            }
          }
          self.set_proxy_state(name, ProxyState::Idle);
        }
      }
      self.drain_stopping_proxies(now, &mut next_wakeup).await;
      return next_wakeup;
    }

    for (name, feconn, maxconn, limit, mut counter, current_state, listener_ids) in frontends {
      let mut blocked = maxconn > 0 && feconn >= maxconn;

      if limit > 0 {
        let delay = self.rate_counter.next_event_delay(&mut counter, limit, 1);
        if delay > 0 {
          next_wakeup = tick_first(next_wakeup, Some(tick_add(now, delay)));
          blocked = true;
        }
        let mut state = self.state.lock();
        if let Some(p) = state.proxies.iter_mut().find(|p| p.id == name) {
          p.fe_sess_per_sec = counter;
        }
      }

      if blocked && current_state == ProxyState::Running {
        for id in &listener_ids {
          if let Some(handle) = self.listener_handle(*id) {
            handle.disable().await;
          }
        }
        self.set_proxy_state(&name, ProxyState::Idle);
      } else if !blocked && current_state == ProxyState::Idle {
        for id in &listener_ids {
          if let Some(handle) = self.listener_handle(*id) {
            handle.enable().await;
          }
        }
        self.set_proxy_state(&name, ProxyState::Running);
      }
    }

    self.drain_stopping_proxies(now, &mut next_wakeup).await;

    next_wakeup
  }

  /// The drain half of `maintain_proxies`, shared by the global-saturation
  /// early return and the normal per-proxy-gate path: stops any proxy whose
  /// grace period has elapsed and garbage-collects the header-index pool
  /// once everything has stopped. A no-op when a `soft_stop` isn't underway.
  async fn drain_stopping_proxies(&self, now: Tick, next_wakeup: &mut Option<Tick>) {
    if !self.is_stopping() {
      return;
    }

    let draining: Vec<(String, Option<Tick>)> = {
      let proxies = self.snapshot_proxies();
      proxies
        .into_iter()
        .filter(|p| p.state != ProxyState::Stopped)
        .map(|p| (p.id, p.stop_time))
        .collect()
    };

    for (name, stop_time) in draining {
      let Some(stop_time) = stop_time else { continue };
      if tick_remain(now, stop_time) == 0 {
        self.stop_proxy(&name).await;
      } else {
        *next_wakeup = tick_first(*next_wakeup, Some(stop_time));
      }
    }

    let all_stopped = self.snapshot_proxies().iter().all(|p| p.state == ProxyState::Stopped);
    if all_stopped {
      self.hdr_idx_pool.garbage_collect().await;
    }
  }

  /// `pause_proxy`: half-close every listener of a frontend without
  /// dropping already-accepted sessions. Any listener failing the sequence
  /// puts the whole proxy into `ERROR` instead of a half-paused state.
  pub async fn pause_proxy(&self, name: &str) -> bool {
    let (listener_ids, is_frontend) = {
      let proxies = self.snapshot_proxies();
      match proxies.iter().find(|p| p.id == name) {
        Some(p) => (p.listeners.clone(), p.cap.contains(Capability::FE)),
        None => return false,
      }
    };
    if !is_frontend {
      return false;
    }

    let mut ok = true;
    for id in &listener_ids {
      let Some(handle) = self.listener_handle(*id) else { continue };
      if !handle.pause(self.config.pause_backlog).await {
        ok = false;
        break;
      }
    }

    if ok {
      self.set_proxy_state(name, ProxyState::Paused);
    } else {
      self.set_proxy_state(name, ProxyState::Error);
      self.log.alert(&format!("failed to pause '{name}' cleanly, marking it in error")).await;
    }
    ok
  }

  /// `pause_proxies`: pauses every frontend not already `ERROR`/`STOPPED`/
  /// `PAUSED`. Any failure anywhere falls back to a full `soft_stop`, the
  /// same escalation the original performs when a clean pause can't be
  /// guaranteed everywhere.
  pub async fn pause_proxies(&self) {
    let names: Vec<String> = {
      let proxies = self.snapshot_proxies();
      proxies
        .into_iter()
        .filter(|p| {
          p.cap.contains(Capability::FE)
            && !matches!(p.state, ProxyState::Error | ProxyState::Stopped | ProxyState::Paused)
        })
        .map(|p| p.id)
        .collect()
    };

    let mut any_failed = false;
    for name in &names {
      if !self.pause_proxy(name).await {
        any_failed = true;
      }
    }

    if any_failed {
      self.log.warning("not every frontend could be paused cleanly, falling back to a full stop").await;
      self.soft_stop().await;
    }
  }

  /// `listen_proxies`: re-opens listening on every paused frontend. A
  /// listener that's still port-busy leaves the frontend paused instead of
  /// partially running.
  pub async fn listen_proxies(&self) {
    let entries: Vec<(String, Vec<u64>)> = {
      let proxies = self.snapshot_proxies();
      proxies
        .into_iter()
        .filter(|p| p.state == ProxyState::Paused)
        .map(|p| (p.id, p.listeners))
        .collect()
    };

    for (name, listener_ids) in entries {
      let mut all_ok = true;
      for id in &listener_ids {
        let Some(handle) = self.listener_handle(*id) else { continue };
        if !handle.relisten(self.config.pause_backlog).await {
          self
            .log
            .warning(&format!("port {} is still busy, '{name}' stays paused", handle.port()))
            .await;
          all_ok = false;
        }
      }
      if all_ok {
        self.set_proxy_state(&name, ProxyState::Running);
      } else {
        self.pause_proxy(&name).await;
      }
    }
  }

  /// `soft_stop`: arms every non-stopped proxy's `stop_time` and flips the
  /// global `stopping` flag; it does not itself touch a listener. The
  /// actual drain-to-STOPPED transition happens in `maintain_proxies`,
  /// once each proxy's grace period has elapsed.
  pub async fn soft_stop(&self) {
    *self.stopping.lock() = true;
    let now = self.clock.now_ms();

    let entries: Vec<(String, u64)> = {
      let proxies = self.snapshot_proxies();
      proxies
        .into_iter()
        .filter(|p| p.state != ProxyState::Stopped)
        .map(|p| (p.id, p.grace))
        .collect()
    };

    for (name, grace) in &entries {
      let mut state = self.state.lock();
      if let Some(p) = state.proxies.iter_mut().find(|p| &p.id == name) {
        p.stop_time = Some(tick_add(now, *grace));
      }
    }

    self.log.info("soft-stop initiated, draining active sessions").await;
  }

  /// `stop_proxy`: unbinds and deletes every listener of a single proxy and
  /// marks it STOPPED, the terminal step `maintain_proxies` triggers once a
  /// proxy's grace period has run out.
  pub async fn stop_proxy(&self, name: &str) {
    let listener_ids: Vec<u64> = {
      let proxies = self.snapshot_proxies();
      match proxies.iter().find(|p| p.id == name) {
        Some(p) => p.listeners.clone(),
        None => return,
      }
    };

    for id in &listener_ids {
      if let Some(handle) = self.listener_handle(*id) {
        handle.unbind().await;
        handle.delete().await;
      }
    }

    self.set_proxy_state(name, ProxyState::Stopped);
    self.log.info(&format!("proxy '{name}' stopped")).await;
  }
}

#[cfg(test)]
mod tests {
  use ferron_core::{Mode, ProxyState};

  use crate::testutil::{test_registry, FailingListener};

  #[tokio::test]
  async fn start_proxies_binds_every_listener_and_leaves_the_proxy_idle() {
    let reg = test_registry();
    let listener = std::sync::Arc::new(ferron_runtime::fixtures::TestListener::new(8080));
    let listener_id = reg.register_listener(listener.clone());
    let uuid = reg.allocate_uuid();
    let mut px = ferron_core::ProxyRecord::new("web", uuid, ferron_core::Capability::FE, Mode::Http, ferron_core::Tick::ZERO);
    px.listeners.push(listener_id);
    reg.register_proxy(px);

    let err = reg.start_proxies().await;
    assert_eq!(err, ferron_core::ErrorBits::NONE);
    let px = reg.findproxy("web", ferron_core::Capability::FE).await.unwrap();
    assert_eq!(px.state, ProxyState::Idle);
    assert_eq!(listener.state(), ferron_runtime::ListenerState::Listen);
  }

  #[tokio::test]
  async fn start_proxies_stops_early_on_a_fatal_bind_error() {
    let reg = test_registry();
    let listener_id = reg.register_listener(std::sync::Arc::new(FailingListener));
    let uuid = reg.allocate_uuid();
    let mut px = ferron_core::ProxyRecord::new("web", uuid, ferron_core::Capability::FE, Mode::Http, ferron_core::Tick::ZERO);
    px.listeners.push(listener_id);
    reg.register_proxy(px);

    let err = reg.start_proxies().await;
    assert!(err.is_fatal_or_abort());
    let px = reg.findproxy("web", ferron_core::Capability::FE).await.unwrap();
    assert_ne!(px.state, ProxyState::Running);
  }

  #[tokio::test]
  async fn pause_proxy_refuses_a_non_frontend() {
    let reg = test_registry();
    reg.create_backend("api").await.unwrap();
    assert!(!reg.pause_proxy("api").await);
  }

  #[tokio::test]
  async fn pause_then_listen_returns_a_frontend_to_running() {
    let reg = test_registry();
    let listener_id = reg.register_listener(std::sync::Arc::new(ferron_runtime::fixtures::TestListener::new(8080)));
    let uuid = reg.allocate_uuid();
    let mut px = ferron_core::ProxyRecord::new("web", uuid, ferron_core::Capability::FE, Mode::Http, ferron_core::Tick::ZERO);
    px.listeners.push(listener_id);
    reg.register_proxy(px);

    assert!(reg.pause_proxy("web").await);
    assert_eq!(reg.findproxy("web", ferron_core::Capability::FE).await.unwrap().state, ProxyState::Paused);

    reg.listen_proxies().await;
    assert_eq!(reg.findproxy("web", ferron_core::Capability::FE).await.unwrap().state, ProxyState::Running);
  }

  #[tokio::test]
  async fn soft_stop_arms_the_grace_deadline_and_maintain_proxies_finishes_the_stop() {
    let reg = test_registry();
    reg.create_backend("api").await.unwrap();
    reg.soft_stop().await;
    assert!(reg.is_stopping());
    let px = reg.findproxy("api", ferron_core::Capability::BE).await.unwrap();
    assert!(px.stop_time.is_some());
    assert_ne!(px.state, ProxyState::Stopped);

    reg.maintain_proxies().await;
    let px = reg.findproxy("api", ferron_core::Capability::BE).await.unwrap();
    assert_eq!(px.state, ProxyState::Stopped);
  }

  #[tokio::test]
  async fn maintain_proxies_garbage_collects_once_everything_has_stopped() {
    let reg = test_registry();
    reg.create_backend("api").await.unwrap();
    reg.soft_stop().await;
    reg.maintain_proxies().await;
  }

  #[tokio::test]
  async fn maintain_proxies_idles_a_frontend_once_feconn_reaches_maxconn_and_reopens_once_it_drops() {
    use std::sync::Arc;

    let reg = test_registry();
    let listener = Arc::new(ferron_runtime::fixtures::TestListener::new(8080));
    let listener_id = reg.register_listener(listener.clone());
    let uuid = reg.allocate_uuid();
    let mut px = ferron_core::ProxyRecord::new("web", uuid, ferron_core::Capability::FE, Mode::Http, ferron_core::Tick::ZERO);
    px.listeners.push(listener_id);
    px.maxconn = 100;
    px.feconn = 100;
    px.state = ProxyState::Running;
    reg.register_proxy(px);

    reg.maintain_proxies().await;
    let px = reg.findproxy("web", ferron_core::Capability::FE).await.unwrap();
    assert_eq!(px.state, ProxyState::Idle);
    assert_eq!(listener.state(), ferron_runtime::ListenerState::Listen);

    {
      let mut state = reg.state.lock();
      let p = state.proxies.iter_mut().find(|p| p.id == "web").unwrap();
      p.feconn = 0;
    }

    reg.maintain_proxies().await;
    let px = reg.findproxy("web", ferron_core::Capability::FE).await.unwrap();
    assert_eq!(px.state, ProxyState::Running);
    assert_eq!(listener.state(), ferron_runtime::ListenerState::Ready);
  }

  #[tokio::test]
  async fn maintain_proxies_idles_every_running_frontend_once_global_maxconn_is_reached() {
    use std::sync::Arc;

    use crate::registry::RegistryConfig;
    use crate::testutil::test_registry_with_config;

    let reg = test_registry_with_config(RegistryConfig {
      default_maxconn: 2_000,
      conn_retries: 3,
      pause_backlog: 128,
      global_maxconn: 150,
    });
    let listener = Arc::new(ferron_runtime::fixtures::TestListener::new(8080));
    let listener_id = reg.register_listener(listener.clone());
    let uuid = reg.allocate_uuid();
    let mut px = ferron_core::ProxyRecord::new("web", uuid, ferron_core::Capability::FE, Mode::Http, ferron_core::Tick::ZERO);
    px.listeners.push(listener_id);
    px.maxconn = 1_000;
    px.feconn = 200;
    px.state = ProxyState::Running;
    reg.register_proxy(px);

    reg.maintain_proxies().await;
    let px = reg.findproxy("web", ferron_core::Capability::FE).await.unwrap();
    assert_eq!(px.state, ProxyState::Idle);
    assert_eq!(listener.state(), ferron_runtime::ListenerState::Listen);
  }
}
