//! Collaborator fakes used only by this crate's own test suite. None of
//! these are production implementations — they exist so `Registry`'s tests
//! don't need a real scheduler, health checker, or socket.

use std::sync::Arc;

use async_trait::async_trait;

use ferron_core::{ErrorBits, LbLookup, ManualClock, ProxyRecord};
use ferron_runtime::{
  fixtures::{RecordingLog, TestScheduler},
  ControlLog, HealthCheck, HeaderIndexPool, LbInitializer, ListenerHandle, ListenerState, NullLog,
  RateCounter, StickyTable,
};

use crate::registry::{Registry, RegistryConfig};

struct NoopHealth;

#[async_trait]
impl HealthCheck for NoopHealth {
  async fn set_server_up(&self, _server_puid: u32) {}
  async fn set_server_down(&self, _server_puid: u32) {}
  fn check_interval_ms(&self, _server_puid: u32) -> u64 {
    2_000
  }
}

struct NoopLbInit;

impl LbInitializer for NoopLbInit {
  fn init_server_structure(&self, _proxy: &ProxyRecord, _lookup: LbLookup) {}
}

struct NoopPools {
  next_pool_id: std::sync::atomic::AtomicU64,
}

impl NoopPools {
  fn new() -> Self {
    Self { next_pool_id: std::sync::atomic::AtomicU64::new(1) }
  }
}

#[async_trait]
impl HeaderIndexPool for NoopPools {
  async fn create(&self, _nb_req_cap: usize, _nb_rsp_cap: usize) -> u64 {
    self.next_pool_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
  }

  async fn alloc(&self, pool_id: u64) -> Option<u64> {
    Some(pool_id * 1000 + 1)
  }
  async fn garbage_collect(&self) {}
}

#[async_trait]
impl StickyTable for NoopPools {
  async fn init(&self, _proxy_uuid: u32) {}
}

struct NoopRate;

impl RateCounter for NoopRate {
  fn next_event_delay(&self, _counter: &mut u32, _limit: u32, _unit: u32) -> u64 {
    0
  }
}

/// A listener whose `bind` always fails fatally, for exercising
/// `start_proxies`'s early-abort path.
pub struct FailingListener;

#[async_trait]
impl ListenerHandle for FailingListener {
  fn state(&self) -> ListenerState {
    ListenerState::Unbound
  }
  async fn bind(&self) -> ErrorBits {
    ErrorBits::FATAL
  }
  async fn enable(&self) {}
  async fn disable(&self) {}
  async fn pause(&self, _backlog: u32) -> bool {
    false
  }
  async fn relisten(&self, _backlog: u32) -> bool {
    false
  }
  async fn unbind(&self) {}
  async fn delete(&self) {}
  fn port(&self) -> u16 {
    0
  }
}

fn default_test_config() -> RegistryConfig {
  RegistryConfig {
    default_maxconn: 2_000,
    conn_retries: 3,
    pause_backlog: 128,
    global_maxconn: 2_000_000,
  }
}

pub fn test_registry() -> Registry {
  test_registry_with_log(Arc::new(NullLog))
}

/// A registry wired to a [`RecordingLog`], for tests that assert *that* an
/// operation alerted/warned (testable property 11) rather than just its
/// state-machine outcome.
pub fn test_registry_with_recording_log() -> (Registry, Arc<RecordingLog>) {
  let log = Arc::new(RecordingLog::new());
  (test_registry_with_log(log.clone()), log)
}

/// A registry with a caller-supplied `RegistryConfig`, for tests that need
/// to tune `global_maxconn` or similar knobs away from the generous test
/// default.
pub fn test_registry_with_config(config: RegistryConfig) -> Registry {
  Registry::new(
    Arc::new(ManualClock::new(0)),
    Arc::new(TestScheduler::new()),
    Arc::new(NoopHealth),
    Arc::new(NoopLbInit),
    Arc::new(NoopPools::new()),
    Arc::new(NoopPools::new()),
    Arc::new(NoopRate),
    Arc::new(NullLog),
    config,
  )
}

fn test_registry_with_log(log: Arc<dyn ControlLog>) -> Registry {
  Registry::new(
    Arc::new(ManualClock::new(0)),
    Arc::new(TestScheduler::new()),
    Arc::new(NoopHealth),
    Arc::new(NoopLbInit),
    Arc::new(NoopPools::new()),
    Arc::new(NoopPools::new()),
    Arc::new(NoopRate),
    log,
    default_test_config(),
  )
}
