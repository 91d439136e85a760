//! Lightweight fakes for the collaborator traits, used only by this crate's
//! own tests and by downstream crates' test suites — not production
//! implementations of the listener/scheduler/health-check subsystems.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use ferron_core::ErrorBits;

use crate::listener::{ListenerHandle, ListenerState};
use crate::log::ControlLog;
use crate::scheduler::{Scheduler, TaskHandle, TaskSpec};

/// A `ControlLog` that records every call instead of discarding it, so a
/// test can assert *that* an operation alerted/warned without scraping
/// stdout or a file.
#[derive(Default)]
pub struct RecordingLog {
  entries: Mutex<Vec<(LogLevel, String)>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
  Alert,
  Warning,
  Info,
}

impl RecordingLog {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn entries(&self) -> Vec<(LogLevel, String)> {
    self.entries.lock().unwrap().clone()
  }

  pub fn any_at(&self, level: LogLevel) -> bool {
    self.entries.lock().unwrap().iter().any(|(l, _)| *l == level)
  }
}

#[async_trait]
impl ControlLog for RecordingLog {
  async fn alert(&self, message: &str) {
    self.entries.lock().unwrap().push((LogLevel::Alert, message.to_string()));
  }

  async fn warning(&self, message: &str) {
    self.entries.lock().unwrap().push((LogLevel::Warning, message.to_string()));
  }

  async fn info(&self, message: &str) {
    self.entries.lock().unwrap().push((LogLevel::Info, message.to_string()));
  }
}

/// An in-memory listener that always binds successfully and tracks its
/// state transitions, so a registry test can assert on them without a real
/// socket.
pub struct TestListener {
  state: AtomicU8,
  port: u16,
  pub fail_pause: bool,
  pub fail_relisten: bool,
}

impl TestListener {
  pub fn new(port: u16) -> Self {
    Self {
      state: AtomicU8::new(ListenerState::Unbound as u8),
      port,
      fail_pause: false,
      fail_relisten: false,
    }
  }

  fn set_state(&self, state: ListenerState) {
    self.state.store(state as u8, Ordering::SeqCst);
  }
}

#[async_trait]
impl ListenerHandle for TestListener {
  fn state(&self) -> ListenerState {
    match self.state.load(Ordering::SeqCst) {
      0 => ListenerState::Unbound,
      1 => ListenerState::Assigned,
      2 => ListenerState::Listen,
      _ => ListenerState::Ready,
    }
  }

  async fn bind(&self) -> ErrorBits {
    self.set_state(ListenerState::Listen);
    ErrorBits::NONE
  }

  async fn enable(&self) {
    self.set_state(ListenerState::Ready);
  }

  async fn disable(&self) {
    self.set_state(ListenerState::Listen);
  }

  async fn pause(&self, _backlog: u32) -> bool {
    if self.fail_pause {
      return false;
    }
    self.set_state(ListenerState::Listen);
    true
  }

  async fn relisten(&self, _backlog: u32) -> bool {
    if self.fail_relisten {
      return false;
    }
    self.set_state(ListenerState::Listen);
    true
  }

  async fn unbind(&self) {
    self.set_state(ListenerState::Assigned);
  }

  async fn delete(&self) {
    self.set_state(ListenerState::Unbound);
  }

  fn port(&self) -> u16 {
    self.port
  }
}

/// A scheduler that tracks pending tasks in memory and never actually fires
/// them; tests assert on `is_pending`/`pending_count` instead.
#[derive(Default)]
pub struct TestScheduler {
  next_id: AtomicU64,
  pending: Mutex<HashMap<u64, TaskSpec>>,
}

impl TestScheduler {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_pending(&self, task: TaskHandle) -> bool {
    self.pending.lock().unwrap().contains_key(&task.0)
  }

  pub fn pending_count(&self) -> usize {
    self.pending.lock().unwrap().len()
  }
}

#[async_trait]
impl Scheduler for TestScheduler {
  async fn task_new(&self) -> TaskHandle {
    TaskHandle(self.next_id.fetch_add(1, Ordering::SeqCst))
  }

  async fn task_queue(&self, task: TaskHandle, spec: TaskSpec) {
    self.pending.lock().unwrap().insert(task.0, spec);
  }

  async fn task_delete(&self, task: TaskHandle) {
    self.pending.lock().unwrap().remove(&task.0);
  }

  async fn task_free(&self, _task: TaskHandle) {}
}
