use async_trait::async_trait;

/// The control-plane logging collaborator: a transport-agnostic trait with
/// severity levels, so nothing in this crate depends on a concrete logging
/// backend.
#[async_trait]
pub trait ControlLog: Send + Sync {
  async fn alert(&self, message: &str);
  async fn warning(&self, message: &str);
  async fn info(&self, message: &str);
}

/// Discards every message. Used by tests and by embedders that don't want
/// control-plane logging.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLog;

#[async_trait]
impl ControlLog for NullLog {
  async fn alert(&self, _message: &str) {}
  async fn warning(&self, _message: &str) {}
  async fn info(&self, _message: &str) {}
}
