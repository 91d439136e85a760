use async_trait::async_trait;

/// The admin-console/hot-reload runtime mutation surface named in §6: each
/// call returns 0 on success and non-zero on failure, logging the reason
/// through whatever `ControlLog` the implementor (`ferron_registry::Registry`)
/// was built with.
#[async_trait]
pub trait RuntimeApi {
  async fn addbackend(&self, name: &str) -> i32;
  async fn delbackend(&self, name: &str) -> i32;
  async fn addserver(&self, backend_name: &str, server_name: &str, addr: &str, cookie: &str) -> i32;
  async fn delserver(&self, backend_name: &str, server_name: &str) -> i32;
  async fn add_switch_entry(&self, frontend_name: &str, backend_name: &str, domain: &str) -> i32;
}
