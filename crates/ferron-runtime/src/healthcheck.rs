use async_trait::async_trait;

/// The health-check collaborator named in §6. The actual check algorithm
/// (`process_chk`) is entirely out of scope; the control plane only calls
/// `set_server_up`/`set_server_down` at the lifecycle edges `addserver` and
/// `delserver` require, and reads the check interval back through
/// `srv_getinter`.
#[async_trait]
pub trait HealthCheck: Send + Sync {
  /// Transitions a server out of `MAINTAIN`, called once at the end of a
  /// successful `addserver`.
  async fn set_server_up(&self, server_puid: u32);

  /// Transitions a server into `MAINTAIN`, called at the start of
  /// `delserver` (and anywhere else maintenance is forced).
  async fn set_server_down(&self, server_puid: u32);

  /// `srv_getinter`: the effective check interval for a server, which may
  /// differ from the raw `inter` field (e.g. `fastinter` while going down).
  fn check_interval_ms(&self, server_puid: u32) -> u64;
}
