use async_trait::async_trait;

use ferron_core::ErrorBits;

/// The states a bound socket moves through, mirroring `LI_ASSIGNED`/`LI_LISTEN`/
/// readiness toggling in the original listener subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
  Unbound,
  Assigned,
  Listen,
  Ready,
}

/// An opaque handle over a bound socket, consumed as an interface: the
/// control plane never names a socket type, only this trait (§9, "Listener
/// as capability").
#[async_trait]
pub trait ListenerHandle: Send + Sync {
  fn state(&self) -> ListenerState;

  /// `tcp_bind_listener`: binds the underlying socket. Returns an error
  /// bitmask rather than a `Result` because fatal/abort/warn bits must
  /// survive being OR-combined across an entire proxy's listener list.
  async fn bind(&self) -> ErrorBits;

  /// `enable_listener` / `EV_FD_SET(fd, DIR_RD)`.
  async fn enable(&self);

  /// `disable_listener` / `EV_FD_CLR(fd, DIR_RD)`.
  async fn disable(&self);

  /// Half-close write, then re-`listen(backlog)`, then half-close read, as
  /// `pause_proxy` requires. Returns `true` iff the whole sequence
  /// succeeded.
  async fn pause(&self, backlog: u32) -> bool;

  /// Re-opens listening after a pause (`listen_proxies`). `false` means the
  /// port is busy and the caller should fall back to `pause`.
  async fn relisten(&self, backlog: u32) -> bool;

  async fn unbind(&self);

  async fn delete(&self);

  /// The port from the bound address, used only to format the "port busy"
  /// warning in `listen_proxies`.
  fn port(&self) -> u16;
}
