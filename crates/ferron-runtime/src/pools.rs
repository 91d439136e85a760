use async_trait::async_trait;

/// The header-index pool collaborator (`pool_alloc2`/`pool_gc2`/`hdr_idx_init`).
/// `session_set_backend` allocates from the *frontend's* pool when a backend
/// first requires L7 analysis (§9, "hdr_idx_pool ownership").
#[async_trait]
pub trait HeaderIndexPool: Send + Sync {
  /// Allocates a fresh pool sized for `nb_req_cap`/`nb_rsp_cap` header-index
  /// slots and returns its opaque id, the collaborator-side counterpart of
  /// `addbackend` always creating a `hdr_idx_pool` for the backend it just
  /// built.
  async fn create(&self, nb_req_cap: usize, nb_rsp_cap: usize) -> u64;

  /// `pool_alloc2`: returns `None` on allocation failure (out of memory),
  /// which `session_set_backend` must propagate as `false`.
  async fn alloc(&self, pool_id: u64) -> Option<u64>;

  /// `pool_gc2`: reclaims freed pool memory; called by `maintain_proxies`
  /// right after a `stop_proxy` drain.
  async fn garbage_collect(&self);
}

/// The sticky-table collaborator (`stktable_init`), initialized once per
/// backend by `addbackend`.
#[async_trait]
pub trait StickyTable: Send + Sync {
  async fn init(&self, proxy_uuid: u32);
}
