use ferron_core::{LbLookup, ProxyRecord};

/// The LB-structure initializers named in §6 (`init_server_map`,
/// `fwrr_init_server_groups`, `fwlc_init_server_tree`, `chash_init_server_tree`).
/// `addbackend` calls exactly one of these, chosen by `LbLookup`; which one
/// is a pure function of the proxy's resolved `lb_algorithm.lookup`, so a
/// single dispatch method stands in for the four original entry points.
pub trait LbInitializer: Send + Sync {
  /// Builds whichever lookup structure `proxy.lb_algorithm.lookup` names
  /// for `proxy`'s current server list.
  fn init_server_structure(&self, proxy: &ProxyRecord, lookup: LbLookup);
}
