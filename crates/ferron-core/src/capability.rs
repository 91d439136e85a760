use bitflags::bitflags;

bitflags! {
  /// What a `ProxyRecord` is allowed to do. `LISTEN` is a combined frontend
  /// and backend, not a distinct bit.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
  pub struct Capability: u8 {
    const FE = 1 << 0;
    const BE = 1 << 1;
    const RS = 1 << 2;
    const LISTEN = Self::FE.bits() | Self::BE.bits();
  }
}

impl Capability {
  /// Two proxies are allowed to share an `id` only if one is `FE|RS` and the
  /// other is `BE|RS` (§3 invariants, §4.6). Every other combination of equal
  /// names is a collision.
  pub fn permits_name_collision_with(self, other: Capability) -> bool {
    const FE_RS: Capability = Capability::FE.union(Capability::RS);
    const BE_RS: Capability = Capability::BE.union(Capability::RS);
    (self == FE_RS && other == BE_RS) || (self == BE_RS && other == FE_RS)
  }
}
