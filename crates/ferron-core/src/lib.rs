mod capability;
mod error;
mod ident;
mod proxy;
mod server;
mod time;

pub use capability::Capability;
pub use error::ErrorBits;
pub use ident::{invalid_identifier_char, IdentityRegistry};
pub use proxy::{
  AnalyserMask, CookieConfig, LbAlgorithm, LbHashType, LbKind, LbLookup, Mode, ProxyRecord,
  ProxyState, SwitchingRule, Timeouts,
};
pub use server::{CheckTaskRef, DefaultServerTemplate, ServerRecord, ServerState, EFFECTIVE_WEIGHT_SCALE};
pub use time::{tick_add, tick_first, tick_remain, Clock, ManualClock, SystemClock, Tick};
