mod healthcheck;
mod lb_init;
mod listener;
mod log;
mod pools;
mod rate;
mod scheduler;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

pub use healthcheck::HealthCheck;
pub use lb_init::LbInitializer;
pub use listener::{ListenerHandle, ListenerState};
pub use log::{ControlLog, NullLog};
pub use pools::{HeaderIndexPool, StickyTable};
pub use rate::RateCounter;
pub use scheduler::{Scheduler, TaskHandle, TaskSpec};
