mod config_registry;
mod runtime_api;

pub use config_registry::{ConfigRegistry, KeywordParser, KeywordTable, ParseOutcome};
pub use runtime_api::RuntimeApi;
