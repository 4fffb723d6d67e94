mod builtin;
pub mod counters;
pub mod dispatch;
pub mod error;
pub mod followers;
pub mod ledger;
pub mod modules;
pub mod registry;
pub mod services;
pub mod sinks;
pub mod status;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod workers;

#[cfg(test)]
mod test_support;

pub use dispatch::{Engine, Outcome, TriggerReport};
pub use error::{ActionError, DispatchError, LedgerError, RegistryError};
pub use registry::{Module, Registry};
pub use services::Services;
