pub mod config;
pub mod driver;
pub mod error;
pub mod interrupt;
pub mod kernel;
pub mod services;

// Re-export specific items if needed for convenient access
pub use config::TutorConfig;
pub use driver::{Driver, Outbound};
pub use kernel::reactor::Reactor;
