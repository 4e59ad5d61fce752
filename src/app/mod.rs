//! Application module
//!
//! Process-level plumbing for the binary:
//! - Configuration handling
//! - Logging setup
//! - Fatal error reporting
//! - Shutdown signals and the run loop

pub mod config;
pub mod error_handling;
pub mod logging;
pub mod runtime;
pub mod signals;

pub use config::AppConfig;
pub use error_handling::handle_fatal_error;
pub use logging::init_logging;
pub use runtime::{check_config, decode_file, run_stack};
pub use signals::{shutdown_signal, ShutdownSignal};
