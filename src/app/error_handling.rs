//! Error handling utilities

use tracing::error;

use crate::error::StackError;

/// Report a fatal error and exit.
///
/// - `verbose = 0`: the error message only
/// - `verbose >= 1`: the full error chain
///
/// Configuration errors exit with 2, everything else with 1.
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    error!("Fatal error: {:#}", error);
    eprintln!("Error: {error}");

    if verbose >= 1 {
        eprintln!("\nError chain:");
        for (i, cause) in error.chain().enumerate() {
            eprintln!("  {}: {}", i, cause);
        }
    }

    std::process::exit(exit_code(&error))
}

fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<StackError>())
        .map_or(1, StackError::exit_code)
}
