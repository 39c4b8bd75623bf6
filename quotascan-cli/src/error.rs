//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;
use quotascan::format::FormatParseError;
use quotascan::ScanError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(std::io::Error),
    /// Unknown quota format name on the command line
    Format(FormatParseError),
    /// Mountpoint scan could not be started
    Scan(ScanError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Scan(ScanError::NoValidTargets) = self {
            eprintln!();
            eprintln!("Targets may be mountpoint directories, block or character");
            eprintln!("device paths, or LABEL=/UUID= specifications.");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Format(e) => write!(f, "{}", e),
            CliError::Scan(e) => write!(f, "Cannot scan mount table: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoggingInit(e) => Some(e),
            CliError::Format(e) => Some(e),
            CliError::Scan(e) => Some(e),
        }
    }
}

impl From<ScanError> for CliError {
    fn from(e: ScanError) -> Self {
        CliError::Scan(e)
    }
}

impl From<FormatParseError> for CliError {
    fn from(e: FormatParseError) -> Self {
        CliError::Format(e)
    }
}
