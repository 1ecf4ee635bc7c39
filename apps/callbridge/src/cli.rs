use std::path::PathBuf;

use clap::Parser;

/// Bridge telephony call events into one call lifecycle and notify the CRM.
///
/// Reads newline-delimited JSON call events from stdin.
#[derive(Debug, Clone, Parser)]
#[command(name = "callbridge", version, about)]
pub struct Args {
    /// Config file (default: <config dir>/callbridge/callbridge.toml)
    #[arg(short, long, env = "CALLBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory for callbridge.log (default: <local data dir>/callbridge/logs)
    #[arg(long, env = "CALLBRIDGE_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Load contacts from this JSON file instead of the configured source
    #[arg(long, env = "CALLBRIDGE_CONTACTS_FILE")]
    pub contacts_file: Option<PathBuf>,
}

impl Args {
    pub fn log_dir_or_default(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(call_core::CALLBRIDGE_NAME)
                .join("logs")
        })
    }
}
