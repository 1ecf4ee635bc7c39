//! Replay transport: newline-delimited JSON call events.
//!
//! Each line is one `CallEvent` as a transport adapter would emit it, e.g.
//!
//! ```text
//! {"callId":"c1","state":"offered","remoteNumber":"+4989123456"}
//! {"callId":"c1","state":"connected"}
//! {"callId":"c1","state":"disconnected"}
//! ```
//!
//! Blank lines are skipped; malformed lines are logged and skipped.

use crate::error::CallbridgeError;

use call_core::orchestrator::EventSender;
use call_core::status::StatusBoard;

use common::ErrorLocation;
use models::{CallEvent, TransportKind};

use std::panic::Location;

use log::{debug, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub accepted: usize,
    pub rejected: usize,
}

/// Feed every event from `reader` into `sender` until EOF.
///
/// The replay reports itself to `status` as the `External` transport, up
/// while reading and down at the end.
pub async fn run<R>(
    reader: R,
    sender: EventSender,
    status: &StatusBoard,
) -> Result<ReplayStats, CallbridgeError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut stats = ReplayStats::default();
    let mut line_number = 0usize;

    status.set_transport(TransportKind::External, true);

    let result = loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break Ok(stats),
            Err(e) => {
                break Err(CallbridgeError::Replay {
                    message: format!("Failed to read line {}: {e}", line_number + 1),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };
        line_number += 1;

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event = match parse_event(line) {
            Ok(event) => event,
            Err(reason) => {
                warn!("Skipping line {line_number}: {reason}");
                stats.rejected += 1;
                continue;
            }
        };

        debug!("Line {line_number}: {:?} for call {}", event.state, event.call_id);

        if let Err(e) = sender.send(event).await {
            break Err(CallbridgeError::Replay {
                message: format!("Orchestrator stopped at line {line_number}: {e}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        stats.accepted += 1;
    };

    status.set_transport(TransportKind::External, false);
    info!(
        "Replay ended after {line_number} lines ({} events, {} skipped)",
        stats.accepted, stats.rejected
    );

    result
}

fn parse_event(line: &str) -> Result<CallEvent, String> {
    let event: CallEvent =
        serde_json::from_str(line).map_err(|e| format!("not a call event: {e}"))?;

    if event.call_id.trim().is_empty() {
        return Err("call id cannot be empty".to_string());
    }

    Ok(event)
}
