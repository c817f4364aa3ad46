//! `mcp-tester watch`: follow the engine's log and connection status.

use std::error::Error;

use crate::mcp::engine::{EngineHandle, EngineSnapshot};
use crate::mcp::session::ConnectionStatus;

/// Tracks what has already been printed so each snapshot only yields news.
#[derive(Debug, Default)]
pub struct WatchPrinter {
    last_seq: Option<u64>,
    last_status: Option<ConnectionStatus>,
}

impl WatchPrinter {
    /// Lines to print for `snapshot`, oldest first.
    pub fn observe(&mut self, snapshot: &EngineSnapshot) -> Vec<String> {
        let mut lines = Vec::new();

        if self.last_status.as_ref() != Some(&snapshot.status) {
            let marker = if snapshot.status.connected {
                "🟢"
            } else {
                "🔴"
            };
            lines.push(format!(
                "{marker} {} ({})",
                snapshot.status.status_text, snapshot.state
            ));
            self.last_status = Some(snapshot.status.clone());
        }

        let last_seq = self.last_seq;
        for entry in snapshot
            .logs
            .iter()
            .rev()
            .filter(|entry| last_seq.map_or(true, |seen| entry.seq > seen))
        {
            lines.push(entry.to_string());
            self.last_seq = Some(entry.seq);
        }

        lines
    }
}

pub async fn run_watch(handle: EngineHandle) -> Result<(), Box<dyn Error>> {
    let mut snapshots = handle.subscribe();
    let mut printer = WatchPrinter::default();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let snapshot = snapshots.borrow_and_update().clone();
        for line in printer.observe(&snapshot) {
            println!("{line}");
        }

        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    handle.shutdown();
    println!("👋 Disconnected");
    Ok(())
}
