//! Host console: operator commands read line by line from stdin

use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Status,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "start" | "s" => Some(Command::Start),
            "status" | "st" => Some(Command::Status),
            "quit" | "q" | "exit" => Some(Command::Quit),
            _ => None,
        }
    }
}

/// Run commands from `input` until it ends, `quit` is entered, or the server
/// shuts down. `quit` triggers the shutdown.
pub async fn run<R>(input: R, state: Arc<AppState>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    tracing::info!("Console ready: type 'start', 'status' or 'quit'");

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = state.shutdown.cancelled() => break,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::debug!("Console input closed");
                break;
            }
            Err(e) => {
                tracing::warn!("Console read error: {}", e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        match Command::parse(&line) {
            Some(Command::Start) => match state.start_game().await {
                Ok(()) => tracing::info!("Game started from console"),
                Err(e) => tracing::warn!("Cannot start: {}", e),
            },
            Some(Command::Status) => {
                let snapshot = state.snapshot().await;
                tracing::info!(
                    "Game {} is {:?}: question {:?} of {}, {} players, {} answered",
                    snapshot.game_id,
                    snapshot.mode,
                    snapshot.question_number,
                    snapshot.total_questions,
                    snapshot.players,
                    snapshot.answered
                );
                for entry in state.leaderboard().await {
                    tracing::info!("  #{} {} {}", entry.rank, entry.name, entry.score);
                }
            }
            Some(Command::Quit) => {
                state.shutdown();
                break;
            }
            None => tracing::warn!("Unknown command '{}'", line.trim()),
        }
    }
}
