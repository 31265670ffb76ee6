use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::{PlayerId, QuestionTicket};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;

impl AppState {
    /// Send `msg` to every registered connection.
    ///
    /// The recipient list is snapshotted under the lock and the sends happen
    /// after it is released. A connection that cannot take the message (writer
    /// gone, or mailbox full because the client stopped reading) is evicted in
    /// a second locked pass, and its departure is broadcast in turn.
    pub async fn broadcast(self: &Arc<Self>, msg: ServerMessage) {
        let mut queue = VecDeque::from([msg]);

        while let Some(msg) = queue.pop_front() {
            let targets = self.game.lock().await.connections();

            let mut failed: Vec<PlayerId> = Vec::new();
            for conn in targets {
                match conn.outbox.try_send(msg.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!("Connection {} is not keeping up, dropping it", conn.id);
                        failed.push(conn.id);
                    }
                    Err(TrySendError::Closed(_)) => {
                        tracing::debug!("Connection {} already closed", conn.id);
                        failed.push(conn.id);
                    }
                }
            }

            if failed.is_empty() {
                continue;
            }

            let (departed, total, reveal) = {
                let mut game = self.game.lock().await;
                let departed: Vec<_> = failed
                    .into_iter()
                    .filter_map(|id| game.unregister(id))
                    .collect();
                (departed, game.count(), game.reveal_due())
            };

            for player in departed {
                player.conn.closed.cancel();
                queue.push_back(ServerMessage::PlayerLeft {
                    name: player.name,
                    total_players: total,
                });
            }

            if let Some(ticket) = reveal {
                self.trigger_reveal(ticket);
            }
        }
    }

    /// Reveal `ticket` when its answer window closes
    pub(crate) fn schedule_reveal(self: &Arc<Self>, ticket: QuestionTicket, deadline: Instant) {
        let state = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = state.shutdown.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => state.reveal(ticket).await,
            }
        });
    }

    /// Reveal `ticket` now, from a fresh task so the caller is not held up
    pub(crate) fn trigger_reveal(self: &Arc<Self>, ticket: QuestionTicket) {
        let state = Arc::clone(self);
        tokio::spawn(async move {
            if !state.shutdown.is_cancelled() {
                state.reveal(ticket).await;
            }
        });
    }

    /// Move past `ticket` once players had `delay` to read the reveal
    pub(crate) fn schedule_advance(self: &Arc<Self>, ticket: QuestionTicket, delay: Duration) {
        let state = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = state.shutdown.cancelled() => {}
                _ = tokio::time::sleep(delay) => state.advance_question(ticket).await,
            }
        });
    }
}
