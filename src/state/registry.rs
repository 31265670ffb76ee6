//! Connection registry: which connections have joined, under which name.

use super::{AppState, Connection, Departed, GameState, Player};
use crate::protocol::ServerMessage;
use crate::types::*;
use std::sync::Arc;
use tokio::time::Instant;

/// Trim a requested display name, falling back to `guest-<id>` when blank
fn display_name(id: PlayerId, requested: Option<&str>) -> String {
    match requested.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.chars().take(MAX_NAME_CHARS).collect(),
        None => format!("guest-{}", id),
    }
}

impl GameState {
    /// Add or rename the player behind `conn`. Returns true if the connection
    /// was not registered before.
    pub(crate) fn register(&mut self, conn: &Connection, requested: Option<&str>) -> bool {
        let name = display_name(conn.id, requested);

        if let Some(player) = self.players.get_mut(&conn.id) {
            tracing::info!("Player {} renamed from '{}' to '{}'", conn.id, player.name, name);
            player.name = name;
            return false;
        }

        tracing::info!("Registered player '{}' (connection {})", name, conn.id);
        self.players.insert(
            conn.id,
            Player {
                id: conn.id,
                name,
                score: 0,
                answered: false,
                conn: conn.clone(),
            },
        );
        true
    }

    /// Remove a player. Once a game has started their score stays on the
    /// leaderboard until the next start; they only drop out of the answered
    /// set and stop receiving messages.
    pub(crate) fn unregister(&mut self, id: PlayerId) -> Option<Player> {
        let player = self.players.remove(&id)?;
        self.answered.remove(&id);
        if self.mode != GameMode::Waiting {
            self.departed.push(Departed {
                id,
                name: player.name.clone(),
                score: player.score,
            });
        }
        tracing::info!("Unregistered player '{}' (connection {})", player.name, id);
        Some(player)
    }

    pub fn count(&self) -> usize {
        self.players.len()
    }

    /// Visit every player in join order. Only for building snapshots.
    pub fn for_each(&self, mut f: impl FnMut(&Player)) {
        for player in self.players.values() {
            f(player);
        }
    }

    /// Snapshot of every player's mailbox, for sending outside the lock
    pub(crate) fn connections(&self) -> Vec<Connection> {
        let mut out = Vec::with_capacity(self.players.len());
        self.for_each(|p| out.push(p.conn.clone()));
        out
    }

    /// Connected and departed players sorted by score descending; equal
    /// scores keep join order
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut rows: Vec<(PlayerId, String, u32)> =
            Vec::with_capacity(self.players.len() + self.departed.len());
        self.for_each(|p| rows.push((p.id, p.name.clone(), p.score)));
        rows.extend(self.departed.iter().map(|d| (d.id, d.name.clone(), d.score)));

        // ids are handed out in join order; sort_by is stable
        rows.sort_by_key(|row| row.0);
        rows.sort_by(|a, b| b.2.cmp(&a.2));

        rows.into_iter()
            .enumerate()
            .map(|(i, (_, name, score))| LeaderboardEntry {
                rank: i + 1,
                name,
                score,
            })
            .collect()
    }

    /// True when at least one player is registered and all of them answered
    pub fn everyone_answered(&self) -> bool {
        !self.players.is_empty() && self.players.keys().all(|id| self.answered.contains(id))
    }

    /// Ticket to reveal immediately, if the live question has nobody left to wait for
    pub(crate) fn reveal_due(&self) -> Option<QuestionTicket> {
        if self.mode == GameMode::Running && self.everyone_answered() {
            self.ticket()
        } else {
            None
        }
    }
}

impl AppState {
    /// Join (or rename) a connection as a player.
    ///
    /// The joiner gets `registered` first, then either the live question
    /// (late joiner) or a `waiting` notice. Both are queued under the lock so
    /// no later broadcast can overtake them. Everyone else gets `player_joined`.
    pub async fn register_player(
        self: &Arc<Self>,
        conn: &Connection,
        requested_name: Option<&str>,
    ) -> PlayerId {
        let (joined, name, total) = {
            let mut game = self.game.lock().await;
            let joined = game.register(conn, requested_name);

            let Some(player) = game.players.get(&conn.id) else {
                return conn.id;
            };
            let name = player.name.clone();

            player.deliver(ServerMessage::Registered {
                player_id: conn.id,
                name: name.clone(),
                message: format!("Welcome {}!", name),
            });

            let follow_up = match (game.mode, game.current) {
                (GameMode::Running, Some(index)) => {
                    self.question_message(index, game.started_at)
                }
                (GameMode::Reveal, _) => {
                    ServerMessage::waiting("Answers are being revealed, next question coming up")
                }
                (GameMode::Ended, _) => {
                    ServerMessage::waiting("Game over. Start a new game to play again")
                }
                _ => ServerMessage::waiting("Waiting for the game to start"),
            };
            player.deliver(follow_up);

            (joined, name, game.count())
        };

        if joined {
            self.broadcast(ServerMessage::PlayerJoined {
                name,
                total_players: total,
            })
            .await;
        }

        conn.id
    }

    /// Remove a connection's player, announce it, and reveal early if the
    /// departure leaves nobody unanswered. Returns the removed player.
    pub async fn unregister_player(self: &Arc<Self>, id: PlayerId) -> Option<Player> {
        let (player, total, reveal) = {
            let mut game = self.game.lock().await;
            let player = game.unregister(id)?;
            (player, game.count(), game.reveal_due())
        };

        self.broadcast(ServerMessage::PlayerLeft {
            name: player.name.clone(),
            total_players: total,
        })
        .await;

        if let Some(ticket) = reveal {
            tracing::info!("Remaining players have all answered, revealing early");
            self.trigger_reveal(ticket);
        }

        Some(player)
    }

    /// `question` message for the question at `index`. When `started_at` is
    /// given, `time_limit` is the time left rather than the full window.
    pub(crate) fn question_message(&self, index: usize, started_at: Option<Instant>) -> ServerMessage {
        let question = &self.questions[index];
        let time_limit = match started_at {
            Some(start) => {
                let elapsed = start.elapsed().as_secs_f64();
                let left = (f64::from(question.time_limit_secs) - elapsed).ceil();
                left.max(1.0) as u32
            }
            None => question.time_limit_secs,
        };

        ServerMessage::Question {
            question_id: question.id,
            question_number: index + 1,
            total_questions: self.questions.len(),
            question: question.prompt.clone(),
            options: question.options.clone(),
            time_limit,
        }
    }
}
