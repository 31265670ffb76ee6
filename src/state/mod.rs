mod game;
mod registry;
pub mod scoring;

pub use game::{AnswerOutcome, AnswerRejection, StartRejection};

use crate::config::GameConfig;
use crate::protocol::ServerMessage;
use crate::types::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Handle to one live connection, as seen by the game.
///
/// The session owns the socket; the game only ever pushes into `outbox`
/// (non-blocking) and cancels `closed` when it evicts the connection.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: PlayerId,
    pub outbox: mpsc::Sender<ServerMessage>,
    pub closed: CancellationToken,
}

impl Connection {
    pub fn new(id: PlayerId, capacity: usize) -> (Self, mpsc::Receiver<ServerMessage>) {
        let (outbox, rx) = mpsc::channel(capacity);
        let conn = Self {
            id,
            outbox,
            closed: CancellationToken::new(),
        };
        (conn, rx)
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    /// Answered the live question
    pub answered: bool,
    pub(crate) conn: Connection,
}

impl Player {
    /// Queue a message for this player without waiting. A closed or full
    /// mailbox closes the connection, so the session unregisters the player.
    fn deliver(&self, msg: ServerMessage) -> bool {
        match self.conn.outbox.try_send(msg) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Could not queue message for player {}, closing: {}", self.id, e);
                self.conn.closed.cancel();
                false
            }
        }
    }
}

/// Everything mutable about the quiz. One instance, one lock.
#[derive(Debug)]
pub struct GameState {
    pub game_id: GameId,
    /// Incremented by every `start_game`
    pub game_no: u64,
    pub mode: GameMode,
    /// Index of the live (or last) question; None before the first one
    pub current: Option<usize>,
    pub started_at: Option<Instant>,
    pub first_correct_awarded: bool,
    pub answered: HashSet<PlayerId>,
    /// Keyed by connection id, so iteration order is join order
    pub players: BTreeMap<PlayerId, Player>,
    /// Players who left during this game, with the score they had. Kept for
    /// the leaderboard until the next `start_game`.
    pub departed: Vec<Departed>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departed {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
}

impl GameState {
    fn new() -> Self {
        Self {
            game_id: ulid::Ulid::new().to_string(),
            game_no: 0,
            mode: GameMode::Waiting,
            current: None,
            started_at: None,
            first_correct_awarded: false,
            answered: HashSet::new(),
            players: BTreeMap::new(),
            departed: Vec::new(),
        }
    }

    /// Queue `msg` for every registered player while the lock is held
    pub(crate) fn send_all(&self, msg: &ServerMessage) {
        self.for_each(|p| {
            p.deliver(msg.clone());
        });
    }

    /// Ticket of the question timers may act on, if one is live or being revealed
    pub fn ticket(&self) -> Option<QuestionTicket> {
        match self.mode {
            GameMode::Running | GameMode::Reveal => self.current.map(|index| QuestionTicket {
                game_no: self.game_no,
                index,
            }),
            GameMode::Waiting | GameMode::Ended => None,
        }
    }
}

/// Read-only view for the status API and host console
#[derive(Debug, Clone, Serialize)]
pub struct GameSnapshot {
    pub game_id: GameId,
    pub mode: GameMode,
    /// 1-based; None before the first question
    pub question_number: Option<usize>,
    pub total_questions: usize,
    pub players: usize,
    pub answered: usize,
    pub first_correct_awarded: bool,
}

/// Shared application state
pub struct AppState {
    pub(crate) game: Mutex<GameState>,
    pub questions: Vec<Question>,
    pub config: GameConfig,
    /// Cancelled on shutdown; sessions, the accept loop and pending timers watch it
    pub shutdown: CancellationToken,
    next_connection_id: AtomicU64,
}

impl AppState {
    pub fn new(questions: Vec<Question>, config: GameConfig) -> Self {
        Self {
            game: Mutex::new(GameState::new()),
            questions,
            config,
            shutdown: CancellationToken::new(),
            next_connection_id: AtomicU64::new(1),
        }
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn next_connection_id(&self) -> PlayerId {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn snapshot(&self) -> GameSnapshot {
        let game = self.game.lock().await;
        GameSnapshot {
            game_id: game.game_id.clone(),
            mode: game.mode,
            question_number: game
                .current
                .map(|i| (i + 1).min(self.questions.len())),
            total_questions: self.questions.len(),
            players: game.count(),
            answered: game.answered.len(),
            first_correct_awarded: game.first_correct_awarded,
        }
    }

    pub async fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        self.game.lock().await.leaderboard()
    }

    /// Score of a registered player
    pub async fn player_score(&self, id: PlayerId) -> Option<u32> {
        self.game.lock().await.players.get(&id).map(|p| p.score)
    }

    pub fn shutdown(&self) {
        tracing::info!("Shutting down game coordinator");
        self.shutdown.cancel();
    }
}
