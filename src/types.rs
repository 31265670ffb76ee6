use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type GameId = String;
/// Connection handle; doubles as the player's identity once joined
pub type PlayerId = u64;
pub type QuestionId = u32;

/// Default base points for a question that does not specify any
pub const DEFAULT_POINTS: u32 = 100;
/// Default answer window in seconds
pub const DEFAULT_TIME_LIMIT_SECS: u32 = 10;
/// Display names are cut to this many characters
pub const MAX_NAME_CHARS: usize = 32;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameMode {
    /// No active question; accepting joins
    Waiting,
    /// A question is live; accepting answers
    Running,
    /// Answer window closed; reveal and leaderboard are out, next question pending
    Reveal,
    /// Questions exhausted
    Ended,
}

/// A loaded quiz question. Immutable once the server is running.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: QuestionId,
    pub prompt: String,
    pub options: Vec<String>,
    /// Zero-based index into `options`
    pub correct_index: usize,
    pub points: u32,
    pub time_limit_secs: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Question {
    pub fn is_correct(&self, answer: usize) -> bool {
        answer == self.correct_index
    }

    /// Text of the correct option
    pub fn correct_answer(&self) -> &str {
        self.options
            .get(self.correct_index)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardEntry {
    /// 1-based position in the snapshot
    pub rank: usize,
    pub name: String,
    pub score: u32,
}

/// Identifies one question of one game. Deferred timers carry the ticket they
/// were scheduled for and act only if it is still the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionTicket {
    pub game_no: u64,
    pub index: usize,
}
