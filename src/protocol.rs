//! Wire protocol: one JSON object per line, discriminated by `type`.

use crate::types::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

/// Longest line accepted from a peer, in bytes
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(alias = "register")]
    Join {
        #[serde(default, alias = "username")]
        name: Option<String>,
    },
    /// An answer for a question.
    ///
    /// Without `question_id` the answer counts for whichever question is live
    /// when it arrives, so one sent just before the next question opens is
    /// scored against that next question. Clients that want late answers
    /// rejected as stale must send the id.
    Answer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        question_id: Option<QuestionId>,
        /// Zero-based option index
        answer: usize,
    },
    StartGame,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Registered {
        player_id: PlayerId,
        name: String,
        message: String,
    },
    PlayerJoined {
        name: String,
        total_players: usize,
    },
    PlayerLeft {
        name: String,
        total_players: usize,
    },
    Waiting {
        message: String,
    },
    GameStarted {
        total_questions: usize,
    },
    /// Never carries the correct answer
    Question {
        question_id: QuestionId,
        /// 1-based
        question_number: usize,
        total_questions: usize,
        question: String,
        options: Vec<String>,
        time_limit: u32,
    },
    AnswerResult {
        correct: bool,
        points: u32,
        message: String,
    },
    AnswerReveal {
        question_id: QuestionId,
        correct_index: usize,
        correct_answer: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        explanation: Option<String>,
    },
    Leaderboard {
        leaderboard: Vec<LeaderboardEntry>,
    },
    GameOver {
        leaderboard: Vec<LeaderboardEntry>,
        message: String,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerMessage {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn waiting(message: impl Into<String>) -> Self {
        ServerMessage::Waiting {
            message: message.into(),
        }
    }
}

/// Errors that end a stream. Malformed JSON on an otherwise readable line is
/// not one of them; it is handed to the caller as an item.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line exceeds {MAX_LINE_LENGTH} bytes")]
    LineTooLong,

    #[error("failed to encode message: {0}")]
    Encode(serde_json::Error),
}

impl From<LinesCodecError> for CodecError {
    fn from(e: LinesCodecError) -> Self {
        match e {
            LinesCodecError::MaxLineLengthExceeded => CodecError::LineTooLong,
            LinesCodecError::Io(e) => CodecError::Io(e),
        }
    }
}

/// Newline-delimited JSON codec, decoding `In` and encoding `Out`.
///
/// Blank lines are skipped and a trailing `\r` is tolerated. Each decoded
/// item is itself a `Result` so that one bad line does not poison the stream.
#[derive(Debug)]
pub struct JsonLinesCodec<In, Out> {
    lines: LinesCodec,
    _marker: PhantomData<fn() -> (In, Out)>,
}

/// Server side of a connection
pub type ServerCodec = JsonLinesCodec<ClientMessage, ServerMessage>;
/// Client side of a connection (test clients, bots)
pub type ClientCodec = JsonLinesCodec<ServerMessage, ClientMessage>;

impl<In, Out> JsonLinesCodec<In, Out> {
    pub fn new() -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
            _marker: PhantomData,
        }
    }
}

impl<In, Out> Default for JsonLinesCodec<In, Out> {
    fn default() -> Self {
        Self::new()
    }
}

impl<In: DeserializeOwned, Out> Decoder for JsonLinesCodec<In, Out> {
    type Item = Result<In, serde_json::Error>;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.lines.decode(src)? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return Ok(Some(serde_json::from_str(&line))),
                None => return Ok(None),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.lines.decode_eof(src)? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return Ok(Some(serde_json::from_str(&line))),
                None => return Ok(None),
            }
        }
    }
}

impl<In, Out: Serialize> Encoder<Out> for JsonLinesCodec<In, Out> {
    type Error = CodecError;

    fn encode(&mut self, item: Out, dst: &mut BytesMut) -> Result<(), Self::Error> {
        // serde_json escapes embedded newlines, so this is exactly one line
        let json = serde_json::to_string(&item).map_err(CodecError::Encode)?;
        dst.reserve(json.len() + 1);
        dst.extend_from_slice(json.as_bytes());
        dst.extend_from_slice(b"\n");
        Ok(())
    }
}
