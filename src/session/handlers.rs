//! Client message dispatch
//!
//! Maps each inbound message onto the registry or the game state machine and
//! turns rejections into protocol replies.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{AnswerRejection, AppState, Connection, StartRejection};
use std::sync::Arc;

pub const NOT_REGISTERED: &str = "NOT_REGISTERED";
pub const GAME_IN_PROGRESS: &str = "GAME_IN_PROGRESS";

/// Handle one client message and return an optional direct reply.
///
/// Replies that must be ordered against broadcasts (registration ack,
/// answer result) are queued by the state itself, so they are not returned.
pub async fn handle_message(
    msg: ClientMessage,
    conn: &Connection,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Join { name } => {
            state.register_player(conn, name.as_deref()).await;
            None
        }

        ClientMessage::Answer {
            question_id,
            answer,
        } => handle_answer(state, conn, question_id, answer).await,

        ClientMessage::StartGame => handle_start_game(state, conn).await,
    }
}

async fn handle_answer(
    state: &Arc<AppState>,
    conn: &Connection,
    question_id: Option<crate::types::QuestionId>,
    answer: usize,
) -> Option<ServerMessage> {
    match state.submit_answer(conn.id, question_id, answer).await {
        Ok(_) => None,
        Err(AnswerRejection::NotRegistered) => Some(ServerMessage::error(
            NOT_REGISTERED,
            AnswerRejection::NotRegistered.to_string(),
        )),
        Err(rejection) => {
            tracing::debug!("Answer from connection {} rejected: {}", conn.id, rejection);
            Some(ServerMessage::AnswerResult {
                correct: false,
                points: 0,
                message: rejection.to_string(),
            })
        }
    }
}

async fn handle_start_game(state: &Arc<AppState>, conn: &Connection) -> Option<ServerMessage> {
    if state.player_score(conn.id).await.is_none() {
        return Some(ServerMessage::error(
            NOT_REGISTERED,
            "Join the game before starting it",
        ));
    }

    match state.start_game().await {
        Ok(()) => {
            tracing::info!("Game started by connection {}", conn.id);
            None
        }
        Err(e @ StartRejection::InProgress) => {
            Some(ServerMessage::error(GAME_IN_PROGRESS, e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::*;

    #[tokio::test]
    async fn test_answer_before_join_is_not_registered() {
        let state = state_with(vec![question(1, 100, 10)]);
        let (conn, _rx) = Connection::new(1, 16);

        let reply = handle_message(
            ClientMessage::Answer {
                question_id: None,
                answer: 0,
            },
            &conn,
            &state,
        )
        .await;

        match reply {
            Some(ServerMessage::Error { code, .. }) => assert_eq!(code, NOT_REGISTERED),
            other => panic!("Expected Error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_start_game_requires_join() {
        let state = state_with(vec![question(1, 100, 10)]);
        let (conn, _rx) = Connection::new(1, 16);

        let reply = handle_message(ClientMessage::StartGame, &conn, &state).await;

        assert!(matches!(reply, Some(ServerMessage::Error { .. })));
        assert_eq!(state.snapshot().await.question_number, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_reports_game_in_progress() {
        let state = state_with(vec![question(1, 100, 10)]);
        let (conn, _rx) = Connection::new(1, 64);
        handle_message(
            ClientMessage::Join {
                name: Some("Host".to_string()),
            },
            &conn,
            &state,
        )
        .await;

        assert_eq!(handle_message(ClientMessage::StartGame, &conn, &state).await, None);
        match handle_message(ClientMessage::StartGame, &conn, &state).await {
            Some(ServerMessage::Error { code, .. }) => assert_eq!(code, GAME_IN_PROGRESS),
            other => panic!("Expected Error, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_answer_gets_rejection_result() {
        let state = state_with(vec![question(1, 100, 10)]);
        let (a, mut a_rx) = Connection::new(1, 64);
        let (b, _b_rx) = Connection::new(2, 64);
        for (conn, name) in [(&a, "A"), (&b, "B")] {
            handle_message(
                ClientMessage::Join {
                    name: Some(name.to_string()),
                },
                conn,
                &state,
            )
            .await;
        }
        handle_message(ClientMessage::StartGame, &a, &state).await;

        let answer = ClientMessage::Answer {
            question_id: Some(1),
            answer: 0,
        };
        assert_eq!(handle_message(answer.clone(), &a, &state).await, None);
        let accepted = drain(&mut a_rx)
            .into_iter()
            .filter(|m| matches!(m, ServerMessage::AnswerResult { correct: true, .. }))
            .count();
        assert_eq!(accepted, 1);

        match handle_message(answer, &a, &state).await {
            Some(ServerMessage::AnswerResult { correct, points, .. }) => {
                assert!(!correct);
                assert_eq!(points, 0);
            }
            other => panic!("Expected AnswerResult, got {:?}", other),
        }
        assert_eq!(state.player_score(1).await, Some(250));
    }
}
