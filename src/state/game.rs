//! The per-question state machine: WAITING -> RUNNING -> REVEAL -> ... -> ENDED

use super::scoring;
use super::{AppState, GameState};
use crate::protocol::ServerMessage;
use crate::types::*;
use std::sync::Arc;
use tokio::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartRejection {
    #[error("A game is already in progress")]
    InProgress,
}

/// Why an answer was not counted. None of these are fatal to the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnswerRejection {
    #[error("Join the game before answering")]
    NotRegistered,

    #[error("No question is open for answers")]
    NotAccepting,

    #[error("Answer for question {submitted} is too late, question {current} is live")]
    Stale {
        submitted: QuestionId,
        current: QuestionId,
    },

    #[error("You already answered this question")]
    AlreadyAnswered,
}

/// What an accepted answer earned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub points: u32,
    pub first_correct: bool,
    /// This answer completed the question for every registered player
    pub everyone_answered: bool,
    pub ticket: QuestionTicket,
}

/// Result of moving to the next question, to be published outside the lock
#[derive(Debug)]
enum Advance {
    Question {
        ticket: QuestionTicket,
        message: ServerMessage,
        deadline: Instant,
    },
    Finished {
        leaderboard: Vec<LeaderboardEntry>,
    },
}

impl GameState {
    /// Zero every score and flag for a fresh run
    fn reset_for_new_game(&mut self) {
        self.game_no += 1;
        self.mode = GameMode::Waiting;
        self.current = None;
        self.started_at = None;
        self.first_correct_awarded = false;
        self.answered.clear();
        self.departed.clear();
        for player in self.players.values_mut() {
            player.score = 0;
            player.answered = false;
        }
    }

    fn advance(&mut self, state: &AppState) -> Advance {
        let next = self.current.map_or(0, |i| i + 1);

        self.current = Some(next);
        self.first_correct_awarded = false;
        self.answered.clear();
        for player in self.players.values_mut() {
            player.answered = false;
        }

        let Some(question) = state.questions.get(next) else {
            self.mode = GameMode::Ended;
            self.started_at = None;
            return Advance::Finished {
                leaderboard: self.leaderboard(),
            };
        };

        let now = Instant::now();
        self.mode = GameMode::Running;
        self.started_at = Some(now);

        Advance::Question {
            ticket: QuestionTicket {
                game_no: self.game_no,
                index: next,
            },
            message: state.question_message(next, None),
            deadline: now + Duration::from_secs(u64::from(question.time_limit_secs)),
        }
    }

    /// Record one answer. Everything that decides points happens here, under
    /// the lock, so concurrent submissions are strictly ordered.
    fn record_answer(
        &mut self,
        questions: &[Question],
        player_id: PlayerId,
        question_id: Option<QuestionId>,
        answer: usize,
    ) -> Result<AnswerOutcome, AnswerRejection> {
        if !self.players.contains_key(&player_id) {
            return Err(AnswerRejection::NotRegistered);
        }
        if self.mode != GameMode::Running {
            return Err(AnswerRejection::NotAccepting);
        }
        let live = self.current.and_then(|i| questions.get(i));
        let (Some(ticket), Some(question)) = (self.ticket(), live) else {
            return Err(AnswerRejection::NotAccepting);
        };
        if let Some(submitted) = question_id {
            if submitted != question.id {
                return Err(AnswerRejection::Stale {
                    submitted,
                    current: question.id,
                });
            }
        }
        if !self.answered.insert(player_id) {
            return Err(AnswerRejection::AlreadyAnswered);
        }

        let elapsed = self
            .started_at
            .map(|start| start.elapsed())
            .unwrap_or_default();
        let correct = question.is_correct(answer);
        let first_correct = correct && !self.first_correct_awarded;
        if first_correct {
            self.first_correct_awarded = true;
        }
        let points = scoring::score(question, answer, elapsed, first_correct);

        if let Some(player) = self.players.get_mut(&player_id) {
            player.answered = true;
            player.score = player.score.saturating_add(points);

            tracing::info!(
                "Player '{}' answered question {} ({}) in {:.2}s: +{} points",
                player.name,
                question.id,
                if correct { "correct" } else { "wrong" },
                elapsed.as_secs_f64(),
                points
            );

            let message = match (correct, first_correct) {
                (true, true) => format!("Correct, and first! +{} points", points),
                (true, false) => format!("Correct! +{} points", points),
                (false, _) => "Wrong answer".to_string(),
            };
            player.deliver(ServerMessage::AnswerResult {
                correct,
                points,
                message,
            });
        }

        Ok(AnswerOutcome {
            correct,
            points,
            first_correct,
            everyone_answered: self.everyone_answered(),
            ticket,
        })
    }
}

impl AppState {
    /// Start a new game from WAITING or ENDED: reset all scores, announce the
    /// game and open the first question.
    ///
    /// `game_started` and the first question are queued under the same lock
    /// that opens the question, so a player joining concurrently sees either
    /// both (already registered) or only the live question (late joiner).
    pub async fn start_game(self: &Arc<Self>) -> Result<(), StartRejection> {
        let step = {
            let mut game = self.game.lock().await;
            if matches!(game.mode, GameMode::Running | GameMode::Reveal) {
                return Err(StartRejection::InProgress);
            }
            game.reset_for_new_game();
            tracing::info!(
                "Starting game #{} with {} players and {} questions",
                game.game_no,
                game.count(),
                self.questions.len()
            );
            let step = game.advance(self);

            game.send_all(&ServerMessage::GameStarted {
                total_questions: self.questions.len(),
            });
            if let Advance::Question { message, .. } = &step {
                game.send_all(message);
            }
            step
        };

        match step {
            Advance::Question {
                ticket, deadline, ..
            } => self.schedule_reveal(ticket, deadline),
            finished => self.publish(finished).await,
        }
        Ok(())
    }

    /// Move from the revealed question `ticket` to the next one, or end the
    /// game. No-op if `ticket` is no longer the revealed question.
    pub async fn advance_question(self: &Arc<Self>, ticket: QuestionTicket) {
        let step = {
            let mut game = self.game.lock().await;
            if game.mode != GameMode::Reveal || game.ticket() != Some(ticket) {
                tracing::debug!("Ignoring stale advance for {:?}", ticket);
                return;
            }
            game.advance(self)
        };

        self.publish(step).await;
    }

    /// Submit `answer` for `player_id`. The player's `answer_result` is queued
    /// before this returns. If everyone has now answered, the reveal is
    /// scheduled right away.
    pub async fn submit_answer(
        self: &Arc<Self>,
        player_id: PlayerId,
        question_id: Option<QuestionId>,
        answer: usize,
    ) -> Result<AnswerOutcome, AnswerRejection> {
        let outcome = {
            let mut game = self.game.lock().await;
            game.record_answer(&self.questions, player_id, question_id, answer)?
        };

        if outcome.everyone_answered {
            tracing::info!("Everyone answered, revealing early");
            self.trigger_reveal(outcome.ticket);
        }

        Ok(outcome)
    }

    /// Close question `ticket`: announce the answer and leaderboard, then
    /// schedule the next question. No-op if `ticket` is no longer live.
    pub async fn reveal(self: &Arc<Self>, ticket: QuestionTicket) {
        let (question, leaderboard) = {
            let mut game = self.game.lock().await;
            if game.mode != GameMode::Running || game.ticket() != Some(ticket) {
                tracing::debug!("Ignoring stale reveal for {:?}", ticket);
                return;
            }
            game.mode = GameMode::Reveal;
            let Some(question) = self.questions.get(ticket.index) else {
                return;
            };
            tracing::info!(
                "Revealing question {}: {} of {} players answered",
                question.id,
                game.answered.len(),
                game.count()
            );
            (question, game.leaderboard())
        };

        self.broadcast(ServerMessage::AnswerReveal {
            question_id: question.id,
            correct_index: question.correct_index,
            correct_answer: question.correct_answer().to_string(),
            explanation: question.explanation.clone(),
        })
        .await;
        self.broadcast(ServerMessage::Leaderboard { leaderboard }).await;

        self.schedule_advance(ticket, self.config.reveal_delay);
    }

    async fn publish(self: &Arc<Self>, step: Advance) {
        match step {
            Advance::Question {
                ticket,
                message,
                deadline,
            } => {
                self.broadcast(message).await;
                self.schedule_reveal(ticket, deadline);
            }
            Advance::Finished { leaderboard } => {
                tracing::info!("Game over");
                self.broadcast(ServerMessage::Leaderboard {
                    leaderboard: leaderboard.clone(),
                })
                .await;
                self.broadcast(ServerMessage::GameOver {
                    leaderboard,
                    message: "Game over! Thanks for playing.".to_string(),
                })
                .await;
            }
        }
    }
}
