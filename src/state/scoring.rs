//! Answer scoring. Pure functions, no state.

use crate::types::Question;
use std::time::Duration;

/// Time bonus for an instant answer
pub const MAX_TIME_BONUS: u32 = 50;
/// Extra points for the first correct answer to a question
pub const FIRST_CORRECT_BONUS: u32 = 100;

/// Points for `answer` given `elapsed` since the question opened.
///
/// Wrong answers score 0. Correct answers score the base points plus
/// `floor((limit - elapsed) / limit * 50)` plus the first-correct bonus.
/// Elapsed time is clamped to the answer window, so the result is always
/// within `base ..= base + 150`.
pub fn score(question: &Question, answer: usize, elapsed: Duration, is_first_correct: bool) -> u32 {
    if !question.is_correct(answer) {
        return 0;
    }

    let first_bonus = if is_first_correct {
        FIRST_CORRECT_BONUS
    } else {
        0
    };

    question
        .points
        .saturating_add(time_bonus(question.time_limit_secs, elapsed))
        .saturating_add(first_bonus)
}

/// Speed component of the score, computed in whole milliseconds
pub fn time_bonus(time_limit_secs: u32, elapsed: Duration) -> u32 {
    let limit_ms = u64::from(time_limit_secs) * 1000;
    if limit_ms == 0 {
        return 0;
    }

    let elapsed_ms = elapsed.as_millis().min(u128::from(limit_ms)) as u64;
    let remaining_ms = limit_ms - elapsed_ms;

    (remaining_ms * u64::from(MAX_TIME_BONUS) / limit_ms) as u32
}
