//! Question set loading and validation.
//!
//! The file is a JSON array. Either spelling of each field is accepted:
//! `question`/`prompt`, `options`/`choices`, `answer`/`correct_index`,
//! `time_limit`/`time`.

use crate::types::{Question, QuestionId, DEFAULT_POINTS, DEFAULT_TIME_LIMIT_SECS};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum QuestionError {
    #[error("failed to read question file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed question file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("question set is empty")]
    Empty,

    #[error("question #{position}: {reason}")]
    Invalid { position: usize, reason: String },
}

#[derive(Debug, Deserialize)]
struct QuestionRecord {
    #[serde(default)]
    id: Option<QuestionId>,
    #[serde(alias = "prompt")]
    question: String,
    #[serde(alias = "choices")]
    options: Vec<String>,
    #[serde(alias = "correct_index")]
    answer: usize,
    #[serde(default = "default_points")]
    points: u32,
    #[serde(default = "default_time_limit", alias = "time")]
    time_limit: u32,
    #[serde(default)]
    explanation: Option<String>,
}

fn default_points() -> u32 {
    DEFAULT_POINTS
}

fn default_time_limit() -> u32 {
    DEFAULT_TIME_LIMIT_SECS
}

/// Read and validate a question set from disk
pub fn load_questions(path: &Path) -> Result<Vec<Question>, QuestionError> {
    let raw = std::fs::read_to_string(path).map_err(|source| QuestionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let questions = parse_questions(&raw)?;
    tracing::info!(
        "Loaded {} questions from {}",
        questions.len(),
        path.display()
    );
    Ok(questions)
}

/// Parse and validate a question set from its JSON text
pub fn parse_questions(raw: &str) -> Result<Vec<Question>, QuestionError> {
    let records: Vec<QuestionRecord> = serde_json::from_str(raw)?;
    if records.is_empty() {
        return Err(QuestionError::Empty);
    }

    let mut seen_ids = HashSet::new();
    let mut questions = Vec::with_capacity(records.len());

    for (i, record) in records.into_iter().enumerate() {
        let position = i + 1;
        let invalid = |reason: String| QuestionError::Invalid { position, reason };

        let prompt = record.question.trim().to_string();
        if prompt.is_empty() {
            return Err(invalid("prompt is empty".to_string()));
        }
        if record.options.len() < 2 {
            return Err(invalid(format!(
                "needs at least 2 options, has {}",
                record.options.len()
            )));
        }
        if record.answer >= record.options.len() {
            return Err(invalid(format!(
                "answer index {} out of range for {} options",
                record.answer,
                record.options.len()
            )));
        }
        if record.time_limit == 0 {
            return Err(invalid("time limit must be at least 1 second".to_string()));
        }

        let id = record.id.unwrap_or(position as QuestionId);
        if !seen_ids.insert(id) {
            return Err(invalid(format!("duplicate id {}", id)));
        }

        questions.push(Question {
            id,
            prompt,
            options: record.options,
            correct_index: record.answer,
            points: record.points,
            time_limit_secs: record.time_limit,
            explanation: record.explanation.filter(|e| !e.trim().is_empty()),
        });
    }

    Ok(questions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_with_defaults_and_ordinal_ids() {
        let questions = parse_questions(
            r#"[
                {"question": "Capital of France?", "options": ["Berlin", "Paris"], "answer": 1},
                {"prompt": "2 + 2?", "choices": ["3", "4", "5"], "correct_index": 1,
                 "points": 200, "time": 20, "explanation": "Basic arithmetic"}
            ]"#,
        )
        .unwrap();

        assert_eq!(questions.len(), 2);

        assert_eq!(questions[0].id, 1);
        assert_eq!(questions[0].points, DEFAULT_POINTS);
        assert_eq!(questions[0].time_limit_secs, DEFAULT_TIME_LIMIT_SECS);
        assert_eq!(questions[0].correct_answer(), "Paris");
        assert!(questions[0].explanation.is_none());

        assert_eq!(questions[1].id, 2);
        assert_eq!(questions[1].points, 200);
        assert_eq!(questions[1].time_limit_secs, 20);
        assert_eq!(questions[1].explanation.as_deref(), Some("Basic arithmetic"));
    }

    #[test]
    fn test_explicit_ids_kept() {
        let questions = parse_questions(
            r#"[{"id": 42, "question": "Q", "options": ["a", "b"], "answer": 0}]"#,
        )
        .unwrap();
        assert_eq!(questions[0].id, 42);
    }

    #[test]
    fn test_validation_failures() {
        let cases = [
            (r#"[]"#, "empty"),
            (r#"[{"question": "  ", "options": ["a", "b"], "answer": 0}]"#, "prompt"),
            (r#"[{"question": "Q", "options": ["a"], "answer": 0}]"#, "at least 2"),
            (r#"[{"question": "Q", "options": ["a", "b"], "answer": 2}]"#, "out of range"),
            (r#"[{"question": "Q", "options": ["a", "b"], "answer": 0, "time": 0}]"#, "time limit"),
            (
                r#"[{"id": 1, "question": "Q", "options": ["a", "b"], "answer": 0},
                    {"id": 1, "question": "R", "options": ["a", "b"], "answer": 1}]"#,
                "duplicate",
            ),
        ];

        for (raw, expected) in cases {
            let err = parse_questions(raw).unwrap_err().to_string();
            assert!(err.contains(expected), "{:?} should mention {:?}", err, expected);
        }
    }

    #[test]
    fn test_malformed_json() {
        let result = parse_questions("{ not an array");
        assert!(matches!(result, Err(QuestionError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"question": "Q", "options": ["yes", "no"], "answer": 0}}]"#
        )
        .unwrap();

        let questions = load_questions(file.path()).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].correct_answer(), "yes");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_questions(&dir.path().join("nope.json"));
        assert!(matches!(result, Err(QuestionError::Io { .. })));
    }
}
