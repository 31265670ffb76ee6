//! Server configuration from environment variables

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Path to the question set (JSON)
    pub questions_path: PathBuf,
    /// Port for the read-only HTTP status API (None = disabled)
    pub http_port: Option<u16>,
    pub game: GameConfig,
    /// Read host commands (`start`, `status`, `quit`) from stdin
    pub console: bool,
}

/// Knobs of the game coordinator itself
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Pause between the answer reveal and the next question
    pub reveal_delay: Duration,
    /// Messages buffered per connection before the client counts as unreachable
    pub outbox_capacity: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            reveal_delay: Duration::from_millis(3000),
            outbox_capacity: 64,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8888,
            questions_path: PathBuf::from("questions/sample_questions.json"),
            http_port: None,
            game: GameConfig::default(),
            console: true,
        }
    }
}

impl Config {
    /// Load config from environment variables, falling back to defaults for unset ones
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = env_string("QUIZ_HOST").unwrap_or(defaults.host);
        let port = env_parse("QUIZ_PORT")?.unwrap_or(defaults.port);
        let questions_path = env_string("QUIZ_QUESTIONS")
            .map(PathBuf::from)
            .unwrap_or(defaults.questions_path);
        let http_port = env_parse("QUIZ_HTTP_PORT")?;

        let reveal_delay = env_parse::<u64>("QUIZ_REVEAL_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.game.reveal_delay);

        let outbox_capacity = match env_parse::<usize>("QUIZ_OUTBOX_CAPACITY")? {
            Some(0) => {
                return Err(ConfigError::Invalid {
                    var: "QUIZ_OUTBOX_CAPACITY",
                    value: "0".to_string(),
                })
            }
            Some(n) => n,
            None => defaults.game.outbox_capacity,
        };

        let console = std::env::var("QUIZ_CONSOLE")
            .map(|v| v != "0" && v.to_lowercase() != "false")
            .unwrap_or(defaults.console);

        Ok(Self {
            host,
            port,
            questions_path,
            http_port,
            game: GameConfig {
                reveal_delay,
                outbox_capacity,
            },
            console,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_string(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env_string(var) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
        None => Ok(None),
    }
}
