//! Error types for Schedcast

use thiserror::Error;

use crate::types::PostState;

pub type Result<T> = std::result::Result<T, SchedcastError>;

#[derive(Error, Debug)]
pub enum SchedcastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SchedcastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SchedcastError::InvalidInput(_) => 3,
            SchedcastError::Schedule(_) => 3,
            SchedcastError::Import(_) => 3,
            SchedcastError::Config(_) => 2,
            SchedcastError::Database(_) => 2,
            SchedcastError::Queue(_) => 1,
            SchedcastError::Adapter(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Failures of queue operations: enqueue, state transitions, cancellation.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Post not found: {0}")]
    NotFound(String),

    #[error("Duplicate content: a post with idempotency key {0} is already enqueued")]
    DuplicateContent(String),

    #[error("Stale transition on post {id}: expected state {expected}, found {actual}")]
    StaleTransition {
        id: String,
        expected: PostState,
        actual: PostState,
    },

    #[error("Post {id} is in terminal state {state} and cannot change")]
    TerminalState { id: String, state: PostState },

    #[error("Post {id} cannot be cancelled from state {state}")]
    InvalidCancellation { id: String, state: PostState },
}

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Unresolvable schedule expression: '{0}'")]
    Unresolvable(String),

    #[error("'today at {0}' has already passed")]
    AlreadyPassed(String),
}

#[derive(Error, Debug, Clone)]
pub enum AdapterError {
    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Adapter unavailable: {0}")]
    Unavailable(String),
}

/// Structural CSV problems that abort an import before any row is enqueued.
/// Per-row problems are reported, not raised.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Failed to read CSV: {0}")]
    Read(#[from] csv::Error),

    #[error("CSV is missing required column '{0}'")]
    MissingColumn(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = SchedcastError::InvalidInput("Empty content".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_schedule_error() {
        let error = SchedcastError::Schedule(ScheduleError::Unresolvable("next blue moon".into()));
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_config_error() {
        let config_error = ConfigError::MissingField("database.path".to_string());
        let error = SchedcastError::Config(config_error);
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_queue_error() {
        let error = SchedcastError::Queue(QueueError::NotFound("abc".to_string()));
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_adapter_error() {
        let error = SchedcastError::Adapter(AdapterError::Publish("browser crashed".into()));
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_stale_transition_formatting() {
        let error = QueueError::StaleTransition {
            id: "post-1".to_string(),
            expected: PostState::Due,
            actual: PostState::Posting,
        };
        let message = format!("{}", error);
        assert!(message.contains("post-1"));
        assert!(message.contains("due"));
        assert!(message.contains("posting"));
    }

    #[test]
    fn test_invalid_cancellation_formatting() {
        let error = QueueError::InvalidCancellation {
            id: "post-2".to_string(),
            state: PostState::Posted,
        };
        let message = format!("{}", error);
        assert!(message.contains("cannot be cancelled"));
        assert!(message.contains("posted"));
    }

    #[test]
    fn test_error_conversion_from_queue_error() {
        let queue_error = QueueError::NotFound("test".to_string());
        let error: SchedcastError = queue_error.into();

        match error {
            SchedcastError::Queue(_) => {}
            _ => panic!("Expected SchedcastError::Queue"),
        }
    }

    #[test]
    fn test_error_conversion_from_schedule_error() {
        let schedule_error = ScheduleError::AlreadyPassed("08:00".to_string());
        let error: SchedcastError = schedule_error.into();

        match error {
            SchedcastError::Schedule(_) => {}
            _ => panic!("Expected SchedcastError::Schedule"),
        }
    }

    #[test]
    fn test_adapter_error_clone() {
        let original = AdapterError::Unavailable("command not found".to_string());
        let cloned = original.clone();
        assert_eq!(format!("{}", original), format!("{}", cloned));
    }
}
