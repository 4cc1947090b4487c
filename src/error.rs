use thiserror::Error;

use crate::dataset::{OptionId, QuestionId};

/// Errors surfaced by storage backends.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage quota exceeded ({used} of {quota} bytes)")]
    QuotaExceeded { used: usize, quota: usize },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading or validating a question dataset.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DatasetError {
    #[error("dataset file not found: {0}")]
    NotFound(String),

    #[error("unable to parse dataset: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("duplicate question id: {0}")]
    DuplicateQuestion(QuestionId),

    #[error("question {id} has no answer options")]
    MissingOptions { id: QuestionId },

    #[error("question {id} has duplicate option id {option}")]
    DuplicateOption { id: QuestionId, option: OptionId },

    #[error("question {id} has no option marked correct")]
    NoCorrectOption { id: QuestionId },

    #[error("question {id} is missing correctAnswer")]
    MissingCorrectAnswer { id: QuestionId },
}

/// Rejected mutations on an in-memory session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("the dataset has no questions")]
    EmptyDataset,

    #[error("session has no current question in this dataset")]
    NoCurrentQuestion,

    #[error("session is already finished")]
    AlreadyFinished,

    #[error("answer does not match the quiz variant")]
    AnswerKindMismatch,

    #[error("option {option} does not belong to question {question}")]
    UnknownOption {
        question: QuestionId,
        option: OptionId,
    },
}
