use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReelError {
    #[error("Missing API key for {service}: {env_var} environment variable is not set")]
    MissingApiKey {
        service: &'static str,
        env_var: &'static str,
    },

    #[error("Script is empty")]
    EmptyScript,

    #[error("No segments found in script (every block needs a SEGMENT: line)")]
    NoSegments,

    #[error("Script has no caption or lyrics content")]
    NoCaptions,

    #[error("Invalid segment: {reason}")]
    InvalidSegment { reason: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Not enough clips: found {found}, need {needed}. Run fetch first")]
    NotEnoughClips { found: usize, needed: usize },

    #[error("Draft video not found: {path}. Run assemble first")]
    DraftMissing { path: PathBuf },

    #[error("No usable footage for query: {query}")]
    NoFootage { query: String },

    #[error("Cannot run {stage}: {required} has not completed")]
    MissingPrerequisite {
        stage: &'static str,
        required: &'static str,
    },

    #[error("{service} request failed: {reason}")]
    Api {
        service: &'static str,
        reason: String,
    },

    #[error("{tool} failed: {reason}")]
    MediaTool { tool: &'static str, reason: String },

    #[error("Malformed {evaluator} report: {reason}")]
    MalformedReport {
        evaluator: &'static str,
        reason: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("WAV error: {0}")]
    WavError(#[from] hound::Error),
}

pub type Result<T> = std::result::Result<T, ReelError>;
