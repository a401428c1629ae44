use crate::book::ContainerKind;
use thiserror::Error;

/// Errors raised while turning a document into chapters. Always fatal to a run.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to parse {kind} document: {message}")]
    Parse { kind: ContainerKind, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from a single synthesis call. Recoverable under the skip policy.
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("Synthesis backend failed: {0}")]
    Backend(String),

    #[error("Synthesis timed out after {secs} seconds")]
    Timeout { secs: u64 },

    #[error("Synthesized audio could not be decoded: {0}")]
    InvalidAudio(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors while writing the finished track.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("WAV encoding failed: {0}")]
    Wav(#[from] hound::Error),

    #[error("Encoder failed: {0}")]
    Encoder(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors in configuration files or rule tables.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {table} rule: {message}")]
    InvalidRule { table: &'static str, message: String },

    #[error("Configuration directory could not be determined")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Errors that end a narration run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("No chapters found in document")]
    NoChapters,

    #[error("Invalid chapter range {start}-{end}: start must not exceed end")]
    InvalidRange { start: usize, end: usize },

    #[error("Chapter range {start}-{end} selects no chapters")]
    EmptySelection { start: usize, end: usize },

    #[error("Selected chapters contain no narratable text")]
    NoSegments,

    #[error("Synthesis of segment {segment_id} failed: {source}")]
    SynthesisAborted {
        segment_id: usize,
        #[source]
        source: SynthesisError,
    },

    #[error("Every segment failed to synthesize")]
    NoAudio,
}

pub type Result<T> = std::result::Result<T, PipelineError>;
