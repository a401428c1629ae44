//! audiobook-narrator - turn EPUB and PDF documents into a single narrated track.
//!
//! The run is a straight line: [`extract`] a book, split it into [`text::Segment`]s
//! with a [`text::SegmentClassifier`], synthesize each segment through a
//! [`tts::SpeechSynthesizer`] and join the clips with an [`audio::AudioAssembler`].

pub mod audio;
pub mod book;
pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod text;
pub mod tts;

pub use book::{BookData, Chapter, ContainerKind};
pub use config::NarratorConfig;
pub use error::{ConfigError, ExportError, ExtractError, PipelineError, Result, SynthesisError};
pub use pipeline::{Narration, RunConfig, narrate};
