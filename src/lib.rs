//! AI-powered DOCX template filler.
//!
//! Detects fillable placeholders in a document template, resolves them from
//! natural-language instructions via a chat model, and rewrites the original
//! package with formatting intact. Two delivery modes share one `Filler`
//! contract: [`LocalFiller`] runs the pipeline in-process against an
//! OpenAI-compatible API; [`RemoteFiller`] delegates to a deployed docfill
//! server and decodes its progress stream.

pub mod config;
pub mod docx;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod progress;
pub mod remote;

pub use error::FillError;
pub use llm::{ChatModel, OpenAiChatModel};
pub use pipeline::slots::{AnalyzedSlot, ChangeSource, SlotChange};
pub use pipeline::{FillMetadata, FillOptions, FillResult, Filler, LocalFiller};
pub use progress::{ConsoleProgress, ProgressEvent, ProgressKind, ProgressObserver};
pub use remote::RemoteFiller;
