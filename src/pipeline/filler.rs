use std::time::Instant;

use crate::docx::extract::flatten_document_text;
use crate::docx::package::DocxPackage;
use crate::docx::patch::patch_document;
use crate::error::FillError;
use crate::llm::ChatModel;
use crate::pipeline::detector::detect_slots;
use crate::pipeline::resolver::resolve_slots;
use crate::pipeline::slots::replacement_set_from_changes;
use crate::pipeline::{FillMetadata, FillOptions, FillResult, Filler};
use crate::progress::{Emitter, ProgressEvent, ProgressObserver};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_DETECT_TOKENS: u32 = 2000;
pub const DEFAULT_RESOLVE_TOKENS: u32 = 4000;

/// In-process pipeline orchestrator: Extracting → Detecting → Resolving →
/// Patching → Complete, strictly sequential, one phase event per
/// transition. Performs no retries itself; retry budgets belong to the
/// collaborator calls. Shared configuration is read-only for the duration
/// of a call, so concurrent fills on one instance cannot interleave state.
pub struct LocalFiller {
    model: Box<dyn ChatModel + Send + Sync>,
    max_retries: u32,
    max_output_tokens: Option<u32>,
    on_progress: Option<Box<ProgressObserver>>,
}

impl LocalFiller {
    pub fn new(model: Box<dyn ChatModel + Send + Sync>) -> Self {
        Self {
            model,
            max_retries: DEFAULT_MAX_RETRIES,
            max_output_tokens: None,
            on_progress: None,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    /// Instance-wide default observer; a per-call `FillOptions::on_progress`
    /// takes precedence.
    pub fn with_progress(mut self, observer: Box<ProgressObserver>) -> Self {
        self.on_progress = Some(observer);
        self
    }

    fn run(&self, document: &[u8], prompt: &str, opts: &FillOptions) -> Result<FillResult, FillError> {
        let start = Instant::now();
        let observer = opts.on_progress.or(self.on_progress.as_deref());
        let emit = Emitter::new(observer);

        let max_retries = opts.max_retries.unwrap_or(self.max_retries);
        let detect_tokens = opts
            .max_output_tokens
            .or(self.max_output_tokens)
            .unwrap_or(DEFAULT_DETECT_TOKENS);
        let resolve_tokens = opts
            .max_output_tokens
            .or(self.max_output_tokens)
            .unwrap_or(DEFAULT_RESOLVE_TOKENS);

        // Extracting. Fails fast, before any model cost.
        emit.phase("Extracting document content...");
        let pkg = DocxPackage::read(document).map_err(FillError::MalformedPackage)?;
        let primary = pkg.primary_content().map_err(FillError::MalformedPackage)?;
        let plain_text = flatten_document_text(&primary.data).map_err(FillError::MalformedContent)?;

        // Detecting.
        emit.phase("Analyzing document structure and detecting placeholders...");
        let detection = detect_slots(self.model.as_ref(), &plain_text, detect_tokens, max_retries, &emit)?;
        emit.thought(format!("Detected {} placeholders", detection.slots.len()));

        // Resolving.
        emit.phase("Analyzing your instructions and filling fields...");
        let changes = resolve_slots(
            self.model.as_ref(),
            &detection.slots,
            &detection.document_summary,
            prompt,
            resolve_tokens,
            max_retries,
            &emit,
        )?;
        for change in &changes {
            let data = serde_json::json!({ "slot": change });
            emit.emit(ProgressEvent::slot_filled(format!("Filled: {}", change.id), data));
        }

        // Patching.
        emit.phase("Applying edits to document...");
        let replacements = replacement_set_from_changes(&changes, &emit);
        let buffer = patch_document(document, &replacements).map_err(FillError::PatchFailed)?;

        let filled = changes.iter().filter(|c| !c.is_skipped()).count();
        let metadata = FillMetadata {
            total_slots: changes.len(),
            filled_slots: filled,
            skipped_slots: changes.len() - filled,
            rag_queries: 0,
            processing_time_ms: start.elapsed().as_millis() as u64,
        };

        emit.emit(ProgressEvent::complete("Complete!"));

        Ok(FillResult {
            buffer,
            document_summary: detection.document_summary,
            changes,
            metadata,
        })
    }
}

impl Filler for LocalFiller {
    fn fill(&self, document: &[u8], prompt: &str, opts: &FillOptions) -> Result<FillResult, FillError> {
        let observer = opts.on_progress.or(self.on_progress.as_deref());
        self.run(document, prompt, opts).map_err(|err| {
            // Failed is terminal: surface the originating error, but let the
            // observer see it first.
            Emitter::new(observer).emit(ProgressEvent::error(err.to_string()));
            err
        })
    }
}
