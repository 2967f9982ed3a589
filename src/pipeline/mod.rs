pub mod detector;
pub mod filler;
pub mod resolver;
pub mod slots;

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::FillError;
use crate::progress::ProgressObserver;
use crate::pipeline::slots::SlotChange;

pub use filler::LocalFiller;

/// Run metadata assembled on success. `filled + skipped == total` always.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FillMetadata {
    pub total_slots: usize,
    pub filled_slots: usize,
    pub skipped_slots: usize,
    pub rag_queries: usize,
    pub processing_time_ms: u64,
}

/// Terminal artifact of one fill operation. Owned by the caller; the
/// pipeline holds no reference to it afterward.
#[derive(Clone, Debug)]
pub struct FillResult {
    /// The mutated document bytes.
    pub buffer: Vec<u8>,
    pub document_summary: String,
    /// One change per detected slot, in resolution order.
    pub changes: Vec<SlotChange>,
    pub metadata: FillMetadata,
}

impl FillResult {
    /// Convenience write-to-path helper; not part of the core contract.
    /// Creates missing parent directories, returns the absolute path written.
    pub fn save(&self, output_path: &Path) -> anyhow::Result<PathBuf> {
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create output dir: {}", parent.display()))?;
            }
        }
        std::fs::write(output_path, &self.buffer)
            .with_context(|| format!("write output: {}", output_path.display()))?;
        Ok(output_path
            .canonicalize()
            .unwrap_or_else(|_| output_path.to_path_buf()))
    }
}

/// Per-call knobs. `on_progress` overrides the filler's default observer;
/// retry/token overrides are propagated uniformly to both collaborator
/// calls.
#[derive(Clone, Copy, Default)]
pub struct FillOptions<'a> {
    pub max_retries: Option<u32>,
    pub max_output_tokens: Option<u32>,
    pub on_progress: Option<&'a ProgressObserver>,
}

/// One contract, two implementations: the in-process `LocalFiller` pipeline
/// and the network-backed `RemoteFiller`. Callers always receive either a
/// complete `FillResult` or a single typed failure, never a partial result.
pub trait Filler {
    fn fill(
        &self,
        document: &[u8],
        prompt: &str,
        opts: &FillOptions,
    ) -> Result<FillResult, FillError>;

    fn fill_path(
        &self,
        path: &Path,
        prompt: &str,
        opts: &FillOptions,
    ) -> Result<FillResult, FillError> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read document: {}", path.display()))
            .map_err(FillError::MalformedPackage)?;
        self.fill(&bytes, prompt, opts)
    }
}
