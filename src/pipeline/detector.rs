use anyhow::Context;
use serde::Deserialize;

use crate::error::FillError;
use crate::llm::prompts::DETECT_SLOTS;
use crate::llm::ChatModel;
use crate::pipeline::slots::AnalyzedSlot;
use crate::progress::Emitter;

#[derive(Debug)]
pub struct Detection {
    pub document_summary: String,
    pub slots: Vec<AnalyzedSlot>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectionResponse {
    #[serde(default)]
    document_summary: Option<String>,
    #[serde(default)]
    slots: Vec<serde_json::Value>,
}

/// One collaborator call over the flattened text. Partial detection is
/// acceptable: entries that fail slot validation are dropped with a warning
/// event. Total failure (call error, or a response that is not the expected
/// JSON shape at all) is not.
pub fn detect_slots(
    model: &dyn ChatModel,
    plain_text: &str,
    max_tokens: u32,
    max_retries: u32,
    emit: &Emitter,
) -> Result<Detection, FillError> {
    let raw = model
        .chat_json(DETECT_SLOTS, plain_text, max_tokens, max_retries)
        .map_err(FillError::DetectionFailed)?;

    let response: DetectionResponse = serde_json::from_str(&raw)
        .context("parse detection response")
        .map_err(FillError::DetectionFailed)?;

    let mut slots: Vec<AnalyzedSlot> = Vec::new();
    for (idx, entry) in response.slots.into_iter().enumerate() {
        match serde_json::from_value::<AnalyzedSlot>(entry) {
            Ok(slot) if slot.is_fillable() => slots.push(slot),
            Ok(slot) => {
                emit.thought(format!(
                    "Warning: dropping slot {} with blank placeholder text",
                    slot.id
                ));
            }
            Err(err) => {
                emit.thought(format!("Warning: dropping malformed slot entry {idx}: {err}"));
            }
        }
    }

    Ok(Detection {
        document_summary: response
            .document_summary
            .unwrap_or_else(|| "Document template".to_string()),
        slots,
    })
}
