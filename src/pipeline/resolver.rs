use anyhow::Context;
use serde::Deserialize;

use crate::error::FillError;
use crate::llm::prompts::{describe_slots, render_template, RESOLVE_SLOTS};
use crate::llm::ChatModel;
use crate::pipeline::slots::{AnalyzedSlot, ChangeSource, SlotChange};
use crate::progress::Emitter;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolutionResponse {
    #[serde(default)]
    filled_slots: Vec<serde_json::Value>,
}

/// One collaborator call resolving every detected slot against the user's
/// instructions. The contract is a bijection: exactly one change per input
/// slot id, in input order. A missing id is a protocol violation
/// (`ResolutionIncomplete`), never silently dropped.
pub fn resolve_slots(
    model: &dyn ChatModel,
    slots: &[AnalyzedSlot],
    document_summary: &str,
    user_prompt: &str,
    max_tokens: u32,
    max_retries: u32,
    emit: &Emitter,
) -> Result<Vec<SlotChange>, FillError> {
    if slots.is_empty() {
        return Ok(Vec::new());
    }

    let system_prompt = render_template(
        RESOLVE_SLOTS,
        &[
            ("document_summary", document_summary),
            ("slots_description", &describe_slots(slots)),
        ],
    );
    let user_content = format!("User's instructions: {user_prompt}");

    let raw = model
        .chat_json(&system_prompt, &user_content, max_tokens, max_retries)
        .map_err(FillError::ResolutionFailed)?;

    let response: ResolutionResponse = serde_json::from_str(&raw)
        .context("parse resolution response")
        .map_err(FillError::ResolutionFailed)?;

    let mut resolved: Vec<SlotChange> = Vec::new();
    for (idx, entry) in response.filled_slots.into_iter().enumerate() {
        match serde_json::from_value::<SlotChange>(entry) {
            Ok(change) => resolved.push(change),
            Err(err) => {
                emit.thought(format!(
                    "Warning: dropping malformed resolution entry {idx}: {err}"
                ));
            }
        }
    }

    // Reassemble in input-slot order, enforcing the per-slot invariants.
    let mut changes: Vec<SlotChange> = Vec::with_capacity(slots.len());
    let mut missing: Vec<String> = Vec::new();
    for slot in slots {
        let found: Vec<&SlotChange> = resolved.iter().filter(|c| c.id == slot.id).collect();
        let Some(first) = found.first() else {
            missing.push(slot.id.clone());
            continue;
        };
        if found.len() > 1 {
            emit.thought(format!(
                "Warning: resolver returned {} entries for {}; keeping the first",
                found.len(),
                slot.id
            ));
        }
        let mut change = (*first).clone();
        if change.original_text != slot.original_text {
            emit.thought(format!(
                "Warning: resolver rewrote placeholder text for {}; keeping the detected text",
                slot.id
            ));
            change.original_text = slot.original_text.clone();
        }
        // Skipped is a no-op by convention.
        if change.source == ChangeSource::Skipped {
            change.filled_value = change.original_text.clone();
        }
        changes.push(change);
    }

    let known: Vec<&str> = slots.iter().map(|s| s.id.as_str()).collect();
    for change in &resolved {
        if !known.contains(&change.id.as_str()) {
            emit.thought(format!(
                "Warning: resolver invented unknown slot id {}; ignoring",
                change.id
            ));
        }
    }

    if !missing.is_empty() {
        return Err(FillError::ResolutionIncomplete { missing });
    }
    Ok(changes)
}
