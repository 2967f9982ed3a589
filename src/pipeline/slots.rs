use serde::{Deserialize, Serialize};

use crate::docx::patch::{Replacement, ReplacementSet};
use crate::progress::Emitter;

/// Candidate placeholder detected in the flattened text view. Field names
/// follow the collaborator wire shape (`originalText`, ...).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedSlot {
    pub id: String,
    /// Exact literal substring to later locate and replace. The patcher
    /// depends on this appearing verbatim in the raw document content.
    pub original_text: String,
    /// Surrounding sentence, display/debugging only.
    pub context: String,
    pub suggested_type: String,
    pub suggested_label: String,
    #[serde(default)]
    pub suggested_query: Option<String>,
}

impl AnalyzedSlot {
    /// A placeholder with no distinguishing text cannot be safely located.
    pub fn is_fillable(&self) -> bool {
        !self.original_text.trim().is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    UserPrompt,
    Rag,
    Skipped,
    #[default]
    #[serde(other)]
    Generated,
}

/// Resolved outcome for one detected slot. Exactly one per slot id.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotChange {
    pub id: String,
    pub original_text: String,
    pub filled_value: String,
    #[serde(default)]
    pub source: ChangeSource,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

fn default_confidence() -> f32 {
    0.5
}

impl SlotChange {
    pub fn is_skipped(&self) -> bool {
        self.source == ChangeSource::Skipped
    }
}

/// Derive the replacement set from resolved changes: skipped and no-op
/// entries are excluded, keys are unique, and each key carries an occurrence
/// budget equal to the number of changes that share it. Two changes sharing
/// `original_text` with differing values collide (only one replacement can
/// be applied per key); the first value wins and a warning is emitted.
pub fn replacement_set_from_changes(changes: &[SlotChange], emit: &Emitter) -> ReplacementSet {
    let mut entries: Vec<Replacement> = Vec::new();
    for change in changes {
        if change.is_skipped() || change.filled_value == change.original_text {
            continue;
        }
        match entries.iter_mut().find(|e| e.find == change.original_text) {
            Some(existing) => {
                if existing.replace != change.filled_value {
                    emit.thought(format!(
                        "Warning: slots share placeholder text {:?} with different values; keeping {:?}",
                        change.original_text, existing.replace
                    ));
                } else {
                    existing.occurrences += 1;
                }
            }
            None => entries.push(Replacement {
                find: change.original_text.clone(),
                replace: change.filled_value.clone(),
                occurrences: 1,
            }),
        }
    }
    ReplacementSet::new(entries)
}
