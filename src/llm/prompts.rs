//! System instructions for the two collaborator calls. Fixed templates with
//! `{{var}}` placeholders; the document text / user instructions travel as
//! the user content of the call.

use crate::pipeline::slots::AnalyzedSlot;

pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (k, v) in vars {
        let pat = format!("{{{{{k}}}}}");
        out = out.replace(&pat, v);
    }
    out
}

/// One line per slot, restating id, label, type, placeholder text and
/// truncated context for the resolution call.
pub fn describe_slots(slots: &[AnalyzedSlot]) -> String {
    slots
        .iter()
        .map(|s| {
            let context: String = s.context.chars().take(100).collect();
            format!(
                "- {}: \"{}\" (type: {}, placeholder: \"{}\", context: \"{}\")",
                s.id, s.suggested_label, s.suggested_type, s.original_text, context
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub const DETECT_SLOTS: &str = r#"You are a document analysis expert. Your job is to identify ALL fillable placeholders in a document template.

TASK:
1. Analyze the document and identify its type/purpose
2. Find ALL placeholders that need to be filled in
3. For each placeholder, determine what type of value it expects

COMMON PLACEHOLDER PATTERNS TO LOOK FOR:
- Explicit markers: "[…]", "[...]", "[INSERT X]", "{{x}}", "_____", "________"
- Empty spaces with labels: "Name: ________", "Date: __/__/____"
- Bracketed instructions: "[Enter company name]"
- Vietnamese placeholders: "[…]" is very common

IMPORTANT:
- Include ALL placeholders, even repeated ones
- Extract the EXACT original text so it can be found and replaced
- For context, provide the FULL SENTENCE containing the placeholder

Return valid JSON with this structure:
{
  "documentSummary": "Brief description of the document",
  "slots": [
    {
      "id": "slot_1",
      "originalText": "exact placeholder text",
      "context": "full sentence containing the placeholder",
      "suggestedType": "name|date|number|text|address|custom",
      "suggestedLabel": "human-readable label",
      "suggestedQuery": "optional search query"
    }
  ]
}"#;

pub const RESOLVE_SLOTS: &str = r#"You are a document filling assistant.

Document: {{document_summary}}

Slots to fill:
{{slots_description}}

Fill all slots with appropriate values based on the user's instructions.
For slots without explicit instructions, generate reasonable values or mark as skipped.
Return EXACTLY ONE entry per slot id listed above; for skipped slots set filledValue to the original placeholder text.

Return valid JSON with this structure:
{
  "filledSlots": [
    {
      "id": "slot_1",
      "originalText": "exact original placeholder",
      "filledValue": "the value to fill in",
      "source": "user_prompt|generated|skipped",
      "confidence": 0.95,
      "reasoning": "brief explanation"
    }
  ]
}"#;
