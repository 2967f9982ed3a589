use std::io::{Cursor, Read, Write};
use std::sync::{Arc, Mutex};

use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use docfill::progress::{ProgressEvent, ProgressKind, ProgressObserver};
use docfill::{ChangeSource, ChatModel, FillError, FillOptions, Filler, LocalFiller};

fn build_docx(document_xml: &str) -> Vec<u8> {
    let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default();
    zout.start_file("word/document.xml", opts).unwrap();
    zout.write_all(document_xml.as_bytes()).unwrap();
    zout.start_file("word/styles.xml", opts).unwrap();
    zout.write_all(b"<styles/>").unwrap();
    zout.finish().unwrap().into_inner()
}

fn read_entry(docx: &[u8], name: &str) -> String {
    let mut zip = ZipArchive::new(Cursor::new(docx)).unwrap();
    let mut entry = zip.by_name(name).unwrap();
    let mut out = String::new();
    entry.read_to_string(&mut out).unwrap();
    out
}

/// Deterministic collaborator: fixed JSON per call, in call order.
struct ScriptedModel {
    replies: Vec<String>,
    calls: Mutex<usize>,
}

impl ScriptedModel {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: replies.iter().map(|s| s.to_string()).collect(),
            calls: Mutex::new(0),
        }
    }
}

impl ChatModel for ScriptedModel {
    fn chat_json(&self, _s: &str, _u: &str, _t: u32, _r: u32) -> anyhow::Result<String> {
        let mut calls = self.calls.lock().unwrap();
        let reply = self
            .replies
            .get(*calls)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unexpected extra model call"))?;
        *calls += 1;
        Ok(reply)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Collaborator that must never be reached.
struct UnreachableModel;

impl ChatModel for UnreachableModel {
    fn chat_json(&self, _s: &str, _u: &str, _t: u32, _r: u32) -> anyhow::Result<String> {
        panic!("collaborator called before extraction succeeded");
    }

    fn model_name(&self) -> &str {
        "unreachable"
    }
}

fn event_log() -> (Arc<Mutex<Vec<(ProgressKind, String)>>>, Box<ProgressObserver>) {
    let seen: Arc<Mutex<Vec<(ProgressKind, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let obs: Box<ProgressObserver> = Box::new(move |ev: &ProgressEvent| {
        sink.lock().unwrap().push((ev.kind.clone(), ev.message.clone()));
    });
    (seen, obs)
}

const DETECT_TWO_SLOTS: &str = r#"{
  "documentSummary": "A client engagement form",
  "slots": [
    {"id":"slot_1","originalText":"[...]","context":"Client: [...]","suggestedType":"name","suggestedLabel":"Client name"},
    {"id":"slot_2","originalText":"[...]","context":"Date: [...]","suggestedType":"date","suggestedLabel":"Date"}
  ]
}"#;

const RESOLVE_ONE_FILLED_ONE_SKIPPED: &str = r#"{
  "filledSlots": [
    {"id":"slot_1","originalText":"[...]","filledValue":"Acme","source":"user_prompt","confidence":0.95,"reasoning":"named in the instructions"},
    {"id":"slot_2","originalText":"[...]","filledValue":"[...]","source":"skipped","confidence":0.9,"reasoning":"asked to leave blank"}
  ]
}"#;

#[test]
fn fills_first_occurrence_and_leaves_skipped_placeholder() {
    let docx = build_docx(
        r#"<w:document xmlns:w="urn:w"><w:body><w:p><w:r><w:t>Client: [...] Date: [...]</w:t></w:r></w:p></w:body></w:document>"#,
    );
    let model = ScriptedModel::new(&[DETECT_TWO_SLOTS, RESOLVE_ONE_FILLED_ONE_SKIPPED]);
    let (seen, obs) = event_log();
    let filler = LocalFiller::new(Box::new(model));
    let opts = FillOptions {
        on_progress: Some(obs.as_ref()),
        ..Default::default()
    };

    let result = filler
        .fill(&docx, "Client is Acme, leave date blank", &opts)
        .expect("fill");

    let doc = read_entry(&result.buffer, "word/document.xml");
    assert!(doc.contains("Client: Acme Date: [...]"), "got: {doc}");
    assert_eq!(read_entry(&result.buffer, "word/styles.xml"), "<styles/>");

    assert_eq!(result.document_summary, "A client engagement form");
    assert_eq!(result.changes.len(), 2);
    assert_eq!(result.changes[0].source, ChangeSource::UserPrompt);
    assert_eq!(result.changes[0].filled_value, "Acme");
    assert!(result.changes[1].is_skipped());

    assert_eq!(result.metadata.total_slots, 2);
    assert_eq!(result.metadata.filled_slots, 1);
    assert_eq!(result.metadata.skipped_slots, 1);
    assert_eq!(
        result.metadata.filled_slots + result.metadata.skipped_slots,
        result.metadata.total_slots
    );

    // Events arrive synchronously, in pipeline order, before fill returns.
    let events = seen.lock().unwrap();
    let kinds: Vec<String> = events.iter().map(|(k, _)| format!("{k:?}")).collect();
    assert_eq!(
        kinds,
        vec![
            "Phase",      // extracting
            "Phase",      // detecting
            "Thought",    // detected count
            "Phase",      // resolving
            "SlotFilled", // slot_1
            "SlotFilled", // slot_2
            "Phase",      // patching
            "Complete",
        ]
    );
    assert!(events[2].1.contains("Detected 2 placeholders"));
    assert!(events[4].1.contains("slot_1"));
}

#[test]
fn document_without_placeholders_completes_with_zero_slots() {
    let docx = build_docx(
        r#"<w:document xmlns:w="urn:w"><w:body><w:p><w:r><w:t>Nothing to fill here.</w:t></w:r></w:p></w:body></w:document>"#,
    );
    let model = ScriptedModel::new(&[r#"{"documentSummary":"A finished letter","slots":[]}"#]);
    let filler = LocalFiller::new(Box::new(model));

    let result = filler.fill(&docx, "fill everything", &FillOptions::default()).expect("fill");

    assert_eq!(result.metadata.total_slots, 0);
    assert_eq!(result.metadata.filled_slots, 0);
    assert_eq!(result.metadata.skipped_slots, 0);
    // No substitutions: the package is returned byte-identical.
    assert_eq!(result.buffer, docx);
}

#[test]
fn malformed_archive_fails_before_any_collaborator_call() {
    let filler = LocalFiller::new(Box::new(UnreachableModel));
    let (seen, obs) = event_log();
    let opts = FillOptions {
        on_progress: Some(obs.as_ref()),
        ..Default::default()
    };

    let err = filler
        .fill(b"definitely not a zip archive", "prompt", &opts)
        .unwrap_err();
    assert!(matches!(err, FillError::MalformedPackage(_)));

    let events = seen.lock().unwrap();
    assert!(matches!(events.last().unwrap().0, ProgressKind::Error));
}

#[test]
fn archive_without_primary_entry_is_malformed_package() {
    let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
    zout.start_file("word/styles.xml", SimpleFileOptions::default()).unwrap();
    zout.write_all(b"<styles/>").unwrap();
    let bytes = zout.finish().unwrap().into_inner();

    let filler = LocalFiller::new(Box::new(UnreachableModel));
    let err = filler.fill(&bytes, "prompt", &FillOptions::default()).unwrap_err();
    assert!(matches!(err, FillError::MalformedPackage(_)));
}

#[test]
fn ill_formed_primary_entry_is_malformed_content() {
    let docx = build_docx("<w:document><w:t>bad</span></w:document>");
    let filler = LocalFiller::new(Box::new(UnreachableModel));
    let err = filler.fill(&docx, "prompt", &FillOptions::default()).unwrap_err();
    assert!(matches!(err, FillError::MalformedContent(_)));
}

#[test]
fn resolver_dropping_a_slot_surfaces_resolution_incomplete() {
    let docx = build_docx(
        r#"<w:document xmlns:w="urn:w"><w:body><w:p><w:r><w:t>Client: [...] Date: [...]</w:t></w:r></w:p></w:body></w:document>"#,
    );
    let only_one = r#"{"filledSlots":[{"id":"slot_1","originalText":"[...]","filledValue":"Acme","source":"user_prompt"}]}"#;
    let model = ScriptedModel::new(&[DETECT_TWO_SLOTS, only_one]);
    let filler = LocalFiller::new(Box::new(model));

    let err = filler
        .fill(&docx, "Client is Acme", &FillOptions::default())
        .unwrap_err();
    match err {
        FillError::ResolutionIncomplete { missing } => assert_eq!(missing, vec!["slot_2"]),
        other => panic!("expected ResolutionIncomplete, got {other:?}"),
    }
}
