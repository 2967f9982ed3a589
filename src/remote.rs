use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{anyhow, Context};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;

use crate::error::FillError;
use crate::pipeline::slots::SlotChange;
use crate::pipeline::{FillMetadata, FillOptions, FillResult, Filler};
use crate::progress::{Emitter, ProgressEvent, ProgressObserver};

const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Drop-in network alternative to `LocalFiller`: uploads the document and
/// prompt to a deployed fill endpoint and reconstructs the same progress
/// vocabulary and result shape from its `data: <json>` event stream.
pub struct RemoteFiller {
    api_base: String,
    client: reqwest::blocking::Client,
    on_progress: Option<Box<ProgressObserver>>,
}

/// One decoded stream frame. Unknown fields are tolerated; absent fields
/// default so a sparse frame still maps onto an event.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct StreamFrame {
    #[serde(rename = "type")]
    kind: String,
    message: String,
    success: bool,
    data: FrameData,
    document_summary: String,
    metadata: FillMetadata,
    download: FrameDownload,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct FrameData {
    slot: Option<SlotChange>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct FrameDownload {
    base64: String,
}

impl RemoteFiller {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            client: reqwest::blocking::Client::new(),
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, observer: Box<ProgressObserver>) -> Self {
        self.on_progress = Some(observer);
        self
    }

    fn fill_named(
        &self,
        document: &[u8],
        filename: &str,
        prompt: &str,
        opts: &FillOptions,
    ) -> Result<FillResult, FillError> {
        let observer = opts.on_progress.or(self.on_progress.as_deref());
        let emit = Emitter::new(observer);

        emit.phase("Sending document to server...");

        let file_part = reqwest::blocking::multipart::Part::bytes(document.to_vec())
            .file_name(filename.to_string())
            .mime_str(DOCX_MIME)
            .map_err(|e| FillError::Transport(anyhow!(e)))?;
        let mut form = reqwest::blocking::multipart::Form::new()
            .part("file", file_part)
            .text("prompt", prompt.to_string());
        if let Some(r) = opts.max_retries {
            form = form.text("maxRetries", r.to_string());
        }
        if let Some(t) = opts.max_output_tokens {
            form = form.text("maxOutputTokens", t.to_string());
        }

        let url = format!("{}/api/template-filler", self.api_base.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .with_context(|| format!("upload to {url}"))
            .map_err(FillError::Transport)?;
        if !response.status().is_success() {
            return Err(FillError::Transport(anyhow!(
                "server returned {}",
                response.status()
            )));
        }

        consume_stream(BufReader::new(response), &emit)
    }
}

impl Filler for RemoteFiller {
    fn fill(&self, document: &[u8], prompt: &str, opts: &FillOptions) -> Result<FillResult, FillError> {
        self.fill_named(document, "template.docx", prompt, opts)
    }

    fn fill_path(&self, path: &Path, prompt: &str, opts: &FillOptions) -> Result<FillResult, FillError> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read document: {}", path.display()))
            .map_err(FillError::MalformedPackage)?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("template.docx");
        self.fill_named(&bytes, filename, prompt, opts)
    }
}

/// Decode the event stream line by line. Lines that are not `data: <json>`
/// frames, and frames that fail to parse, are transport hiccups and are
/// skipped; a stream that ends without a successful `complete` frame is
/// fatal. Changes are buffered from `slot_filled` frames in arrival order.
fn consume_stream<R: BufRead>(reader: R, emit: &Emitter) -> Result<FillResult, FillError> {
    let mut changes: Vec<SlotChange> = Vec::new();
    let mut terminal: Option<StreamFrame> = None;

    for line in reader.lines() {
        // A read error mid-stream is a disconnect: same outcome as the
        // stream ending early.
        let Ok(line) = line else { break };
        let Some(payload) = line.strip_prefix("data: ") else {
            continue;
        };
        let Ok(frame) = serde_json::from_str::<StreamFrame>(payload) else {
            continue;
        };

        emit.emit(event_for(&frame));
        if frame.kind == "slot_filled" {
            if let Some(slot) = frame.data.slot.clone() {
                changes.push(slot);
            }
        }
        if frame.kind == "complete" && frame.success {
            terminal = Some(frame);
            break;
        }
    }

    let Some(frame) = terminal else {
        return Err(FillError::RemoteIncomplete);
    };

    let buffer = BASE64
        .decode(frame.download.base64.as_bytes())
        .context("decode document payload")
        .map_err(FillError::Transport)?;

    Ok(FillResult {
        buffer,
        document_summary: frame.document_summary,
        changes,
        metadata: frame.metadata,
    })
}

fn event_for(frame: &StreamFrame) -> ProgressEvent {
    match frame.kind.as_str() {
        "phase" => ProgressEvent::phase(frame.message.clone()),
        "slot_filled" => {
            let data = frame
                .data
                .slot
                .as_ref()
                .map(|slot| serde_json::json!({ "slot": slot }))
                .unwrap_or(serde_json::Value::Null);
            ProgressEvent::slot_filled(frame.message.clone(), data)
        }
        "complete" => ProgressEvent::complete(frame.message.clone()),
        "error" => ProgressEvent::error(frame.message.clone()),
        _ => ProgressEvent::thought(frame.message.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressKind;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    fn collect_events() -> (Arc<Mutex<Vec<(String, String)>>>, Box<ProgressObserver>) {
        let seen: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let obs: Box<ProgressObserver> = Box::new(move |ev: &ProgressEvent| {
            let kind = match ev.kind {
                ProgressKind::Phase => "phase",
                ProgressKind::Thought => "thought",
                ProgressKind::SlotFilled => "slot_filled",
                ProgressKind::Complete => "complete",
                ProgressKind::Error => "error",
            };
            sink.lock().unwrap().push((kind.to_string(), ev.message.clone()));
        });
        (seen, obs)
    }

    #[test]
    fn decodes_full_stream_into_result() {
        let doc_b64 = BASE64.encode(b"filled document bytes");
        let stream = format!(
            "data: {{\"type\":\"phase\",\"message\":\"Extracting...\"}}\n\
             : keepalive comment\n\
             data: {{\"type\":\"slot_filled\",\"message\":\"Filled: slot_1\",\"data\":{{\"slot\":{{\"id\":\"slot_1\",\"originalText\":\"[...]\",\"filledValue\":\"Acme\",\"source\":\"user_prompt\",\"confidence\":0.95}}}}}}\n\
             data: this line is garbage\n\
             data: {{\"type\":\"complete\",\"message\":\"Done\",\"success\":true,\"documentSummary\":\"A contract\",\"metadata\":{{\"totalSlots\":1,\"filledSlots\":1,\"skippedSlots\":0,\"processingTimeMs\":900}},\"download\":{{\"base64\":\"{doc_b64}\"}}}}\n"
        );
        let (seen, obs) = collect_events();
        let emit = Emitter::new(Some(obs.as_ref()));
        let result = consume_stream(Cursor::new(stream), &emit).expect("consume");

        assert_eq!(result.buffer, b"filled document bytes");
        assert_eq!(result.document_summary, "A contract");
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.changes[0].filled_value, "Acme");
        assert_eq!(result.metadata.total_slots, 1);

        let events = seen.lock().unwrap();
        let kinds: Vec<&str> = events.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(kinds, vec!["phase", "slot_filled", "complete"]);
    }

    #[test]
    fn stream_without_terminal_frame_is_remote_incomplete() {
        let stream = "data: {\"type\":\"slot_filled\",\"message\":\"Filled: a\",\"data\":{\"slot\":{\"id\":\"a\",\"originalText\":\"[...]\",\"filledValue\":\"x\",\"source\":\"generated\"}}}\n\
                      data: {\"type\":\"slot_filled\",\"message\":\"Filled: b\",\"data\":{\"slot\":{\"id\":\"b\",\"originalText\":\"[...]\",\"filledValue\":\"y\",\"source\":\"generated\"}}}\n\
                      data: {\"type\":\"slot_filled\",\"message\":\"Filled: c\",\"data\":{\"slot\":{\"id\":\"c\",\"originalText\":\"[...]\",\"filledValue\":\"z\",\"source\":\"generated\"}}}\n";
        let (seen, obs) = collect_events();
        let emit = Emitter::new(Some(obs.as_ref()));
        let err = consume_stream(Cursor::new(stream), &emit).unwrap_err();
        assert!(matches!(err, FillError::RemoteIncomplete));
        // Partial changes were observed as events but no result was returned.
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn unsuccessful_complete_frame_does_not_terminate() {
        let stream = "data: {\"type\":\"complete\",\"message\":\"failed\",\"success\":false}\n";
        let err = consume_stream(Cursor::new(stream), &Emitter::new(None)).unwrap_err();
        assert!(matches!(err, FillError::RemoteIncomplete));
    }

    #[test]
    fn invalid_base64_download_is_a_transport_error() {
        let stream = "data: {\"type\":\"complete\",\"message\":\"Done\",\"success\":true,\"download\":{\"base64\":\"%%%not-base64%%%\"}}\n";
        let err = consume_stream(Cursor::new(stream), &Emitter::new(None)).unwrap_err();
        assert!(matches!(err, FillError::Transport(_)));
    }
}
