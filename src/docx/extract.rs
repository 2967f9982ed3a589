use anyhow::Context;
use quick_xml::events::Event;
use quick_xml::Reader;

/// Flatten the primary content entry into one plain string: the text of
/// every text-bearing node in document order, space-joined. Structural
/// markup is discarded; this view is for language understanding only, never
/// for mutation.
pub fn flatten_document_text(xml_bytes: &[u8]) -> anyhow::Result<String> {
    let mut reader = Reader::from_reader(xml_bytes);
    reader.config_mut().trim_text(false);

    let mut texts: Vec<String> = Vec::new();
    let mut text_depth: usize = 0;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf).context("read xml event")? {
            Event::Eof => break,
            Event::Start(s) => {
                if is_text_tag(s.name().as_ref()) {
                    text_depth += 1;
                }
            }
            Event::End(e) => {
                if is_text_tag(e.name().as_ref()) {
                    text_depth = text_depth.saturating_sub(1);
                }
            }
            Event::Text(t) => {
                if text_depth > 0 {
                    let txt = t.unescape().context("unescape text")?.into_owned();
                    if !txt.is_empty() {
                        texts.push(txt);
                    }
                }
            }
            _ => {}
        }
    }

    Ok(texts.join(" "))
}

/// Text-node tag, matched regardless of namespace prefix (`w:t`, `a:t`, bare
/// `t`).
fn is_text_tag(name: &[u8]) -> bool {
    name == b"t" || name.ends_with(b":t")
}
