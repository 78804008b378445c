//! Feed-shape scanning: RSS `<item>` and Atom `<entry>` elements.
//!
//! The document is streamed with `quick-xml`. Each item becomes a
//! [`RecordDraft`] holding whatever child fields were present; nothing is
//! validated here.
//!
//! Real feeds are often not quite XML: bare `&` in titles, unclosed `<br>`
//! inside descriptions. The reader is configured to accept both. Any other
//! markup error costs only the item it happened in, which is counted in
//! [`FeedScan::dropped`]; scanning stops only on errors the reader cannot
//! step past.

use crate::models::{RawTimestamp, RecordDraft, TimestampFormat};
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Reader;
use tracing::warn;

/// Drafts found in a document, in document order.
#[derive(Debug, Default)]
pub struct FeedScan {
    pub drafts: Vec<RecordDraft>,
    /// Items discarded because their markup was broken.
    pub dropped: usize,
    /// Set when the document stopped being readable as XML.
    pub error: Option<String>,
}

/// Child elements of an item that feed a draft field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Title,
    Link,
    Description,
    Content,
    PubDate,
    DcDate,
    Published,
    Updated,
}

/// Field values collected for one item. The first occurrence of each slot wins.
#[derive(Debug, Default)]
struct ItemFields {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    content: Option<String>,
    pub_date: Option<String>,
    dc_date: Option<String>,
    published: Option<String>,
    updated: Option<String>,
}

impl ItemFields {
    fn set(&mut self, slot: Slot, value: String) {
        let target = match slot {
            Slot::Title => &mut self.title,
            Slot::Link => &mut self.link,
            Slot::Description => &mut self.description,
            Slot::Content => &mut self.content,
            Slot::PubDate => &mut self.pub_date,
            Slot::DcDate => &mut self.dc_date,
            Slot::Published => &mut self.published,
            Slot::Updated => &mut self.updated,
        };
        if target.is_none() {
            *target = Some(value);
        }
    }

    fn into_draft(self) -> RecordDraft {
        let published = self
            .pub_date
            .map(|text| RawTimestamp {
                text,
                format: TimestampFormat::Rfc2822,
            })
            .or_else(|| {
                self.published
                    .or(self.updated)
                    .or(self.dc_date)
                    .map(|text| RawTimestamp {
                        text,
                        format: TimestampFormat::Iso8601,
                    })
            });

        RecordDraft {
            title: self.title,
            link: self.link,
            description: self.description.or(self.content),
            published,
        }
    }
}

/// Text being collected for one field. Markup nested inside the field is
/// flattened; only an end tag with the field's own name closes it.
#[derive(Debug)]
struct Capture {
    slot: Slot,
    name: Vec<u8>,
    /// Open elements inside the field that share its name.
    nested: usize,
    text: String,
}

/// An item currently being read.
#[derive(Debug, Default)]
struct OpenItem {
    fields: ItemFields,
    /// Uncaptured elements open inside the item, not counting the item itself.
    depth: usize,
    capture: Option<Capture>,
}

/// What an end tag did to the open item.
#[derive(Debug, PartialEq, Eq)]
enum Closing {
    StillOpen,
    Done,
    /// The item cannot be finished sensibly.
    Broken,
}

impl OpenItem {
    fn start(&mut self, e: &BytesStart) {
        if let Some(capture) = self.capture.as_mut() {
            if e.name().as_ref() == capture.name.as_slice() {
                capture.nested += 1;
            }
            capture.text.push(' ');
            return;
        }

        if self.depth == 0 {
            if let Some(href) = link_href(e) {
                self.fields.set(Slot::Link, href);
            } else if let Some(slot) = slot_for(e) {
                self.capture = Some(Capture {
                    slot,
                    name: e.name().as_ref().to_vec(),
                    nested: 0,
                    text: String::new(),
                });
                return;
            }
        }
        self.depth += 1;
    }

    fn empty(&mut self, e: &BytesStart) {
        if let Some(capture) = self.capture.as_mut() {
            capture.text.push(' ');
        } else if self.depth == 0 {
            if let Some(href) = link_href(e) {
                self.fields.set(Slot::Link, href);
            }
        }
    }

    fn end(&mut self, e: &BytesEnd) -> Closing {
        if let Some(capture) = self.capture.as_mut() {
            if e.name().as_ref() == capture.name.as_slice() {
                if capture.nested > 0 {
                    capture.nested -= 1;
                } else {
                    self.finish_capture();
                }
                return Closing::StillOpen;
            }
            // The item closes while one of its fields is still open.
            return if is_item_end(e) {
                Closing::Broken
            } else {
                Closing::StillOpen
            };
        }

        if is_item_end(e) {
            Closing::Done
        } else if self.depth == 0 {
            // An enclosing element closes before the item did.
            Closing::Broken
        } else {
            self.depth -= 1;
            Closing::StillOpen
        }
    }

    fn finish_capture(&mut self) {
        if let Some(capture) = self.capture.take() {
            let text = capture.text.trim();
            if !text.is_empty() {
                self.fields.set(capture.slot, text.to_string());
            }
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(capture) = self.capture.as_mut() {
            capture.text.push_str(text);
        }
    }
}

/// Scan `body` for feed items.
pub fn scan(body: &str) -> FeedScan {
    let mut reader = Reader::from_str(body);
    let config = reader.config_mut();
    config.allow_dangling_amp = true;
    config.check_end_names = false;

    let mut scan = FeedScan::default();
    let mut item: Option<OpenItem> = None;
    let mut last_error_at = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                let at = reader.buffer_position();
                if item.take().is_some() {
                    scan.dropped += 1;
                }
                // A syntax error, or a second error at the same spot, means the
                // reader cannot move on.
                if matches!(e, quick_xml::Error::Syntax(_)) || last_error_at == Some(at) {
                    scan.error = Some(e.to_string());
                    break;
                }
                warn!(position = at, error = %e, "Skipping malformed feed markup");
                last_error_at = Some(at);
                continue;
            }
        };

        match event {
            Event::Start(e) => {
                let capturing = item.as_ref().is_some_and(|open| open.capture.is_some());
                if is_item(&e) && !capturing {
                    // A new item while the previous one never closed.
                    if item.replace(OpenItem::default()).is_some() {
                        scan.dropped += 1;
                    }
                } else if let Some(open) = item.as_mut() {
                    open.start(&e);
                }
            }
            Event::Empty(e) => {
                if let Some(open) = item.as_mut() {
                    open.empty(&e);
                }
            }
            Event::End(e) => {
                let Some(open) = item.as_mut() else {
                    continue;
                };
                match open.end(&e) {
                    Closing::StillOpen => {}
                    Closing::Done => {
                        if let Some(done) = item.take() {
                            scan.drafts.push(done.fields.into_draft());
                        }
                    }
                    Closing::Broken => {
                        item = None;
                        scan.dropped += 1;
                    }
                }
            }
            Event::Text(e) => push_capture(&mut item, &String::from_utf8_lossy(&e)),
            Event::CData(e) => push_capture(&mut item, &String::from_utf8_lossy(&e)),
            Event::GeneralRef(e) => {
                push_capture(&mut item, &resolve_entity(&String::from_utf8_lossy(&e)))
            }
            Event::Eof => {
                if item.take().is_some() {
                    scan.dropped += 1;
                }
                break;
            }
            _ => {}
        }
    }

    scan
}

fn push_capture(item: &mut Option<OpenItem>, text: &str) {
    if let Some(open) = item.as_mut() {
        open.push_text(text);
    }
}

fn is_item(e: &BytesStart) -> bool {
    matches!(e.local_name().as_ref(), b"item" | b"entry")
}

fn is_item_end(e: &BytesEnd) -> bool {
    matches!(e.local_name().as_ref(), b"item" | b"entry")
}

/// Map a direct child of an item to the slot it fills. Elements from
/// extension namespaces (`media:title`, `content:encoded`, ...) are ignored,
/// except Dublin Core's `dc:date`.
fn slot_for(e: &BytesStart) -> Option<Slot> {
    let name = e.name();
    let prefix = name.prefix();
    let local = name.local_name();
    let prefix = prefix.as_ref().map(|p| p.as_ref());

    match (prefix, local.as_ref()) {
        (Some(b"dc"), b"date") => Some(Slot::DcDate),
        (None | Some(b"atom"), local) => match local {
            b"title" => Some(Slot::Title),
            b"link" => Some(Slot::Link),
            b"description" | b"summary" => Some(Slot::Description),
            b"content" => Some(Slot::Content),
            b"pubDate" => Some(Slot::PubDate),
            b"published" => Some(Slot::Published),
            b"updated" => Some(Slot::Updated),
            _ => None,
        },
        _ => None,
    }
}

/// `href` of an Atom-style `<link>`, when it points at the entry itself
/// (no `rel`, or `rel="alternate"`).
fn link_href(e: &BytesStart) -> Option<String> {
    if e.local_name().as_ref() != b"link" {
        return None;
    }

    let mut href = None;
    for attr in e.attributes().flatten() {
        match attr.key.local_name().as_ref() {
            b"href" => href = Some(decode_attr(&attr.value)),
            b"rel" if attr.value.as_ref() != b"alternate" => return None,
            _ => {}
        }
    }
    href.filter(|h| !h.trim().is_empty())
}

fn decode_attr(raw: &[u8]) -> String {
    let raw = String::from_utf8_lossy(raw);
    quick_xml::escape::unescape(&raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.into_owned())
}

/// Resolve the name of an `&...;` reference. Unknown named entities (HTML
/// ones such as `&nbsp;` in feeds without a DTD) are kept as written so the
/// HTML stripper can decode them later.
fn resolve_entity(name: &str) -> String {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => num.parse().ok(),
        };
        if let Some(c) = code.and_then(char::from_u32) {
            return c.to_string();
        }
    } else if let Some(s) = resolve_predefined_entity(name) {
        return s.to_string();
    }
    format!("&{name};")
}
