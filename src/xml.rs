//! Minimal XML plumbing shared by the response decoders
//!
//! Decoders walk the document once with quick-xml, tracking the element path,
//! and receive the text of every element as it closes. Text is passed through
//! verbatim since keys and prefixes may carry edge whitespace; decoders trim
//! the values they parse as flags, numbers or identifiers. Request bodies are
//! built by string pushes with [`escape_into`].

use crate::error::{Result, ServiceError};
use quick_xml::events::Event;
use quick_xml::Reader;

/// Event handed to a decoder while walking a document
pub(crate) enum XmlEvent<'a> {
    /// An element opened; `path` ends with its local name
    Start { path: &'a [String] },
    /// An element closed; `path` ends with its local name, `text` is its content
    End { path: &'a [String], text: String },
}

/// Walk an XML document, reporting element starts and ends with their path.
///
/// Empty elements (`<Self/>`) are reported as a start immediately followed by
/// an end with empty text.
pub(crate) fn walk<F>(xml: &[u8], mut visit: F) -> Result<()>
where
    F: FnMut(XmlEvent<'_>),
{
    let mut reader = Reader::from_reader(xml);

    let mut path: Vec<String> = Vec::with_capacity(8);
    let mut current_text = String::with_capacity(256);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                path.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                current_text.clear();
                visit(XmlEvent::Start { path: &path });
            }
            Ok(Event::Empty(e)) => {
                path.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                visit(XmlEvent::Start { path: &path });
                visit(XmlEvent::End {
                    path: &path,
                    text: String::new(),
                });
                path.pop();
                current_text.clear();
            }
            Ok(Event::Text(e)) => {
                current_text.push_str(&e.unescape()?);
            }
            Ok(Event::CData(e)) => {
                current_text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Ok(Event::End(_)) => {
                visit(XmlEvent::End {
                    path: &path,
                    text: std::mem::take(&mut current_text),
                });
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ServiceError::XmlParse(format!(
                    "at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(())
}

/// Name of the element `depth` levels above the closing one (0 = the element itself)
pub(crate) fn ancestor(path: &[String], depth: usize) -> Option<&str> {
    path.len()
        .checked_sub(depth + 1)
        .map(|index| path[index].as_str())
}

/// Escape XML special characters into an existing buffer (no intermediate allocation)
pub(crate) fn escape_into(buf: &mut String, s: &str) {
    for ch in s.chars() {
        match ch {
            '&' => buf.push_str("&amp;"),
            '<' => buf.push_str("&lt;"),
            '>' => buf.push_str("&gt;"),
            '"' => buf.push_str("&quot;"),
            '\'' => buf.push_str("&apos;"),
            _ => buf.push(ch),
        }
    }
}

/// Push `<name>escaped value</name>`
pub(crate) fn push_element(buf: &mut String, name: &str, value: &str) {
    buf.push('<');
    buf.push_str(name);
    buf.push('>');
    escape_into(buf, value);
    buf.push_str("</");
    buf.push_str(name);
    buf.push('>');
}
