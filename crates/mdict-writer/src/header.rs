use std::fmt::Write as _;

use bytes::BufMut;
use chrono::{Datelike, NaiveDate};
use mdict_common::{MdictError, MdictResult};

use crate::{compress::checksum, encoding::TextEncoding, SIZE_OF_U32};

const ENGINE_VERSION: &str = "2.0";
const DATA_SOURCE_FORMAT: &str = "106";

/// The header is always stored as UTF-16LE, whatever the key encoding is.
pub const HEADER_ENCODING: TextEncoding = TextEncoding::Utf16Le;

/// The dictionary-level metadata rendered into the first segment of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub title: String,
    pub description: String,
    pub creation_date: NaiveDate,
    pub is_resource_archive: bool,
}

impl Header {
    fn root_tag(&self) -> &'static str {
        if self.is_resource_archive {
            "Library_Data"
        } else {
            "Dictionary"
        }
    }

    /// The attributes in the order readers expect them.
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        let mut attrs = vec![
            ("GeneratedByEngineVersion", ENGINE_VERSION.to_string()),
            ("RequiredEngineVersion", ENGINE_VERSION.to_string()),
            // encryption is never applied
            ("Encrypted", "0".to_string()),
        ];
        if self.is_resource_archive {
            attrs.push(("Format", String::new()));
        } else {
            attrs.push(("Encoding", TextEncoding::Utf8.name().to_string()));
            attrs.push(("Format", "Html".to_string()));
        }
        let date = self.creation_date;
        attrs.extend([
            (
                "CreationDate",
                format!("{}-{}-{}", date.year(), date.month(), date.day()),
            ),
            ("Compact", "No".to_string()),
            ("Compat", "No".to_string()),
            ("KeyCaseSensitive", "No".to_string()),
            ("Description", escape(&self.description)),
            ("Title", escape(&self.title)),
            ("DataSourceFormat", DATA_SOURCE_FORMAT.to_string()),
            ("StyleSheet", String::new()),
            ("RegisterBy", String::new()),
            ("RegCode", String::new()),
        ]);
        attrs
    }

    /// Renders the self-closing header element, including the trailing CRLF
    /// and NUL character.
    pub fn render(&self) -> String {
        let mut s = String::with_capacity(512);
        s.push('<');
        s.push_str(self.root_tag());
        for (name, value) in self.attributes() {
            let _ = write!(s, " {}=\"{}\"", name, value);
        }
        s.push_str("/>\r\n\0");
        s
    }

    /// ┌────────────────────────────────────────────────────────┐
    /// │ Header Section                                         │
    /// │┌ ─ ─ ─ ─ ─ ─ ─ ─ ┬ ─ ─ ─ ─ ─ ─ ─ ─ ─ ┬ ─ ─ ─ ─ ─ ─ ─ ─ │
    /// │  header length   │   header string  │   checksum     ││
    /// ││    u32 (BE)     │  bytes (UTF-16LE) │    u32 (LE)     │
    /// │ ─ ─ ─ ─ ─ ─ ─ ─ ─┘─ ─ ─ ─ ─ ─ ─ ─ ─ ─┘─ ─ ─ ─ ─ ─ ─ ─ ┘│
    /// └────────────────────────────────────────────────────────┘
    pub fn encode(&self) -> Vec<u8> {
        let text = HEADER_ENCODING.encode(&self.render());
        let mut buf = Vec::with_capacity(text.len() + 2 * SIZE_OF_U32);
        buf.put_u32(text.len() as u32);
        buf.put_slice(&text);
        buf.put_u32_le(checksum(&text));
        buf
    }
}

/// Escapes text for use inside a double-quoted markup attribute.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

pub fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Splits a rendered header element into its tag name and unescaped
/// attributes.
pub fn parse_header(text: &str) -> MdictResult<(String, Vec<(String, String)>)> {
    let invalid = || MdictError::DecodeError("Invalid header element".into());
    let text = text.trim_end_matches(['\0', '\r', '\n']);
    let body = text
        .strip_prefix('<')
        .and_then(|t| t.strip_suffix("/>"))
        .ok_or_else(invalid)?;
    let (tag, mut rest) = body.split_once(' ').unwrap_or((body, ""));
    let mut attrs = Vec::new();
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        let (name, after) = rest.split_once("=\"").ok_or_else(invalid)?;
        let (value, after) = after.split_once('"').ok_or_else(invalid)?;
        attrs.push((name.trim().to_string(), unescape(value)));
        rest = after;
    }
    Ok((tag.to_string(), attrs))
}

#[cfg(test)]
mod test {
    use super::*;

    fn header(is_resource_archive: bool) -> Header {
        Header {
            title: "Wiktionary <English>".into(),
            description: "This is an \"example\" & 'dictionary'.".into(),
            creation_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            is_resource_archive,
        }
    }

    #[test]
    fn render_text_dictionary() {
        assert_eq!(
            header(false).render(),
            "<Dictionary GeneratedByEngineVersion=\"2.0\" RequiredEngineVersion=\"2.0\" \
             Encrypted=\"0\" Encoding=\"UTF-8\" Format=\"Html\" CreationDate=\"2024-1-5\" \
             Compact=\"No\" Compat=\"No\" KeyCaseSensitive=\"No\" \
             Description=\"This is an &quot;example&quot; &amp; &#x27;dictionary&#x27;.\" \
             Title=\"Wiktionary &lt;English&gt;\" DataSourceFormat=\"106\" StyleSheet=\"\" \
             RegisterBy=\"\" RegCode=\"\"/>\r\n\0"
        );
    }

    #[test]
    fn encoded_text_header_matches_reference_bytes() {
        let buf = header(false).encode();
        assert_eq!(buf.len(), 734);
        assert_eq!(&buf[..4], &[0x00, 0x00, 0x02, 0xd6]);
        assert_eq!(&buf[buf.len() - 4..], &[0x58, 0x77, 0x60, 0xf1]);
    }

    #[test]
    fn encoded_resource_header_matches_reference_bytes() {
        let h = header(true);
        assert!(h.render().starts_with("<Library_Data "));
        assert!(!h.render().contains("Encoding="));
        let buf = h.encode();
        assert_eq!(buf.len(), 696);
        assert_eq!(&buf[..4], &[0x00, 0x00, 0x02, 0xb0]);
        assert_eq!(&buf[buf.len() - 4..], &[0x3f, 0x71, 0x91, 0xb5]);
    }

    #[test]
    fn parse_round_trip() {
        let h = header(false);
        let (tag, attrs) = parse_header(&h.render()).unwrap();
        assert_eq!(tag, "Dictionary");
        let title = attrs.iter().find(|(k, _)| k == "Title").unwrap();
        assert_eq!(title.1, "Wiktionary <English>");
        let desc = attrs.iter().find(|(k, _)| k == "Description").unwrap();
        assert_eq!(desc.1, h.description);
        assert_eq!(attrs.len(), h.attributes().len());
    }

    #[test]
    fn escape_unescape() {
        let s = "a&b<c>d\"e'f &amp;";
        assert_eq!(unescape(&escape(s)), s);
    }
}
