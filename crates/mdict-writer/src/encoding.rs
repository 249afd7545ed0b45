use mdict_common::{MdictError, MdictResult};

/// The text encodings a dictionary can be written in.
///
/// Keys of a resource archive are always UTF-16LE. Text dictionaries are
/// written in UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf16Le,
}

impl TextEncoding {
    /// Parses the name used in the `Encoding` header attribute.
    pub fn from_name(name: &str) -> MdictResult<Self> {
        match name.to_ascii_uppercase().as_str() {
            "UTF-8" | "UTF8" => Ok(TextEncoding::Utf8),
            "UTF-16" | "UTF-16LE" | "UTF16" => Ok(TextEncoding::Utf16Le),
            _ => Err(MdictError::UnsupportedEncoding(name.into())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Utf16Le => "UTF-16",
        }
    }

    /// Bytes per code unit. Key lengths in the key index are counted in units.
    pub fn unit_width(&self) -> usize {
        match self {
            TextEncoding::Utf8 => 1,
            TextEncoding::Utf16Le => 2,
        }
    }

    pub fn terminator(&self) -> &'static [u8] {
        match self {
            TextEncoding::Utf8 => &[0],
            TextEncoding::Utf16Le => &[0, 0],
        }
    }

    pub fn encode_into(&self, text: &str, buf: &mut Vec<u8>) {
        match self {
            TextEncoding::Utf8 => buf.extend_from_slice(text.as_bytes()),
            TextEncoding::Utf16Le => {
                buf.reserve(text.len() * 2);
                for unit in text.encode_utf16() {
                    buf.extend_from_slice(&unit.to_le_bytes());
                }
            }
        }
    }

    pub fn encode(&self, text: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(text, &mut buf);
        buf
    }

    pub fn decode(&self, bytes: &[u8]) -> MdictResult<String> {
        match self {
            TextEncoding::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|e| MdictError::DecodeError(format!("Invalid UTF-8: {}", e).into())),
            TextEncoding::Utf16Le => {
                if bytes.len() % 2 != 0 {
                    return Err(MdictError::DecodeError(
                        "UTF-16 text has an odd number of bytes".into(),
                    ));
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect();
                String::from_utf16(&units)
                    .map_err(|e| MdictError::DecodeError(format!("Invalid UTF-16: {}", e).into()))
            }
        }
    }

    /// Position of the first unit-aligned terminator in `bytes`.
    pub fn find_terminator(&self, bytes: &[u8]) -> Option<usize> {
        let width = self.unit_width();
        bytes
            .chunks_exact(width)
            .position(|unit| unit == self.terminator())
            .map(|i| i * width)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(
            TextEncoding::from_name("utf-8").unwrap(),
            TextEncoding::Utf8
        );
        assert_eq!(
            TextEncoding::from_name("UTF-16").unwrap(),
            TextEncoding::Utf16Le
        );
        let err = TextEncoding::from_name("GBK").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn utf16_units() {
        let enc = TextEncoding::Utf16Le;
        let bytes = enc.encode("a€");
        assert_eq!(bytes, vec![0x61, 0x00, 0xAC, 0x20]);
        assert_eq!(bytes.len() / enc.unit_width(), 2);
        assert_eq!(enc.decode(&bytes).unwrap(), "a€");
    }

    #[test]
    fn terminator_must_be_unit_aligned() {
        // 0x0100 followed by 0x0061: the zero bytes straddle two units.
        let bytes = [0x00, 0x01, 0x61, 0x00, 0x00, 0x00];
        assert_eq!(TextEncoding::Utf16Le.find_terminator(&bytes), Some(4));
        assert_eq!(TextEncoding::Utf8.find_terminator(b"ab\0c"), Some(2));
        assert_eq!(TextEncoding::Utf8.find_terminator(b"abc"), None);
    }
}
