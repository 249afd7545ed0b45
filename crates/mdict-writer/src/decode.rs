//! A sequential, verifying decoder for files produced by
//! [`DictionaryWriter`](crate::DictionaryWriter).
//!
//! Every checksum and length is checked and both block bodies are inflated in
//! full. This is meant for validating output, not for serving lookups.

use mdict_common::{MdictError, MdictResult};

use crate::{
    compress::{checksum, decompress, unframe, CompressionType},
    encoding::TextEncoding,
    header::{parse_header, HEADER_ENCODING},
    utils::{checked_len, get_bytes, get_u16_be, get_u32_be, get_u32_le, get_u64_be},
    SIZE_OF_U64,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEntry {
    pub key: String,
    pub value: Vec<u8>,
}

impl DecodedEntry {
    /// The value of a text dictionary entry, without its terminator.
    pub fn value_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }
}

#[derive(Debug, Clone)]
pub struct DecodedDictionary {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub encoding: TextEncoding,
    pub is_resource_archive: bool,
    pub num_entries: u64,
    pub first_key: String,
    pub last_key: String,
    pub entries: Vec<DecodedEntry>,
}

impl DecodedDictionary {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Parses a complete file.
    ///
    /// # Errors
    /// - [MdictError::DecodeChecksumMismatchError]
    /// - [MdictError::DecodeError] for truncated or inconsistent data
    pub fn parse(data: &[u8]) -> MdictResult<Self> {
        let (tag, attributes, rest) = read_header(data)?;
        let is_resource_archive = tag == "Library_Data";
        let encoding = match attributes.iter().find(|(k, _)| k == "Encoding") {
            Some((_, name)) if !is_resource_archive => TextEncoding::from_name(name)?,
            _ if is_resource_archive => TextEncoding::Utf16Le,
            _ => TextEncoding::Utf8,
        };

        let (key_section, rest) = read_key_section(rest, encoding)?;
        let (record_section, rest) = read_record_section(rest)?;
        if !rest.is_empty() {
            return Err(MdictError::DecodeError(
                format!("{} trailing bytes after the record block", rest.len()).into(),
            ));
        }
        if key_section.num_entries != record_section.num_entries {
            return Err(MdictError::DecodeError(
                "Key and record sections disagree on the entry count".into(),
            ));
        }

        let keys = split_key_records(&key_section.body, encoding)?;
        if keys.len() as u64 != key_section.num_entries {
            return Err(MdictError::DecodeError(
                format!(
                    "Expected {} key records, found {}",
                    key_section.num_entries,
                    keys.len()
                )
                .into(),
            ));
        }

        let records = record_section.body;
        let mut entries = Vec::with_capacity(keys.len());
        for (i, (offset, key)) in keys.iter().enumerate() {
            let end = keys.get(i + 1).map_or(records.len() as u64, |(o, _)| *o);
            if *offset > end || end > records.len() as u64 {
                return Err(MdictError::DecodeError(
                    format!("Invalid value offset {} for key {:?}", offset, key).into(),
                ));
            }
            let mut value = &records[*offset as usize..end as usize];
            if !is_resource_archive {
                value = value.strip_suffix(encoding.terminator()).ok_or_else(|| {
                    MdictError::DecodeError(format!("Value of {:?} is not terminated", key).into())
                })?;
            }
            entries.push(DecodedEntry {
                key: key.clone(),
                value: value.to_vec(),
            });
        }

        Ok(Self {
            tag,
            attributes,
            encoding,
            is_resource_archive,
            num_entries: key_section.num_entries,
            first_key: key_section.first_key,
            last_key: key_section.last_key,
            entries,
        })
    }
}

type HeaderParts<'a> = (String, Vec<(String, String)>, &'a [u8]);

fn read_header(data: &[u8]) -> MdictResult<HeaderParts<'_>> {
    let (len, rest) = get_u32_be(data, "header length")?;
    let (text, rest) = get_bytes(rest, len as usize, "header")?;
    let (expected, rest) = get_u32_le(rest, "header checksum")?;
    if checksum(text) != expected {
        return Err(MdictError::DecodeChecksumMismatchError("header"));
    }
    let (tag, attributes) = parse_header(&HEADER_ENCODING.decode(text)?)?;
    Ok((tag, attributes, rest))
}

struct Section {
    num_entries: u64,
    first_key: String,
    last_key: String,
    body: Vec<u8>,
}

fn ensure_single_block(blocks: u64, what: &str) -> MdictResult<()> {
    if blocks != 1 {
        return Err(MdictError::DecodeError(
            format!("Expected exactly one {} block, found {}", what, blocks).into(),
        ));
    }
    Ok(())
}

/// Reads the block header and the compressed body that follows it, verifying
/// both sizes and the checksum.
fn read_block<'a>(
    data: &'a [u8],
    block_len: u64,
    body_len: u64,
    what: &'static str,
) -> MdictResult<(Vec<u8>, &'a [u8])> {
    let block_len = checked_len(block_len, data.len(), what)?;
    let (block, rest) = data.split_at(block_len);
    let (compression_type, block) = get_u32_le(block, what)?;
    let (expected, compressed) = get_u32_be(block, what)?;
    let body = decompress(compressed, CompressionType::try_from(compression_type)?)?;
    if body.len() as u64 != body_len {
        return Err(MdictError::DecodeError(
            format!(
                "{} decompressed to {} bytes, expected {}",
                what,
                body.len(),
                body_len
            )
            .into(),
        ));
    }
    if checksum(&body) != expected {
        return Err(MdictError::DecodeChecksumMismatchError(what));
    }
    Ok((body, rest))
}

fn read_index_key<'a>(data: &'a [u8], encoding: TextEncoding) -> MdictResult<(String, &'a [u8])> {
    let (units, rest) = get_u16_be(data, "index key length")?;
    let len = units as usize * encoding.unit_width();
    let (key, rest) = get_bytes(rest, len, "index key")?;
    let (terminator, rest) = get_bytes(rest, encoding.terminator().len(), "index key")?;
    if terminator != encoding.terminator() {
        return Err(MdictError::DecodeError(
            "Index key is not terminated".into(),
        ));
    }
    Ok((encoding.decode(key)?, rest))
}

fn read_key_section(data: &[u8], encoding: TextEncoding) -> MdictResult<(Section, &[u8])> {
    let (preamble, rest) = get_bytes(data, SIZE_OF_U64 * 5, "key section preamble")?;
    let (expected, rest) = get_u32_be(rest, "key section checksum")?;
    if checksum(preamble) != expected {
        return Err(MdictError::DecodeChecksumMismatchError(
            "key section preamble",
        ));
    }
    let (blocks, p) = get_u64_be(preamble, "key block count")?;
    let (num_entries, p) = get_u64_be(p, "entry count")?;
    let (index_len, p) = get_u64_be(p, "key index length")?;
    let (framed_len, p) = get_u64_be(p, "framed key index length")?;
    let (blocks_len, _) = get_u64_be(p, "key blocks length")?;
    ensure_single_block(blocks, "key")?;

    let framed_len = checked_len(framed_len, rest.len(), "framed key index")?;
    let (framed, rest) = rest.split_at(framed_len);
    let index = unframe(framed)?;
    if index.len() as u64 != index_len {
        return Err(MdictError::DecodeError("Key index length mismatch".into()));
    }

    let (index_entries, i) = get_u64_be(&index, "key index entry count")?;
    let (first_key, i) = read_index_key(i, encoding)?;
    let (last_key, i) = read_index_key(i, encoding)?;
    let (block_len, i) = get_u64_be(i, "key block length")?;
    let (body_len, _) = get_u64_be(i, "key body length")?;
    if index_entries != num_entries || block_len != blocks_len {
        return Err(MdictError::DecodeError(
            "Key index disagrees with the key section preamble".into(),
        ));
    }

    let (body, rest) = read_block(rest, block_len, body_len, "key block")?;
    Ok((
        Section {
            num_entries,
            first_key,
            last_key,
            body,
        },
        rest,
    ))
}

fn read_record_section(data: &[u8]) -> MdictResult<(Section, &[u8])> {
    let (blocks, rest) = get_u64_be(data, "record block count")?;
    let (num_entries, rest) = get_u64_be(rest, "entry count")?;
    let (index_len, rest) = get_u64_be(rest, "record index length")?;
    let (blocks_len, rest) = get_u64_be(rest, "record blocks length")?;
    ensure_single_block(blocks, "record")?;
    if index_len != 2 * SIZE_OF_U64 as u64 {
        return Err(MdictError::DecodeError(
            format!("Invalid record index length {}", index_len).into(),
        ));
    }
    let (block_len, rest) = get_u64_be(rest, "record block length")?;
    let (body_len, rest) = get_u64_be(rest, "record body length")?;
    if block_len != blocks_len {
        return Err(MdictError::DecodeError(
            "Record index disagrees with the record section preamble".into(),
        ));
    }
    let (body, rest) = read_block(rest, block_len, body_len, "record block")?;
    Ok((
        Section {
            num_entries,
            first_key: String::new(),
            last_key: String::new(),
            body,
        },
        rest,
    ))
}

/// Splits a decompressed key block body into `(value offset, key)` pairs.
fn split_key_records(mut body: &[u8], encoding: TextEncoding) -> MdictResult<Vec<(u64, String)>> {
    let mut keys = Vec::new();
    let mut previous = 0;
    while !body.is_empty() {
        let (offset, rest) = get_u64_be(body, "value offset")?;
        if offset < previous {
            return Err(MdictError::DecodeError(
                format!("Value offsets go backwards at key record {}", keys.len()).into(),
            ));
        }
        let end = encoding
            .find_terminator(rest)
            .ok_or_else(|| MdictError::DecodeError("Key record is not terminated".into()))?;
        keys.push((offset, encoding.decode(&rest[..end])?));
        body = &rest[end + encoding.terminator().len()..];
        previous = offset;
    }
    Ok(keys)
}
