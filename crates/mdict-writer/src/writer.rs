use std::io::Write;

use bytes::BufMut;
use chrono::NaiveDate;
use flate2::Compression;
use mdict_common::{MdictError, MdictResult};
use tracing::{debug, trace};

use crate::{
    compress::{block_header, frame, CompressionType, RunningChecksum, ZlibBodyWriter},
    encoding::TextEncoding,
    header::Header,
    SIZE_OF_U16, SIZE_OF_U32, SIZE_OF_U64,
};

/// Both block bodies and the key index are zlib compressed.
const BODY_COMPRESSION: CompressionType = CompressionType::Zlib;
/// Only one key block and one record block are ever written. Supporting more
/// means replacing the single body per section with a list of block
/// descriptors (first/last key, sizes) and one index entry per block.
const BLOCK_COUNT: u64 = 1;

/// How keys are expected to arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyOrder {
    /// Keys are written exactly in the order they are added.
    #[default]
    Arrival,
    /// Keys must be added in ascending case-insensitive order. An
    /// out-of-order key is rejected with [`MdictError::UnsortedKey`].
    Ascending,
}

#[derive(Debug, Clone)]
pub struct DictionaryConfig {
    title: String,
    description: String,
    creation_date: NaiveDate,
    is_resource_archive: bool,
    key_order: KeyOrder,
    compression_level: Compression,
}

impl DictionaryConfig {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            creation_date: chrono::Local::now().date_naive(),
            is_resource_archive: false,
            key_order: KeyOrder::default(),
            compression_level: Compression::default(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn creation_date(mut self, date: NaiveDate) -> Self {
        self.creation_date = date;
        self
    }

    /// Writes an `.mdd` resource archive instead of an `.mdx` text
    /// dictionary: values are raw bytes, keys are UTF-16LE and values get no
    /// terminator.
    pub fn resource_archive(mut self, is_resource_archive: bool) -> Self {
        self.is_resource_archive = is_resource_archive;
        self
    }

    pub fn key_order(mut self, key_order: KeyOrder) -> Self {
        self.key_order = key_order;
        self
    }

    pub fn compression_level(mut self, level: Compression) -> Self {
        self.compression_level = level;
        self
    }

    pub fn encoding(&self) -> TextEncoding {
        if self.is_resource_archive {
            TextEncoding::Utf16Le
        } else {
            TextEncoding::Utf8
        }
    }

    pub fn header(&self) -> Header {
        Header {
            title: self.title.clone(),
            description: self.description.clone(),
            creation_date: self.creation_date,
            is_resource_archive: self.is_resource_archive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Building,
    Committed,
    Done,
    /// A sink failed. Everything written so far must be discarded.
    Failed,
}

impl WriterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriterState::Building => "building",
            WriterState::Committed => "committed",
            WriterState::Done => "done",
            WriterState::Failed => "failed",
        }
    }
}

/// A key as stored in the key index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKey {
    /// Encoded key including the terminator.
    pub bytes: Vec<u8>,
    /// Length of the key in code units, without the terminator.
    pub unit_len: u16,
}

impl IndexKey {
    fn empty(encoding: TextEncoding) -> Self {
        Self {
            bytes: encoding.terminator().to_vec(),
            unit_len: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodySummary {
    pub compressed_len: u64,
    pub uncompressed_len: u64,
    pub checksum: u32,
}

impl BodySummary {
    /// Size of the block as referenced from the index: the block header plus
    /// the compressed body.
    pub fn block_len(&self) -> u64 {
        crate::compress::BLOCK_HEADER_LEN as u64 + self.compressed_len
    }
}

/// Summary of a committed dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryIndex {
    pub num_entries: u64,
    pub first_key: Option<IndexKey>,
    pub last_key: Option<IndexKey>,
    pub key_body: BodySummary,
    pub record_body: BodySummary,
}

/// A compressed block body together with the checksum of its uncompressed
/// stream.
struct BlockBody<W: Write> {
    compressor: ZlibBodyWriter<W>,
    checksum: RunningChecksum,
}

impl<W: Write> BlockBody<W> {
    fn new(sink: W, level: Compression) -> Self {
        Self {
            compressor: ZlibBodyWriter::new(sink, level),
            checksum: RunningChecksum::new(),
        }
    }

    fn write(&mut self, data: &[u8]) -> MdictResult<()> {
        self.checksum.update(data);
        self.compressor.write(data)
    }

    fn summary(&self) -> BodySummary {
        BodySummary {
            compressed_len: self.compressor.compressed_len(),
            uncompressed_len: self.compressor.uncompressed_len(),
            checksum: self.checksum.value(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct SectionsWritten {
    header: bool,
    key_section: bool,
    record_section: bool,
}

impl SectionsWritten {
    fn all(&self) -> bool {
        self.header && self.key_section && self.record_section
    }
}

/// Streams a dictionary into the five segments of an MDict file.
///
/// The key block body and record block body are compressed straight into
/// `K` and `R` while entries are added. After [`Self::commit`] the three
/// metadata segments can be written to any sinks, in any order. The final
/// file is the concatenation of
/// `header, key section, K, record section, R`; see [`crate::assemble`].
pub struct DictionaryWriter<K: Write, R: Write> {
    header: Header,
    encoding: TextEncoding,
    is_resource_archive: bool,
    key_order: KeyOrder,
    compression_level: Compression,
    key_body: BlockBody<K>,
    record_body: BlockBody<R>,
    state: WriterState,
    written: SectionsWritten,
    num_entries: u64,
    total_record_len: u64,
    first_key: Option<IndexKey>,
    last_key: Option<IndexKey>,
    // Lowercased previous key, tracked only for `KeyOrder::Ascending`.
    previous_key: Option<String>,
    scratch: Vec<u8>,
}

impl<K: Write, R: Write> DictionaryWriter<K, R> {
    pub fn new(config: DictionaryConfig, key_body_sink: K, record_body_sink: R) -> Self {
        let level = config.compression_level;
        Self {
            header: config.header(),
            encoding: config.encoding(),
            is_resource_archive: config.is_resource_archive,
            key_order: config.key_order,
            compression_level: level,
            key_body: BlockBody::new(key_body_sink, level),
            record_body: BlockBody::new(record_body_sink, level),
            state: WriterState::Building,
            written: SectionsWritten::default(),
            num_entries: 0,
            total_record_len: 0,
            first_key: None,
            last_key: None,
            previous_key: None,
            scratch: Vec::with_capacity(256),
        }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn num_entries(&self) -> u64 {
        self.num_entries
    }

    fn ensure_state(&self, op: &'static str, expected: WriterState) -> MdictResult<()> {
        if self.state != expected {
            return Err(MdictError::Sequencing {
                op,
                state: self.state.as_str(),
            });
        }
        Ok(())
    }

    /// Marks the writer as failed if `result` is an error.
    fn poison<T>(&mut self, result: MdictResult<T>) -> MdictResult<T> {
        if matches!(result, Err(MdictError::SinkWrite(_))) {
            self.state = WriterState::Failed;
        }
        result
    }

    /// Adds entries in iteration order.
    ///
    /// Values of a text dictionary must be UTF-8 text. Values of a resource
    /// archive are written unmodified.
    pub fn add<I, Key, Value>(&mut self, entries: I) -> MdictResult<()>
    where
        I: IntoIterator<Item = (Key, Value)>,
        Key: AsRef<str>,
        Value: AsRef<[u8]>,
    {
        self.ensure_state("add", WriterState::Building)?;
        for (key, value) in entries {
            let result = self.add_one(key.as_ref(), value.as_ref());
            self.poison(result)?;
        }
        Ok(())
    }

    pub fn add_entry(&mut self, key: &str, value: impl AsRef<[u8]>) -> MdictResult<()> {
        self.add([(key, value)])
    }

    fn add_one(&mut self, key: &str, value: &[u8]) -> MdictResult<()> {
        let folded_key = self.check_key_order(key)?;
        let value_text = if self.is_resource_archive {
            None
        } else {
            Some(std::str::from_utf8(value).map_err(|e| {
                MdictError::InvalidValue(
                    format!("value of {:?} is not valid UTF-8: {}", key, e).into(),
                )
            })?)
        };

        // key record: value offset + key + terminator
        self.scratch.clear();
        self.scratch.put_u64(self.total_record_len);
        self.encoding.encode_into(key, &mut self.scratch);
        let key_bytes_len = self.scratch.len() - SIZE_OF_U64;
        let unit_len = u16::try_from(key_bytes_len / self.encoding.unit_width())
            .map_err(|_| MdictError::InvalidValue(format!("key {:?} is too long", key).into()))?;
        self.scratch.put_slice(self.encoding.terminator());
        let index_key = IndexKey {
            bytes: self.scratch[SIZE_OF_U64..].to_vec(),
            unit_len,
        };
        self.key_body.write(&self.scratch)?;
        if self.first_key.is_none() {
            self.first_key = Some(index_key.clone());
        }
        self.last_key = Some(index_key);

        // value record
        let record_len = match value_text {
            Some(text) => {
                self.scratch.clear();
                self.encoding.encode_into(text, &mut self.scratch);
                self.scratch.put_slice(self.encoding.terminator());
                self.record_body.write(&self.scratch)?;
                self.scratch.len()
            }
            None => {
                self.record_body.write(value)?;
                value.len()
            }
        };

        trace!(
            key,
            offset = self.total_record_len,
            len = record_len,
            "added entry"
        );
        self.total_record_len += record_len as u64;
        self.num_entries += 1;
        if folded_key.is_some() {
            self.previous_key = folded_key;
        }
        Ok(())
    }

    /// Returns the folded key to remember once the entry has been written.
    fn check_key_order(&self, key: &str) -> MdictResult<Option<String>> {
        if self.key_order != KeyOrder::Ascending {
            return Ok(None);
        }
        let folded = key.to_lowercase();
        if let Some(previous) = &self.previous_key {
            if folded < *previous {
                return Err(MdictError::UnsortedKey {
                    previous: previous.as_str().into(),
                    key: key.into(),
                });
            }
        }
        Ok(Some(folded))
    }

    /// Finishes both block bodies. No entries can be added afterwards.
    pub fn commit(&mut self) -> MdictResult<()> {
        self.ensure_state("commit", WriterState::Building)?;
        let result = self
            .key_body
            .compressor
            .finish()
            .and_then(|_| self.record_body.compressor.finish());
        self.poison(result)?;
        self.state = WriterState::Committed;
        debug!(
            entries = self.num_entries,
            key_body = self.key_body.compressor.compressed_len(),
            record_body = self.record_body.compressor.compressed_len(),
            "committed dictionary bodies"
        );
        Ok(())
    }

    /// The summary of the committed dictionary.
    pub fn index(&self) -> MdictResult<DictionaryIndex> {
        if !matches!(self.state, WriterState::Committed | WriterState::Done) {
            return Err(MdictError::Sequencing {
                op: "index",
                state: self.state.as_str(),
            });
        }
        Ok(DictionaryIndex {
            num_entries: self.num_entries,
            first_key: self.first_key.clone(),
            last_key: self.last_key.clone(),
            key_body: self.key_body.summary(),
            record_body: self.record_body.summary(),
        })
    }

    fn write_section<W: Write>(
        &mut self,
        op: &'static str,
        already_written: bool,
        sink: &mut W,
        data: &[u8],
    ) -> MdictResult<()> {
        self.ensure_state(op, WriterState::Committed)?;
        if already_written {
            return Err(MdictError::Sequencing {
                op,
                state: "past this section",
            });
        }
        let result = sink.write_all(data).map_err(MdictError::from);
        self.poison(result)?;
        debug!(section = op, len = data.len(), "wrote section");
        Ok(())
    }

    fn mark_written(&mut self, f: impl FnOnce(&mut SectionsWritten)) {
        f(&mut self.written);
        if self.written.all() {
            self.state = WriterState::Done;
        }
    }

    /// Writes the header segment.
    pub fn write_header<W: Write>(&mut self, sink: &mut W) -> MdictResult<()> {
        let data = self.header.encode();
        self.write_section("write_header", self.written.header, sink, &data)?;
        self.mark_written(|w| w.header = true);
        Ok(())
    }

    /// Writes the key section: preamble, preamble checksum, framed key index
    /// and the header of the key block body.
    pub fn write_key_section<W: Write>(&mut self, sink: &mut W) -> MdictResult<()> {
        self.ensure_state("write_key_section", WriterState::Committed)?;
        let data = self.encode_key_section();
        self.write_section("write_key_section", self.written.key_section, sink, &data)?;
        self.mark_written(|w| w.key_section = true);
        Ok(())
    }

    /// Writes the record section: preamble, record index and the header of
    /// the record block body.
    pub fn write_record_section<W: Write>(&mut self, sink: &mut W) -> MdictResult<()> {
        self.ensure_state("write_record_section", WriterState::Committed)?;
        let data = self.encode_record_section();
        self.write_section(
            "write_record_section",
            self.written.record_section,
            sink,
            &data,
        )?;
        self.mark_written(|w| w.record_section = true);
        Ok(())
    }

    /// ┌───────────────────────────────────────────────────────────────────────────────────┐
    /// │ Key Section                                                                       │
    /// │┌ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ┬ ─ ─ ─ ─ ─ ┬ ─ ─ ─ ─ ─ ┬ ─ ─ ─ ─ ─ ─ ─ │
    /// │  blocks │ entries │ index len │ framed len │ blocks len │ checksum │ framed index ││
    /// ││ u64    │  u64    │   u64     │    u64     │    u64     │ u32 (BE) │    bytes      │
    /// │ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ┘─ ─ ─ ─ ─ ─┘─ ─ ─ ─ ─ ─┘─ ─ ─ ─ ─ ─ ─ ┘│
    /// └───────────────────────────────────────────────────────────────────────────────────┘
    ///
    /// followed by the block header of the key block body. The index is
    ///
    /// ┌────────────────────────────────────────────────────────────────────────────────┐
    /// │ Key Index                                                                      │
    /// │┌ ─ ─ ─ ─ ┬ ─ ─ ─ ─ ─ ┬ ─ ─ ─ ─ ─ ┬ ─ ─ ─ ─ ─ ┬ ─ ─ ─ ─ ─┬ ─ ─ ─ ─ ─ ┬ ─ ─ ─ ─ ─ │
    /// │  entries │ first len │ first key │ last len  │ last key │ block len │ body len ││
    /// ││  u64    │    u16    │   bytes   │    u16    │   bytes  │    u64    │   u64     │
    /// │ ─ ─ ─ ─ ┘─ ─ ─ ─ ─ ─┘─ ─ ─ ─ ─ ─┘─ ─ ─ ─ ─ ─┘─ ─ ─ ─ ─ ┘─ ─ ─ ─ ─ ─┘─ ─ ─ ─ ─ ┘│
    /// └────────────────────────────────────────────────────────────────────────────────┘
    ///
    /// All integers are big-endian.
    fn encode_key_section(&self) -> Vec<u8> {
        let body = self.key_body.summary();
        let empty = IndexKey::empty(self.encoding);
        let first_key = self.first_key.as_ref().unwrap_or(&empty);
        let last_key = self.last_key.as_ref().unwrap_or(&empty);

        let mut index = Vec::with_capacity(
            SIZE_OF_U64 * 3 + SIZE_OF_U16 * 2 + first_key.bytes.len() + last_key.bytes.len(),
        );
        index.put_u64(self.num_entries);
        index.put_u16(first_key.unit_len);
        index.put_slice(&first_key.bytes);
        index.put_u16(last_key.unit_len);
        index.put_slice(&last_key.bytes);
        index.put_u64(body.block_len());
        index.put_u64(body.uncompressed_len);
        let framed = frame(&index, BODY_COMPRESSION, self.compression_level);

        let mut preamble = Vec::with_capacity(SIZE_OF_U64 * 5);
        preamble.put_u64(BLOCK_COUNT);
        preamble.put_u64(self.num_entries);
        preamble.put_u64(index.len() as u64);
        preamble.put_u64(framed.len() as u64);
        preamble.put_u64(body.block_len());

        let mut buf = Vec::with_capacity(preamble.len() + SIZE_OF_U32 + framed.len() + 8);
        buf.put_slice(&preamble);
        buf.put_u32(crate::compress::checksum(&preamble));
        buf.put_slice(&framed);
        buf.put_slice(&block_header(BODY_COMPRESSION, body.checksum));
        buf
    }

    /// ┌─────────────────────────────────────────────────────────────────────────────┐
    /// │ Record Section                                                              │
    /// │┌ ─ ─ ─ ─ ┬ ─ ─ ─ ─ ─ ┬ ─ ─ ─ ─ ─ ─ ┬ ─ ─ ─ ─ ─ ─ ┬ ─ ─ ─ ─ ─ ─ ┬ ─ ─ ─ ─ ─ ─ │
    /// │  blocks  │ entries   │ index len   │ blocks len  │ block len   │ body len   ││
    /// ││  u64    │   u64     │    u64      │    u64      │    u64      │    u64      │
    /// │ ─ ─ ─ ─ ┘─ ─ ─ ─ ─ ─┘─ ─ ─ ─ ─ ─ ─┘─ ─ ─ ─ ─ ─ ─┴ ─ ─ ─ ─ ─ ─ ┴ ─ ─ ─ ─ ─ ┘│
    /// └─────────────────────────────────────────────────────────────────────────────┘
    ///
    /// The last two fields are the unframed record index. All integers are
    /// big-endian. The block header of the record block body follows.
    fn encode_record_section(&self) -> Vec<u8> {
        let body = self.record_body.summary();

        let mut index = Vec::with_capacity(SIZE_OF_U64 * 2);
        index.put_u64(body.block_len());
        index.put_u64(body.uncompressed_len);

        let mut buf = Vec::with_capacity(SIZE_OF_U64 * 6 + 8);
        buf.put_u64(BLOCK_COUNT);
        buf.put_u64(self.num_entries);
        buf.put_u64(index.len() as u64);
        buf.put_u64(body.block_len());
        buf.put_slice(&index);
        buf.put_slice(&block_header(BODY_COMPRESSION, body.checksum));
        buf
    }

    /// Returns the two block body sinks. Only valid after [`Self::commit`].
    pub fn into_sinks(self) -> MdictResult<(K, R)> {
        self.ensure_state_any("into_sinks", &[WriterState::Committed, WriterState::Done])?;
        Ok((
            self.key_body.compressor.into_inner()?,
            self.record_body.compressor.into_inner()?,
        ))
    }

    fn ensure_state_any(&self, op: &'static str, expected: &[WriterState]) -> MdictResult<()> {
        if expected.contains(&self.state) {
            Ok(())
        } else {
            Err(MdictError::Sequencing {
                op,
                state: self.state.as_str(),
            })
        }
    }
}
