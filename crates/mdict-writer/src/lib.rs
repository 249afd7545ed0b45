//! # MDict Writer Documentation
//!
//! A streaming writer for MDict dictionaries: `.mdx` files holding HTML
//! entries and `.mdd` resource archives holding raw files. Entries are
//! compressed into their block bodies as they are added, so only the small
//! index structures are held in memory.
//!
//! ## Overall Structure
//!
//! A dictionary file is the concatenation of five segments:
//!
//! ┌──────────────────────────────────────────────────────────────────────────────────────┐
//! │ MDict File                                                                           │
//! │┌ ─ ─ ─ ─ ─ ─ ┬ ─ ─ ─ ─ ─ ─ ─ ─ ┬ ─ ─ ─ ─ ─ ─ ─ ┬ ─ ─ ─ ─ ─ ─ ─ ─ ─ ┬ ─ ─ ─ ─ ─ ─ ─ ─ │
//! │   Header    │  Key Section   │ Key Block Body │  Record Section   │Record Block Body││
//! ││   bytes    │     bytes      │ zlib stream    │      bytes        │  zlib stream    │
//! │ ─ ─ ─ ─ ─ ─ ┘─ ─ ─ ─ ─ ─ ─ ─ ┘─ ─ ─ ─ ─ ─ ─ ─┘─ ─ ─ ─ ─ ─ ─ ─ ─ ─┘─ ─ ─ ─ ─ ─ ─ ─ ┘│
//! └──────────────────────────────────────────────────────────────────────────────────────┘
//!
//! 1. Header: big-endian length, the UTF-16LE header element, little-endian
//!    Adler-32 of the element.
//! 2. Key Section: preamble (block count, entry count, index sizes, block
//!    size), its Adler-32, the framed key index and the block header of the
//!    key block body.
//! 3. Key Block Body: zlib stream of all key records.
//! 4. Record Section: preamble, record index and the block header of the
//!    record block body.
//! 5. Record Block Body: zlib stream of all values.
//!
//! The block bodies are streamed to their own sinks while entries are added.
//! The sections in front of them need the final sizes and checksums, so they
//! can only be written after [`DictionaryWriter::commit`].
//!
//! ## Block Header
//!
//! ┌─────────────────────────────────────┐
//! │ Block Header                        │
//! │┌ ─ ─ ─ ─ ─ ─ ─ ─ ─┬ ─ ─ ─ ─ ─ ─ ─ ─ │
//! │  compression type │   checksum     ││
//! ││     u32 (LE)     │    u32 (BE)     │
//! │ ─ ─ ─ ─ ─ ─ ─ ─ ─ ┘─ ─ ─ ─ ─ ─ ─ ─ ┘│
//! └─────────────────────────────────────┘
//!
//! The checksum is the Adler-32 of the *uncompressed* data. Compression type
//! 0 stores the data as is, 2 is zlib.
//!
//! ## Key Records
//!
//! ┌───────────────────────────────────────────────┐
//! │ Key Record                                    │
//! │┌ ─ ─ ─ ─ ─ ─ ─ ─ ┬ ─ ─ ─ ─ ─ ─ ┬ ─ ─ ─ ─ ─ ─ │
//! │  value offset    │    key     │ terminator ││
//! ││    u64 (BE)     │   bytes    │  1 or 2    │ │
//! │ ─ ─ ─ ─ ─ ─ ─ ─ ┘─ ─ ─ ─ ─ ─ ┘─ ─ ─ ─ ─ ─ ─┘│
//! └───────────────────────────────────────────────┘
//!
//! The value offset is the position of the entry's value inside the
//! uncompressed record block body. Keys are UTF-8 in `.mdx` files and
//! UTF-16LE in `.mdd` files.
//!
//! ## Values
//!
//! Text values are UTF-8 followed by a NUL byte. Resource values are written
//! unmodified.
//!
//! ## Example
//!
//! ```
//! use mdict_writer::{assemble, DictionaryConfig, DictionaryWriter};
//!
//! let config = DictionaryConfig::new("Example").description("Two entries");
//! let mut writer = DictionaryWriter::new(config, Vec::new(), Vec::new());
//! writer.add([("doe", "a deer, a female deer.")]).unwrap();
//! writer.add([("ray", "a drop of golden sun.")]).unwrap();
//! writer.commit().unwrap();
//!
//! let (mut header, mut keys, mut records) = (Vec::new(), Vec::new(), Vec::new());
//! writer.write_header(&mut header).unwrap();
//! writer.write_key_section(&mut keys).unwrap();
//! writer.write_record_section(&mut records).unwrap();
//! let (key_body, record_body) = writer.into_sinks().unwrap();
//!
//! let mut file = Vec::new();
//! let parts: [&[u8]; 5] = [&header, &keys, &key_body, &records, &record_body];
//! assemble::assemble(&mut file, parts).unwrap();
//! ```
pub mod assemble;
pub mod compress;
pub mod decode;
pub mod encoding;
pub mod header;
mod utils;
pub mod writer;

pub use compress::CompressionType;
pub use decode::{DecodedDictionary, DecodedEntry};
pub use encoding::TextEncoding;
pub use header::Header;
pub use mdict_common::{MdictError, MdictResult};
pub use writer::{DictionaryConfig, DictionaryIndex, DictionaryWriter, KeyOrder, WriterState};

pub const SIZE_OF_U16: usize = std::mem::size_of::<u16>();
pub const SIZE_OF_U32: usize = std::mem::size_of::<u32>();
pub const SIZE_OF_U64: usize = std::mem::size_of::<u64>();
