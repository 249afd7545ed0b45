use std::io::{self, Read, Write};

use adler::Adler32;
use bytes::BufMut;
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use mdict_common::{MdictError, MdictResult};

use crate::SIZE_OF_U32;

/// Size of the `compression type + checksum` prefix in front of every
/// compressed payload.
pub const BLOCK_HEADER_LEN: usize = SIZE_OF_U32 * 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    None,
    Zlib,
}

impl TryFrom<u32> for CompressionType {
    type Error = MdictError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CompressionType::None),
            2 => Ok(CompressionType::Zlib),
            // 1 is LZO, which is readable by some clients but never written here.
            _ => Err(MdictError::UnsupportedCompression(value)),
        }
    }
}

impl From<CompressionType> for u32 {
    fn from(value: CompressionType) -> Self {
        match value {
            CompressionType::None => 0,
            CompressionType::Zlib => 2,
        }
    }
}

/// Adler-32 of `data`, starting from the standard seed of 1.
pub fn checksum(data: &[u8]) -> u32 {
    let mut adler = Adler32::new();
    adler.write_slice(data);
    adler.checksum()
}

/// ┌─────────────────────────────────────┐
/// │ Block Header                        │
/// │┌ ─ ─ ─ ─ ─ ─ ─ ─ ─┬ ─ ─ ─ ─ ─ ─ ─ ─ │
/// │  compression type │   checksum     ││
/// ││     u32 (LE)     │    u32 (BE)     │
/// │ ─ ─ ─ ─ ─ ─ ─ ─ ─ ┘─ ─ ─ ─ ─ ─ ─ ─ ┘│
/// └─────────────────────────────────────┘
pub fn block_header(compression_type: CompressionType, checksum: u32) -> [u8; BLOCK_HEADER_LEN] {
    let mut header = [0u8; BLOCK_HEADER_LEN];
    let mut buf = &mut header[..];
    buf.put_u32_le(compression_type.into());
    buf.put_u32(checksum);
    header
}

pub fn compress(data: &[u8], compression_type: CompressionType, level: Compression) -> Vec<u8> {
    match compression_type {
        CompressionType::None => data.to_vec(),
        CompressionType::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), level);
            // Writing into a Vec cannot fail.
            encoder
                .write_all(data)
                .and_then(|_| encoder.finish())
                .unwrap_or_default()
        }
    }
}

pub fn decompress(data: &[u8], compression_type: CompressionType) -> MdictResult<Vec<u8>> {
    match compression_type {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Zlib => {
            let mut out = Vec::new();
            ZlibDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| MdictError::DecodeError(format!("Invalid zlib data: {}", e).into()))?;
            Ok(out)
        }
    }
}

/// Frames a small in-memory payload: the block header followed by the
/// payload in the requested compression. The checksum always covers the
/// uncompressed payload.
pub fn frame(payload: &[u8], compression_type: CompressionType, level: Compression) -> Vec<u8> {
    let body = compress(payload, compression_type, level);
    let mut buf = Vec::with_capacity(BLOCK_HEADER_LEN + body.len());
    buf.put_slice(&block_header(compression_type, checksum(payload)));
    buf.put_slice(&body);
    buf
}

/// Inverse of [`frame`]. Verifies the checksum of the recovered payload.
pub fn unframe(framed: &[u8]) -> MdictResult<Vec<u8>> {
    if framed.len() < BLOCK_HEADER_LEN {
        return Err(MdictError::DecodeError("Framed block is too short".into()));
    }
    let compression_type = u32::from_le_bytes(framed[..SIZE_OF_U32].try_into().unwrap());
    let expected = u32::from_be_bytes(framed[SIZE_OF_U32..BLOCK_HEADER_LEN].try_into().unwrap());
    let payload = decompress(
        &framed[BLOCK_HEADER_LEN..],
        CompressionType::try_from(compression_type)?,
    )?;
    if checksum(&payload) != expected {
        return Err(MdictError::DecodeChecksumMismatchError("framed block"));
    }
    Ok(payload)
}

/// Counts the bytes that actually reach the inner sink.
#[derive(Debug)]
struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Streams chunks through a zlib compressor into a sink, keeping the
/// cumulative uncompressed and compressed sizes.
///
/// Compressed output is forwarded to the sink as the encoder produces it, so
/// memory use is bounded by the encoder's own window and buffer.
pub struct ZlibBodyWriter<W: Write> {
    encoder: ZlibEncoder<CountingWriter<W>>,
    uncompressed_len: u64,
    finished: bool,
}

impl<W: Write> ZlibBodyWriter<W> {
    pub fn new(sink: W, level: Compression) -> Self {
        Self {
            encoder: ZlibEncoder::new(
                CountingWriter {
                    inner: sink,
                    written: 0,
                },
                level,
            ),
            uncompressed_len: 0,
            finished: false,
        }
    }

    pub fn write(&mut self, chunk: &[u8]) -> MdictResult<()> {
        debug_assert!(!self.finished, "write after finish");
        self.encoder.write_all(chunk)?;
        self.uncompressed_len += chunk.len() as u64;
        Ok(())
    }

    /// Flushes the remaining compressor state and the zlib trailer. Calling
    /// it again is a no-op.
    pub fn finish(&mut self) -> MdictResult<()> {
        if self.finished {
            return Ok(());
        }
        self.encoder.try_finish()?;
        self.encoder.get_mut().flush()?;
        self.finished = true;
        Ok(())
    }

    pub fn uncompressed_len(&self) -> u64 {
        self.uncompressed_len
    }

    /// Bytes handed to the sink so far. Final only after [`Self::finish`].
    pub fn compressed_len(&self) -> u64 {
        self.encoder.get_ref().written
    }

    pub fn into_inner(self) -> MdictResult<W> {
        Ok(self.encoder.finish()?.inner)
    }
}

/// An Adler-32 that can be fed incrementally.
#[derive(Debug, Clone, Copy)]
pub struct RunningChecksum(Adler32);

impl RunningChecksum {
    pub fn new() -> Self {
        Self(Adler32::new())
    }

    pub fn update(&mut self, data: &[u8]) {
        self.0.write_slice(data);
    }

    pub fn value(&self) -> u32 {
        self.0.checksum()
    }
}

impl Default for RunningChecksum {
    fn default() -> Self {
        Self::new()
    }
}
