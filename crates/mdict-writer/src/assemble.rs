//! Joining the five segments written by a [`DictionaryWriter`] into one file.

use std::{
    fs::{self, File},
    io::{self, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use mdict_common::{MdictError, MdictResult};
use tracing::{debug, warn};

use crate::writer::{DictionaryConfig, DictionaryIndex, DictionaryWriter};

/// header, key section, key block body, record section, record block body
pub const SEGMENT_COUNT: usize = 5;

/// Copies every part into `out`, in order. Returns the number of bytes
/// written.
pub fn assemble<W, R, I>(out: &mut W, parts: I) -> MdictResult<u64>
where
    W: Write,
    R: Read,
    I: IntoIterator<Item = R>,
{
    let mut total = 0;
    for mut part in parts {
        total += io::copy(&mut part, out)?;
    }
    out.flush()?;
    Ok(total)
}

/// Concatenates the files at `parts` into a new file at `out`.
pub fn merge_files<P: AsRef<Path>>(out: &Path, parts: &[P]) -> MdictResult<u64> {
    let mut o = BufWriter::new(File::create(out)?);
    let files = parts
        .iter()
        .map(|p| File::open(p.as_ref()))
        .collect::<io::Result<Vec<_>>>()?;
    let total = assemble(&mut o, files)?;
    debug!(path = %out.display(), bytes = total, "merged dictionary segments");
    Ok(total)
}

pub type FileWriter = DictionaryWriter<BufWriter<File>, BufWriter<File>>;

/// Writes a dictionary through five part files next to the output
/// (`<output>.1` to `<output>.5`) and merges them into `<output>`.
#[derive(Debug, Clone)]
pub struct SegmentFiles {
    output: PathBuf,
    parts: [PathBuf; SEGMENT_COUNT],
    keep_parts: bool,
}

impl SegmentFiles {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        let output = output.into();
        let parts = std::array::from_fn(|i| {
            let mut name = output.clone().into_os_string();
            name.push(format!(".{}", i + 1));
            PathBuf::from(name)
        });
        Self {
            output,
            parts,
            keep_parts: false,
        }
    }

    /// Leave the part files on disk after a successful merge.
    pub fn keep_parts(mut self, keep_parts: bool) -> Self {
        self.keep_parts = keep_parts;
        self
    }

    pub fn parts(&self) -> &[PathBuf; SEGMENT_COUNT] {
        &self.parts
    }

    /// Runs `fill` against a fresh writer, then commits, writes the metadata
    /// segments and merges everything into the output file.
    ///
    /// On any error the part files and any partially merged output are
    /// removed.
    pub fn build<E, F>(&self, config: DictionaryConfig, fill: F) -> Result<DictionaryIndex, E>
    where
        E: From<MdictError>,
        F: FnOnce(&mut FileWriter) -> Result<(), E>,
    {
        let result = self.build_parts(config, fill).and_then(|index| {
            if let Err(e) = merge_files(&self.output, &self.parts[..]) {
                remove_file(&self.output);
                return Err(e.into());
            }
            Ok(index)
        });
        if result.is_err() || !self.keep_parts {
            self.remove_parts();
        }
        result
    }

    fn build_parts<E, F>(&self, config: DictionaryConfig, fill: F) -> Result<DictionaryIndex, E>
    where
        E: From<MdictError>,
        F: FnOnce(&mut FileWriter) -> Result<(), E>,
    {
        fn create(path: &Path) -> MdictResult<BufWriter<File>> {
            Ok(BufWriter::new(File::create(path)?))
        }

        let [header, key_section, key_body, record_section, record_body] = &self.parts;
        let mut writer = DictionaryWriter::new(config, create(key_body)?, create(record_body)?);
        fill(&mut writer)?;
        writer.commit()?;

        let mut header = create(header)?;
        let mut key_section = create(key_section)?;
        let mut record_section = create(record_section)?;
        writer.write_header(&mut header)?;
        writer.write_key_section(&mut key_section)?;
        writer.write_record_section(&mut record_section)?;
        let index = writer.index()?;

        let (mut key_body, mut record_body) = writer.into_sinks()?;
        for sink in [
            &mut header,
            &mut key_section,
            &mut key_body,
            &mut record_section,
            &mut record_body,
        ] {
            sink.flush().map_err(MdictError::from)?;
        }
        Ok(index)
    }

    fn remove_parts(&self) {
        for part in &self.parts {
            remove_file(part);
        }
    }
}

fn remove_file(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove file");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn assemble_in_order() {
        let parts: Vec<&[u8]> = vec![b"ab", b"", b"cde", b"f", b"gh"];
        let mut out = Vec::new();
        let n = assemble(&mut out, parts).unwrap();
        assert_eq!(n, 8);
        assert_eq!(out, b"abcdefgh");
    }

    #[test]
    fn part_names() {
        let files = SegmentFiles::new("/tmp/out/sample.mdx");
        assert_eq!(files.parts()[0], PathBuf::from("/tmp/out/sample.mdx.1"));
        assert_eq!(files.parts()[4], PathBuf::from("/tmp/out/sample.mdx.5"));
    }
}
