//! Entry producers for the command line builder.

use std::{
    fs::File,
    io::{BufRead, BufReader, Lines},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: String,
}

/// Parses one input line, either a JSON object or `key<TAB>value`.
pub fn parse_line(line: &str) -> Result<Option<Entry>> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(None);
    }
    if line.trim_start().starts_with('{') {
        return Ok(Some(serde_json::from_str(line)?));
    }
    match line.split_once('\t') {
        Some((key, value)) if !key.is_empty() => Ok(Some(Entry {
            key: key.to_string(),
            value: value.to_string(),
        })),
        _ => bail!("expected a JSON object or `key<TAB>value`"),
    }
}

/// Lazily reads entries from `path`, one per line. Blank lines are skipped.
pub struct Entries<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl<R: BufRead> Iterator for Entries<R> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;
            let line_no = self.line_no;
            let parsed = line
                .map_err(anyhow::Error::from)
                .and_then(|l| parse_line(&l))
                .with_context(|| format!("invalid entry on line {}", line_no));
            match parsed {
                Ok(None) => continue,
                Ok(Some(entry)) => return Some(Ok(entry)),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

pub fn read_entries(path: &Path) -> Result<Entries<BufReader<File>>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(Entries {
        lines: BufReader::new(file).lines(),
        line_no: 0,
    })
}

/// Every regular file under `dir`, keyed `\relative\path` as resource
/// archives expect. Sorted by key.
pub fn collect_resources(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut out = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let read = std::fs::read_dir(&current)
            .with_context(|| format!("failed to list {}", current.display()))?;
        for entry in read {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            let relative = path.strip_prefix(dir)?;
            let mut key = String::new();
            for part in relative.components() {
                key.push('\\');
                key.push_str(&part.as_os_str().to_string_lossy());
            }
            out.push((key, path));
        }
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}
