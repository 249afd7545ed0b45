use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use mdict_writer::{assemble::SegmentFiles, DecodedDictionary, DictionaryConfig, KeyOrder};
use tracing::info;

mod input;

#[derive(Parser)]
#[command(author, version, about = "Build and inspect MDict dictionaries")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct DictionaryArgs {
    /// Dictionary title shown by readers.
    #[arg(long)]
    title: String,
    /// Short description of the dictionary.
    #[arg(long, default_value = "")]
    description: String,
    /// Creation date as YYYY-MM-DD. Defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,
    /// Keep the five part files next to the output.
    #[arg(long)]
    keep_parts: bool,
}

impl DictionaryArgs {
    fn config(&self) -> DictionaryConfig {
        let mut config = DictionaryConfig::new(&self.title).description(&self.description);
        if let Some(date) = self.date {
            config = config.creation_date(date);
        }
        config
    }
}

#[derive(Subcommand)]
enum Command {
    /// Build an .mdx dictionary from JSON lines (`{"key": .., "value": ..}`)
    /// or tab-separated `key<TAB>html` lines.
    Build {
        /// Input entries file.
        input: PathBuf,
        /// Output .mdx file.
        output: PathBuf,
        #[command(flatten)]
        dictionary: DictionaryArgs,
        /// Reject keys that are not in ascending (case-insensitive) order.
        #[arg(long)]
        ascending: bool,
    },
    /// Build an .mdd resource archive from every file under a directory.
    BuildResources {
        /// Directory holding the resources.
        dir: PathBuf,
        /// Output .mdd file.
        output: PathBuf,
        #[command(flatten)]
        dictionary: DictionaryArgs,
    },
    /// Decode a dictionary, verify its checksums and print its entries.
    Dump {
        /// Dictionary file to read.
        file: PathBuf,
        /// Print at most this many entries.
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Build {
            input,
            output,
            dictionary,
            ascending,
        } => build(input, output, dictionary, ascending),
        Command::BuildResources {
            dir,
            output,
            dictionary,
        } => build_resources(dir, output, dictionary),
        Command::Dump { file, limit } => dump(file, limit),
    }
}

fn build(input: PathBuf, output: PathBuf, args: DictionaryArgs, ascending: bool) -> Result<()> {
    let key_order = if ascending {
        KeyOrder::Ascending
    } else {
        KeyOrder::Arrival
    };
    let config = args.config().key_order(key_order);
    let entries = input::read_entries(&input)?;
    let files = SegmentFiles::new(&output).keep_parts(args.keep_parts);
    let index = files
        .build(config, |writer| {
            for entry in entries {
                let entry = entry?;
                writer
                    .add_entry(&entry.key, entry.value.as_bytes())
                    .with_context(|| format!("failed to add {:?}", entry.key))?;
            }
            Ok::<_, anyhow::Error>(())
        })
        .with_context(|| format!("failed to build {}", output.display()))?;
    info!(entries = index.num_entries, path = %output.display(), "built dictionary");
    Ok(())
}

fn build_resources(dir: PathBuf, output: PathBuf, args: DictionaryArgs) -> Result<()> {
    let config = args.config().resource_archive(true);
    let resources = input::collect_resources(&dir)?;
    let files = SegmentFiles::new(&output).keep_parts(args.keep_parts);
    let index = files
        .build(config, |writer| {
            for (key, path) in &resources {
                let data = std::fs::read(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                writer.add_entry(key, data)?;
            }
            Ok::<_, anyhow::Error>(())
        })
        .with_context(|| format!("failed to build {}", output.display()))?;
    info!(entries = index.num_entries, path = %output.display(), "built resource archive");
    Ok(())
}

fn dump(file: PathBuf, limit: Option<usize>) -> Result<()> {
    let data =
        std::fs::read(&file).with_context(|| format!("failed to read {}", file.display()))?;
    let dict = DecodedDictionary::parse(&data)
        .with_context(|| format!("{} is not a valid dictionary", file.display()))?;
    println!("<{}>", dict.tag);
    for (name, value) in &dict.attributes {
        println!("  {}={:?}", name, value);
    }
    println!(
        "{} entries, first {:?}, last {:?}",
        dict.num_entries, dict.first_key, dict.last_key
    );
    for entry in dict.entries.iter().take(limit.unwrap_or(usize::MAX)) {
        match entry.value_text() {
            Some(text) if !dict.is_resource_archive => println!("{}\t{}", entry.key, text),
            _ => println!("{}\t<{} bytes>", entry.key, entry.value.len()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn args(title: &str) -> DictionaryArgs {
        DictionaryArgs {
            title: title.into(),
            description: "test".into(),
            date: NaiveDate::from_ymd_opt(2024, 2, 29),
            keep_parts: false,
        }
    }

    #[test]
    fn build_from_mixed_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("entries.txt");
        std::fs::write(
            &input,
            "doe\ta deer, a female deer.\n{\"key\": \"ray\", \"value\": \"a drop of golden sun.\"}\n",
        )
        .unwrap();
        let output = dir.path().join("out.mdx");
        build(input, output.clone(), args("Songs"), true).unwrap();

        let dict = DecodedDictionary::parse(&std::fs::read(&output).unwrap()).unwrap();
        assert_eq!(dict.attribute("CreationDate"), Some("2024-2-29"));
        assert_eq!(dict.entries.len(), 2);
        assert_eq!(dict.entries[0].value_text(), Some("a deer, a female deer."));
        assert_eq!(dict.last_key, "ray");
    }

    #[test]
    fn build_rejects_unsorted_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("entries.txt");
        std::fs::write(&input, "b\t1\na\t2\n").unwrap();
        let output = dir.path().join("out.mdx");
        assert!(build(input, output.clone(), args("x"), true).is_err());
        assert!(!output.exists());
    }

    #[test]
    fn build_resource_archive() {
        let dir = tempfile::tempdir().unwrap();
        let res = dir.path().join("res");
        std::fs::create_dir_all(&res).unwrap();
        std::fs::write(res.join("a.css"), b"body{}").unwrap();
        let output = dir.path().join("out.mdd");
        build_resources(res, output.clone(), args("Resources")).unwrap();

        let dict = DecodedDictionary::parse(&std::fs::read(&output).unwrap()).unwrap();
        assert!(dict.is_resource_archive);
        assert_eq!(dict.entries[0].key, "\\a.css");
        assert_eq!(dict.entries[0].value, b"body{}");
        dump(output, Some(1)).unwrap();
    }
}
