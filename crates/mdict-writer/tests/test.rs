use chrono::NaiveDate;
use mdict_writer::{
    assemble::{assemble, SegmentFiles},
    compress::{checksum, decompress},
    CompressionType, DecodedDictionary, DictionaryConfig, DictionaryWriter, KeyOrder, MdictError,
};
use rand::{rngs::StdRng, SeedableRng};

#[ctor::ctor]
fn init() {
    dev_utils::setup_test_log();
}

fn config() -> DictionaryConfig {
    DictionaryConfig::new("Wiktionary English")
        .description("This is an example dictionary.")
        .creation_date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap())
}

struct Built {
    file: Vec<u8>,
    key_body: Vec<u8>,
    record_body: Vec<u8>,
}

fn build<K, V>(config: DictionaryConfig, batches: &[Vec<(K, V)>]) -> Built
where
    K: AsRef<str>,
    V: AsRef<[u8]>,
{
    let mut writer = DictionaryWriter::new(config, Vec::new(), Vec::new());
    for batch in batches {
        writer
            .add(batch.iter().map(|(k, v)| (k.as_ref(), v.as_ref())))
            .unwrap();
    }
    writer.commit().unwrap();
    let mut header = Vec::new();
    let mut key_section = Vec::new();
    let mut record_section = Vec::new();
    // any order is fine once committed
    writer.write_record_section(&mut record_section).unwrap();
    writer.write_key_section(&mut key_section).unwrap();
    writer.write_header(&mut header).unwrap();
    let (key_body, record_body) = writer.into_sinks().unwrap();

    let mut file = Vec::new();
    let parts: [&[u8]; 5] = [
        &header,
        &key_section,
        &key_body,
        &record_section,
        &record_body,
    ];
    let total = assemble(&mut file, parts).unwrap();
    assert_eq!(total as usize, file.len());
    Built {
        file,
        key_body,
        record_body,
    }
}

#[test]
fn doe_ray_round_trip() {
    let built = build(
        config(),
        &[
            vec![("doe", "a deer, a female deer.")],
            vec![("ray", "a drop of golden sun.")],
        ],
    );
    let records = decompress(&built.record_body, CompressionType::Zlib).unwrap();
    assert_eq!(records, b"a deer, a female deer.\0a drop of golden sun.\0");

    let dict = DecodedDictionary::parse(&built.file).unwrap();
    assert_eq!(dict.tag, "Dictionary");
    assert_eq!(dict.attribute("Title"), Some("Wiktionary English"));
    assert_eq!(dict.attribute("CreationDate"), Some("2024-3-9"));
    assert_eq!(dict.attribute("Encoding"), Some("UTF-8"));
    assert_eq!(dict.num_entries, 2);
    assert_eq!(dict.first_key, "doe");
    assert_eq!(dict.last_key, "ray");
    let entries: Vec<_> = dict
        .entries
        .iter()
        .map(|e| (e.key.as_str(), e.value_text().unwrap()))
        .collect();
    assert_eq!(
        entries,
        vec![
            ("doe", "a deer, a female deer."),
            ("ray", "a drop of golden sun.")
        ]
    );
}

#[test]
fn empty_dictionary() {
    let built = build::<&str, &str>(config(), &[]);
    assert!(decompress(&built.record_body, CompressionType::Zlib)
        .unwrap()
        .is_empty());
    let dict = DecodedDictionary::parse(&built.file).unwrap();
    assert_eq!(dict.num_entries, 0);
    assert!(dict.entries.is_empty());
    assert_eq!(dict.first_key, "");
    assert_eq!(dict.last_key, "");
}

#[test]
fn single_entry() {
    let built = build(config(), &[vec![("only", "<b>one</b>")]]);
    let dict = DecodedDictionary::parse(&built.file).unwrap();
    assert_eq!(dict.num_entries, 1);
    assert_eq!(dict.first_key, "only");
    assert_eq!(dict.last_key, "only");
    assert_eq!(dict.entries[0].value, b"<b>one</b>");
}

#[test]
fn first_and_last_key_span_all_add_calls() {
    let built = build(
        config(),
        &[
            vec![("m", "1"), ("c", "2")],
            vec![("x", "3")],
            vec![("b", "4"), ("q", "5")],
        ],
    );
    let dict = DecodedDictionary::parse(&built.file).unwrap();
    assert_eq!(dict.first_key, "m");
    assert_eq!(dict.last_key, "q");
    let keys: Vec<_> = dict.entries.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, ["m", "c", "x", "b", "q"]);
}

#[test]
fn random_text_round_trip() {
    let mut rng = StdRng::seed_from_u64(7);
    let entries = dev_utils::random_entries(&mut rng, 2000);
    let batches: Vec<Vec<(String, String)>> = entries.chunks(37).map(|c| c.to_vec()).collect();
    let built = build(config(), &batches);

    // value offsets add up to the record body size
    let keys = decompress(&built.key_body, CompressionType::Zlib).unwrap();
    let records = decompress(&built.record_body, CompressionType::Zlib).unwrap();
    let expected: usize = entries.iter().map(|(_, v)| v.len() + 1).sum();
    assert_eq!(records.len(), expected);
    let last_offset_pos = keys.len() - entries.last().unwrap().0.len() - 1 - 8;
    let offset_bytes = &keys[last_offset_pos..][..8];
    let last_offset = u64::from_be_bytes(offset_bytes.try_into().unwrap());
    assert_eq!(
        last_offset as usize + entries.last().unwrap().1.len() + 1,
        records.len()
    );

    let dict = DecodedDictionary::parse(&built.file).unwrap();
    assert_eq!(dict.num_entries, entries.len() as u64);
    for (decoded, (key, value)) in dict.entries.iter().zip(&entries) {
        assert_eq!(&decoded.key, key);
        assert_eq!(decoded.value_text().unwrap(), value);
    }
}

#[test]
fn resource_archive_round_trip() {
    let mut rng = StdRng::seed_from_u64(11);
    let resources = dev_utils::random_resources(&mut rng, 50);
    let built = build(config().resource_archive(true), &[resources.clone()]);

    let dict = DecodedDictionary::parse(&built.file).unwrap();
    assert_eq!(dict.tag, "Library_Data");
    assert!(dict.is_resource_archive);
    assert_eq!(dict.attribute("Encoding"), None);
    assert_eq!(dict.first_key, resources[0].0);
    assert_eq!(dict.last_key, resources[49].0);
    for (decoded, (key, value)) in dict.entries.iter().zip(&resources) {
        assert_eq!(&decoded.key, key);
        assert_eq!(&decoded.value, value);
    }

    let records = decompress(&built.record_body, CompressionType::Zlib).unwrap();
    let expected: usize = resources.iter().map(|(_, v)| v.len()).sum();
    assert_eq!(records.len(), expected);
}

#[test]
fn block_checksums_cover_uncompressed_bodies() {
    let built = build(config(), &[vec![("alpha", "a"), ("beta", "b")]]);
    let keys = decompress(&built.key_body, CompressionType::Zlib).unwrap();
    let records = decompress(&built.record_body, CompressionType::Zlib).unwrap();

    // The block headers sit right before each body in the assembled file.
    let key_body_at = find(&built.file, &built.key_body);
    let header = &built.file[key_body_at - 8..key_body_at];
    assert_eq!(&header[..4], &2u32.to_le_bytes());
    assert_eq!(&header[4..], &checksum(&keys).to_be_bytes());

    let record_body_at = built.file.len() - built.record_body.len();
    let header = &built.file[record_body_at - 8..record_body_at];
    assert_eq!(&header[4..], &checksum(&records).to_be_bytes());
}

fn find(haystack: &[u8], needle: &[u8]) -> usize {
    haystack
        .windows(needle.len())
        .position(|w| w == needle)
        .unwrap()
}

#[test]
fn corruption_is_detected() {
    let built = build(config(), &[vec![("alpha", "a"), ("beta", "b")]]);

    let mut file = built.file.clone();
    // inside the header text
    file[10] ^= 0x01;
    assert!(matches!(
        DecodedDictionary::parse(&file),
        Err(MdictError::DecodeChecksumMismatchError("header"))
    ));

    let mut file = built.file.clone();
    let len = file.len();
    file.truncate(len - 1);
    assert!(DecodedDictionary::parse(&file).is_err());

    let mut file = built.file.clone();
    file.push(0);
    assert!(matches!(
        DecodedDictionary::parse(&file),
        Err(MdictError::DecodeError(_))
    ));
}

#[test]
fn ascending_keys_build_a_valid_file() {
    let built = build(
        config().key_order(KeyOrder::Ascending),
        &[vec![("able", "1"), ("Baker", "2"), ("charlie", "3")]],
    );
    let dict = DecodedDictionary::parse(&built.file).unwrap();
    assert_eq!(dict.first_key, "able");
    assert_eq!(dict.last_key, "charlie");
}

#[test]
fn segment_files_build_and_merge() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("sample.mdx");
    let files = SegmentFiles::new(&output);
    let index = files
        .build(config(), |w| {
            w.add([("doe", "a deer, a female deer.")])?;
            w.add([("ray", "a drop of golden sun.")])?;
            Ok::<_, MdictError>(())
        })
        .unwrap();
    assert_eq!(index.num_entries, 2);
    for part in files.parts() {
        assert!(!part.exists());
    }
    let data = std::fs::read(&output).unwrap();
    let dict = DecodedDictionary::parse(&data).unwrap();
    assert_eq!(dict.entries.len(), 2);
    assert_eq!(dict.entries[1].value_text(), Some("a drop of golden sun."));
}

#[test]
fn segment_files_can_be_kept() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("sample.mdd");
    let files = SegmentFiles::new(&output).keep_parts(true);
    files
        .build(config().resource_archive(true), |w| {
            w.add_entry("\\img\\a.png", [1u8, 2, 3])
        })
        .unwrap();
    let mut total = 0;
    for part in files.parts() {
        total += std::fs::metadata(part).unwrap().len();
    }
    assert_eq!(total, std::fs::metadata(&output).unwrap().len());
}

#[test]
fn segment_files_clean_up_on_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("broken.mdx");
    let files = SegmentFiles::new(&output);
    let err = files
        .build(config(), |w| w.add_entry("bad", [0xffu8]))
        .unwrap_err();
    assert!(matches!(err, MdictError::InvalidValue(_)));
    assert!(!output.exists());
    for part in files.parts() {
        assert!(!part.exists());
    }
}

#[test]
fn segment_files_remove_partial_output_when_merge_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("partial.mdx");
    let files = SegmentFiles::new(&output);
    let record_body = files.parts()[4].clone();
    let err = files
        .build(config(), |w| {
            w.add_entry("doe", "a deer")?;
            // the merge then fails to open this part after creating the output
            std::fs::remove_file(&record_body).map_err(MdictError::from)
        })
        .unwrap_err();
    assert!(matches!(err, MdictError::SinkWrite(_)));
    assert!(!output.exists());
    for part in files.parts() {
        assert!(!part.exists());
    }
}
