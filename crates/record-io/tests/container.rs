//! Write/read tests for the record container on disk.

use record_io::{Compression, RecordError, RecordReader, RecordValue, RecordWriter, ValueKind};
use test_utils::{create_temperature_values, temp_test_dir};

#[test]
fn test_typed_values_survive_a_file() {
    let dir = temp_test_dir();
    let path = dir.path().join("typed.atlas");

    let values = create_temperature_values(1000);
    let mut writer = RecordWriter::new(&path);
    writer.set("grid.name", "F128");
    writer.set("fields.size", 1i64);
    writer.set("fields[0].array", values.clone());
    writer.write().unwrap();

    let reader = RecordReader::open(&path).unwrap();
    assert_eq!(reader.read_string("grid.name").unwrap(), "F128");
    assert_eq!(reader.read_integer("fields.size").unwrap(), 1);
    assert_eq!(reader.read_doubles("fields[0].array").unwrap(), values);
    assert_eq!(reader.doubles_len("fields[0].array").unwrap(), 1000);
    assert_eq!(
        reader.keys().collect::<Vec<_>>(),
        vec!["grid.name", "fields.size", "fields[0].array"]
    );
}

#[test]
fn test_deflate_is_transparent_and_smaller() {
    let dir = temp_test_dir();
    let plain_path = dir.path().join("plain.atlas");
    let packed_path = dir.path().join("packed.atlas");
    let values = vec![273.15; 10_000];

    let mut plain = RecordWriter::new(&plain_path);
    plain.set("a", values.clone());
    plain.write().unwrap();

    let mut packed = RecordWriter::new(&packed_path).with_array_compression(Compression::Deflate);
    packed.set("a", values.clone());
    packed.write().unwrap();

    let plain_len = std::fs::metadata(&plain_path).unwrap().len();
    let packed_len = std::fs::metadata(&packed_path).unwrap().len();
    assert!(packed_len < plain_len / 10);

    let reader = RecordReader::open(&packed_path).unwrap();
    let mut out = vec![0.0; values.len()];
    reader.read_doubles_into("a", &mut out).unwrap();
    assert_eq!(out, values);
}

#[test]
fn test_missing_key_and_type_mismatch() {
    let dir = temp_test_dir();
    let path = dir.path().join("errors.atlas");

    let mut writer = RecordWriter::new(&path);
    writer.set("fields.size", 2i64);
    writer.write().unwrap();

    let reader = RecordReader::open(&path).unwrap();
    assert!(matches!(
        reader.read_string("grid.name"),
        Err(RecordError::KeyNotFound(_))
    ));
    assert!(matches!(
        reader.read_string("fields.size"),
        Err(RecordError::TypeMismatch {
            expected: ValueKind::String,
            found: ValueKind::Integer,
            ..
        })
    ));
    assert_eq!(reader.get("fields.size").unwrap(), RecordValue::Integer(2));
}

#[test]
fn test_read_into_wrong_length() {
    let dir = temp_test_dir();
    let path = dir.path().join("length.atlas");

    let mut writer = RecordWriter::new(&path);
    writer.set("a", vec![1.0, 2.0, 3.0]);
    writer.write().unwrap();

    let reader = RecordReader::open(&path).unwrap();
    let mut out = vec![0.0; 2];
    assert!(matches!(
        reader.read_doubles_into("a", &mut out),
        Err(RecordError::LengthMismatch {
            stored: 3,
            provided: 2,
            ..
        })
    ));
}

#[test]
fn test_corrupted_payload_is_detected() {
    let dir = temp_test_dir();
    let path = dir.path().join("corrupt.atlas");

    let mut writer = RecordWriter::new(&path);
    writer.set("a", vec![1.0, 2.0, 3.0]);
    writer.write().unwrap();

    // Flip a bit inside the first payload, right after the 8-byte header
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[9] ^= 0x01;
    std::fs::write(&path, bytes).unwrap();

    let reader = RecordReader::open(&path).unwrap();
    assert!(matches!(
        reader.read_doubles("a"),
        Err(RecordError::ChecksumMismatch { .. })
    ));
}

#[test]
fn test_open_missing_file() {
    let dir = temp_test_dir();
    assert!(matches!(
        RecordReader::open(dir.path().join("nope.atlas")),
        Err(RecordError::Io(_))
    ));
}

#[test]
fn test_payloads_are_read_on_access() {
    use std::io::{Seek, SeekFrom, Write};

    let dir = temp_test_dir();
    let path = dir.path().join("lazy.atlas");

    let mut writer = RecordWriter::new(&path);
    writer.set("a", vec![1.0, 2.0, 3.0]);
    writer.set("b", vec![4.0]);
    writer.write().unwrap();

    let reader = RecordReader::open(&path).unwrap();
    assert_eq!(reader.read_doubles("a").unwrap(), vec![1.0, 2.0, 3.0]);

    // Damage the first payload after the index has been loaded
    let mut file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.seek(SeekFrom::Start(9)).unwrap();
    file.write_all(&[0xff]).unwrap();
    drop(file);

    assert!(matches!(
        reader.read_doubles("a"),
        Err(RecordError::ChecksumMismatch { .. })
    ));
    assert_eq!(reader.read_doubles("b").unwrap(), vec![4.0]);
}

#[test]
fn test_integer_lists() {
    let dir = temp_test_dir();
    let path = dir.path().join("pl.atlas");

    let mut writer = RecordWriter::new(&path);
    writer.set("grid.pl", vec![20i64, 24, 24, 20]);
    writer.write().unwrap();

    let reader = RecordReader::open(&path).unwrap();
    assert_eq!(reader.kind("grid.pl").unwrap(), ValueKind::Integers);
    assert_eq!(reader.read_integers("grid.pl").unwrap(), vec![20, 24, 24, 20]);
    assert!(matches!(
        reader.read_doubles("grid.pl"),
        Err(RecordError::TypeMismatch { .. })
    ));
}

#[test]
fn test_absurd_raw_length_is_corrupt() {
    let dir = temp_test_dir();
    let path = dir.path().join("hostile.atlas");

    // A valid deflate payload whose index entry claims u64::MAX raw bytes
    let mut writer = RecordWriter::new(&path);
    writer.set_with_compression("s", "abc", Compression::Deflate);
    writer.write().unwrap();
    let bytes = std::fs::read(&path).unwrap();
    let payload_len = bytes.len() - 8 - 16 - index_len(&bytes);

    let payload = &bytes[8..8 + payload_len];
    let index = format!(
        "{{\"format_version\":1,\"entries\":[{{\"key\":\"s\",\"kind\":\"string\",\
         \"compression\":\"deflate\",\"offset\":8,\"length\":{},\
         \"raw_length\":18446744073709551615,\"crc32\":0}}]}}",
        payload_len
    );
    let mut hostile = b"GRBREC01".to_vec();
    hostile.extend_from_slice(payload);
    hostile.extend_from_slice(index.as_bytes());
    hostile.extend_from_slice(&(index.len() as u64).to_le_bytes());
    hostile.extend_from_slice(b"GRBRECIX");
    std::fs::write(&path, hostile).unwrap();

    let reader = RecordReader::open(&path).unwrap();
    assert!(matches!(
        reader.read_string("s"),
        Err(RecordError::Corrupt(_))
    ));
}

fn index_len(container: &[u8]) -> usize {
    let trailer = &container[container.len() - 16..];
    let mut len = [0u8; 8];
    len.copy_from_slice(&trailer[..8]);
    u64::from_le_bytes(len) as usize
}
