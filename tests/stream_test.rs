//! Integration tests for writing, reading and seeking streams

use std::path::Path;

use proptest::prelude::*;
use tempfile::TempDir;

use pgrstream::storage::{pgr_filename, table_entry_position, SIGNATURE_SIZE};
use pgrstream::{
    CameraInfo, Frame, FrameInfo, StreamConfig, StreamError, StreamReader, StreamWriter,
};

fn make_frame(seq: u32, payload_len: usize) -> Frame {
    let info = FrameInfo {
        fingerprint: 0xcafe_babe,
        sequence_id: seq,
        time_seconds: 1_700_000_000 + seq / 15,
        time_microseconds: (seq % 15) * 66_666,
        ..FrameInfo::default()
    };
    let payload: Vec<u8> = (0..payload_len).map(|i| (i as u32 ^ seq) as u8).collect();
    Frame::encode(&info, &payload).unwrap()
}

fn camera() -> CameraInfo {
    CameraInfo {
        serial_base: 5_100_001,
        serial_head: 5_100_002,
        calibration: b"<calibration>opaque</calibration>".to_vec(),
    }
}

fn write_frames(base: &Path, config: StreamConfig, frames: &[Frame]) -> StreamWriter {
    let mut writer = StreamWriter::new(config);
    writer.open(base, camera(), 0).unwrap();
    for frame in frames {
        writer.write_frame(frame.as_bytes()).unwrap();
    }
    writer.close().unwrap();
    writer
}

fn read_all(reader: &mut StreamReader) -> Vec<Frame> {
    let mut frames = Vec::new();
    loop {
        match reader.read_next_frame() {
            Ok(frame) => frames.push(frame),
            Err(StreamError::EndOfStream) => break,
            Err(e) => panic!("unexpected read error: {e}"),
        }
    }
    frames
}

fn small_files() -> StreamConfig {
    StreamConfig {
        size_limit: 32 * 1024,
        index_increment: 4,
        ..StreamConfig::default()
    }
}

#[test]
fn test_empty_stream_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().join("empty");
    write_frames(&base, StreamConfig::default(), &[]);

    let mut reader = StreamReader::open_path(&base).unwrap();
    assert_eq!(reader.total_frames(), 0);
    assert_eq!(reader.file_count(), 1);
    assert!(read_all(&mut reader).is_empty());
    assert!(reader.seek_to_frame(0).is_err());
}

#[test]
fn test_index_slot_ordering_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().join("index");
    let frames: Vec<_> = (0..150).map(|seq| make_frame(seq, 200)).collect();
    write_frames(&base, StreamConfig::default(), &frames);

    let bytes = std::fs::read(pgr_filename(&base, 0)).unwrap();
    let word = |pos: usize| u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap());

    let data_start = word(SIGNATURE_SIZE + 0x94);
    assert_eq!(word(SIGNATURE_SIZE + 0x88), 150);
    assert_eq!(word(SIGNATURE_SIZE + 0x8c), 3);

    for key in 0..3usize {
        let position = table_entry_position(key) as usize;
        assert_eq!(position, SIGNATURE_SIZE + 0x3f0 + (511 - key) * 4);
        assert_eq!(word(position), data_start + (key as u32) * 50 * 328);
    }
}

#[test]
fn test_rollover_keeps_numbering_contiguous() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().join("roll");
    let frames: Vec<_> = (0..300).map(|seq| make_frame(seq, 300 + seq as usize % 500)).collect();
    let writer = write_frames(&base, small_files(), &frames);
    assert_eq!(writer.frames_count(), 300);
    assert!(writer.file_index() > 0);

    let mut reader = StreamReader::new(small_files());
    reader.open(&base, 0).unwrap();
    assert_eq!(reader.total_frames(), 300);
    assert_eq!(reader.file_count() as u32, writer.file_index() + 1);

    let spans = reader.files();
    for (i, pair) in spans.windows(2).enumerate() {
        assert_eq!(pair[0].file_index, i as u32);
        assert_eq!(pair[1].first_frame, pair[0].first_frame + pair[0].frame_count);
    }

    for span in spans {
        let len = std::fs::metadata(pgr_filename(&base, span.file_index))
            .unwrap()
            .len();
        assert!(len < 32 * 1024);
    }

    // sequential reads cross every file boundary without help
    assert_eq!(read_all(&mut reader), frames);
}

#[test]
fn test_open_from_middle_file() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().join("middle");
    let frames: Vec<_> = (0..300).map(|seq| make_frame(seq, 700)).collect();
    write_frames(&base, small_files(), &frames);

    let mut full = StreamReader::new(small_files());
    full.open(&base, 0).unwrap();
    let second = full.files()[1];

    let mut reader = StreamReader::new(small_files());
    reader.open(pgr_filename(&base, 1), 0).unwrap();
    assert_eq!(reader.files()[0].first_frame, 0);
    assert_eq!(reader.total_frames(), 300 - second.first_frame);

    let first = reader.read_next_frame().unwrap();
    assert_eq!(first, frames[second.first_frame as usize]);
}

#[test]
fn test_unsupported_profile_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().join("profile");
    write_frames(&base, StreamConfig::default(), &[make_frame(0, 10)]);

    // resolution tag lives at header offset 0x7c
    let path = pgr_filename(&base, 0);
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[SIGNATURE_SIZE + 0x7c..SIGNATURE_SIZE + 0x80].copy_from_slice(&3u32.to_le_bytes());
    std::fs::write(&path, bytes).unwrap();

    let mut reader = StreamReader::new(StreamConfig::default());
    assert!(matches!(
        reader.open(&base, 0),
        Err(StreamError::UnsupportedProfile { resolution: 3, .. })
    ));
    assert!(!reader.is_open());
    assert!(matches!(reader.close(), Err(StreamError::NotOpen)));
}

#[test]
fn test_probe_stops_at_damaged_file() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().join("probe");
    let frames: Vec<_> = (0..200).map(|seq| make_frame(seq, 700)).collect();
    write_frames(&base, small_files(), &frames);

    let path = pgr_filename(&base, 2);
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0..4].copy_from_slice(b"JUNK");
    std::fs::write(&path, bytes).unwrap();

    let mut reader = StreamReader::new(small_files());
    reader.open(&base, 0).unwrap();
    assert_eq!(reader.file_count(), 2);
    assert_eq!(read_all(&mut reader).len() as u64, reader.total_frames());
}

#[test]
fn test_idempotent_close() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().join("close");
    let mut writer = StreamWriter::create(&base, camera(), 0).unwrap();
    for seq in 0..5 {
        writer.write_frame(make_frame(seq, 50).as_bytes()).unwrap();
    }

    assert!(writer.close().is_ok());
    assert!(matches!(writer.close(), Err(StreamError::NotOpen)));
    assert!(writer.write_frame(make_frame(5, 50).as_bytes()).is_err());

    let mut reader = StreamReader::open_path(&base).unwrap();
    assert_eq!(reader.total_frames(), 5);
    assert_eq!(read_all(&mut reader).len(), 5);
}

#[test]
fn test_drop_finalizes_file() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().join("drop");
    {
        let mut writer = StreamWriter::create(&base, camera(), 0).unwrap();
        for seq in 0..7 {
            writer.write_frame(make_frame(seq, 50).as_bytes()).unwrap();
        }
    }

    let reader = StreamReader::open_path(&base).unwrap();
    assert_eq!(reader.total_frames(), 7);
    assert_eq!(reader.camera_info(), &camera());
}

#[test]
fn test_frame_time_across_files() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().join("time");
    let frames: Vec<_> = (0..150).map(|seq| make_frame(seq, 900)).collect();
    write_frames(&base, small_files(), &frames);

    let mut reader = StreamReader::new(small_files());
    reader.open(&base, 0).unwrap();
    assert!(reader.file_count() > 1);

    for target in [149u64, 0, 75, 31] {
        assert_eq!(
            reader.frame_time(target).unwrap(),
            frames[target as usize].timestamp_ms()
        );
        assert_eq!(reader.current_frame(), target);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_roundtrip(sizes in prop::collection::vec(0usize..2000, 0..120)) {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("prop");
        let frames: Vec<_> = sizes
            .iter()
            .enumerate()
            .map(|(seq, &len)| make_frame(seq as u32, len))
            .collect();
        write_frames(&base, small_files(), &frames);

        let mut reader = StreamReader::new(small_files());
        reader.open(&base, 0).unwrap();
        prop_assert_eq!(reader.total_frames(), frames.len() as u64);
        prop_assert_eq!(read_all(&mut reader), frames);
    }

    #[test]
    fn prop_seek_matches_sequential(
        sizes in prop::collection::vec(0usize..2000, 1..120),
        targets in prop::collection::vec(any::<prop::sample::Index>(), 1..20),
    ) {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("seek");
        let frames: Vec<_> = sizes
            .iter()
            .enumerate()
            .map(|(seq, &len)| make_frame(seq as u32, len))
            .collect();
        write_frames(&base, small_files(), &frames);

        let mut reader = StreamReader::new(small_files());
        reader.open(&base, 0).unwrap();
        for target in targets {
            let k = target.index(frames.len());
            reader.seek_to_frame(k as u64).unwrap();
            prop_assert_eq!(&reader.read_next_frame().unwrap(), &frames[k]);
        }
    }
}
