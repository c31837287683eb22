//! Capture container: on-disk round-trips, appends, legacy files

use busrecon_core::capture::{
    read_capture, read_capture_legacy, write_capture, Capture, CaptureError, CaptureWriter,
    RawFrame,
};
use pretty_assertions::assert_eq;
use std::io::Write;

fn sample_capture() -> Capture {
    Capture::from_frames(vec![
        RawFrame::new(0.010, vec![0x10, 0xe0, 0x01, 0x02]),
        RawFrame::new(0.085, vec![0x3e, 0x70, 0x00]),
        RawFrame::new(0.085, vec![0xff]),
        RawFrame::new(1.500, (0..200).collect()),
    ])
    .unwrap()
}

#[test]
fn test_file_roundtrip_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("traffic.brc");

    let capture = sample_capture();
    write_capture(&path, &capture).unwrap();
    let reloaded = read_capture(&path).unwrap();

    assert_eq!(capture.frames(), reloaded.frames());
}

#[test]
fn test_streaming_append_across_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.brc");

    {
        let mut writer = CaptureWriter::create(&path).unwrap();
        writer.write_frame(&RawFrame::new(1.0, vec![0x01])).unwrap();
        writer.finish().unwrap();
    }
    {
        let mut writer = CaptureWriter::append(&path).unwrap();
        writer.write_frame(&RawFrame::new(2.0, vec![0x02])).unwrap();
        writer.finish().unwrap();
    }

    let capture = read_capture(&path).unwrap();
    assert_eq!(capture.len(), 2);
    assert_eq!(capture.frames()[1].bytes(), &[0x02]);
}

#[test]
fn test_append_enforces_monotonic_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mono.brc");

    {
        let mut writer = CaptureWriter::create(&path).unwrap();
        writer.write_frame(&RawFrame::new(5.0, vec![0x01])).unwrap();
        writer.finish().unwrap();
    }

    // A later session may not rewind the clock
    let mut writer = CaptureWriter::append(&path).unwrap();
    let err = writer
        .write_frame(&RawFrame::new(4.0, vec![0x02]))
        .unwrap_err();
    assert!(matches!(err, CaptureError::ClockWentBackwards { .. }));
}

#[test]
fn test_legacy_headerless_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("old_capture.bin");

    // The original tooling wrote struct.pack("<dI") records with no header
    let mut file = std::fs::File::create(&path).unwrap();
    for (ts, payload) in [(0.5f64, vec![0xaa, 0xbb]), (0.9, vec![0xcc])] {
        file.write_all(&ts.to_le_bytes()).unwrap();
        file.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
        file.write_all(&payload).unwrap();
    }
    drop(file);

    let capture = read_capture_legacy(&path).unwrap();
    assert_eq!(capture.len(), 2);
    assert_eq!(capture.frames()[0].bytes(), &[0xaa, 0xbb]);

    // The versioned reader refuses it rather than misparse
    assert!(matches!(read_capture(&path), Err(CaptureError::BadMagic)));
}

#[test]
fn test_partial_trailing_record_reported_with_offset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cut.brc");

    write_capture(&path, &sample_capture()).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

    let mut reader = busrecon_core::capture::CaptureReader::open(&path).unwrap();
    let mut frames = 0;
    let err = loop {
        match reader.next_frame() {
            Ok(Some(_)) => frames += 1,
            Ok(None) => panic!("truncation should surface as an error"),
            Err(e) => break e,
        }
    };
    assert_eq!(frames, 3); // everything before the cut record survives
    assert!(matches!(err, CaptureError::TruncatedRecord(_)));
}
