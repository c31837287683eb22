//! Capture container format
//!
//! Binary, append-only, streamable in both directions:
//!
//! - 8-byte file header: magic `BRCAP`, format version, two reserved bytes
//! - records: `[8-byte f64 LE timestamp][4-byte u32 LE length][payload]`
//!
//! Records carry no separators, so frames can be appended and re-read as a
//! stream without loading the whole file. Earlier captures from the Python
//! tooling used the same record layout with no header at all; the legacy
//! reader handles those.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::Local;
use tracing::debug;

use super::{Capture, CaptureError, RawFrame, MAX_FRAME_LEN};

/// Container magic bytes
pub const MAGIC: &[u8; 5] = b"BRCAP";

/// Current container format version
pub const FORMAT_VERSION: u8 = 1;

/// File extension used by the filename helper
pub const CAPTURE_EXTENSION: &str = "brc";

const HEADER_LEN: u64 = 8;
const RECORD_HEADER_LEN: u64 = 12;

/// Streaming writer for the capture container.
///
/// Frames are flushed record-by-record so a capture interrupted mid-session
/// keeps everything sealed so far.
pub struct CaptureWriter<W: Write> {
    writer: W,
    last_timestamp: Option<f64>,
}

impl CaptureWriter<BufWriter<File>> {
    /// Create a new capture file, writing the versioned header
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file))
    }

    /// Open an existing capture file for append.
    ///
    /// The header is validated and existing records are scanned (streamed,
    /// not loaded) to recover the last timestamp for the monotonicity check.
    pub fn append<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let mut last_timestamp = None;
        {
            let mut reader = CaptureReader::open(&path)?;
            while let Some(frame) = reader.next_frame()? {
                last_timestamp = Some(frame.timestamp());
            }
        }

        let mut file = OpenOptions::new().append(true).open(path)?;
        file.seek(SeekFrom::End(0))?;
        Ok(Self {
            writer: BufWriter::new(file),
            last_timestamp,
        })
    }
}

impl<W: Write> CaptureWriter<W> {
    /// Wrap an arbitrary writer, emitting the container header
    pub fn new(mut writer: W) -> Result<Self, CaptureError> {
        writer.write_all(MAGIC)?;
        writer.write_u8(FORMAT_VERSION)?;
        writer.write_all(&[0u8; 2])?;
        Ok(Self {
            writer,
            last_timestamp: None,
        })
    }

    /// Append one frame record and flush it
    pub fn write_frame(&mut self, frame: &RawFrame) -> Result<(), CaptureError> {
        if frame.len() > MAX_FRAME_LEN as usize {
            return Err(CaptureError::OversizedRecord(frame.len() as u32));
        }
        if let Some(previous) = self.last_timestamp {
            if frame.timestamp() < previous {
                return Err(CaptureError::ClockWentBackwards {
                    previous,
                    current: frame.timestamp(),
                });
            }
        }

        self.writer.write_f64::<LittleEndian>(frame.timestamp())?;
        self.writer.write_u32::<LittleEndian>(frame.len() as u32)?;
        self.writer.write_all(frame.bytes())?;
        self.writer.flush()?;

        self.last_timestamp = Some(frame.timestamp());
        Ok(())
    }

    /// Write every frame of a capture
    pub fn write_capture(&mut self, capture: &Capture) -> Result<(), CaptureError> {
        for frame in capture {
            self.write_frame(frame)?;
        }
        Ok(())
    }

    /// Flush and return the underlying writer
    pub fn finish(mut self) -> Result<W, CaptureError> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Streaming reader for the capture container
#[derive(Debug)]
pub struct CaptureReader<R: Read> {
    reader: R,
    offset: u64,
    last_timestamp: Option<f64>,
}

impl CaptureReader<BufReader<File>> {
    /// Open a capture file, validating the header
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }

    /// Open a headerless capture written by the original Python tooling
    pub fn open_legacy<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            offset: 0,
            last_timestamp: None,
        })
    }
}

impl<R: Read> CaptureReader<R> {
    /// Wrap an arbitrary reader, validating the container header
    pub fn new(mut reader: R) -> Result<Self, CaptureError> {
        let mut magic = [0u8; 5];
        reader.read_exact(&mut magic).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                CaptureError::BadMagic
            } else {
                CaptureError::Io(e)
            }
        })?;
        if &magic != MAGIC {
            return Err(CaptureError::BadMagic);
        }

        let version = reader.read_u8()?;
        if version != FORMAT_VERSION {
            return Err(CaptureError::UnsupportedVersion(version));
        }
        let mut reserved = [0u8; 2];
        reader.read_exact(&mut reserved)?;

        Ok(Self {
            reader,
            offset: HEADER_LEN,
            last_timestamp: None,
        })
    }

    /// Read the next frame record, or `None` at a clean end of stream.
    ///
    /// A record cut off mid-way is a [`CaptureError::TruncatedRecord`]; a
    /// timestamp running backwards is surfaced, never clamped.
    pub fn next_frame(&mut self) -> Result<Option<RawFrame>, CaptureError> {
        let timestamp = match self.reader.read_f64::<LittleEndian>() {
            Ok(ts) => ts,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(CaptureError::Io(e)),
        };

        let length = self
            .reader
            .read_u32::<LittleEndian>()
            .map_err(|e| self.truncation(e))?;
        if length > MAX_FRAME_LEN {
            return Err(CaptureError::OversizedRecord(length));
        }

        let mut payload = vec![0u8; length as usize];
        self.reader
            .read_exact(&mut payload)
            .map_err(|e| self.truncation(e))?;

        if let Some(previous) = self.last_timestamp {
            if timestamp < previous {
                return Err(CaptureError::ClockWentBackwards {
                    previous,
                    current: timestamp,
                });
            }
        }
        self.last_timestamp = Some(timestamp);

        let frame = RawFrame::new(timestamp, payload);
        self.offset += RECORD_HEADER_LEN + frame.len() as u64;
        Ok(Some(frame))
    }

    fn truncation(&self, e: io::Error) -> CaptureError {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            CaptureError::TruncatedRecord(self.offset)
        } else {
            CaptureError::Io(e)
        }
    }
}

impl<R: Read> Iterator for CaptureReader<R> {
    type Item = Result<RawFrame, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}

/// Read an entire capture file into memory
pub fn read_capture<P: AsRef<Path>>(path: P) -> Result<Capture, CaptureError> {
    collect(CaptureReader::open(path)?)
}

/// Read an entire headerless (legacy) capture file into memory
pub fn read_capture_legacy<P: AsRef<Path>>(path: P) -> Result<Capture, CaptureError> {
    collect(CaptureReader::open_legacy(path)?)
}

fn collect(mut reader: CaptureReader<BufReader<File>>) -> Result<Capture, CaptureError> {
    let mut capture = Capture::new();
    while let Some(frame) = reader.next_frame()? {
        capture.push(frame)?;
    }
    debug!(
        frames = capture.len(),
        bytes = capture.total_bytes(),
        "capture loaded"
    );
    Ok(capture)
}

/// Write an entire capture to a new file
pub fn write_capture<P: AsRef<Path>>(path: P, capture: &Capture) -> Result<(), CaptureError> {
    let mut writer = CaptureWriter::create(path)?;
    writer.write_capture(capture)?;
    writer.finish()?;
    Ok(())
}

/// Build a timestamped capture filename inside `dir`,
/// e.g. `captures/capture_20240131_154500.brc`
pub fn capture_filename<P: AsRef<Path>>(dir: P) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    dir.as_ref()
        .join(format!("capture_{}.{}", stamp, CAPTURE_EXTENSION))
}
