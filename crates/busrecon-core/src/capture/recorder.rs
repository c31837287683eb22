//! Gap-based capture recorder
//!
//! The bus under study has no known start/end markers, so frames are
//! delimited purely by silence: whenever the idle gap after a byte exceeds
//! the configured threshold, the accumulated run is sealed into a
//! [`RawFrame`]. The recorder blocks on its source; [`CaptureRecorder::spawn`]
//! moves that blocking loop onto a dedicated thread while callers inspect
//! the sealed frames concurrently.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::container::CaptureWriter;
use super::source::{BusSource, SourceRead, TimedByte};
use super::{Capture, CaptureError, RawFrame};

/// Default idle gap that seals a frame, in milliseconds
pub const DEFAULT_GAP_THRESHOLD_MS: u64 = 50;

/// Recorder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Idle gap that seals a frame, in milliseconds
    pub gap_threshold_ms: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            gap_threshold_ms: DEFAULT_GAP_THRESHOLD_MS,
        }
    }
}

impl RecorderConfig {
    /// Configuration with a specific gap threshold
    pub fn with_gap_ms(gap_threshold_ms: u64) -> Self {
        Self { gap_threshold_ms }
    }

    fn gap_seconds(&self) -> f64 {
        self.gap_threshold_ms as f64 / 1000.0
    }
}

/// Turns a timed byte stream into frames by watching for idle gaps.
///
/// Pure state machine, no I/O: the recorder drives it from a source, tests
/// drive it directly.
#[derive(Debug)]
struct FrameAssembler {
    gap: f64,
    run: Vec<u8>,
    run_start: f64,
    last_byte_at: Option<f64>,
}

impl FrameAssembler {
    fn new(gap: f64) -> Self {
        Self {
            gap,
            run: Vec::new(),
            run_start: 0.0,
            last_byte_at: None,
        }
    }

    /// Feed one byte; returns a sealed frame when this byte follows a gap
    fn push(&mut self, byte: TimedByte) -> Result<Option<RawFrame>, CaptureError> {
        let mut sealed = None;

        if let Some(last) = self.last_byte_at {
            if byte.timestamp < last {
                return Err(CaptureError::ClockWentBackwards {
                    previous: last,
                    current: byte.timestamp,
                });
            }
            if !self.run.is_empty() && byte.timestamp - last > self.gap {
                sealed = self.seal();
            }
        }

        if self.run.is_empty() {
            self.run_start = byte.timestamp;
        }
        self.run.push(byte.byte);
        self.last_byte_at = Some(byte.timestamp);
        Ok(sealed)
    }

    /// Seal the run if the bus has been idle past the gap threshold
    fn check_idle(&mut self, now: f64) -> Option<RawFrame> {
        match self.last_byte_at {
            Some(last) if !self.run.is_empty() && now - last > self.gap => self.seal(),
            _ => None,
        }
    }

    /// Seal whatever is accumulated; zero-length runs never become frames
    fn seal(&mut self) -> Option<RawFrame> {
        if self.run.is_empty() {
            return None;
        }
        let frame = RawFrame::new(self.run_start, std::mem::take(&mut self.run));
        debug!(
            at = frame.timestamp(),
            len = frame.len(),
            "frame sealed"
        );
        Some(frame)
    }
}

/// Running statistics for an in-progress recording
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecorderStats {
    /// Frames sealed so far
    pub frames: usize,
    /// Payload bytes across sealed frames
    pub bytes: usize,
}

/// The result of a recording session.
///
/// A source failure is fatal to the session but everything sealed before it
/// is preserved here, so partial captures remain usable.
#[derive(Debug)]
pub struct RecordingOutcome {
    /// All frames sealed before the session ended
    pub capture: Capture,
    /// The failure that ended the session, if it did not end cleanly
    pub error: Option<CaptureError>,
}

impl RecordingOutcome {
    /// Discard the partial capture on failure
    pub fn into_result(self) -> Result<Capture, CaptureError> {
        match self.error {
            None => Ok(self.capture),
            Some(e) => Err(e),
        }
    }
}

/// Cooperative stop flag shared with a recording loop
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    /// Create an un-tripped signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the recording loop to stop after its current poll
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether a stop has been requested
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Records a capture from a [`BusSource`] using gap-based segmentation
#[derive(Debug, Clone, Default)]
pub struct CaptureRecorder {
    config: RecorderConfig,
}

impl CaptureRecorder {
    /// Create a recorder with the given configuration
    pub fn new(config: RecorderConfig) -> Self {
        Self { config }
    }

    /// Record until the source is exhausted or fails.
    ///
    /// Blocking; suited to replay sources. For live buses prefer
    /// [`CaptureRecorder::spawn`], which adds a stop signal and concurrent
    /// inspection.
    pub fn record<S: BusSource>(&self, source: &mut S) -> RecordingOutcome {
        self.record_with_stop(source, &StopSignal::new())
    }

    /// Record until stop is requested, the source is exhausted, or it fails
    pub fn record_with_stop<S: BusSource>(
        &self,
        source: &mut S,
        stop: &StopSignal,
    ) -> RecordingOutcome {
        let mut capture = Capture::started_at(Utc::now());
        let error = self.run_loop(source, stop, &mut |frame| capture.push(frame));
        info!(
            frames = capture.len(),
            bytes = capture.total_bytes(),
            clean = error.is_none(),
            "recording finished"
        );
        RecordingOutcome { capture, error }
    }

    /// Record while streaming every sealed frame straight into a container
    /// writer, the way the original capture tool wrote its files. On failure
    /// the file retains everything sealed before the error.
    pub fn record_to_writer<S, W>(
        &self,
        source: &mut S,
        writer: &mut CaptureWriter<W>,
        stop: &StopSignal,
    ) -> RecordingOutcome
    where
        S: BusSource,
        W: std::io::Write,
    {
        let mut capture = Capture::started_at(Utc::now());
        let error = self.run_loop(source, stop, &mut |frame| {
            writer.write_frame(&frame)?;
            capture.push(frame)
        });
        RecordingOutcome { capture, error }
    }

    /// Run the recording loop on a dedicated thread.
    ///
    /// The returned handle is the sole way to stop, observe, and collect the
    /// session. The source moves into the thread, so its handle (e.g. an
    /// open serial port) lives exactly as long as the recording.
    pub fn spawn<S>(&self, mut source: S) -> RecorderHandle
    where
        S: BusSource + Send + 'static,
    {
        let shared = Arc::new(SharedState::default());
        let stop = StopSignal::new();
        let recorder = self.clone();

        let thread_shared = Arc::clone(&shared);
        let thread_stop = stop.clone();
        let join = std::thread::spawn(move || {
            let error = recorder.run_loop(&mut source, &thread_stop, &mut |frame| {
                thread_shared.append(frame);
                Ok(())
            });
            if let Some(e) = &error {
                warn!(error = %e, "recording thread stopped on error");
            }
            error
        });

        RecorderHandle {
            shared,
            stop,
            started_at: Utc::now(),
            join,
        }
    }

    /// Core loop shared by every entry point. Returns the error that ended
    /// the session, if any; `sink` receives each sealed frame.
    fn run_loop<S: BusSource>(
        &self,
        source: &mut S,
        stop: &StopSignal,
        sink: &mut dyn FnMut(RawFrame) -> Result<(), CaptureError>,
    ) -> Option<CaptureError> {
        let mut assembler = FrameAssembler::new(self.config.gap_seconds());

        let mut seal_rest = |assembler: &mut FrameAssembler,
                             sink: &mut dyn FnMut(RawFrame) -> Result<(), CaptureError>|
         -> Option<CaptureError> {
            match assembler.seal() {
                Some(frame) => sink(frame).err(),
                None => None,
            }
        };

        loop {
            if stop.is_requested() {
                debug!("stop requested, sealing in-progress frame");
                return seal_rest(&mut assembler, &mut *sink);
            }

            match source.read_chunk() {
                Ok(SourceRead::Bytes(bytes)) => {
                    for byte in bytes {
                        match assembler.push(byte) {
                            Ok(Some(frame)) => {
                                if let Err(e) = sink(frame) {
                                    return Some(e);
                                }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                // Seal what we have, then surface the
                                // integrity error.
                                if let Some(sink_err) = seal_rest(&mut assembler, &mut *sink) {
                                    return Some(sink_err);
                                }
                                return Some(e);
                            }
                        }
                    }
                }
                Ok(SourceRead::Idle { now }) => {
                    if let Some(frame) = assembler.check_idle(now) {
                        if let Err(e) = sink(frame) {
                            return Some(e);
                        }
                    }
                }
                Ok(SourceRead::Eof) => {
                    debug!("source exhausted");
                    return seal_rest(&mut assembler, &mut *sink);
                }
                Err(e) => {
                    if let Some(sink_err) = seal_rest(&mut assembler, &mut *sink) {
                        return Some(sink_err);
                    }
                    return Some(e);
                }
            }
        }
    }
}

/// Frame store shared between the recording thread and inspecting callers.
///
/// Appends are whole, sealed frames only; readers may lag the tail but can
/// never observe a partially-written frame.
#[derive(Debug, Default)]
struct SharedState {
    frames: RwLock<Vec<RawFrame>>,
    frame_count: AtomicUsize,
    byte_count: AtomicU64,
}

impl SharedState {
    fn append(&self, frame: RawFrame) {
        let len = frame.len();
        self.frames
            .write()
            .expect("recorder frame store poisoned")
            .push(frame);
        self.frame_count.fetch_add(1, Ordering::Release);
        self.byte_count.fetch_add(len as u64, Ordering::Release);
    }
}

/// Handle to a recording session running on its own thread
pub struct RecorderHandle {
    shared: Arc<SharedState>,
    stop: StopSignal,
    started_at: chrono::DateTime<Utc>,
    join: JoinHandle<Option<CaptureError>>,
}

impl RecorderHandle {
    /// Ask the session to stop; it seals any in-progress frame first
    pub fn stop(&self) {
        self.stop.request_stop();
    }

    /// Running statistics over sealed frames
    pub fn stats(&self) -> RecorderStats {
        RecorderStats {
            frames: self.shared.frame_count.load(Ordering::Acquire),
            bytes: self.shared.byte_count.load(Ordering::Acquire) as usize,
        }
    }

    /// Snapshot of every frame sealed so far (read-only copy)
    pub fn snapshot(&self) -> Vec<RawFrame> {
        self.shared
            .frames
            .read()
            .expect("recorder frame store poisoned")
            .clone()
    }

    /// Wait for the session to end and collect the capture.
    ///
    /// Call [`RecorderHandle::stop`] first for live sources, which otherwise
    /// record until the source closes.
    pub fn finish(self) -> RecordingOutcome {
        let error = match self.join.join() {
            Ok(error) => error,
            Err(_) => Some(CaptureError::Source("recording thread panicked".into())),
        };

        let frames = Arc::try_unwrap(self.shared)
            .map(|state| state.frames.into_inner().expect("recorder frame store poisoned"))
            .unwrap_or_else(|shared| {
                shared
                    .frames
                    .read()
                    .expect("recorder frame store poisoned")
                    .clone()
            });

        let mut capture = Capture::started_at(self.started_at);
        for frame in frames {
            // Frames were sealed in order; push cannot fail.
            let _ = capture.push(frame);
        }
        RecordingOutcome { capture, error }
    }
}
