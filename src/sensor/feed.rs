//! Landmark feed: frames arrive as JSON lines from an external detector.
//!
//! Each line is either an array of `[x, y]` (or `[x, y, z]`) points or `null`
//! for a frame in which nothing was detected. Blank lines are skipped.
//!
//! Lines are read on a background thread so a quiet feed never blocks the
//! capture loop: `capture` waits a short while and then reports
//! [`CaptureError::Pending`]. A read error is reported once and ends the feed.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread;
use std::time::Duration;

use super::types::{CaptureError, FrameSource, LandmarkDetector, SensorError};
use crate::landmarks::LandmarkSet;

/// How long `capture` waits for the next line before giving control back.
const LINE_WAIT: Duration = Duration::from_millis(100);

/// Lines read ahead of the capture loop.
const LINE_BUFFER: usize = 64;

/// One raw feed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFrame {
    pub line: String,
}

/// Reads feed lines from a file or stdin.
#[derive(Debug)]
pub struct FeedSource {
    lines: Receiver<io::Result<String>>,
}

impl FeedSource {
    /// Open a feed. `-` reads from stdin.
    pub fn open(path: &Path) -> Result<Self, SensorError> {
        if path == Path::new("-") {
            return Ok(Self::from_reader(BufReader::new(io::stdin())));
        }
        let file = File::open(path).map_err(|source| SensorError::FeedUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(BufReader::new(file)))
    }

    pub fn from_reader(reader: impl BufRead + Send + 'static) -> Self {
        let (tx, rx) = mpsc::sync_channel(LINE_BUFFER);
        thread::spawn(move || read_lines(reader, tx));
        Self { lines: rx }
    }
}

fn read_lines(reader: impl BufRead, tx: SyncSender<io::Result<String>>) {
    for line in reader.lines() {
        let failed = line.is_err();
        if tx.send(line).is_err() || failed {
            return;
        }
    }
}

impl FrameSource for FeedSource {
    type Frame = FeedFrame;

    fn capture(&mut self) -> Result<FeedFrame, CaptureError> {
        loop {
            match self.lines.recv_timeout(LINE_WAIT) {
                Ok(Ok(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    return Ok(FeedFrame {
                        line: line.to_string(),
                    });
                }
                Ok(Err(e)) => return Err(CaptureError::Failed(e.to_string())),
                Err(RecvTimeoutError::Timeout) => return Err(CaptureError::Pending),
                Err(RecvTimeoutError::Disconnected) => return Err(CaptureError::Exhausted),
            }
        }
    }
}

/// Parses feed lines into landmark sets.
#[derive(Debug, Default)]
pub struct FeedDetector;

impl LandmarkDetector for FeedDetector {
    type Frame = FeedFrame;

    fn detect(&mut self, frame: &FeedFrame) -> Option<LandmarkSet> {
        match serde_json::from_str::<Option<LandmarkSet>>(&frame.line) {
            Ok(set) => set.filter(|s| !s.is_empty()),
            Err(e) => {
                log::warn!("Ignoring malformed feed line: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn next_frame(source: &mut FeedSource) -> Result<FeedFrame, CaptureError> {
        loop {
            match source.capture() {
                Err(CaptureError::Pending) => continue,
                other => return other,
            }
        }
    }

    #[test]
    fn test_reads_lines_until_exhausted() {
        let mut source = FeedSource::from_reader(Cursor::new("[[0.1,0.2]]\n\nnull\n"));
        assert_eq!(next_frame(&mut source).unwrap().line, "[[0.1,0.2]]");
        assert_eq!(next_frame(&mut source).unwrap().line, "null");
        assert!(matches!(next_frame(&mut source), Err(CaptureError::Exhausted)));
    }

    #[test]
    fn test_detects_landmarks_and_absence() {
        let mut detector = FeedDetector;
        let frame = |line: &str| FeedFrame {
            line: line.to_string(),
        };

        let set = detector.detect(&frame("[[0.1,0.2],[0.3,0.4]]")).unwrap();
        assert_eq!(set.len(), 2);
        assert!(detector.detect(&frame("null")).is_none());
        assert!(detector.detect(&frame("[]")).is_none());
        assert!(detector.detect(&frame("{not json")).is_none());
    }

    #[test]
    fn test_detects_xyz_triples() {
        let mut detector = FeedDetector;
        let frame = FeedFrame {
            line: "[[0.1,0.2,-0.03],[0.3,0.4,0.01]]".to_string(),
        };
        let set = detector.detect(&frame).unwrap();
        assert_eq!(set.len(), 2);
    }

    /// Blocks on reads until the test hands it more input.
    struct ChannelReader {
        rx: mpsc::Receiver<String>,
        pending: Vec<u8>,
    }

    impl io::Read for ChannelReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.pending.is_empty() {
                match self.rx.recv() {
                    Ok(text) => self.pending = text.into_bytes(),
                    Err(_) => return Ok(0),
                }
            }
            let n = buf.len().min(self.pending.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            Ok(n)
        }
    }

    #[test]
    fn test_idle_feed_does_not_block() {
        let (tx, rx) = mpsc::channel();
        let reader = BufReader::new(ChannelReader {
            rx,
            pending: Vec::new(),
        });
        let mut source = FeedSource::from_reader(reader);

        let start = std::time::Instant::now();
        assert!(matches!(source.capture(), Err(CaptureError::Pending)));
        assert!(start.elapsed() < Duration::from_secs(1));

        tx.send("[[0.1,0.2]]\n".to_string()).unwrap();
        assert_eq!(next_frame(&mut source).unwrap().line, "[[0.1,0.2]]");

        drop(tx);
        assert!(matches!(next_frame(&mut source), Err(CaptureError::Exhausted)));
    }

    #[test]
    fn test_open_missing_file() {
        let err = FeedSource::open(Path::new("/nonexistent/feed.jsonl")).unwrap_err();
        assert!(matches!(err, SensorError::FeedUnavailable { .. }));
    }
}
