// THEORY:
// The replay source stands in for a live detector. It reads detections that were
// recorded earlier as JSON lines, one sampled frame per line:
//
//     {"time": 0.066, "detections": [{"track_id": 3, "class_label": "T", "confidence": 0.81}]}
//
// A frame with nobody on-screen is recorded with an empty `detections` array;
// leaving the frame out entirely would hide the disappearance from the tracker.

use crate::core_modules::detection::Detection;
use crate::error::{ExposureError, Result};
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead};

/// All detections of one sampled frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub time: f64,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// Iterates over the frame records of a JSON-lines stream.
pub struct ReplaySource<R> {
    reader: R,
    line_number: usize,
    buffer: String,
}

impl<R: BufRead> ReplaySource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            buffer: String::new(),
        }
    }

    /// Reads the next non-blank record, or `None` at end of input.
    pub fn next_record(&mut self) -> Result<Option<FrameRecord>> {
        loop {
            self.buffer.clear();
            let read = self
                .reader
                .read_line(&mut self.buffer)
                .map_err(|e| {
                    let message = format!("replay line {}: {e}", self.line_number + 1);
                    if e.kind() == io::ErrorKind::InvalidData {
                        ExposureError::Input(message)
                    } else {
                        ExposureError::Source(message)
                    }
                })?;
            if read == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let line = self.buffer.trim();
            if line.is_empty() {
                continue;
            }

            let record: FrameRecord = serde_json::from_str(line).map_err(|e| {
                ExposureError::Input(format!("replay line {}: {e}", self.line_number))
            })?;
            for detection in &record.detections {
                detection
                    .validate()
                    .map_err(|e| ExposureError::Input(format!("replay line {}: {e}", self.line_number)))?;
            }
            return Ok(Some(record));
        }
    }
}

impl<R: BufRead> Iterator for ReplaySource<R> {
    type Item = Result<FrameRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
