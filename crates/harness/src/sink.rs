use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

static SINK_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_sink_lock_poison_once(operation: &'static str) {
    if SINK_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "memory sink lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub time: f64,
    pub channel: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write log data to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode log record: {0}")]
    Encode(#[source] serde_json::Error),
}

pub trait DataSink {
    fn log(&mut self, time: f64, fields: &[String], channel: &str) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<S: DataSink + ?Sized> DataSink for Box<S> {
    fn log(&mut self, time: f64, fields: &[String], channel: &str) -> Result<(), SinkError> {
        (**self).log(time, fields, channel)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }
}

/// Shared in-memory sink. Clones append to the same record list.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        match self.records.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => {
                warn_sink_lock_poison_once("read");
                poisoned.into_inner().clone()
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.records.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => {
                warn_sink_lock_poison_once("len");
                poisoned.into_inner().len()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<LogRecord> {
        self.records().pop()
    }
}

impl DataSink for MemorySink {
    fn log(&mut self, time: f64, fields: &[String], channel: &str) -> Result<(), SinkError> {
        let record = LogRecord {
            time,
            channel: channel.to_string(),
            fields: fields.to_vec(),
        };
        match self.records.lock() {
            Ok(mut guard) => guard.push(record),
            Err(poisoned) => {
                warn_sink_lock_poison_once("write");
                poisoned.into_inner().push(record);
            }
        }
        Ok(())
    }
}

/// Appends one JSON object per record to a file.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonLinesSink {
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        let io_error = |source| SinkError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let file = File::create(path).map_err(io_error)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataSink for JsonLinesSink {
    fn log(&mut self, time: f64, fields: &[String], channel: &str) -> Result<(), SinkError> {
        let record = LogRecord {
            time,
            channel: channel.to_string(),
            fields: fields.to_vec(),
        };
        serde_json::to_writer(&mut self.writer, &record).map_err(SinkError::Encode)?;
        self.writer
            .write_all(b"\n")
            .map_err(|source| SinkError::Io {
                path: self.path.clone(),
                source,
            })
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush().map_err(|source| SinkError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl Drop for JsonLinesSink {
    fn drop(&mut self) {
        if let Err(error) = self.writer.flush() {
            warn!(path = %self.path.display(), error = %error, "log_flush_failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use tempfile::TempDir;

    use super::*;

    fn fields(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn memory_sink_clones_share_records() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer
            .log(0.5, &fields(&["a", "b"]), "channel")
            .expect("log");
        assert_eq!(sink.len(), 1);
        let record = sink.last().expect("record");
        assert_eq!(record.time, 0.5);
        assert_eq!(record.channel, "channel");
        assert_eq!(record.fields, fields(&["a", "b"]));
    }

    #[test]
    fn memory_sink_recovers_after_poison() {
        let sink = MemorySink::new();
        let shared = sink.records.clone();
        thread::scope(|scope| {
            let _ = scope
                .spawn(|| {
                    let _guard = shared.lock().expect("lock");
                    panic!("poison sink lock");
                })
                .join();
        });

        let mut writer = sink.clone();
        writer.log(1.0, &fields(&["x"]), "c").expect("log");
        assert_eq!(sink.records().len(), 1);
    }

    #[test]
    fn json_lines_sink_writes_one_record_per_line() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("logs").join("session.jsonl");
        {
            let mut sink = JsonLinesSink::create(&path).expect("create sink");
            sink.log(0.0, &fields(&["t", "ROUND_1"]), "pose-match")
                .expect("first");
            sink.log(0.1, &fields(&["t", "COMPLETE"]), "pose-match")
                .expect("second");
            sink.flush().expect("flush");
        }

        let raw = fs::read_to_string(&path).expect("read log");
        let records = raw
            .lines()
            .map(|line| serde_json::from_str::<LogRecord>(line).expect("record"))
            .collect::<Vec<_>>();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].fields[1], "COMPLETE");
        assert_eq!(records[0].channel, "pose-match");
    }
}
