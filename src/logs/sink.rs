//! [`LogSink`] implementations: terminal, in-memory buffer and file.

use console::style;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use super::LogSink;

/// Streams log text to stdout. A terminal can't be unwritten, so clearing
/// prints a marker line instead.
#[derive(Debug)]
pub struct ConsoleSink {
    title: String,
}

impl ConsoleSink {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

impl LogSink for ConsoleSink {
    fn clear(&mut self) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out)?;
        writeln!(out, "{}", style(format!("----- {} -----", self.title)).dim())?;
        out.flush()
    }

    fn append(&mut self, text: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(text.as_bytes())?;
        out.flush()
    }
}

/// Keeps the visible log in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    buffer: Arc<Mutex<String>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LogSink for BufferSink {
    fn clear(&mut self) -> io::Result<()> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }

    fn append(&mut self, text: &str) -> io::Result<()> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_str(text);
        Ok(())
    }
}

/// Mirrors the log into a file; clearing truncates it.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        File::create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileSink {
    fn clear(&mut self) -> io::Result<()> {
        File::create(&self.path).map(|_| ())
    }

    fn append(&mut self, text: &str) -> io::Result<()> {
        let mut file = OpenOptions::new().append(true).create(true).open(&self.path)?;
        file.write_all(text.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::{AppLog, LogType};
    use tempfile::tempdir;

    #[test]
    fn test_buffer_sink_tracks_visible_log() {
        let sink = BufferSink::new();
        let mut log = AppLog::new("p1", "app", LogType::App, Box::new(sink.clone())).unwrap();
        assert!(sink.contents().starts_with("Waiting for Microclimate"));

        log.update("one\n").unwrap();
        log.update("one\ntwo\n").unwrap();
        assert_eq!(sink.contents(), "one\ntwo\n");

        log.update("fresh\n").unwrap();
        assert_eq!(sink.contents(), "fresh\n");
    }

    #[test]
    fn test_file_sink_truncates_on_clear() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs/app.log");
        let mut sink = FileSink::create(&path).unwrap();

        sink.append("hello ").unwrap();
        sink.append("world").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello world");

        sink.clear().unwrap();
        sink.append("again").unwrap();
        assert_eq!(std::fs::read_to_string(sink.path()).unwrap(), "again");
    }
}
