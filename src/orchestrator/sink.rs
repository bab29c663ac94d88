//! Append-only, ordered record of plain-text progress lines.
//!
//! The log file is the artifact external assertions inspect after a run;
//! every line is written and flushed immediately so observers see partial
//! progress even if the process is killed mid-phase. Stdout mirroring is a
//! convenience for interactive use only.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub struct LogSink {
    path: PathBuf,
    file: File,
    echo: bool,
}

impl LogSink {
    /// Open the sink in append mode, creating the file if needed.
    pub fn open(path: &Path, echo: bool) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            echo,
        })
    }

    /// Append one line and flush it to the file before returning.
    pub fn append(&mut self, line: &str) -> io::Result<()> {
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.file.flush()?;
        if self.echo {
            println!("{line}");
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_append_preserves_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.log");
        let mut sink = LogSink::open(&path, false).unwrap();

        sink.append("first").unwrap();
        sink.append("second").unwrap();
        sink.append("third").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_reopen_appends_rather_than_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.log");

        {
            let mut sink = LogSink::open(&path, false).unwrap();
            sink.append("before reboot").unwrap();
        }

        {
            let mut sink = LogSink::open(&path, false).unwrap();
            sink.append("after reboot").unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content.lines().collect::<Vec<_>>(),
            vec!["before reboot", "after reboot"]
        );
    }

    #[test]
    fn test_open_missing_parent_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope").join("run.log");
        assert!(LogSink::open(&path, false).is_err());
    }
}
