// Copyright (c) 2026 aquaplant contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/aquaplant/aquaplant

//! Looping file-backed data source standing in for real field hardware

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{DeviceError, Result};

/// Sequential line reader over a delimited simulation file.
///
/// The source is an infinite, restartable stream of finite length: once the
/// last record has been handed out, the next [`read_line`](Self::read_line)
/// rewinds to the first data record instead of reporting end-of-stream.
/// Files with a `.csv` extension carry a header line, which is consumed on
/// open and after every reset and never returned to callers.
#[derive(Debug)]
pub struct SimFileSource {
    path: PathBuf,
    reader: BufReader<File>,
    has_header: bool,
    at_end: bool,
}

impl SimFileSource {
    /// Open a simulation file. Fails with [`DeviceError::NotFound`] if the
    /// file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(DeviceError::NotFound(path));
        }

        let has_header = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);

        let file = File::open(&path)?;
        let mut source = Self {
            path,
            reader: BufReader::new(file),
            has_header,
            at_end: false,
        };

        if source.has_header {
            source.next_raw()?;
        }
        source.at_end = source.buffer_exhausted()?;
        Ok(source)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True once the cursor sits past the last record. Cleared again by the
    /// reset performed inside a loop-triggered read.
    pub fn is_at_end(&self) -> bool {
        self.at_end
    }

    /// Return the next unread record. A source already at end resets first
    /// and returns the first data record, so callers only ever see `None`
    /// for a file that has no data records at all.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        if self.at_end {
            self.reset()?;
        }

        match self.next_raw()? {
            Some(line) => {
                self.at_end = self.buffer_exhausted()?;
                Ok(Some(line))
            }
            None => {
                self.at_end = true;
                Ok(None)
            }
        }
    }

    /// Reposition to the first data record, re-skipping the header.
    pub fn reset(&mut self) -> io::Result<()> {
        self.reader.seek(SeekFrom::Start(0))?;
        if self.has_header {
            self.next_raw()?;
        }
        self.at_end = self.buffer_exhausted()?;
        Ok(())
    }

    /// Append one line of text through a separate handle. The read cursor is
    /// untouched; the appended record becomes visible on the next loop.
    pub fn append_line(&self, data: &str) -> io::Result<()> {
        let mut writer = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        writeln!(writer, "{data}")
    }

    fn next_raw(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        let bytes = self.reader.read_line(&mut line)?;
        if bytes == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    fn buffer_exhausted(&mut self) -> io::Result<bool> {
        Ok(self.reader.fill_buf()?.is_empty())
    }
}
