//! Line filter that persists runner stdout to a file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::bytes::Regex;
use tracing::debug;

use crate::io::config::OutputSettings;

/// Selenium startup banner; noise in persisted reports.
static BANNER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Using the selenium server at").unwrap());

/// Writes stdout lines to a sink, dropping the selenium banner.
#[derive(Debug)]
pub struct OutputTee<W: Write> {
    sink: W,
}

impl OutputTee<BufWriter<File>> {
    /// Open the sink at `path`, creating missing parent directories.
    pub fn open(path: &Path, settings: &OutputSettings) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create output dir {}", parent.display()))?;
        }
        let mut options = OpenOptions::new();
        options.create(true);
        if settings.append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        let file = options
            .open(path)
            .with_context(|| format!("open output file {}", path.display()))?;
        debug!(path = %path.display(), append = settings.append, "opened output tee");
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> OutputTee<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    /// Forward one line. `line` may carry its trailing `\n` (or `\r\n`);
    /// exactly one `\n` is written after the content.
    pub fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        let content = strip_line_ending(line);
        if BANNER_RE.is_match(content) {
            return Ok(());
        }
        self.sink.write_all(content)?;
        self.sink.write_all(b"\n")
    }

    /// Flush and return the sink.
    pub fn finish(mut self) -> io::Result<W> {
        self.sink.flush()?;
        Ok(self.sink)
    }
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
