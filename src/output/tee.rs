//! Destinations for live (teed) output.

use std::io::{self, Write};

use crate::execution::{OutputChunk, OutputSource};

/// Receives output as it is produced, alongside the capture.
pub trait TeeSink: Send {
    /// Echo one chunk of child output.
    fn write_chunk(&mut self, chunk: &OutputChunk) -> io::Result<()>;

    /// Echo a line produced by the runner itself (command prompt, banners).
    fn write_note(&mut self, line: &str) -> io::Result<()>;
}

/// Echoes to the caller's own stdout and stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioSink;

impl TeeSink for StdioSink {
    fn write_chunk(&mut self, chunk: &OutputChunk) -> io::Result<()> {
        match chunk.source {
            OutputSource::Stderr => {
                let mut err = io::stderr().lock();
                err.write_all(&chunk.raw)?;
                err.flush()
            }
            OutputSource::Stdout | OutputSource::Combined => {
                let mut out = io::stdout().lock();
                out.write_all(&chunk.raw)?;
                out.flush()
            }
        }
    }

    fn write_note(&mut self, line: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{line}")?;
        out.flush()
    }
}

/// Collects echoed output in memory.
#[derive(Debug, Default, Clone)]
pub struct BufferSink {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub notes: Vec<String>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

impl TeeSink for BufferSink {
    fn write_chunk(&mut self, chunk: &OutputChunk) -> io::Result<()> {
        match chunk.source {
            OutputSource::Stderr => self.stderr.extend_from_slice(&chunk.raw),
            OutputSource::Stdout | OutputSource::Combined => {
                self.stdout.extend_from_slice(&chunk.raw)
            }
        }
        Ok(())
    }

    fn write_note(&mut self, line: &str) -> io::Result<()> {
        self.notes.push(line.to_string());
        Ok(())
    }
}
