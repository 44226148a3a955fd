//! Single-byte key input
//!
//! Reads are at most one byte and are bounded by the VTIME interval set in raw
//! mode, so the event loop wakes at least every 100 ms even without input.

use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::os::fd::AsFd;

use tracing::{trace, warn};

use super::terminal::{Result, TerminalError};

/// Transient read failures absorbed per `next()` call
pub const MAX_TRANSIENT_RETRIES: u32 = 8;

/// One decoded input event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    /// Raw byte; control chords arrive already folded (Ctrl-Q = 0x11)
    Byte(u8),
    /// No input within the read timeout
    Timeout,
}

/// Key reader over any byte source
pub struct KeyReader<R> {
    input: R,
}

impl KeyReader<File> {
    /// Reader on the process's standard input.
    ///
    /// Uses a duplicate of fd 0 wrapped in a `File`, so each `next()` is a
    /// single unbuffered read(2).
    pub fn stdin() -> Result<Self> {
        let fd = io::stdin()
            .as_fd()
            .try_clone_to_owned()
            .map_err(TerminalError::Read)?;
        Ok(Self::new(File::from(fd)))
    }
}

impl<R: Read> KeyReader<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    /// Wait for the next key, up to the terminal's read timeout.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<KeyEvent> {
        let mut buf = [0u8; 1];
        let mut retries = 0;

        loop {
            match self.input.read(&mut buf) {
                Ok(0) => return Ok(KeyEvent::Timeout),
                Ok(_) => return Ok(KeyEvent::Byte(buf[0])),
                Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => {
                    retries += 1;
                    if retries > MAX_TRANSIENT_RETRIES {
                        warn!("Read still failing after {} retries: {}", MAX_TRANSIENT_RETRIES, e);
                        return Ok(KeyEvent::Timeout);
                    }
                    trace!("Transient read failure ({}), retrying", e);
                }
                Err(e) => return Err(TerminalError::Read(e)),
            }
        }
    }

    pub fn into_inner(self) -> R {
        self.input
    }
}
