//! termios snapshots and raw-mode derivation
//!
//! This module wraps `nix::sys::termios` so the rest of the crate deals with
//! whole configuration snapshots instead of individual flag fields.

use std::io;
use std::os::fd::AsFd;

use nix::sys::termios::{
    self, ControlFlags, InputFlags, LocalFlags, OutputFlags, SetArg, SpecialCharacterIndices,
    Termios,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TerminalError {
    #[error("failed to read terminal attributes (tcgetattr): {0}")]
    Query(nix::Error),

    #[error("failed to apply terminal attributes (tcsetattr): {0}")]
    Apply(nix::Error),

    #[error("failed to read from terminal input: {0}")]
    Read(io::Error),

    #[error("a raw-mode session is already bound to standard input")]
    SessionBusy,
}

pub type Result<T> = std::result::Result<T, TerminalError>;

/// Snapshot of every terminal driver attribute for one device
///
/// Flags, control characters and line speeds travel together. A snapshot is
/// never edited in place; raw variants are derived as modified clones.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TerminalConfiguration {
    termios: Termios,
}

impl TerminalConfiguration {
    pub fn from_termios(termios: Termios) -> Self {
        Self { termios }
    }

    pub fn input_flags(&self) -> InputFlags {
        self.termios.input_flags
    }

    pub fn output_flags(&self) -> OutputFlags {
        self.termios.output_flags
    }

    pub fn control_flags(&self) -> ControlFlags {
        self.termios.control_flags
    }

    pub fn local_flags(&self) -> LocalFlags {
        self.termios.local_flags
    }

    /// Value of a control character slot (VMIN, VTIME, ...)
    pub fn control_char(&self, index: SpecialCharacterIndices) -> u8 {
        self.termios.control_chars[index as usize]
    }
}

/// Parameters for raw-mode derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawModeOptions {
    /// VTIME value in deciseconds
    pub read_timeout: u8,
    /// Keep OPOST (newline translation on output) enabled
    pub output_processing: bool,
}

impl Default for RawModeOptions {
    fn default() -> Self {
        Self {
            read_timeout: 1,
            output_processing: false,
        }
    }
}

impl RawModeOptions {
    /// Convert a millisecond timeout to VTIME deciseconds.
    ///
    /// Rounds to the nearest decisecond. The result is clamped to 1..=255
    /// because VTIME = 0 together with VMIN = 0 turns every read into a
    /// non-blocking poll.
    pub fn deciseconds_from_millis(millis: u32) -> u8 {
        let ds = (millis.saturating_add(50)) / 100;
        ds.clamp(1, u8::MAX as u32) as u8
    }
}

/// Compute the raw configuration for `original`.
///
/// The input is only read. Calling this twice with the same snapshot yields
/// identical results.
pub fn derive_raw_configuration(
    original: &TerminalConfiguration,
    options: RawModeOptions,
) -> TerminalConfiguration {
    let mut raw = original.termios.clone();

    // Input translation: no XON/XOFF, no CR->NL, no break signal,
    // no parity check, no 8th-bit stripping
    raw.input_flags.remove(
        InputFlags::IXON
            | InputFlags::ICRNL
            | InputFlags::BRKINT
            | InputFlags::INPCK
            | InputFlags::ISTRIP,
    );

    // Output post-processing (NL -> CR NL)
    if !options.output_processing {
        raw.output_flags.remove(OutputFlags::OPOST);
    }

    // 8 bits per character
    raw.control_flags.remove(ControlFlags::CSIZE);
    raw.control_flags.insert(ControlFlags::CS8);

    // No echo, byte-at-a-time, no INTR/SUSP signals, no Ctrl-V literal-next
    raw.local_flags.remove(
        LocalFlags::ECHO | LocalFlags::ICANON | LocalFlags::ISIG | LocalFlags::IEXTEN,
    );

    // read() returns after one byte or after VTIME deciseconds with none
    raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
    raw.control_chars[SpecialCharacterIndices::VTIME as usize] = options.read_timeout;

    TerminalConfiguration { termios: raw }
}

/// A device whose driver configuration can be queried and replaced
pub trait TerminalDevice {
    fn query(&self) -> Result<TerminalConfiguration>;
    fn apply(&mut self, config: &TerminalConfiguration) -> Result<()>;
}

/// Real terminal backed by a file descriptor
#[derive(Debug)]
pub struct Tty<F> {
    fd: F,
}

impl<F: AsFd> Tty<F> {
    pub fn new(fd: F) -> Self {
        Self { fd }
    }
}

impl Tty<io::Stdin> {
    /// Controlling terminal on standard input
    pub fn stdin() -> Self {
        Self::new(io::stdin())
    }
}

impl<F: AsFd> TerminalDevice for Tty<F> {
    fn query(&self) -> Result<TerminalConfiguration> {
        termios::tcgetattr(self.fd.as_fd())
            .map(TerminalConfiguration::from_termios)
            .map_err(TerminalError::Query)
    }

    fn apply(&mut self, config: &TerminalConfiguration) -> Result<()> {
        // TCSAFLUSH drops pending input typed under the previous mode
        termios::tcsetattr(self.fd.as_fd(), SetArg::TCSAFLUSH, &config.termios)
            .map_err(TerminalError::Apply)
    }
}
