//! Key echo output
//!
//! Writes one line per key event. Raw mode disables output post-processing,
//! so every line ends with an explicit "\r\n".

use std::io::{self, Write};

use crossterm::{
    queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
};

use crate::core::input::KeyEvent;
use super::keymapper::{KeyMapper, KeyName};

const LINE_END: &str = "\r\n";

/// Printer options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrinterOptions {
    pub color: bool,
    pub show_timeouts: bool,
}

impl Default for PrinterOptions {
    fn default() -> Self {
        Self {
            color: true,
            show_timeouts: false,
        }
    }
}

/// Writes decoded key events to an output stream
pub struct KeyPrinter<W: Write> {
    out: W,
    options: PrinterOptions,
}

impl<W: Write> KeyPrinter<W> {
    pub fn new(out: W, options: PrinterOptions) -> Self {
        Self { out, options }
    }

    /// Print a banner line
    pub fn message(&mut self, text: &str) -> io::Result<()> {
        queue!(self.out, Print(text), Print(LINE_END))?;
        self.out.flush()
    }

    pub fn print(&mut self, event: KeyEvent) -> io::Result<()> {
        match event {
            KeyEvent::Timeout => {
                if !self.options.show_timeouts {
                    return Ok(());
                }
                queue!(self.out, Print("  . (timeout)"), Print(LINE_END))?;
            }
            KeyEvent::Byte(byte) => {
                let name = KeyMapper::name(byte);
                let color = match name {
                    KeyName::Chord(_) | KeyName::Nul => Some(Color::Cyan),
                    KeyName::Delete | KeyName::High(_) => Some(Color::Yellow),
                    KeyName::Char(_) => None,
                };

                queue!(self.out, Print(format!("{:3} ", byte)))?;
                match color {
                    Some(color) if self.options.color => {
                        queue!(self.out, SetForegroundColor(color), Print(name), ResetColor)?;
                    }
                    _ => queue!(self.out, Print(name))?,
                }
                queue!(self.out, Print(LINE_END))?;
            }
        }
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
