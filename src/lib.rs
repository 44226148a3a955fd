//! rawkey - raw-mode terminal control and single-key input
//!
//! The input foundation for a terminal line editor: put the controlling
//! terminal into raw mode, read keys one byte at a time with a 100 ms timeout,
//! decode control chords, and always give the terminal back the way it was.
//!
//! # Usage
//!
//! ```no_run
//! use rawkey::core::input::{KeyEvent, KeyReader};
//! use rawkey::core::mode::{install_panic_hook, TerminalModeController};
//! use rawkey::core::terminal::RawModeOptions;
//! use rawkey::ui::ctrl_key;
//!
//! # fn main() -> anyhow::Result<()> {
//! let controller = TerminalModeController::stdin(RawModeOptions::default())?;
//! install_panic_hook(controller.restore_hook());
//! let mut reader = KeyReader::stdin()?;
//!
//! let _raw = controller.activate()?;
//! loop {
//!     match reader.next()? {
//!         KeyEvent::Byte(b) if b == ctrl_key(b'q') => break,
//!         KeyEvent::Byte(_) | KeyEvent::Timeout => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod config;
pub mod core;
pub mod ui;
