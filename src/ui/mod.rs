//! Key naming and echo output.
//!
//! - **keymapper**: control-chord decoding and byte naming
//! - **printer**: one line per key event, written through crossterm

pub mod keymapper;
pub mod printer;

pub use keymapper::{ctrl_key, is_control_chord, KeyMapper, KeyName};
pub use printer::{KeyPrinter, PrinterOptions};
