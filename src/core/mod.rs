//! Core terminal control components.
//!
//! This module contains the low-level pieces the editor is built on:
//!
//! - **terminal**: termios snapshots, raw-mode derivation, the `TerminalDevice` seam
//! - **mode**: `TerminalModeController`, the raw-mode session and its restore paths
//! - **input**: `KeyReader`, time-boxed single-byte reads
//!
//! # Architecture
//!
//! ```text
//! TerminalModeController
//! ├── RawModeSession (original snapshot + active flag)
//! │   └── TerminalDevice (Tty on stdin, or a fake in tests)
//! └── RestoreHook (panic hook / exit paths)
//!
//! KeyReader
//! └── Read source (dup of stdin, VMIN=0 / VTIME=1)
//! ```

pub mod input;
pub mod mode;
pub mod terminal;
