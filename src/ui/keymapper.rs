//! Byte to key mapping
//!
//! A terminal delivers Ctrl+<key> as the key's value with the top three bits
//! cleared (Ctrl-Q = 'q' & 0x1f = 0x11). These helpers go both ways.

use std::fmt;

/// Mask the driver applies for control chords
pub const CTRL_MASK: u8 = 0x1f;

/// Byte produced by Ctrl + `key`
pub const fn ctrl_key(key: u8) -> u8 {
    key & CTRL_MASK
}

/// Base key of a control chord, or `None` if `byte` is not one.
///
/// 0x01..=0x1A give the lowercase letter (0x11 -> 'q'); 0x1B..=0x1F give the
/// caret-notation punctuation `[ \ ] ^ _`.
pub fn is_control_chord(byte: u8) -> Option<u8> {
    match byte {
        0x01..=0x1A => Some(byte | 0x60),
        0x1B..=0x1F => Some(byte | 0x40),
        _ => None,
    }
}

/// Human-readable name of one input byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyName {
    /// Printable ASCII
    Char(char),
    /// Control chord with its base key
    Chord(u8),
    /// NUL (Ctrl-@ / Ctrl-Space)
    Nul,
    /// DEL, sent by most Backspace keys
    Delete,
    /// Anything above ASCII; not decoded further
    High(u8),
}

impl fmt::Display for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyName::Char(c) => write!(f, "'{}'", c),
            KeyName::Chord(base) => write!(f, "Ctrl-{}", (*base as char).to_ascii_uppercase()),
            KeyName::Nul => write!(f, "Ctrl-@"),
            KeyName::Delete => write!(f, "DEL"),
            KeyName::High(b) => write!(f, "0x{:02x}", b),
        }
    }
}

/// Key mapper for input bytes
pub struct KeyMapper;

impl KeyMapper {
    pub fn name(byte: u8) -> KeyName {
        if let Some(base) = is_control_chord(byte) {
            return KeyName::Chord(base);
        }
        match byte {
            0x00 => KeyName::Nul,
            0x20..=0x7E => KeyName::Char(byte as char),
            0x7F => KeyName::Delete,
            _ => KeyName::High(byte),
        }
    }

    /// Parse a quit-key setting ("q", "Q", "ctrl-q", "^Q") into its chord byte
    pub fn parse_chord(s: &str) -> Option<u8> {
        let s = s.trim();
        let lower = s.to_ascii_lowercase();
        let key = lower
            .strip_prefix("ctrl-")
            .or_else(|| lower.strip_prefix("ctrl+"))
            .or_else(|| lower.strip_prefix('^'))
            .unwrap_or(lower.as_str());

        let mut chars = key.chars();
        let c = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        match c {
            'a'..='z' | '[' | '\\' | ']' | '^' | '_' => Some(ctrl_key(c as u8)),
            _ => None,
        }
    }
}
