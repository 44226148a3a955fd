//! Read-print event loop
//!
//! Raw mode is scoped to `run_event_loop`: every return path, including `?`
//! on a read or write error, drops the guard and restores the terminal before
//! the error reaches the caller.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Context;
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use tracing::{debug, info};

use crate::config::QuitKey;
use crate::core::input::{KeyEvent, KeyReader};
use crate::core::mode::TerminalModeController;
use crate::core::terminal::TerminalDevice;
use crate::ui::{KeyMapper, KeyPrinter};

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    QuitKey,
    /// Termination signal, by number
    Signal(i32),
}

impl ExitReason {
    /// Process exit status: 0 for the quit key, 128 + signo for a signal
    pub fn exit_code(self) -> u8 {
        match self {
            ExitReason::QuitKey => 0,
            ExitReason::Signal(signo) => u8::try_from(128 + signo).unwrap_or(u8::MAX),
        }
    }
}

/// Holds the number of the last SIGTERM, SIGHUP or SIGINT received, 0 if none.
///
/// With ISIG off the keyboard cannot raise SIGINT, but `kill` still can. The
/// loop polls the flag after every read, so shutdown takes at most one read
/// timeout and still goes through the normal restore path.
pub fn register_shutdown_signals() -> io::Result<Arc<AtomicUsize>> {
    let flag = Arc::new(AtomicUsize::new(0));
    for signal in [SIGTERM, SIGHUP, SIGINT] {
        signal_hook::flag::register_usize(signal, Arc::clone(&flag), signal as usize)?;
    }
    Ok(flag)
}

/// Print keys until the quit chord arrives or `shutdown` holds a signal number.
pub fn run_event_loop<D, R, W>(
    controller: &TerminalModeController<D>,
    reader: &mut KeyReader<R>,
    printer: &mut KeyPrinter<W>,
    quit: QuitKey,
    shutdown: &AtomicUsize,
) -> anyhow::Result<ExitReason>
where
    D: TerminalDevice,
    R: Read,
    W: Write,
{
    let _raw = controller.activate().context("failed to enter raw mode")?;

    printer
        .message(&format!("Press {} to quit", KeyMapper::name(quit.byte)))
        .context("failed to write output")?;

    loop {
        let signo = shutdown.load(Ordering::Relaxed);
        if signo != 0 {
            info!("Termination signal {} received", signo);
            return Ok(ExitReason::Signal(signo as i32));
        }

        match reader.next().context("failed to read key")? {
            KeyEvent::Byte(byte) if byte == quit.byte => {
                info!("Quit key pressed");
                return Ok(ExitReason::QuitKey);
            }
            event => {
                if let KeyEvent::Byte(byte) = event {
                    debug!("Key {:#04x}", byte);
                }
                printer.print(event).context("failed to write output")?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::terminal::{RawModeOptions, TerminalError};
    use crate::core::testing::{scripted_err, FakeTerminal, ScriptedInput};
    use crate::ui::PrinterOptions;
    use std::io::ErrorKind;

    struct Harness {
        fake: FakeTerminal,
        controller: TerminalModeController<FakeTerminal>,
        printer: KeyPrinter<Vec<u8>>,
    }

    impl Harness {
        fn new() -> Self {
            let fake = FakeTerminal::new();
            let controller =
                TerminalModeController::with_device(fake.clone(), RawModeOptions::default());
            let options = PrinterOptions {
                color: false,
                show_timeouts: false,
            };
            Self {
                fake,
                controller,
                printer: KeyPrinter::new(Vec::new(), options),
            }
        }

        fn run(
            &mut self,
            input: ScriptedInput,
            shutdown: &AtomicUsize,
        ) -> anyhow::Result<ExitReason> {
            let mut reader = KeyReader::new(input);
            run_event_loop(
                &self.controller,
                &mut reader,
                &mut self.printer,
                QuitKey::default(),
                shutdown,
            )
        }

        fn output(self) -> String {
            String::from_utf8(self.printer.into_inner()).unwrap()
        }
    }

    #[test]
    fn test_quit_key_stops_loop() {
        let mut h = Harness::new();
        let original = h.fake.live();
        let shutdown = AtomicUsize::new(0);

        let reason = h
            .run(ScriptedInput::bytes(&[b'a', 0x01, 0x11, b'z']), &shutdown)
            .unwrap();

        assert_eq!(reason, ExitReason::QuitKey);
        assert_eq!(h.fake.live(), original);
        assert!(!h.controller.is_active());
        assert_eq!(
            h.output(),
            "Press Ctrl-Q to quit\r\n 97 'a'\r\n  1 Ctrl-A\r\n"
        );
    }

    #[test]
    fn test_read_error_restores_terminal() {
        let mut h = Harness::new();
        let original = h.fake.live();
        let shutdown = AtomicUsize::new(0);
        let input = ScriptedInput::new(vec![Ok(b'a'), scripted_err(ErrorKind::BrokenPipe)]);

        let err = h.run(input, &shutdown).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<TerminalError>(),
            Some(TerminalError::Read(_))
        ));
        assert_eq!(h.fake.live(), original);
        assert!(!h.controller.is_active());
    }

    #[test]
    fn test_shutdown_flag_stops_loop() {
        let mut h = Harness::new();
        let original = h.fake.live();
        let shutdown = AtomicUsize::new(SIGTERM as usize);

        let reason = h.run(ScriptedInput::bytes(&[]), &shutdown).unwrap();

        assert_eq!(reason, ExitReason::Signal(SIGTERM));
        assert_eq!(h.fake.live(), original);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitReason::QuitKey.exit_code(), 0);
        assert_eq!(ExitReason::Signal(SIGINT).exit_code(), 130);
        assert_eq!(ExitReason::Signal(SIGTERM).exit_code(), 143);
        assert_eq!(ExitReason::Signal(SIGHUP).exit_code(), 129);
    }

    #[test]
    fn test_enter_failure_reported() {
        let mut h = Harness::new();
        let original = h.fake.live();
        h.fake.fail_next_applies(1);
        let shutdown = AtomicUsize::new(0);

        let err = h.run(ScriptedInput::bytes(&[b'a']), &shutdown).unwrap_err();

        assert!(err.to_string().contains("raw mode"));
        assert_eq!(h.fake.live(), original);
        assert!(h.output().is_empty());
    }
}
