//! Raw-mode session management
//!
//! `TerminalModeController` owns the only transition the crate performs on the
//! terminal (cooked -> raw) and guarantees it is undone. Restoration runs from
//! `exit()`, from `Drop`, and from the panic hook installed with
//! [`install_panic_hook`]. All three paths are idempotent.

use std::io;
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use tracing::{debug, error, info};

use super::terminal::{
    derive_raw_configuration, RawModeOptions, Result, TerminalConfiguration, TerminalDevice,
    TerminalError, Tty,
};

/// Set while a controller is bound to the process's standard input
static STDIN_SESSION_CLAIMED: AtomicBool = AtomicBool::new(false);

/// Proof of exclusive ownership of the stdin session
#[derive(Debug)]
struct StdinClaim;

impl StdinClaim {
    fn acquire() -> Result<Self> {
        STDIN_SESSION_CLAIMED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| StdinClaim)
            .map_err(|_| TerminalError::SessionBusy)
    }
}

impl Drop for StdinClaim {
    fn drop(&mut self) {
        STDIN_SESSION_CLAIMED.store(false, Ordering::Release);
    }
}

/// Session state shared between the controller and its restore hooks
#[derive(Debug)]
struct RawModeSession<D> {
    device: D,
    options: RawModeOptions,
    original: Option<TerminalConfiguration>,
    active: bool,
}

impl<D: TerminalDevice> RawModeSession<D> {
    fn capture_original(&mut self) -> Result<TerminalConfiguration> {
        if let Some(original) = &self.original {
            return Ok(original.clone());
        }
        let original = self.device.query()?;
        debug!("Captured original terminal configuration");
        self.original = Some(original.clone());
        Ok(original)
    }

    fn enter(&mut self) -> Result<()> {
        if self.active {
            return Ok(());
        }
        let original = self.capture_original()?;
        let raw = derive_raw_configuration(&original, self.options);
        self.device.apply(&raw)?;
        self.active = true;
        info!(
            "Raw mode entered (VTIME={}ds, output processing {})",
            self.options.read_timeout,
            if self.options.output_processing { "on" } else { "off" }
        );
        Ok(())
    }

    /// Returns false when the original configuration could not be applied.
    fn exit(&mut self) -> bool {
        if !self.active {
            return true;
        }
        let Some(original) = &self.original else {
            // active implies a captured original
            self.active = false;
            return true;
        };
        match self.device.apply(original) {
            Ok(()) => {
                self.active = false;
                info!("Raw mode exited, terminal restored");
                true
            }
            Err(e) => {
                error!("Failed to restore terminal: {}", e);
                false
            }
        }
    }
}

/// Controller for the raw-mode lifecycle of one terminal device
///
/// State machine: `Inactive --enter()--> Active --exit()--> Inactive`.
/// Dropping the controller runs `exit()`.
#[derive(Debug)]
pub struct TerminalModeController<D: TerminalDevice> {
    session: Arc<Mutex<RawModeSession<D>>>,
    // Released after `Drop::drop` has restored the terminal
    _claim: Option<StdinClaim>,
}

impl TerminalModeController<Tty<io::Stdin>> {
    /// Controller for the controlling terminal on stdin.
    ///
    /// Only one may exist at a time; a second call fails with
    /// `TerminalError::SessionBusy` until the first is dropped.
    pub fn stdin(options: RawModeOptions) -> Result<Self> {
        let claim = StdinClaim::acquire()?;
        let mut controller = Self::with_device(Tty::stdin(), options);
        controller._claim = Some(claim);
        Ok(controller)
    }
}

impl<D: TerminalDevice> TerminalModeController<D> {
    pub fn with_device(device: D, options: RawModeOptions) -> Self {
        Self {
            session: Arc::new(Mutex::new(RawModeSession {
                device,
                options,
                original: None,
                active: false,
            })),
            _claim: None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RawModeSession<D>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read the live configuration once; later calls return the cached snapshot.
    pub fn capture_original(&self) -> Result<TerminalConfiguration> {
        self.lock().capture_original()
    }

    /// Switch the terminal to raw mode. No-op when already active.
    ///
    /// On failure nothing has been applied and the session stays inactive.
    pub fn enter(&self) -> Result<()> {
        self.lock().enter()
    }

    /// Restore the original configuration. No-op when inactive.
    ///
    /// Failures are logged, not returned; the session then stays active so
    /// the next `exit()` (or drop) tries again.
    pub fn exit(&self) {
        self.lock().exit();
    }

    /// Enter raw mode for the lifetime of the returned guard.
    pub fn activate(&self) -> Result<RawModeGuard<'_, D>> {
        self.enter()?;
        Ok(RawModeGuard { controller: self })
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    pub fn options(&self) -> RawModeOptions {
        self.lock().options
    }

    /// Handle that restores this session from outside the normal flow
    pub fn restore_hook(&self) -> RestoreHook<D> {
        RestoreHook {
            session: Arc::clone(&self.session),
        }
    }
}

impl<D: TerminalDevice> Drop for TerminalModeController<D> {
    fn drop(&mut self) {
        self.exit();
    }
}

/// Scoped raw mode; dropping it restores the terminal
#[must_use = "raw mode ends when the guard is dropped"]
#[derive(Debug)]
pub struct RawModeGuard<'a, D: TerminalDevice> {
    controller: &'a TerminalModeController<D>,
}

impl<D: TerminalDevice> Drop for RawModeGuard<'_, D> {
    fn drop(&mut self) {
        self.controller.exit();
    }
}

/// Restores a session on process-level exit paths (panics)
#[derive(Debug)]
pub struct RestoreHook<D> {
    session: Arc<Mutex<RawModeSession<D>>>,
}

impl<D> Clone for RestoreHook<D> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
        }
    }
}

impl<D: TerminalDevice> RestoreHook<D> {
    /// Same as `TerminalModeController::exit`, returning whether the terminal
    /// is back in its original configuration.
    ///
    /// Never blocks. If the session is locked by the current call stack this
    /// returns false; the controller's drop restores it once the lock is
    /// released.
    pub fn restore(&self) -> bool {
        let mut session = match self.session.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return false,
        };
        session.exit()
    }
}

/// Chain a terminal restore in front of the current panic hook, so the panic
/// message is printed on a cooked terminal.
pub fn install_panic_hook<D>(hook: RestoreHook<D>)
where
    D: TerminalDevice + Send + 'static,
{
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        hook.restore();
        previous(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::FakeTerminal;

    fn controller(fake: &FakeTerminal) -> TerminalModeController<FakeTerminal> {
        TerminalModeController::with_device(fake.clone(), RawModeOptions::default())
    }

    #[test]
    fn test_enter_applies_raw_configuration() {
        let fake = FakeTerminal::new();
        let original = fake.live();
        let ctl = controller(&fake);

        ctl.enter().unwrap();

        assert!(ctl.is_active());
        assert_eq!(
            fake.live(),
            derive_raw_configuration(&original, RawModeOptions::default())
        );
    }

    #[test]
    fn test_exit_restores_and_is_idempotent() {
        let fake = FakeTerminal::new();
        let original = fake.live();
        let ctl = controller(&fake);

        ctl.enter().unwrap();
        ctl.exit();
        assert!(!ctl.is_active());
        assert_eq!(fake.live(), original);

        let applies = fake.applies();
        ctl.exit();
        assert_eq!(fake.applies(), applies);
        assert_eq!(fake.live(), original);
    }

    #[test]
    fn test_enter_twice_is_noop() {
        let fake = FakeTerminal::new();
        let ctl = controller(&fake);

        ctl.enter().unwrap();
        ctl.enter().unwrap();

        assert_eq!(fake.applies(), 1);
        assert_eq!(fake.queries(), 1);
    }

    #[test]
    fn test_original_captured_once() {
        let fake = FakeTerminal::new();
        let original = fake.live();
        let ctl = controller(&fake);

        for _ in 0..3 {
            ctl.enter().unwrap();
            ctl.exit();
        }

        assert_eq!(fake.queries(), 1);
        assert_eq!(ctl.capture_original().unwrap(), original);
        assert_eq!(fake.queries(), 1);
    }

    #[test]
    fn test_any_sequence_ends_restored() {
        let fake = FakeTerminal::new();
        let original = fake.live();
        let ctl = controller(&fake);

        // true = enter, false = exit
        let script = [true, true, false, false, true, false, true, true, false];
        for step in script {
            if step {
                ctl.enter().unwrap();
            } else {
                ctl.exit();
                assert_eq!(fake.live(), original);
            }
        }
    }

    #[test]
    fn test_query_failure() {
        let fake = FakeTerminal::new();
        fake.fail_query();
        let ctl = controller(&fake);

        assert!(matches!(ctl.enter(), Err(TerminalError::Query(_))));
        assert!(!ctl.is_active());
        assert_eq!(fake.applies(), 0);
    }

    #[test]
    fn test_apply_failure_leaves_session_inactive() {
        let fake = FakeTerminal::new();
        let original = fake.live();
        fake.fail_next_applies(1);
        let ctl = controller(&fake);

        assert!(matches!(ctl.enter(), Err(TerminalError::Apply(_))));
        assert!(!ctl.is_active());
        assert_eq!(fake.live(), original);

        // Dropping an inactive controller must not touch the device
        drop(ctl);
        assert_eq!(fake.applies(), 0);
    }

    #[test]
    fn test_failed_exit_retried_on_drop() {
        let fake = FakeTerminal::new();
        let original = fake.live();
        let ctl = controller(&fake);

        ctl.enter().unwrap();
        fake.fail_next_applies(1);
        ctl.exit();
        assert!(ctl.is_active());
        assert_ne!(fake.live(), original);

        drop(ctl);
        assert_eq!(fake.live(), original);
    }

    #[test]
    fn test_drop_restores() {
        let fake = FakeTerminal::new();
        let original = fake.live();
        {
            let ctl = controller(&fake);
            ctl.enter().unwrap();
            assert_ne!(fake.live(), original);
        }
        assert_eq!(fake.live(), original);
    }

    #[test]
    fn test_guard_restores_on_early_return() {
        fn fails_inside_raw_mode(ctl: &TerminalModeController<FakeTerminal>) -> Result<()> {
            let _raw = ctl.activate()?;
            Err(TerminalError::SessionBusy)
        }

        let fake = FakeTerminal::new();
        let original = fake.live();
        let ctl = controller(&fake);

        assert!(fails_inside_raw_mode(&ctl).is_err());
        assert!(!ctl.is_active());
        assert_eq!(fake.live(), original);
    }

    #[test]
    fn test_restore_hook() {
        let fake = FakeTerminal::new();
        let original = fake.live();
        let ctl = controller(&fake);
        let hook = ctl.restore_hook();

        ctl.enter().unwrap();
        assert!(hook.restore());
        assert!(!ctl.is_active());
        assert_eq!(fake.live(), original);

        let applies = fake.applies();
        assert!(hook.clone().restore());
        drop(ctl);
        assert_eq!(fake.applies(), applies);
    }

    #[test]
    fn test_restore_hook_recovers_poisoned_lock() {
        let fake = FakeTerminal::new();
        let original = fake.live();
        let ctl = controller(&fake);
        ctl.enter().unwrap();
        let hook = ctl.restore_hook();

        let session = Arc::clone(&ctl.session);
        let _ = std::thread::spawn(move || {
            let _guard = session.lock().unwrap();
            panic!("poison the session lock");
        })
        .join();

        assert!(hook.restore());
        assert_eq!(fake.live(), original);
    }

    #[test]
    fn test_panic_hook_restores() {
        use std::mem::ManuallyDrop;
        use std::panic::AssertUnwindSafe;

        let saved = panic::take_hook();

        // Hook restores while the controller is still alive
        let fake = FakeTerminal::new();
        let original = fake.live();
        let ctl = ManuallyDrop::new(controller(&fake));
        install_panic_hook(ctl.restore_hook());
        ctl.enter().unwrap();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            panic!("panic in raw mode");
        }));
        assert!(result.is_err());
        assert!(!ctl.is_active());
        assert_eq!(fake.live(), original);
        drop(ManuallyDrop::into_inner(ctl));

        // Panicking frame holds the session lock: the hook backs off and the
        // controller's drop restores once unwinding releases it
        let fake = FakeTerminal::new();
        let original = fake.live();
        let ctl = controller(&fake);
        let hook = ctl.restore_hook();
        install_panic_hook(hook.clone());
        ctl.enter().unwrap();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _held = ctl.lock();
            assert!(!hook.restore());
            panic!("panic with the session locked");
        }));
        assert!(result.is_err());
        drop(ctl);
        assert_eq!(fake.live(), original);

        let _ = panic::take_hook();
        panic::set_hook(saved);
    }

    #[test]
    fn test_stdin_session_is_exclusive() {
        let first = TerminalModeController::stdin(RawModeOptions::default()).unwrap();
        assert!(matches!(
            TerminalModeController::stdin(RawModeOptions::default()),
            Err(TerminalError::SessionBusy)
        ));

        drop(first);
        assert!(TerminalModeController::stdin(RawModeOptions::default()).is_ok());
    }
}
