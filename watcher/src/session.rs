//! Session controller: run-mode policy and exit codes.

use std::ops::ControlFlow;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{SessionConfig, WatchMode};
use crate::error::Result;
use crate::event::Event;
use crate::poller::Poller;
use crate::report::EventSink;
use crate::watcher::EventWatcher;

/// Exit code after an interrupt while polling.
pub const POLLING_INTERRUPT_EXIT_CODE: i32 = 128;

/// Exit code after an interrupt while watching.
pub const WATCHING_INTERRUPT_EXIT_CODE: i32 = 130;

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Single-shot run stopped at this event.
    Event(Event),

    /// The timeout elapsed.
    TimedOut,

    /// The user cancelled the session.
    Interrupted,
}

/// Terminal outcome of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub termination: Termination,
    pub exit_code: i32,
}

/// Drives a reconciler and decides, per event, whether to keep going.
///
/// Starts in the running state; returning a [`RunResult`] is the only way
/// out.
pub struct SessionController<S: EventSink> {
    config: SessionConfig,
    continuous: bool,
    sink: S,
    cancel: CancellationToken,
    started_at: Instant,
}

impl<S: EventSink> SessionController<S> {
    pub fn new(config: SessionConfig, sink: S, cancel: CancellationToken) -> Self {
        let continuous = config.effective_continuous();
        Self {
            config,
            continuous,
            sink,
            cancel,
            started_at: Instant::now(),
        }
    }

    /// Validate the configuration and run the reconciler it selects.
    pub async fn run(&mut self) -> Result<RunResult> {
        self.config.validate()?;

        match self.config.mode {
            WatchMode::Polling => {
                let mut poller = Poller::new(&self.config.paths)?;
                self.run_polling(&mut poller).await
            }
            WatchMode::Watching => {
                let mut watcher = EventWatcher::with_os_backend(self.config.pattern()?)?;
                let result = self.run_watching(&mut watcher).await;
                watcher.shutdown();
                result
            }
        }
    }

    /// Run with a poller already built for the configured paths.
    pub async fn run_polling(&mut self, poller: &mut Poller) -> Result<RunResult> {
        self.start();
        poller.run(self).await
    }

    /// Register the configured paths with `watcher` and run it.
    pub async fn run_watching(&mut self, watcher: &mut EventWatcher) -> Result<RunResult> {
        watcher.watch_paths(&self.config.paths, self.config.recursive)?;
        self.start();
        watcher.run(self).await
    }

    fn start(&mut self) {
        self.started_at = Instant::now();
        info!(
            "Session started ({:?}, continuous: {}, timeout: {:?})",
            self.config.mode, self.continuous, self.config.timeout
        );
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Whether the session keeps going after an event.
    pub fn is_continuous(&self) -> bool {
        self.continuous
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Instant at which the timeout expires, if one is set.
    pub fn deadline(&self) -> Option<Instant> {
        self.config
            .has_timeout()
            .then_some(self.started_at + self.config.timeout)
    }

    pub fn timed_out(&self) -> bool {
        self.config.has_timeout() && self.started_at.elapsed() >= self.config.timeout
    }

    /// Report an event and decide whether the session ends.
    pub fn dispatch(&mut self, event: Event) -> Result<ControlFlow<RunResult>> {
        self.sink.emit(&event)?;

        if self.continuous {
            return Ok(ControlFlow::Continue(()));
        }

        let exit_code = if self.config.success_only {
            0
        } else {
            event.kind.exit_code()
        };
        info!("Stopping after {} on {}", event.kind, event.path.display());
        Ok(ControlFlow::Break(RunResult {
            termination: Termination::Event(event),
            exit_code,
        }))
    }

    /// Dispatch events in order, stopping at the first that ends the session.
    pub fn dispatch_all(&mut self, events: Vec<Event>) -> Result<ControlFlow<RunResult>> {
        for event in events {
            if let ControlFlow::Break(result) = self.dispatch(event)? {
                return Ok(ControlFlow::Break(result));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    pub fn timed_out_result(&self) -> RunResult {
        info!("Timeout of {:?} reached", self.config.timeout);
        RunResult {
            termination: Termination::TimedOut,
            exit_code: 0,
        }
    }

    pub fn interrupted(&self, mode: WatchMode) -> RunResult {
        info!("Interrupted");
        let exit_code = match mode {
            WatchMode::Polling => POLLING_INTERRUPT_EXIT_CODE,
            WatchMode::Watching => WATCHING_INTERRUPT_EXIT_CODE,
        };
        RunResult {
            termination: Termination::Interrupted,
            exit_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn controller(config: SessionConfig) -> SessionController<Vec<Event>> {
        SessionController::new(config, Vec::new(), CancellationToken::new())
    }

    #[test]
    fn test_single_shot_exit_codes() {
        for (kind, code) in [
            (EventKind::Modify, 0),
            (EventKind::Add, 1),
            (EventKind::Remove, 2),
        ] {
            let mut session = controller(SessionConfig::new(["a.txt"]));
            let flow = session.dispatch(Event::new(kind, "a.txt")).unwrap();

            let ControlFlow::Break(result) = flow else {
                panic!("single-shot session kept running");
            };
            assert_eq!(result.exit_code, code);
            assert!(matches!(result.termination, Termination::Event(ref e) if e.kind == kind));
            assert_eq!(session.sink().len(), 1);
        }
    }

    #[test]
    fn test_success_only_always_zero() {
        for kind in [EventKind::Modify, EventKind::Add, EventKind::Remove] {
            let mut session = controller(SessionConfig::new(["a.txt"]).success_only());
            let flow = session.dispatch(Event::new(kind, "a.txt")).unwrap();

            assert!(matches!(flow, ControlFlow::Break(RunResult { exit_code: 0, .. })));
        }
    }

    #[test]
    fn test_continuous_keeps_running() {
        let mut session = controller(SessionConfig::new(["a.txt"]).continuous());

        let flow = session
            .dispatch_all(vec![Event::remove("a.txt"), Event::add("a.txt")])
            .unwrap();

        assert_eq!(flow, ControlFlow::Continue(()));
        let kinds: Vec<_> = session.sink().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Remove, EventKind::Add]);
    }

    #[test]
    fn test_dispatch_all_stops_at_first_in_single_shot() {
        let mut session = controller(SessionConfig::new(["a.txt", "b.txt"]));

        let flow = session
            .dispatch_all(vec![Event::remove("a.txt"), Event::remove("b.txt")])
            .unwrap();

        assert!(matches!(flow, ControlFlow::Break(_)));
        assert_eq!(session.into_sink().len(), 1);
    }

    #[test]
    fn test_timeout_makes_session_continuous() {
        let session = controller(SessionConfig::new(["a.txt"]).with_timeout(Duration::from_secs(5)));
        assert!(session.is_continuous());
        assert!(session.deadline().is_some());
    }

    #[test]
    fn test_no_timeout_no_deadline() {
        let session = controller(SessionConfig::new(["a.txt"]));
        assert!(!session.is_continuous());
        assert_eq!(session.deadline(), None);
        assert!(!session.timed_out());
    }

    #[test]
    fn test_timeout_and_interrupt_codes() {
        let session = controller(SessionConfig::new(["a.txt"]).success_only());

        assert_eq!(
            session.timed_out_result(),
            RunResult {
                termination: Termination::TimedOut,
                exit_code: 0
            }
        );
        assert_eq!(session.interrupted(WatchMode::Polling).exit_code, 128);
        assert_eq!(session.interrupted(WatchMode::Watching).exit_code, 130);
    }
}
