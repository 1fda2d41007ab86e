//! Startup sequencing and the frame loop state machine.

use std::fmt;

use thiserror::Error;

use crate::Error;

/// The initialization phases, in the order they run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Window,
    Device,
    Overlay,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Window => "window",
            Phase::Device => "device",
            Phase::Overlay => "overlay",
        })
    }
}

#[derive(Debug, Error)]
#[error("{phase} initialization failed")]
pub struct StartupError {
    pub phase: Phase,
    #[source]
    pub source: Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Running,
    ShuttingDown,
}

pub struct Started<W, D, O> {
    pub window: W,
    pub device: D,
    pub overlay: O,
}

/// Runs window, device and overlay initialization in order.
///
/// The first failing phase is logged and returned; no later phase runs.
pub fn start<W, D, O>(
    window: impl FnOnce() -> crate::Result<W>,
    device: impl FnOnce(&mut W) -> crate::Result<D>,
    overlay: impl FnOnce(&mut W, &D) -> crate::Result<O>,
) -> Result<Started<W, D, O>, StartupError> {
    let fail = |phase: Phase| {
        move |source: Error| {
            log::error!("{phase} initialization failed: {source}");
            StartupError { phase, source }
        }
    };

    let mut window = window().map_err(fail(Phase::Window))?;
    let device = device(&mut window).map_err(fail(Phase::Device))?;
    let overlay = overlay(&mut window, &device).map_err(fail(Phase::Overlay))?;

    Ok(Started {
        window,
        device,
        overlay,
    })
}

/// Outcome of one non-blocking look at the message queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pump {
    Dispatched,
    Idle,
    Quit(i32),
}

pub trait FrameLoop {
    /// Cleared by the exit action; checked before every iteration.
    fn is_running(&self) -> bool;

    fn pump(&mut self) -> Pump;

    fn tick(&mut self);

    fn shutdown(&mut self);
}

/// Drives `app` until a quit message arrives or it stops running, then
/// shuts it down and returns the exit code.
pub fn run(app: &mut impl FrameLoop) -> i32 {
    let mut lifecycle = Lifecycle::Running;
    let mut exit_code = 0;

    while lifecycle == Lifecycle::Running {
        if !app.is_running() {
            lifecycle = Lifecycle::ShuttingDown;
            continue;
        }

        match app.pump() {
            Pump::Dispatched => {}
            Pump::Idle => app.tick(),
            Pump::Quit(code) => {
                exit_code = code;
                lifecycle = Lifecycle::ShuttingDown;
            }
        }
    }

    app.shutdown();
    log::info!("quit with exit code {exit_code}");

    exit_code
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, collections::VecDeque};

    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<&'static str>>,
    }

    impl Recorder {
        fn record(&self, call: &'static str) {
            self.calls.borrow_mut().push(call);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.borrow().clone()
        }
    }

    #[test]
    fn device_failure_stops_startup() {
        let recorder = Recorder::default();

        let result = start(
            || {
                recorder.record("window");
                Ok(())
            },
            |_| -> crate::Result<()> {
                recorder.record("device");
                Err(Error::Unsupported("no adapter"))
            },
            |_, _| {
                recorder.record("overlay");
                Ok(())
            },
        );

        let err = result.err().expect("startup should fail");
        assert_eq!(err.phase, Phase::Device);
        assert_eq!(err.to_string(), "device initialization failed");
        assert_eq!(recorder.calls(), vec!["window", "device"]);
    }

    #[test]
    fn window_failure_runs_nothing_else() {
        let recorder = Recorder::default();

        let result = start(
            || -> crate::Result<()> { Err(Error::Unsupported("no window")) },
            |_| {
                recorder.record("device");
                Ok(())
            },
            |_, _| {
                recorder.record("overlay");
                Ok(())
            },
        );

        assert_eq!(result.err().map(|e| e.phase), Some(Phase::Window));
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn successful_startup_keeps_every_phase() {
        let started = start(|| Ok(1), |w| Ok(*w + 1), |w, d| Ok(*w + *d)).unwrap();
        assert_eq!((started.window, started.device, started.overlay), (1, 2, 3));
    }

    struct Scripted {
        running: bool,
        messages: VecDeque<Pump>,
        ticks: usize,
        stop_after: Option<usize>,
        shutdowns: usize,
    }

    impl Scripted {
        fn new(messages: impl IntoIterator<Item = Pump>) -> Self {
            Self {
                running: true,
                messages: messages.into_iter().collect(),
                ticks: 0,
                stop_after: None,
                shutdowns: 0,
            }
        }
    }

    impl FrameLoop for Scripted {
        fn is_running(&self) -> bool {
            self.running
        }

        fn pump(&mut self) -> Pump {
            self.messages.pop_front().unwrap_or(Pump::Idle)
        }

        fn tick(&mut self) {
            self.ticks += 1;
            if self.stop_after == Some(self.ticks) {
                self.running = false;
            }
        }

        fn shutdown(&mut self) {
            self.shutdowns += 1;
        }
    }

    #[test]
    fn quit_message_ends_loop_with_its_code() {
        let mut app = Scripted::new([Pump::Dispatched, Pump::Idle, Pump::Idle, Pump::Quit(3)]);
        assert_eq!(run(&mut app), 3);
        assert_eq!(app.ticks, 2);
        assert_eq!(app.shutdowns, 1);
    }

    #[test]
    fn exit_action_ends_loop_on_next_check() {
        let mut app = Scripted::new([]);
        app.stop_after = Some(5);
        assert_eq!(run(&mut app), 0);
        assert_eq!(app.ticks, 5);
        assert_eq!(app.shutdowns, 1);
    }

    #[test]
    fn pending_messages_are_drained_before_ticking() {
        let mut app = Scripted::new([Pump::Dispatched, Pump::Dispatched, Pump::Quit(0)]);
        run(&mut app);
        assert_eq!(app.ticks, 0);
    }
}
