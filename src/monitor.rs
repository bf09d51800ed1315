//! Monitor-topology state machine
//!
//! Classifies the display configuration as single- or multi-monitor from an
//! injected screen-count source and reports mode transitions exactly once
//! per actual change. Raw count changes that stay on one side of the
//! single/multi boundary (2 -> 3, 3 -> 2) are not transitions.

use std::rc::Rc;

use tracing::info;

/// Number of screens currently attached.
///
/// Implementations must be infallible; wrap fallible platform calls to
/// report 0 ("no monitors"), which classifies as single-monitor mode.
pub trait ScreenCountSource {
    fn screen_count(&self) -> usize;
}

impl<S: ScreenCountSource + ?Sized> ScreenCountSource for Rc<S> {
    fn screen_count(&self) -> usize {
        (**self).screen_count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorMode {
    Single,
    Multi,
}

/// Mode change reported by [`MonitorTopology::recheck`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    ToSingle,
    ToMulti,
}

/// Tracks single- vs multi-monitor mode for the lifetime of the process.
///
/// The instance is exclusively owned; callers sharing one across threads
/// must add their own synchronization.
pub struct MonitorTopology<S> {
    source: S,
    mode: MonitorMode,
}

impl<S: ScreenCountSource> MonitorTopology<S> {
    pub fn new(source: S) -> Self {
        let mode = classify(source.screen_count());
        Self { source, mode }
    }

    pub fn current_mode(&self) -> MonitorMode {
        self.mode
    }

    pub fn screen_count(&self) -> usize {
        self.source.screen_count()
    }

    /// Re-reads the screen count and returns the transition if the
    /// single/multi classification changed, None otherwise.
    pub fn recheck(&mut self) -> Option<Transition> {
        let mode = classify(self.source.screen_count());
        if mode == self.mode {
            return None;
        }
        self.mode = mode;
        let transition = match mode {
            MonitorMode::Single => Transition::ToSingle,
            MonitorMode::Multi => Transition::ToMulti,
        };
        info!(?transition, "monitor mode changed");
        Some(transition)
    }

    /// Periodic polling is only needed while in single-monitor mode, to
    /// notice a monitor being added back.
    pub fn should_run_periodic_recheck(&self) -> bool {
        self.mode == MonitorMode::Single
    }
}

fn classify(count: usize) -> MonitorMode {
    if count <= 1 {
        MonitorMode::Single
    } else {
        MonitorMode::Multi
    }
}
