//! Cursor blocking engine
//!
//! Pure per-tick decision core: given the current monitor mode, screen
//! layout and cursor position, decide whether the cursor may stay where it
//! is or must be warped off the blocked screen. The caller applies the
//! verdict through the platform layer.

use crate::types::{Point, ScreenInfo};

/// Outcome of one evaluation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardVerdict {
    /// Cursor may stay where it is; ensure it is visible.
    Allow,
    /// Cursor entered the blocked screen: warp it to `move_to` and hide it.
    /// `notify` is true only on the first tick of a block episode.
    Block { move_to: Point, notify: bool },
    /// The stored screen index no longer matches an attached screen; the
    /// caller should force a topology recheck.
    StaleBlockedScreen,
}

pub struct GuardEngine {
    blocked_screen: Option<usize>,
    enabled: bool,
    notified: bool,
}

impl GuardEngine {
    pub fn new(blocked_screen: Option<usize>) -> Self {
        Self {
            blocked_screen,
            enabled: true,
            notified: false,
        }
    }

    pub fn blocked_screen(&self) -> Option<usize> {
        self.blocked_screen
    }

    pub fn set_blocked_screen(&mut self, index: Option<usize>) {
        self.blocked_screen = index;
        self.notified = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Flip blocking on/off; returns the new state.
    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.enabled
    }

    pub fn evaluate(
        &mut self,
        single_monitor_mode: bool,
        screens: &[ScreenInfo],
        cursor: Point,
    ) -> GuardVerdict {
        if single_monitor_mode || !self.enabled {
            self.notified = false;
            return GuardVerdict::Allow;
        }
        let Some(index) = self.blocked_screen else {
            self.notified = false;
            return GuardVerdict::Allow;
        };
        let Some(blocked) = screens.get(index) else {
            self.notified = false;
            return GuardVerdict::StaleBlockedScreen;
        };
        if !blocked.bounds.contains(cursor) {
            self.notified = false;
            return GuardVerdict::Allow;
        }
        match safe_point(screens) {
            Some(move_to) => {
                let notify = !self.notified;
                self.notified = true;
                GuardVerdict::Block { move_to, notify }
            }
            None => GuardVerdict::Allow,
        }
    }
}

/// Where a blocked cursor is parked: the primary screen's center, or the
/// first screen when none is marked primary.
fn safe_point(screens: &[ScreenInfo]) -> Option<Point> {
    screens
        .iter()
        .find(|screen| screen.primary)
        .or_else(|| screens.first())
        .map(|screen| screen.bounds.center())
}
