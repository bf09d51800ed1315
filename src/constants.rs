//! Application-wide constants
//!
//! Single source of truth for magic numbers and string literals used
//! throughout the application.

/// Settings storage names
pub mod config {
    /// Folder under the per-user config root holding all persisted state
    pub const APP_DIR: &str = "Mouse-Guard";

    /// Settings file name (same name is used at the legacy location)
    pub const SETTINGS_FILENAME: &str = "settings.json";

    /// Error log file name, co-located with the settings file
    pub const ERROR_LOG_FILENAME: &str = "error.log";

    /// Lock file name for the single-instance guard
    pub const LOCK_FILENAME: &str = "mouse-guard.lock";
}

/// Polling cadence
pub mod timing {
    use std::time::Duration;

    /// Cursor position poll interval
    pub const CURSOR_POLL_INTERVAL: Duration = Duration::from_millis(20);

    /// Monitor count recheck interval while in single-monitor mode
    pub const MONITOR_CHECK_INTERVAL: Duration = Duration::from_millis(5000);
}

/// Input event constants (from evdev)
pub mod input {
    /// Key press event value
    pub const KEY_PRESS: i32 = 1;
}

/// Filesystem paths for the hotkey listener
pub mod paths {
    /// Directory scanned for keyboard event devices
    pub const DEV_INPUT: &str = "/dev/input";
}

/// Permission hints for hotkey support
pub mod permissions {
    /// Group granting read access to /dev/input devices
    pub const INPUT_GROUP: &str = "input";

    /// Command that adds the current user to the input group
    pub const ADD_TO_INPUT_GROUP: &str = "sudo usermod -aG input $USER";
}

/// User-facing message strings
pub mod messages {
    pub const APP_NAME: &str = "Mouse Guard";

    pub const SINGLE_MONITOR_WARNING: &str = "Mouse Guard requires at least 2 monitors to \
        function properly. Currently only 1 monitor is detected. The application keeps \
        running but blocking is disabled until a second monitor is connected.";

    pub const NOTIFICATION_TITLE: &str = "Mouse Blocked";

    pub const NOTIFICATION_MESSAGE: &str =
        "The mouse was blocked from entering the selected screen.";
}
