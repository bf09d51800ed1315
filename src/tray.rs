//! Status text formatting
//!
//! Pure string builders for the tray tooltip and screen labels. The text is
//! also emitted through the log output so state changes stay visible
//! without a tray surface.

use crate::hotkey::Hotkey;

/// Tooltip line, e.g. "Mouse Guard (Blocking) - Hotkey: Control,Alt,B".
pub fn status_line(app_name: &str, blocking_enabled: bool, hotkey: &Hotkey) -> String {
    let status = if blocking_enabled {
        "Blocking"
    } else {
        "Unblocked"
    };
    format!("{app_name} ({status}) - Hotkey: {hotkey}")
}

/// Screen label combining a friendly monitor name with the output name,
/// falling back to the output name alone.
pub fn compose_display_name(device_name: &str, friendly_name: Option<&str>) -> String {
    match friendly_name {
        Some(friendly) if !friendly.is_empty() => format!("{friendly} ({device_name})"),
        _ => device_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_line_blocking() {
        let line = status_line("Mouse Guard", true, &Hotkey::default());
        assert_eq!(line, "Mouse Guard (Blocking) - Hotkey: Control,Alt,B");
    }

    #[test]
    fn test_status_line_unblocked() {
        let line = status_line("Mouse Guard", false, &Hotkey::default());
        assert_eq!(line, "Mouse Guard (Unblocked) - Hotkey: Control,Alt,B");
    }

    #[test]
    fn test_compose_display_name_with_friendly_name() {
        assert_eq!(
            compose_display_name("DP-1", Some("DELL U2720Q")),
            "DELL U2720Q (DP-1)"
        );
    }

    #[test]
    fn test_compose_display_name_without_friendly_name() {
        assert_eq!(compose_display_name("DP-1", None), "DP-1");
        assert_eq!(compose_display_name("DP-1", Some("")), "DP-1");
    }
}
