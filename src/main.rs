#![forbid(unsafe_code)]

mod constants;
mod guard;
mod hotkey;
mod monitor;
mod settings;
mod single_instance;
mod tray;
mod types;
mod x11_utils;

use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Instant;

use clap::Parser;
use tracing::{Level as TraceLevel, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use constants::{config, messages, timing};
use guard::{GuardEngine, GuardVerdict};
use hotkey::{Hotkey, HotkeyCommand};
use monitor::{MonitorMode, MonitorTopology, Transition};
use settings::{AppSettings, SettingsStore};
use single_instance::SingleInstance;
use tray::{compose_display_name, status_line};
use x11_utils::X11Desktop;

/// Blocks the mouse cursor from entering a selected screen.
#[derive(Parser, Debug)]
#[command(name = "mouse-guard", version, about)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); the LOG_LEVEL
    /// environment variable is honored as a fallback
    #[arg(long)]
    log_level: Option<String>,

    /// Block the screen with the given index (persisted), then run
    #[arg(long, value_name = "INDEX", conflicts_with = "unblock")]
    block: Option<usize>,

    /// Clear any persisted blocked screen, then run
    #[arg(long)]
    unblock: bool,

    /// Print the detected screens and exit
    #[arg(long)]
    list_screens: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_level = match cli
        .log_level
        .or_else(|| std::env::var("LOG_LEVEL").ok())
        .unwrap_or_else(|| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let desktop = Rc::new(X11Desktop::connect()?);
    let screens = desktop.screens()?;
    for (index, screen) in screens.iter().enumerate() {
        info!(
            index = index,
            name = %compose_display_name(&screen.name, None),
            primary = screen.primary,
            x = screen.bounds.x,
            y = screen.bounds.y,
            width = screen.bounds.width,
            height = screen.bounds.height,
            "detected screen"
        );
    }

    if cli.list_screens {
        for (index, screen) in screens.iter().enumerate() {
            println!(
                "{}: {} [{}x{} at {},{}]{}",
                index,
                compose_display_name(&screen.name, None),
                screen.bounds.width,
                screen.bounds.height,
                screen.bounds.x,
                screen.bounds.y,
                if screen.primary { " (primary)" } else { "" },
            );
        }
        return Ok(());
    }

    let store = SettingsStore::open_default();
    let lock_path = store
        .settings_file_path()
        .with_file_name(config::LOCK_FILENAME);
    let instance = SingleInstance::acquire(&lock_path);
    if !instance.is_first_instance() {
        error!("Another instance is already running, exiting");
        return Ok(());
    }

    // Migrate old settings from the install directory if needed
    store.migrate_old_settings();
    let persisted: AppSettings = store.load();

    let hotkey = match persisted.hotkey.as_deref() {
        Some(text) => Hotkey::parse(text).unwrap_or_else(|| {
            warn!(hotkey = %text, "Could not parse persisted hotkey, using default");
            Hotkey::default()
        }),
        None => Hotkey::default(),
    };

    // Drop a persisted selection that no longer points at an attached screen
    let mut blocked = persisted
        .blocked_screen_index
        .filter(|&index| index < screens.len());

    if let Some(index) = cli.block {
        if index < screens.len() {
            info!(index = index, name = %screens[index].name, "Blocking screen");
            blocked = Some(index);
        } else {
            error!(
                index = index,
                screens = screens.len(),
                "--block index out of range"
            );
            return Ok(());
        }
    } else if cli.unblock {
        info!("Clearing blocked screen");
        blocked = None;
    }

    if blocked != persisted.blocked_screen_index {
        store.save(&AppSettings {
            blocked_screen_index: blocked,
            hotkey: Some(hotkey.to_string()),
        });
    }

    let mut guard = GuardEngine::new(blocked);
    let mut topology = MonitorTopology::new(Rc::clone(&desktop));
    if topology.current_mode() == MonitorMode::Single {
        warn!("{}", messages::SINGLE_MONITOR_WARNING);
    }

    // Channel for hotkey threads -> main loop
    let (hotkey_tx, hotkey_rx) = mpsc::channel();

    // Spawn hotkey listener (optional - skip if permissions denied)
    let _hotkey_handles = if hotkey::check_permissions() {
        match hotkey::spawn_listener(hotkey, hotkey_tx) {
            Ok(handles) => {
                info!(hotkey = %hotkey, "Hotkey support enabled");
                Some(handles)
            }
            Err(e) => {
                error!(error = %e, "Failed to start hotkey listener");
                hotkey::print_permission_error();
                None
            }
        }
    } else {
        hotkey::print_permission_error();
        None
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    #[cfg(unix)]
    {
        signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown))?;
        signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown))?;
    }

    info!("{}", status_line(messages::APP_NAME, guard.is_enabled(), &hotkey));

    let mut last_recheck = Instant::now();
    let mut cursor_hidden = false;

    while !shutdown.load(Ordering::Relaxed) {
        std::thread::sleep(timing::CURSOR_POLL_INTERVAL);

        while let Ok(HotkeyCommand::ToggleBlocking) = hotkey_rx.try_recv() {
            guard.toggle();
            info!("{}", status_line(messages::APP_NAME, guard.is_enabled(), &hotkey));
        }

        let screens = match desktop.screens() {
            Ok(screens) => screens,
            Err(e) => {
                error!(error = %e, "Screen enumeration failed");
                continue;
            }
        };
        let cursor = match desktop.cursor_position() {
            Ok(cursor) => cursor,
            Err(e) => {
                error!(error = %e, "Cursor query failed");
                continue;
            }
        };

        let single = topology.current_mode() == MonitorMode::Single;
        let mut force_recheck = false;

        match guard.evaluate(single, &screens, cursor) {
            GuardVerdict::Allow => {
                if cursor_hidden {
                    match desktop.set_cursor_visible(true) {
                        Ok(()) => cursor_hidden = false,
                        Err(e) => error!(error = %e, "Failed to show cursor"),
                    }
                }
            }
            GuardVerdict::Block { move_to, notify } => {
                if let Err(e) = desktop.move_cursor(move_to) {
                    error!(error = %e, "Failed to move cursor off blocked screen");
                }
                if !cursor_hidden {
                    match desktop.set_cursor_visible(false) {
                        Ok(()) => cursor_hidden = true,
                        Err(e) => error!(error = %e, "Failed to hide cursor"),
                    }
                }
                if notify {
                    info!(
                        "{}: {}",
                        messages::NOTIFICATION_TITLE,
                        messages::NOTIFICATION_MESSAGE
                    );
                }
            }
            GuardVerdict::StaleBlockedScreen => {
                force_recheck = true;
            }
        }

        // Periodic polling runs only in single-monitor mode; a stale blocked
        // index or an observed drop to one screen forces an immediate check
        let removal_suspected = !single && screens.len() <= 1;
        let due = last_recheck.elapsed() >= timing::MONITOR_CHECK_INTERVAL;
        if force_recheck || removal_suspected || (due && topology.should_run_periodic_recheck()) {
            last_recheck = Instant::now();
            match topology.recheck() {
                Some(Transition::ToSingle) => {
                    warn!("{}", messages::SINGLE_MONITOR_WARNING);
                    guard.set_blocked_screen(None);
                    store.save(&AppSettings {
                        blocked_screen_index: None,
                        hotkey: Some(hotkey.to_string()),
                    });
                }
                Some(Transition::ToMulti) => {
                    info!("Second monitor detected, blocking available again");
                }
                None => {}
            }
        }
    }

    info!("Shutting down");
    if cursor_hidden {
        if let Err(e) = desktop.set_cursor_visible(true) {
            error!(error = %e, "Failed to restore cursor on exit");
        }
    }
    store.save(&AppSettings {
        blocked_screen_index: guard.blocked_screen(),
        hotkey: Some(hotkey.to_string()),
    });

    Ok(())
}
