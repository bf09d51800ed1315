//! Thin X11 adapters
//!
//! Everything the core consumes from the platform (monitor layout, cursor
//! position, cursor warping, cursor visibility) as single-request wrappers
//! over one X11 connection. No state is kept beyond the connection itself.

use anyhow::{Context, Result};
use tracing::warn;
use x11rb::connection::Connection;
use x11rb::protocol::randr::ConnectionExt as _;
use x11rb::protocol::xfixes::ConnectionExt as _;
use x11rb::protocol::xproto::{Atom, ConnectionExt as _, Window};
use x11rb::rust_connection::RustConnection;

use crate::monitor::ScreenCountSource;
use crate::types::{Point, Rect, ScreenInfo};

pub struct X11Desktop {
    conn: RustConnection,
    root: Window,
}

impl X11Desktop {
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None).context("Failed to connect to X11")?;
        let root = conn.setup().roots[screen_num].root;

        // XFIXES requires version negotiation before cursor requests
        conn.xfixes_query_version(5, 0)
            .context("XFIXES version request failed")?
            .reply()
            .context("XFIXES is unavailable on this server")?;

        Ok(Self { conn, root })
    }

    /// Current monitor layout as reported by RandR, primary first.
    pub fn screens(&self) -> Result<Vec<ScreenInfo>> {
        let reply = self
            .conn
            .randr_get_monitors(self.root, true)
            .context("RandR get_monitors request failed")?
            .reply()
            .context("RandR get_monitors reply failed")?;

        let mut screens = Vec::with_capacity(reply.monitors.len());
        for monitor in reply.monitors {
            let name = self
                .atom_name(monitor.name)
                .unwrap_or_else(|_| "unknown".to_string());
            screens.push(ScreenInfo {
                name,
                bounds: Rect::new(
                    monitor.x.into(),
                    monitor.y.into(),
                    monitor.width.into(),
                    monitor.height.into(),
                ),
                primary: monitor.primary,
            });
        }
        Ok(screens)
    }

    pub fn cursor_position(&self) -> Result<Point> {
        let reply = self
            .conn
            .query_pointer(self.root)
            .context("query_pointer request failed")?
            .reply()
            .context("query_pointer reply failed")?;
        Ok(Point::new(reply.root_x.into(), reply.root_y.into()))
    }

    pub fn move_cursor(&self, point: Point) -> Result<()> {
        self.conn
            .warp_pointer(
                x11rb::NONE,
                self.root,
                0,
                0,
                0,
                0,
                point.x as i16,
                point.y as i16,
            )
            .context("warp_pointer request failed")?;
        self.conn.flush().context("flush after warp_pointer failed")?;
        Ok(())
    }

    pub fn set_cursor_visible(&self, visible: bool) -> Result<()> {
        if visible {
            self.conn
                .xfixes_show_cursor(self.root)
                .context("show_cursor request failed")?;
        } else {
            self.conn
                .xfixes_hide_cursor(self.root)
                .context("hide_cursor request failed")?;
        }
        self.conn.flush().context("flush after cursor change failed")?;
        Ok(())
    }

    fn atom_name(&self, atom: Atom) -> Result<String> {
        let reply = self.conn.get_atom_name(atom)?.reply()?;
        Ok(String::from_utf8_lossy(&reply.name).into_owned())
    }
}

impl ScreenCountSource for X11Desktop {
    /// Monitor count; enumeration failure reports 0 ("no monitors"), which
    /// the topology treats as single-monitor mode.
    fn screen_count(&self) -> usize {
        match self.screens() {
            Ok(screens) => screens.len(),
            Err(err) => {
                warn!(error = %err, "Screen enumeration failed, reporting no monitors");
                0
            }
        }
    }
}
