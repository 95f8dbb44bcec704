//! Process-wide log and status output. A single lock serialises the two so
//! interactive log lines never tear the in-place status block: each line
//! erases the block, prints, and redraws it.

mod approximate;

pub use approximate::approximate;

use crate::status::Set;

use crossterm::terminal;
use std::io::{self, IsTerminal, Write};
use std::sync::{LazyLock, Mutex};
use tracing_subscriber::fmt::MakeWriter;

const CSI: &str = "\x1b[";
const MIN_VIEWPORT_WIDTH: u16 = 80;
const FALLBACK_VIEWPORT_WIDTH: u16 = 120;
const TOO_NARROW_NOTICE: &str = "-- terminal too narrow for status: need at least 80 columns --";

static SCREEN: LazyLock<Mutex<Screen>> = LazyLock::new(|| Mutex::new(Screen::new()));

/// Whether stderr is a terminal and the status block can be redrawn in place.
pub fn interactive_mode() -> bool {
    io::stderr().is_terminal()
}

/// Install the tracing subscriber that routes log lines through the status
/// screen. Later calls are no-ops, which keeps tests happy.
pub fn init() {
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_target(false)
        .with_writer(StatusWriter)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Erase the currently drawn status block, if any.
pub fn clear_status() {
    with_screen(|screen| screen.hide());
}

/// Replace the status snapshot and draw it.
pub fn status_print(set: Set) {
    with_screen(|screen| {
        screen.set = set;
        screen.show();
    });
}

struct Screen {
    interactive: bool,
    line_count: usize,
    set: Set,
}

impl Screen {
    fn new() -> Self {
        Self {
            interactive: interactive_mode(),
            line_count: 0,
            set: Set::default(),
        }
    }

    fn hide(&mut self) {
        if !self.interactive {
            return;
        }

        let mut err = io::stderr();
        let _ = write!(err, "{CSI}1G{CSI}0K");
        for _ in 0..self.line_count {
            let _ = write!(err, "{CSI}1A{CSI}1G{CSI}0K");
        }
        self.line_count = 0;
        let _ = err.flush();
    }

    fn show(&mut self) {
        let mut err = io::stderr();

        if self.interactive {
            let (width, _) = terminal::size().unwrap_or((FALLBACK_VIEWPORT_WIDTH, 24));
            let lines = if width < MIN_VIEWPORT_WIDTH {
                vec![String::new(), TOO_NARROW_NOTICE.to_owned()]
            } else {
                self.set.display(width as usize)
            };

            self.line_count = lines.len();
            for line in lines {
                let _ = writeln!(err, "{line}");
            }
        } else {
            for line in self.set.to_file() {
                let _ = writeln!(err, "{line}");
            }
        }

        let _ = err.flush();
    }

    fn print_log(&mut self, bytes: &[u8]) {
        if self.interactive {
            self.hide();
        }

        let mut out = io::stdout();
        let _ = out.write_all(bytes);
        let _ = out.flush();

        if self.interactive {
            self.show();
        }
    }
}

fn with_screen<F: FnOnce(&mut Screen)>(f: F) {
    let mut screen = SCREEN.lock().unwrap_or_else(|err| err.into_inner());
    f(&mut screen);
}

/// `MakeWriter` handing tracing a per-event buffer; the formatted event is
/// flushed through the status screen when the buffer drops.
pub struct StatusWriter;

impl<'a> MakeWriter<'a> for StatusWriter {
    type Writer = LineBuffer;

    fn make_writer(&'a self) -> LineBuffer {
        LineBuffer::default()
    }
}

#[derive(Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl Write for LineBuffer {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for LineBuffer {
    fn drop(&mut self) {
        if !self.buf.is_empty() {
            with_screen(|screen| screen.print_log(&self.buf));
        }
    }
}
