use super::Status;
use crate::tty_table::{Renderer, Table};

use chrono::Local;

const STATUS_DELIMITER: &str = " Current Status ";
const HALF_MAX_DELIMITER_WIDTH: usize = 60;
const COLUMN_SEPARATOR: &str = "  ";
const FILE_RENDER_WIDTH: usize = 200;

/// A snapshot of every operation's status, renderable as a table.
#[derive(Debug, Default)]
pub struct Set {
    statuses: Vec<Status>,
}

impl Set {
    pub fn new(statuses: Vec<Status>) -> Self {
        Self { statuses }
    }

    /// Lines for the interactive display at the given viewport width:
    /// a blank spacer, the centred delimiter, then the aligned table.
    pub fn display(&self, viewport_width: usize) -> Vec<String> {
        let renderer = Renderer {
            column_separator: COLUMN_SEPARATOR.into(),
            max_width: viewport_width,
        };

        let mut lines = vec![String::new(), self.delimiter(viewport_width)];
        lines.extend(renderer.render(&self.table()));
        lines
    }

    /// Lines for non-interactive output: a timestamp header and the table
    /// rendered at a fixed generous width.
    pub fn to_file(&self) -> Vec<String> {
        let renderer = Renderer {
            column_separator: COLUMN_SEPARATOR.into(),
            max_width: FILE_RENDER_WIDTH,
        };

        let mut lines = vec![
            String::new(),
            Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        ];
        lines.extend(renderer.render(&self.table()));
        lines
    }

    fn header() -> Vec<String> {
        ["TABLE", "DETAILS", "BACKFILL", "STREAM", "RATES & BUFFER"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// " Current Status " centred in a viewport-wide run of dashes.
    fn delimiter(&self, viewport_width: usize) -> String {
        let div = (viewport_width.saturating_sub(STATUS_DELIMITER.len()) / 2)
            .saturating_sub(1)
            .min(HALF_MAX_DELIMITER_WIDTH);

        format!("{}{}{}", "-".repeat(div), STATUS_DELIMITER, "-".repeat(div))
    }

    fn table(&self) -> Table {
        Table {
            headers: Self::header(),
            cells: self.statuses.iter().map(Status::display).collect(),
        }
    }
}
