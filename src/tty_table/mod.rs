//! Column-aligned text tables for the in-place status display.

/// The current contents of a table: headers plus cell rows.
#[derive(Debug, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub cells: Vec<Vec<String>>,
}

impl Table {
    /// The maximal display width of each column across headers and rows.
    pub fn column_widths(&self) -> Vec<usize> {
        let columns = self
            .cells
            .iter()
            .map(Vec::len)
            .chain([self.headers.len()])
            .max()
            .unwrap_or_default();

        let mut widths = vec![0; columns];
        for row in self.cells.iter().chain([&self.headers]) {
            for (index, cell) in row.iter().enumerate() {
                widths[index] = widths[index].max(cell.chars().count());
            }
        }
        widths
    }
}

/// Rendering options for a [`Table`].
#[derive(Debug, Default, Clone)]
pub struct Renderer {
    /// The separator placed between columns. Defaults to a single space.
    pub column_separator: String,

    /// The maximum width allowed for any rendered line. Longer lines are
    /// truncated and finished with an ellipsis. Zero disables truncation.
    pub max_width: usize,
}

impl Renderer {
    /// Render headers and cells into column-aligned lines. All columns but
    /// the last are right-padded; the final column is left ragged so
    /// terminals do not wrap on trailing spaces.
    pub fn render(&self, table: &Table) -> Vec<String> {
        let separator = if self.column_separator.is_empty() {
            " "
        } else {
            self.column_separator.as_str()
        };

        let widths = table.column_widths();

        [&table.headers]
            .into_iter()
            .chain(table.cells.iter())
            .map(|row| self.elide(pad_row_cells(row, &widths).join(separator)))
            .collect()
    }

    fn elide(&self, line: String) -> String {
        if self.max_width == 0 {
            return line;
        }

        let chars: Vec<char> = line.chars().collect();
        if chars.len() <= self.max_width {
            return line;
        }

        let mut truncated: String = chars[..self.max_width - 1].iter().collect();
        truncated.push('…');
        truncated
    }
}

fn pad_row_cells(row: &[String], column_widths: &[usize]) -> Vec<String> {
    row.iter()
        .enumerate()
        .map(|(index, cell)| {
            if index < row.len() - 1 {
                let width = cell.chars().count();
                let padding = column_widths[index].saturating_sub(width);
                format!("{cell}{}", " ".repeat(padding))
            } else {
                cell.clone()
            }
        })
        .collect()
}
