use crate::model::paragraph::Paragraph;

/// An inline table, navigated row-major. Editing a cell is editing one of
/// its nested paragraphs.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub rows: Vec<TableRow>,
}

impl Table {
    /// Build a `rows x cols` table with one empty paragraph per cell,
    /// optionally pre-filled from row-major `data`.
    pub fn with_size(rows: usize, cols: usize, data: Option<&[Vec<String>]>) -> Self {
        let mut table = Table::default();
        for r in 0..rows {
            let mut row = TableRow::default();
            for c in 0..cols {
                let text = data
                    .and_then(|d| d.get(r))
                    .and_then(|d| d.get(c))
                    .map(|s| s.as_str())
                    .unwrap_or("");
                row.cells.push(TableCell {
                    paragraphs: vec![Paragraph::from_text(text, 0)],
                    col_span: 1,
                    row_span: 1,
                });
            }
            table.rows.push(row);
        }
        table
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn col_count(&self) -> usize {
        self.rows.iter().map(|r| r.cells.len()).max().unwrap_or(0)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&TableCell> {
        self.rows.get(row)?.cells.get(col)
    }

    pub fn cell_mut(&mut self, row: usize, col: usize) -> Option<&mut TableCell> {
        self.rows.get_mut(row)?.cells.get_mut(col)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Default)]
pub struct TableCell {
    pub paragraphs: Vec<Paragraph>,
    pub col_span: u16,
    pub row_span: u16,
}

impl TableCell {
    pub fn plain_text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.plain_text())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
