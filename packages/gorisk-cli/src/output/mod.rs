//! Report rendering
//!
//! Plain-text tables and the machine formats. Everything rendered here is
//! already deterministically sorted by the producing stage; the renderers
//! never iterate a raw map.

pub mod cyclonedx;
pub mod sarif;
pub mod sparkline;

/// Minimal fixed-width table writer.
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: Into<String>>(headers: Vec<S>) -> Table {
        Table {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row<S: Into<String>>(&mut self, cells: Vec<S>) {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        let columns = self.headers.len();
        let mut widths: Vec<usize> = self.headers.iter().map(String::len).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate().take(columns) {
                if cell.len() > widths[i] {
                    widths[i] = cell.len();
                }
            }
        }

        let mut out = String::new();
        let write_row = |out: &mut String, cells: &[String]| {
            for (i, cell) in cells.iter().enumerate().take(columns) {
                if i > 0 {
                    out.push_str("  ");
                }
                out.push_str(cell);
                if i + 1 < columns {
                    for _ in cell.len()..widths[i] {
                        out.push(' ');
                    }
                }
            }
            out.push('\n');
        };

        write_row(&mut out, &self.headers);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        write_row(&mut out, &rule);
        for row in &self.rows {
            write_row(&mut out, row);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_alignment() {
        let mut table = Table::new(vec!["MODULE", "RISK"]);
        table.row(vec!["github.com/acme/long-name", "HIGH"]);
        table.row(vec!["short", "LOW"]);
        let rendered = table.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("MODULE"));
        assert!(lines[2].contains("HIGH"));
        // all data rows begin at the same RISK column
        let risk_col = lines[2].find("HIGH").unwrap();
        assert_eq!(lines[3].find("LOW").unwrap(), risk_col);
    }
}
