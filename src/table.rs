//! Plain-text table rendering for terminal output.

use std::fmt::Write as _;

const COLUMN_GAP: &str = "  ";
const MAX_CELL_WIDTH: usize = 40;

/// Renders `headers` and `rows` as aligned columns with a dashed rule under the
/// header. Control characters are flattened to spaces and overly long cells
/// are cut with an ellipsis.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let headers = headers.iter().map(|h| clean_cell(h)).collect::<Vec<_>>();
    let rows = rows
        .iter()
        .map(|row| {
            (0..headers.len())
                .map(|idx| row.get(idx).map(|cell| clean_cell(cell)).unwrap_or_default())
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let widths = (0..headers.len())
        .map(|idx| {
            rows.iter()
                .map(|row| row[idx].chars().count())
                .chain(std::iter::once(headers[idx].chars().count()))
                .max()
                .unwrap_or(0)
                .max(1)
        })
        .collect::<Vec<_>>();

    let mut output = String::new();
    let _ = writeln!(output, "{}", join_padded(&headers, &widths));
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", join_padded(&rule, &widths));
    for row in &rows {
        let _ = writeln!(output, "{}", join_padded(row, &widths));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn join_padded(cells: &[String], widths: &[usize]) -> String {
    let mut line = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join(COLUMN_GAP);
    line.truncate(line.trim_end().len());
    line
}

fn clean_cell(value: &str) -> String {
    let flattened = value
        .chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .collect::<String>();
    if flattened.chars().count() <= MAX_CELL_WIDTH {
        return flattened;
    }
    let mut cut = flattened
        .chars()
        .take(MAX_CELL_WIDTH - 1)
        .collect::<String>();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn aligns_columns_and_trims_trailing_space() {
        let rendered = render_table(
            &strings(&["#", "date"]),
            &[strings(&["0", "2024-01-10"]), strings(&["1"])],
        );
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(
            lines,
            vec!["#  date", "-  ----------", "0  2024-01-10", "1"]
        );
    }

    #[test]
    fn flattens_control_characters_and_truncates() {
        let long = "x".repeat(60);
        let rendered = render_table(&strings(&["note"]), &[strings(&["a\nb"]), vec![long]]);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[2], "a b");
        assert_eq!(lines[3].chars().count(), MAX_CELL_WIDTH);
        assert!(lines[3].ends_with('…'));
    }
}
