//! Plain-text tables for CLI reports.
//!
//! Columns whose non-empty cells all parse as numbers are right-aligned so
//! totals line up; everything else is left-aligned.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::value::parse_number;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Right,
}

fn column_alignments(column_count: usize, rows: &[Vec<String>]) -> Vec<Alignment> {
    (0..column_count)
        .map(|idx| {
            let mut cells = rows
                .iter()
                .filter_map(|row| row.get(idx))
                .filter(|cell| !cell.trim().is_empty())
                .peekable();
            if cells.peek().is_some() && cells.all(|cell| parse_number(cell).is_some()) {
                Alignment::Right
            } else {
                Alignment::Left
            }
        })
        .collect()
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }
    for width in &mut widths {
        *width = (*width).max(3);
    }
    let alignments = column_alignments(column_count, rows);

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths, &alignments));
    let separator = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths, &alignments));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, &alignments));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

/// Renders a titled section: a heading line followed by the table, or a
/// placeholder when there is nothing to show.
pub fn render_section(title: &str, headers: &[String], rows: &[Vec<String>]) -> String {
    let mut output = format!("{title}\n");
    if rows.is_empty() {
        output.push_str("(no data)\n");
    } else {
        output.push_str(&render_table(headers, rows));
    }
    output
}

pub fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn format_row(values: &[String], widths: &[usize], alignments: &[Alignment]) -> String {
    let cells = values
        .iter()
        .zip(widths)
        .zip(alignments)
        .map(|((value, width), alignment)| {
            let sanitized = sanitize_cell(value);
            let padding = " ".repeat(width.saturating_sub(display_width(&sanitized)));
            match alignment {
                Alignment::Left => format!("{sanitized}{padding}"),
                Alignment::Right => format!("{padding}{sanitized}"),
            }
        })
        .collect::<Vec<_>>();
    cells.join("  ").trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // ANSI colour sequences take no columns.
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
