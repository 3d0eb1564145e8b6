//! Terminal rendering for search responses

use anyhow::Result;
use colored::Colorize;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use catalog_search::search::format::Table;
use catalog_search::search::router::Backend;
use catalog_search::Response;

/// Cells wider than this are cut with an ellipsis
const MAX_CELL_WIDTH: usize = 48;

/// Print a response. Returns false when the query was rejected.
pub fn print_response(response: &Response, label: &str, json: bool) -> Result<bool> {
    if json {
        println!("{}", serde_json::to_string_pretty(&response.to_json())?);
        return Ok(!matches!(response, Response::Rejected { .. }));
    }

    match response {
        Response::Table(table) => {
            let source = match table.backend {
                Backend::Relational => "catalog",
                Backend::Vector => "vector index",
            };
            println!(
                "{} {} results from {} for: {}",
                "→".dimmed(),
                table.rows.len(),
                source,
                label.cyan()
            );
            println!();
            print_table(table);
            Ok(true)
        }
        Response::NoResults => {
            println!("{} No products found for: {}", "→".dimmed(), label.cyan());
            Ok(true)
        }
        Response::Rejected {
            message,
            validation,
        } => {
            let prefix = if *validation { "Invalid:" } else { "Error:" };
            eprintln!("{} {}", prefix.red().bold(), message);
            Ok(false)
        }
    }
}

pub fn print_table(table: &Table) {
    let with_scores = table.has_scores();

    let mut header: Vec<String> = table.columns.iter().map(|c| c.title().to_string()).collect();
    if with_scores {
        header.push("Score".to_string());
    }

    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| {
            let mut cells: Vec<String> = row.cells.iter().map(|c| truncate(c, MAX_CELL_WIDTH)).collect();
            if with_scores {
                cells.push(row.score.map(|s| format!("{:.3}", s)).unwrap_or_default());
            }
            cells
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.width()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.width());
        }
    }

    let header_line = header
        .iter()
        .zip(&widths)
        .map(|(h, w)| pad(h, *w))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{}", header_line.bold().cyan());

    let rule_width = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    println!("{}", "-".repeat(rule_width).dimmed());

    for row in &rows {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(c, w)| pad(c, *w))
            .collect::<Vec<_>>()
            .join("  ");
        println!("{}", line.trim_end());
    }
}

/// Display-width aware truncation (CJK characters count double)
fn truncate(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > max_width - 1 {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

fn pad(s: &str, width: usize) -> String {
    format!("{}{}", s, " ".repeat(width.saturating_sub(s.width())))
}
