//! Presentation formatting for report values.
//!
//! Currency renders as `$1,234.56`, ratios as percentages rounded half-up to
//! two places. Nulls (guarded-division sentinels, missing lags) render as `-`.

use itertools::Itertools;
use rust_decimal::Decimal;

use super::derive::round_half_up;
use super::types::{ColumnKind, ReportResult};
use crate::model::Value;

const NULL_CELL: &str = "-";

/// Insert thousands separators into a run of ASCII digits.
fn group_digits(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out.chars().rev().collect()
}

/// Fixed two-decimal rendering with grouped integer part, sign split off.
fn grouped_fixed(value: Decimal, dp: u32) -> (bool, String) {
    let rounded = round_half_up(value, dp);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.*}", dp as usize, rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), ""));
    let grouped = group_digits(int_part);
    if frac_part.is_empty() {
        (negative, grouped)
    } else {
        (negative, format!("{grouped}.{frac_part}"))
    }
}

/// `1234.5` → `$1,234.50`; `-150` → `-$150.00`.
pub fn format_currency(value: Decimal) -> String {
    let (negative, body) = grouped_fixed(value, 2);
    if negative {
        format!("-${body}")
    } else {
        format!("${body}")
    }
}

/// Ratio → percentage: `0.3333` → `33.33%`, `-1` → `-100.00%`.
pub fn format_percent(ratio: Decimal) -> String {
    let pct = round_half_up(ratio.saturating_mul(Decimal::ONE_HUNDRED), 2);
    let pct = if pct.is_zero() { Decimal::ZERO } else { pct };
    format!("{pct:.2}%")
}

/// `1234567` → `1,234,567`.
pub fn format_integer(n: i64) -> String {
    let grouped = group_digits(&n.unsigned_abs().to_string());
    if n < 0 { format!("-{grouped}") } else { grouped }
}

/// Render one cell according to its column kind.
pub fn format_cell(kind: ColumnKind, value: &Value) -> String {
    if value.is_null() {
        return NULL_CELL.to_string();
    }
    match (kind, value) {
        (ColumnKind::Currency, v) => v
            .as_decimal()
            .map_or_else(|| v.to_string(), format_currency),
        (ColumnKind::Percent, v) => v
            .as_decimal()
            .map_or_else(|| v.to_string(), format_percent),
        (ColumnKind::Integer, Value::Int(n)) => format_integer(*n),
        (ColumnKind::Decimal, Value::Decimal(d)) => format!("{:.2}", round_half_up(*d, 2)),
        (_, v) => v.to_string(),
    }
}

/// Plain-text table: header, rule, one line per row. Numeric kinds are
/// right-aligned.
pub fn render_table(result: &ReportResult) -> String {
    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| {
            result
                .columns
                .iter()
                .zip(row)
                .map(|(c, v)| format_cell(c.kind, v))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = result
        .columns
        .iter()
        .enumerate()
        .map(|(j, c)| {
            cells
                .iter()
                .map(|r| r[j].chars().count())
                .chain(std::iter::once(c.name.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let right_aligned = |kind: ColumnKind| {
        matches!(
            kind,
            ColumnKind::Integer | ColumnKind::Currency | ColumnKind::Decimal | ColumnKind::Percent
        )
    };

    let header = result
        .columns
        .iter()
        .zip(&widths)
        .map(|(c, &w)| format!("{:<w$}", c.name))
        .join("  ");
    let rule = widths.iter().map(|&w| "-".repeat(w)).join("  ");
    let body = cells.iter().map(|row| {
        row.iter()
            .zip(result.columns.iter().zip(&widths))
            .map(|(cell, (c, &w))| {
                if right_aligned(c.kind) {
                    format!("{cell:>w$}")
                } else {
                    format!("{cell:<w$}")
                }
            })
            .join("  ")
            .trim_end()
            .to_string()
    });

    std::iter::once(header.trim_end().to_string())
        .chain(std::iter::once(rule))
        .chain(body)
        .join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
