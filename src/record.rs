use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use rust_decimal::prelude::*;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::filter::DateFormat;

static EMPTY: Cell = Cell::Empty;

/// A numeric cell too large to be carried as a report quantity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0} does not fit in a report quantity")]
pub struct OutOfRange(pub String);

/// A single raw value as it came out of a delimited file or a worksheet.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDateTime),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Numeric reading of the cell. Anything that is not a number, or does not
    /// start with one, counts as zero. Numbers beyond `Decimal`'s range are an
    /// error rather than zero.
    pub fn quantity(&self) -> Result<Decimal, OutOfRange> {
        match self {
            Cell::Number(value) if value.is_nan() => Ok(Decimal::ZERO),
            Cell::Number(value) => {
                Decimal::from_f64(*value).ok_or_else(|| OutOfRange(value.to_string()))
            }
            Cell::Text(value) => match numeric_prefix(value) {
                Some(number) => parse_number(&number).ok_or(OutOfRange(number)),
                None => Ok(Decimal::ZERO),
            },
            Cell::Empty | Cell::Date(_) => Ok(Decimal::ZERO),
        }
    }

    /// Resolves the cell to a point in time. Native dates are used as they are,
    /// text goes through `format`; everything else has no date.
    pub fn date_with(&self, format: DateFormat) -> Option<NaiveDateTime> {
        match self {
            Cell::Date(value) => Some(*value),
            Cell::Text(value) => NaiveDate::parse_from_str(value.trim(), format.pattern())
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0)),
            Cell::Empty | Cell::Number(_) => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(value) => f.write_str(value),
            Cell::Number(value) => write!(f, "{}", value),
            Cell::Date(value) => write!(f, "{}", value.format("%Y-%m-%dT%H:%M:%S%.3fZ")),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Cell::Empty => serializer.serialize_none(),
            Cell::Text(value) => serializer.serialize_str(value),
            Cell::Number(value) => serializer.serialize_f64(*value),
            Cell::Date(_) => serializer.collect_str(self),
        }
    }
}

/// Longest numeric prefix of `value`, the way a lenient float parser reads it:
/// `"12 kg"` is `12`, `".5e3x"` is `0.5e3`, `"bad"` is nothing.
fn numeric_prefix(value: &str) -> Option<String> {
    let value = value.trim_start();
    let (negative, rest) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };

    let whole_len = digit_run(rest);
    let (whole, rest) = rest.split_at(whole_len);
    let (fraction, rest) = match rest.strip_prefix('.') {
        Some(after_dot) => after_dot.split_at(digit_run(after_dot)),
        None => ("", rest),
    };
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }

    let mut number = String::with_capacity(value.len() + 2);
    if negative {
        number.push('-');
    }
    number.push_str(if whole.is_empty() { "0" } else { whole });
    if !fraction.is_empty() {
        number.push('.');
        number.push_str(fraction);
    }
    if let Some(exp) = exponent(rest) {
        number.push('e');
        number.push_str(exp);
    }
    Some(number)
}

/// Exact decimal for a prefix from [`numeric_prefix`]. Magnitudes below one
/// that carry too many places round instead of failing.
fn parse_number(number: &str) -> Option<Decimal> {
    let exact = if number.contains('e') {
        Decimal::from_scientific(number)
    } else {
        Decimal::from_str(number)
    };
    match exact {
        Ok(value) => Some(value),
        Err(_) => {
            let approx: f64 = number.parse().ok()?;
            if approx.abs() < 1.0 {
                Some(Decimal::from_f64(approx).unwrap_or(Decimal::ZERO))
            } else {
                None
            }
        }
    }
}

fn digit_run(value: &str) -> usize {
    value.bytes().take_while(u8::is_ascii_digit).count()
}

/// `e7`, `E-2`, `e+10` at the head of `value`.
fn exponent(value: &str) -> Option<&str> {
    let rest = value.strip_prefix(|c: char| c == 'e' || c == 'E')?;
    let sign_len = usize::from(rest.starts_with(|c: char| c == '+' || c == '-'));
    let digits = digit_run(&rest[sign_len..]);
    if digits == 0 {
        return None;
    }
    Some(&rest[..sign_len + digits])
}

/// One data row, keyed by header name in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    cells: IndexMap<String, Cell>,
}

impl Record {
    pub fn new() -> Self {
        Record {
            cells: IndexMap::new(),
        }
    }

    pub fn insert(&mut self, column: impl Into<String>, cell: Cell) {
        self.cells.insert(column.into(), cell);
    }

    /// Missing columns read as an empty cell.
    pub fn get(&self, column: &str) -> &Cell {
        self.cells.get(column).unwrap_or(&EMPTY)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Cell)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Cell)>>(iter: I) -> Self {
        Record {
            cells: iter
                .into_iter()
                .map(|(column, cell)| (column.into(), cell))
                .collect(),
        }
    }
}

#[cfg(test)]
use rust_decimal_macros::dec;

#[test]
fn quantity_reads_numeric_prefix() {
    assert_eq!(Cell::text("10").quantity(), Ok(dec!(10)));
    assert_eq!(Cell::text(" 2.5 cases").quantity(), Ok(dec!(2.5)));
    assert_eq!(Cell::text("-3").quantity(), Ok(dec!(-3)));
    assert_eq!(Cell::text(".5").quantity(), Ok(dec!(0.5)));
    assert_eq!(Cell::text("4.").quantity(), Ok(dec!(4)));
    assert_eq!(Cell::text("1e3").quantity(), Ok(dec!(1000)));
    assert!(Cell::text("7e28").quantity().is_ok());
    assert_eq!(Cell::Number(7.0).quantity(), Ok(dec!(7)));
}

#[test]
fn quantity_defaults_to_zero() {
    assert_eq!(Cell::text("bad").quantity(), Ok(Decimal::ZERO));
    assert_eq!(Cell::text("").quantity(), Ok(Decimal::ZERO));
    assert_eq!(Cell::text("-").quantity(), Ok(Decimal::ZERO));
    assert_eq!(Cell::text(".").quantity(), Ok(Decimal::ZERO));
    assert_eq!(Cell::Empty.quantity(), Ok(Decimal::ZERO));
    assert_eq!(Cell::Number(f64::NAN).quantity(), Ok(Decimal::ZERO));
}

#[test]
fn huge_quantities_are_errors_not_zero() {
    assert_eq!(
        Cell::text("1e30").quantity(),
        Err(OutOfRange("1e30".to_string()))
    );
    assert!(Cell::text("123456789012345678901234567890 units")
        .quantity()
        .is_err());
    assert!(Cell::Number(1e30).quantity().is_err());
    assert!(Cell::Number(f64::INFINITY).quantity().is_err());
}

#[test]
fn tiny_quantities_round_toward_zero() {
    let tiny = Cell::text("1e-40").quantity().unwrap();
    assert!(tiny.abs() < dec!(0.0000001));
}

#[test]
fn dates_follow_the_requested_format() {
    let expected = NaiveDate::from_ymd_opt(2025, 10, 28)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();

    assert_eq!(
        Cell::text("28/10/2025").date_with(DateFormat::DayMonthYear),
        Some(expected)
    );
    assert_eq!(
        Cell::text("2025-10-28").date_with(DateFormat::YearMonthDay),
        Some(expected)
    );
    assert_eq!(Cell::text("2025-10-28").date_with(DateFormat::DayMonthYear), None);
    assert_eq!(Cell::text("soon").date_with(DateFormat::YearMonthDay), None);
    assert_eq!(Cell::Number(45958.0).date_with(DateFormat::YearMonthDay), None);
}

#[test]
fn native_dates_skip_parsing() {
    let moment = NaiveDate::from_ymd_opt(2025, 1, 2)
        .and_then(|d| d.and_hms_opt(13, 30, 0))
        .unwrap();

    assert_eq!(
        Cell::Date(moment).date_with(DateFormat::DayMonthYear),
        Some(moment)
    );
}

#[test]
fn numbers_render_without_trailing_zero() {
    assert_eq!(Cell::Number(123.0).to_string(), "123");
    assert_eq!(Cell::Number(1.5).to_string(), "1.5");
    assert_eq!(Cell::Empty.to_string(), "");
}

#[test]
fn dates_render_as_utc_timestamps() {
    let moment = NaiveDate::from_ymd_opt(2025, 10, 28)
        .and_then(|d| d.and_hms_milli_opt(14, 5, 9, 250))
        .unwrap();
    let midnight = NaiveDate::from_ymd_opt(2025, 10, 28)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();

    assert_eq!(Cell::Date(moment).to_string(), "2025-10-28T14:05:09.250Z");
    assert_eq!(
        serde_json::to_value(Cell::Date(midnight)).unwrap(),
        serde_json::json!("2025-10-28T00:00:00.000Z")
    );
}

#[test]
fn missing_columns_read_empty() {
    let record: Record = vec![("Customer Name", Cell::text("Acme"))]
        .into_iter()
        .collect();

    assert_eq!(record.get("Customer Name"), &Cell::text("Acme"));
    assert!(record.get("Order Qty").is_empty());
    assert_eq!(record.columns().collect::<Vec<_>>(), vec!["Customer Name"]);
}
