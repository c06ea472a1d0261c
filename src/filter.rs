use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::record::{Cell, Record};
use crate::scope::AccessScope;

/// How a report writes its dates when they arrive as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum DateFormat {
    #[serde(rename = "dd/MM/yyyy")]
    DayMonthYear,
    #[serde(rename = "yyyy-MM-dd")]
    YearMonthDay,
}

impl DateFormat {
    pub fn pattern(self) -> &'static str {
        match self {
            DateFormat::DayMonthYear => "%d/%m/%Y",
            DateFormat::YearMonthDay => "%Y-%m-%d",
        }
    }
}

/// Maximum age, in whole days, of the date found in `column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecencyWindow {
    pub column: String,
    pub format: DateFormat,
    pub max_age_days: i64,
}

impl RecencyWindow {
    pub fn new(column: impl Into<String>, format: DateFormat, max_age_days: i64) -> Self {
        RecencyWindow {
            column: column.into(),
            format,
            max_age_days,
        }
    }

    pub fn contains(&self, record: &Record, now: NaiveDateTime) -> bool {
        match record.get(&self.column).date_with(self.format) {
            // whole days, truncated toward zero; future dates are negative and pass
            Some(date) => (now - date).num_days() <= self.max_age_days,
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFilter {
    pub owner_column: String,
    pub recency: Option<RecencyWindow>,
}

impl RowFilter {
    pub fn new(owner_column: impl Into<String>) -> Self {
        RowFilter {
            owner_column: owner_column.into(),
            recency: None,
        }
    }

    pub fn with_recency(mut self, window: RecencyWindow) -> Self {
        self.recency = Some(window);
        self
    }

    pub fn owned_by(&self, scope: &AccessScope, record: &Record) -> bool {
        if scope.sees_all() {
            return true;
        }
        matches!(record.get(&self.owner_column), Cell::Text(owner) if *owner == scope.filter_name)
    }

    pub fn admits(&self, scope: &AccessScope, record: &Record, now: NaiveDateTime) -> bool {
        self.owned_by(scope, record)
            && self
                .recency
                .as_ref()
                .map_or(true, |window| window.contains(record, now))
    }
}

#[cfg(test)]
use crate::scope::Role;
#[cfg(test)]
use chrono::{Duration, NaiveDate};

#[cfg(test)]
fn noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 10, 29)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .unwrap()
}

#[cfg(test)]
fn sales_row(owner: &str, so_date: &str) -> Record {
    vec![
        ("DSR Name", Cell::text(owner)),
        ("SO Date", Cell::text(so_date)),
    ]
    .into_iter()
    .collect()
}

#[cfg(test)]
fn sales_filter() -> RowFilter {
    RowFilter::new("DSR Name").with_recency(RecencyWindow::new(
        "SO Date",
        DateFormat::DayMonthYear,
        2,
    ))
}

#[test]
fn standard_scope_sees_only_own_rows() {
    let scope = AccessScope::new(Role::restricted("standard"), "bob");
    let filter = sales_filter();

    assert!(filter.admits(&scope, &sales_row("bob", "28/10/2025"), noon()));
    assert!(!filter.admits(&scope, &sales_row("alice", "28/10/2025"), noon()));
    assert!(!filter.admits(&scope, &sales_row("Bob", "28/10/2025"), noon()));
}

#[test]
fn full_visibility_ignores_owner() {
    let scope = AccessScope::new(Role::full_visibility("admin"), "");
    let filter = sales_filter();

    assert!(filter.admits(&scope, &sales_row("alice", "28/10/2025"), noon()));

    let mut ownerless = Record::new();
    ownerless.insert("SO Date", Cell::text("28/10/2025"));
    assert!(filter.admits(&scope, &ownerless, noon()));
}

#[test]
fn recency_boundary_is_inclusive() {
    let scope = AccessScope::new(Role::full_visibility("admin"), "");
    let filter = sales_filter();

    assert!(filter.admits(&scope, &sales_row("x", "27/10/2025"), noon()));
    assert!(!filter.admits(&scope, &sales_row("x", "26/10/2025"), noon()));
    // future dates are never too old
    assert!(filter.admits(&scope, &sales_row("x", "05/11/2025"), noon()));
}

#[test]
fn unparseable_dates_are_not_recent() {
    let scope = AccessScope::new(Role::full_visibility("admin"), "");
    let filter = sales_filter();

    assert!(!filter.admits(&scope, &sales_row("x", "2025-10-28"), noon()));
    assert!(!filter.admits(&scope, &sales_row("x", ""), noon()));
    assert!(!filter.admits(&scope, &Record::new(), noon()));
}

#[test]
fn native_dates_keep_their_time() {
    let scope = AccessScope::new(Role::full_visibility("admin"), "");
    let filter = sales_filter();
    let mut row = Record::new();
    // two days and one hour back truncates to two whole days
    row.insert("SO Date", Cell::Date(noon() - Duration::hours(49)));
    assert!(filter.admits(&scope, &row, noon()));

    let mut row = Record::new();
    row.insert("SO Date", Cell::Date(noon() - Duration::hours(72)));
    assert!(!filter.admits(&scope, &row, noon()));
}

#[test]
fn ownership_only_filter_skips_dates() {
    let scope = AccessScope::new(Role::restricted("standard"), "bob");
    let filter = RowFilter::new("DSR Name");

    assert!(filter.admits(&scope, &sales_row("bob", "not a date"), noon()));
}
