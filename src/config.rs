use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::DeskError;
use crate::filter::{DateFormat, RecencyWindow, RowFilter};
use crate::scope::{Role, RoleBook};

/// Column names and date window used by one report.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReportWindow {
    pub owner_column: String,
    pub date_column: String,
    pub date_format: DateFormat,
    pub max_age_days: i64,
}

impl ReportWindow {
    pub fn row_filter(&self) -> RowFilter {
        self.ownership_filter().with_recency(RecencyWindow::new(
            self.date_column.clone(),
            self.date_format,
            self.max_age_days,
        ))
    }

    pub fn ownership_filter(&self) -> RowFilter {
        RowFilter::new(self.owner_column.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    pub data_dir: PathBuf,
    pub sales_order_file: String,
    pub quarterly_extension: String,
    pub roster_file: String,
    pub sales_orders: ReportWindow,
    pub billing: ReportWindow,
    pub roles: Vec<Role>,
}

impl Default for DeskConfig {
    fn default() -> Self {
        DeskConfig {
            data_dir: PathBuf::from("data"),
            sales_order_file: "Open_Sales_Order_29Oct2025.xlsx".to_string(),
            quarterly_extension: "xlsx".to_string(),
            roster_file: "users.csv".to_string(),
            sales_orders: ReportWindow {
                owner_column: "DSR Name".to_string(),
                date_column: "SO Date".to_string(),
                date_format: DateFormat::DayMonthYear,
                max_age_days: 2,
            },
            billing: ReportWindow {
                owner_column: "Sales Executive Name".to_string(),
                date_column: "Invoice Date".to_string(),
                date_format: DateFormat::YearMonthDay,
                max_age_days: 6,
            },
            roles: RoleBook::default_roles(),
        }
    }
}

impl DeskConfig {
    pub fn load(path: &Path) -> Result<Self, DeskError> {
        let invalid = |reason: String| DeskError::Config {
            path: path.to_path_buf(),
            reason,
        };
        let text = fs::read_to_string(path).map_err(|err| invalid(err.to_string()))?;
        DeskConfig::from_toml(&text).map_err(|err| invalid(err.to_string()))
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn sales_order_path(&self) -> PathBuf {
        self.data_dir.join(&self.sales_order_file)
    }

    pub fn roster_path(&self) -> PathBuf {
        self.data_dir.join(&self.roster_file)
    }

    pub fn role_book(&self) -> RoleBook {
        RoleBook::new(self.roles.clone())
    }
}

#[test]
fn defaults_match_the_shipped_reports() {
    let config = DeskConfig::default();

    assert_eq!(
        config.sales_order_path(),
        Path::new("data").join("Open_Sales_Order_29Oct2025.xlsx")
    );
    assert_eq!(config.sales_orders.max_age_days, 2);
    assert_eq!(config.billing.date_format, DateFormat::YearMonthDay);
    assert!(config.role_book().resolve("admin").sees_all);
}

#[test]
fn partial_toml_keeps_defaults() {
    let config = DeskConfig::from_toml(
        r#"
        data_dir = "/srv/desk"
        quarterly_extension = "csv"

        [billing]
        owner_column = "Sales Executive Name"
        date_column = "Invoice Date"
        date_format = "dd/MM/yyyy"
        max_age_days = 30

        [[roles]]
        name = "manager"
        sees_all = true
        "#,
    )
    .unwrap();

    assert_eq!(config.data_dir, PathBuf::from("/srv/desk"));
    assert_eq!(config.quarterly_extension, "csv");
    assert_eq!(config.billing.date_format, DateFormat::DayMonthYear);
    assert_eq!(config.billing.max_age_days, 30);
    assert_eq!(config.sales_orders, DeskConfig::default().sales_orders);
    assert_eq!(config.roles, vec![Role::full_visibility("manager")]);
}

#[test]
fn bad_config_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("desk.toml");
    fs::write(&path, "max_age_days = [").unwrap();

    assert!(matches!(
        DeskConfig::load(&path),
        Err(DeskError::Config { path: p, .. }) if p == path
    ));
}
