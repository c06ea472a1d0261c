use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use log::{debug, info};

use crate::aggregate::{
    Accumulator, BillingBook, BillingGroup, InvoiceBook, InvoiceSearchResult, SalesOrderBook,
    SalesOrderGroup, INVOICE_NO,
};
use crate::config::DeskConfig;
use crate::error::DeskError;
use crate::files::quarterly_files;
use crate::record::Record;
use crate::scope::AccessScope;
use crate::table::read_records;

/// Supplies "now" for recency windows.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync + 'static>;

/// The three reports, read fresh from the data directory on every call.
#[derive(Clone)]
pub struct Desk {
    config: DeskConfig,
    clock: Clock,
}

impl fmt::Debug for Desk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Desk")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Desk {
    pub fn new(config: DeskConfig) -> Self {
        Desk {
            config,
            clock: Arc::new(|| Local::now().naive_local()),
        }
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> NaiveDateTime + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    /// Recent open sales orders, summed per customer.
    pub fn open_sales_orders(
        &self,
        scope: &AccessScope,
    ) -> Result<Vec<SalesOrderGroup>, DeskError> {
        let files = vec![self.config.sales_order_path()];
        let filter = self.config.sales_orders.row_filter();
        let now = self.now();
        self.compile(
            &files,
            |record| filter.admits(scope, record, now),
            SalesOrderBook::new(),
        )
    }

    /// Recent billing rows from every quarterly file, listed per customer.
    pub fn billing_details(&self, scope: &AccessScope) -> Result<Vec<BillingGroup>, DeskError> {
        let files = self.quarterly_files()?;
        let filter = self.config.billing.row_filter();
        let now = self.now();
        self.compile(
            &files,
            |record| filter.admits(scope, record, now),
            BillingBook::new(),
        )
    }

    /// All visible rows of one invoice across the quarterly files, merged.
    /// No match is an empty result; a blank invoice number is rejected.
    pub fn search_invoices(
        &self,
        scope: &AccessScope,
        invoice_no: &str,
    ) -> Result<Vec<InvoiceSearchResult>, DeskError> {
        let target = invoice_no.trim();
        if target.is_empty() {
            return Err(DeskError::BlankInvoiceNo);
        }
        let files = self.quarterly_files()?;
        let filter = self.config.billing.ownership_filter();
        self.compile(
            &files,
            |record| filter.owned_by(scope, record) && same_invoice(record, target),
            InvoiceBook::new(),
        )
    }

    fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    fn quarterly_files(&self) -> Result<Vec<PathBuf>, DeskError> {
        quarterly_files(&self.config.data_dir, &self.config.quarterly_extension)
    }

    // files are folded one after another in the order given
    fn compile<A, P>(
        &self,
        files: &[PathBuf],
        admit: P,
        mut book: A,
    ) -> Result<Vec<A::Group>, DeskError>
    where
        A: Accumulator,
        P: Fn(&Record) -> bool,
    {
        for path in files {
            let records = read_records(path);
            let before = records.len();
            let admitted: Vec<&Record> = records.iter().filter(|&record| admit(record)).collect();
            debug!(
                "{} of {} records admitted from '{}'",
                admitted.len(),
                before,
                path.display()
            );
            book.consume(admitted)?;
        }
        let groups = book.into_groups();
        info!(
            "report compiled from {} files into {} groups",
            files.len(),
            groups.len()
        );
        Ok(groups)
    }
}

fn same_invoice(record: &Record, target: &str) -> bool {
    record.get(INVOICE_NO).to_string().trim() == target
}

#[cfg(test)]
use crate::scope::Role;

#[test]
fn missing_sales_order_file_is_an_empty_report() {
    let dir = tempfile::tempdir().unwrap();
    let desk = Desk::new(DeskConfig::default().with_data_dir(dir.path()));
    let scope = AccessScope::new(Role::full_visibility("admin"), "");

    assert_eq!(desk.open_sales_orders(&scope).unwrap(), vec![]);
}

#[test]
fn missing_data_dir_fails_quarterly_reports() {
    let dir = tempfile::tempdir().unwrap();
    let desk = Desk::new(DeskConfig::default().with_data_dir(dir.path().join("gone")));
    let scope = AccessScope::new(Role::full_visibility("admin"), "");

    assert!(matches!(
        desk.billing_details(&scope),
        Err(DeskError::DataDir { .. })
    ));
    assert!(matches!(
        desk.search_invoices(&scope, "INV-1"),
        Err(DeskError::DataDir { .. })
    ));
}

#[test]
fn invoice_numbers_compare_as_text() {
    let mut record = Record::new();
    record.insert(INVOICE_NO, crate::record::Cell::Number(1042.0));

    assert!(same_invoice(&record, "1042"));
    assert!(!same_invoice(&record, "1043"));
}

#[test]
fn blank_invoice_number_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let desk = Desk::new(DeskConfig::default().with_data_dir(dir.path().join("gone")));
    let scope = AccessScope::new(Role::full_visibility("admin"), "");

    // rejected before the data directory is listed
    assert!(matches!(
        desk.search_invoices(&scope, ""),
        Err(DeskError::BlankInvoiceNo)
    ));
    assert!(matches!(
        desk.search_invoices(&scope, " \t "),
        Err(DeskError::BlankInvoiceNo)
    ));
}
