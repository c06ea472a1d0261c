//! Sales desk reporting: reads sales-order and quarterly billing sheets from a
//! data directory, keeps the rows a caller may see, and groups them into the
//! open sales order, billing detail and invoice search reports.
//!
//! ```no_run
//! use clerk::{AccessScope, Desk, DeskConfig, Role};
//!
//! let desk = Desk::new(DeskConfig::default());
//! let scope = AccessScope::new(Role::restricted("standard"), "Bob Smith");
//! for group in desk.open_sales_orders(&scope)? {
//!     println!("{}: {}", group.customer_name, group.order_qty);
//! }
//! # Ok::<(), clerk::DeskError>(())
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod files;
pub mod filter;
pub mod record;
pub mod reports;
pub mod scope;
pub mod table;

pub use aggregate::{
    BillingGroup, BillingInvoice, InvoiceSearchResult, ProductLine, SalesOrderGroup,
    SalesOrderLine,
};
pub use config::{DeskConfig, ReportWindow};
pub use error::DeskError;
pub use filter::{DateFormat, RecencyWindow, RowFilter};
pub use record::{Cell, OutOfRange, Record};
pub use reports::Desk;
pub use scope::{AccessScope, Role, RoleBook, Roster};
