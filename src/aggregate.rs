use indexmap::IndexMap;
use log::debug;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::DeskError;
use crate::record::{Cell, Record};

pub const CUSTOMER_NAME: &str = "Customer Name";
pub const ORDER_QTY: &str = "Order Qty";
pub const PRODUCT_DESCRIPTION: &str = "Product Description";
pub const INVOICE_NO: &str = "Invoice No";
pub const INVOICE_DATE: &str = "Invoice Date";
pub const PRODUCT_VOLUME: &str = "Product Volume";
pub const PRODUCT_NAME: &str = "Product Name";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesOrderLine {
    pub product_description: Cell,
    #[serde(with = "rust_decimal::serde::float")]
    pub order_qty: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesOrderGroup {
    pub customer_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub order_qty: Decimal,
    pub products: Vec<SalesOrderLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductLine {
    pub product_name: Cell,
    #[serde(with = "rust_decimal::serde::float")]
    pub product_volume: Decimal,
}

impl ProductLine {
    fn from_record(record: &Record) -> Result<Self, DeskError> {
        Ok(ProductLine {
            product_name: record.get(PRODUCT_NAME).clone(),
            product_volume: quantity(record, PRODUCT_VOLUME)?,
        })
    }
}

fn quantity(record: &Record, column: &str) -> Result<Decimal, DeskError> {
    record
        .get(column)
        .quantity()
        .map_err(|source| DeskError::Quantity {
            column: column.to_string(),
            source,
        })
}

// Decimal addition panics past its range, so totals are summed checked.
fn add_to(
    total: &mut Decimal,
    amount: Decimal,
    key: &str,
    column: &str,
) -> Result<(), DeskError> {
    *total = total
        .checked_add(amount)
        .ok_or_else(|| DeskError::TotalOverflow {
            key: key.to_string(),
            column: column.to_string(),
        })?;
    Ok(())
}

/// One billing row. Rows sharing an invoice number stay separate entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingInvoice {
    pub invoice_no: Cell,
    pub invoice_date: Cell,
    #[serde(with = "rust_decimal::serde::float")]
    pub product_volume: Decimal,
    pub products: Vec<ProductLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingGroup {
    pub customer_name: String,
    pub invoices: Vec<BillingInvoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSearchResult {
    pub customer_name: String,
    pub invoice_no: Cell,
    pub invoice_date: Cell,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_product_volume: Decimal,
    pub products: Vec<ProductLine>,
}

/// Folds filtered records into groups. Groups come out in the order their
/// key was first seen.
pub trait Accumulator {
    type Group;

    fn add(&mut self, record: &Record) -> Result<(), DeskError>;

    fn into_groups(self) -> Vec<Self::Group>;

    fn consume<'a>(
        &mut self,
        records: impl IntoIterator<Item = &'a Record>,
    ) -> Result<(), DeskError> {
        records.into_iter().try_for_each(|record| self.add(record))
    }
}

/// Open sales orders summed per customer.
#[derive(Debug, Default)]
pub struct SalesOrderBook {
    groups: IndexMap<String, SalesOrderGroup>,
}

impl SalesOrderBook {
    pub fn new() -> Self {
        SalesOrderBook {
            groups: IndexMap::new(),
        }
    }
}

impl Accumulator for SalesOrderBook {
    type Group = SalesOrderGroup;

    fn add(&mut self, record: &Record) -> Result<(), DeskError> {
        let customer = record.get(CUSTOMER_NAME).to_string();
        let qty = quantity(record, ORDER_QTY)?;

        let group = self
            .groups
            .entry(customer)
            .or_insert_with_key(|customer| SalesOrderGroup {
                customer_name: customer.clone(),
                order_qty: Decimal::ZERO,
                products: Vec::new(),
            });
        add_to(&mut group.order_qty, qty, &group.customer_name, ORDER_QTY)?;
        group.products.push(SalesOrderLine {
            product_description: record.get(PRODUCT_DESCRIPTION).clone(),
            order_qty: qty,
        });
        Ok(())
    }

    fn into_groups(self) -> Vec<SalesOrderGroup> {
        debug!("{} sales order groups", self.groups.len());
        self.groups.into_values().collect()
    }
}

/// Billing rows listed per customer.
#[derive(Debug, Default)]
pub struct BillingBook {
    groups: IndexMap<String, BillingGroup>,
}

impl BillingBook {
    pub fn new() -> Self {
        BillingBook {
            groups: IndexMap::new(),
        }
    }
}

impl Accumulator for BillingBook {
    type Group = BillingGroup;

    fn add(&mut self, record: &Record) -> Result<(), DeskError> {
        let customer = record.get(CUSTOMER_NAME).to_string();
        let line = ProductLine::from_record(record)?;

        self.groups
            .entry(customer)
            .or_insert_with_key(|customer| BillingGroup {
                customer_name: customer.clone(),
                invoices: Vec::new(),
            })
            .invoices
            .push(BillingInvoice {
                invoice_no: record.get(INVOICE_NO).clone(),
                invoice_date: record.get(INVOICE_DATE).clone(),
                product_volume: line.product_volume,
                products: vec![line],
            });
        Ok(())
    }

    fn into_groups(self) -> Vec<BillingGroup> {
        debug!("{} billing groups", self.groups.len());
        self.groups.into_values().collect()
    }
}

/// Billing rows merged per invoice number.
#[derive(Debug, Default)]
pub struct InvoiceBook {
    groups: IndexMap<String, InvoiceSearchResult>,
}

impl InvoiceBook {
    pub fn new() -> Self {
        InvoiceBook {
            groups: IndexMap::new(),
        }
    }
}

impl Accumulator for InvoiceBook {
    type Group = InvoiceSearchResult;

    fn add(&mut self, record: &Record) -> Result<(), DeskError> {
        let invoice_no = record.get(INVOICE_NO);
        let line = ProductLine::from_record(record)?;

        // customer and date are taken from the first row of the invoice
        let group = self
            .groups
            .entry(invoice_no.to_string())
            .or_insert_with(|| InvoiceSearchResult {
                customer_name: record.get(CUSTOMER_NAME).to_string(),
                invoice_no: invoice_no.clone(),
                invoice_date: record.get(INVOICE_DATE).clone(),
                total_product_volume: Decimal::ZERO,
                products: Vec::new(),
            });
        add_to(
            &mut group.total_product_volume,
            line.product_volume,
            &invoice_no.to_string(),
            PRODUCT_VOLUME,
        )?;
        group.products.push(line);
        Ok(())
    }

    fn into_groups(self) -> Vec<InvoiceSearchResult> {
        debug!("{} invoices matched", self.groups.len());
        self.groups.into_values().collect()
    }
}

#[cfg(test)]
use rust_decimal_macros::dec;

#[cfg(test)]
fn row(cells: &[(&str, &str)]) -> Record {
    cells
        .iter()
        .map(|(column, value)| (*column, Cell::text(*value)))
        .collect()
}

#[test]
fn sales_orders_sum_per_customer() {
    let records = vec![
        row(&[(CUSTOMER_NAME, "A"), (ORDER_QTY, "10"), (PRODUCT_DESCRIPTION, "Bolts")]),
        row(&[(CUSTOMER_NAME, "A"), (ORDER_QTY, "bad"), (PRODUCT_DESCRIPTION, "Nuts")]),
    ];

    let mut book = SalesOrderBook::new();
    book.consume(&records).unwrap();
    let groups = book.into_groups();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].customer_name, "A");
    assert_eq!(groups[0].order_qty, dec!(10));
    assert_eq!(
        groups[0].products,
        vec![
            SalesOrderLine {
                product_description: Cell::text("Bolts"),
                order_qty: dec!(10),
            },
            SalesOrderLine {
                product_description: Cell::text("Nuts"),
                order_qty: dec!(0),
            },
        ]
    );
}

#[test]
fn groups_keep_first_encounter_order() {
    let records = vec![
        row(&[(CUSTOMER_NAME, "B"), (ORDER_QTY, "1")]),
        row(&[(CUSTOMER_NAME, "A"), (ORDER_QTY, "2")]),
        row(&[(CUSTOMER_NAME, "B"), (ORDER_QTY, "3")]),
    ];

    let mut book = SalesOrderBook::new();
    book.consume(&records).unwrap();
    let groups = book.into_groups();

    let names: Vec<_> = groups.iter().map(|g| g.customer_name.as_str()).collect();
    assert_eq!(names, vec!["B", "A"]);
    assert_eq!(groups[0].order_qty, dec!(4));
}

#[test]
fn billing_keeps_every_row() {
    let records = vec![
        row(&[
            (CUSTOMER_NAME, "A"),
            (INVOICE_NO, "INV-1"),
            (PRODUCT_NAME, "Bolts"),
            (PRODUCT_VOLUME, "5"),
        ]),
        row(&[
            (CUSTOMER_NAME, "A"),
            (INVOICE_NO, "INV-1"),
            (PRODUCT_NAME, "Nuts"),
            (PRODUCT_VOLUME, "7"),
        ]),
    ];

    let mut book = BillingBook::new();
    book.consume(&records).unwrap();
    let groups = book.into_groups();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].invoices.len(), 2);
    assert_eq!(groups[0].invoices[1].product_volume, dec!(7));
    assert_eq!(groups[0].invoices[1].products.len(), 1);
    assert_eq!(groups[0].invoices[1].products[0].product_name, Cell::text("Nuts"));
}

#[test]
fn invoice_search_merges_rows() {
    let records = vec![
        row(&[
            (CUSTOMER_NAME, "A"),
            (INVOICE_NO, "INV-1"),
            (INVOICE_DATE, "2025-10-27"),
            (PRODUCT_NAME, "Bolts"),
            (PRODUCT_VOLUME, "5"),
        ]),
        row(&[
            (CUSTOMER_NAME, "A"),
            (INVOICE_NO, "INV-1"),
            (PRODUCT_NAME, "Nuts"),
        ]),
        row(&[
            (CUSTOMER_NAME, "A"),
            (INVOICE_NO, "INV-1"),
            (PRODUCT_NAME, "Washers"),
            (PRODUCT_VOLUME, "2.5"),
        ]),
    ];

    let mut book = InvoiceBook::new();
    book.consume(&records).unwrap();
    let groups = book.into_groups();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].invoice_no, Cell::text("INV-1"));
    assert_eq!(groups[0].invoice_date, Cell::text("2025-10-27"));
    assert_eq!(groups[0].total_product_volume, dec!(7.5));
    assert_eq!(groups[0].products.len(), 3);
    assert_eq!(groups[0].products[1].product_volume, dec!(0));
}

#[test]
fn overflowing_total_is_an_error() {
    let records = vec![
        row(&[(CUSTOMER_NAME, "A"), (ORDER_QTY, "7e28")]),
        row(&[(CUSTOMER_NAME, "A"), (ORDER_QTY, "7e28")]),
    ];

    let mut book = SalesOrderBook::new();
    assert!(matches!(
        book.consume(&records),
        Err(DeskError::TotalOverflow { key, column }) if key == "A" && column == ORDER_QTY
    ));
}

#[test]
fn out_of_range_volume_is_an_error() {
    let records = vec![row(&[
        (CUSTOMER_NAME, "A"),
        (INVOICE_NO, "INV-1"),
        (PRODUCT_VOLUME, "1e30"),
    ])];

    assert!(matches!(
        BillingBook::new().consume(&records),
        Err(DeskError::Quantity { column, .. }) if column == PRODUCT_VOLUME
    ));
    assert!(matches!(
        InvoiceBook::new().consume(&records),
        Err(DeskError::Quantity { .. })
    ));
}

#[test]
fn serializes_camel_case_numbers() {
    let group = SalesOrderGroup {
        customer_name: "A".to_string(),
        order_qty: dec!(10),
        products: vec![SalesOrderLine {
            product_description: Cell::Empty,
            order_qty: dec!(10),
        }],
    };

    assert_eq!(
        serde_json::to_value(&group).unwrap(),
        serde_json::json!({
            "customerName": "A",
            "orderQty": 10.0,
            "products": [{ "productDescription": null, "orderQty": 10.0 }],
        })
    );
}
