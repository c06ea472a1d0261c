use std::fs;
use std::path::Path;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use clerk::{AccessScope, Cell, Desk, DeskConfig, DeskError, Role, RoleBook, Roster};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, XlsxError};

const SALES_HEADER: &str = "Customer Name,Product Description,Order Qty,SO Date,DSR Name";
const BILLING_HEADER: &str =
    "Customer Name,Invoice No,Invoice Date,Product Name,Product Volume,Sales Executive Name";

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 10, 29)
        .and_then(|d| d.and_hms_opt(9, 30, 0))
        .unwrap()
}

fn so_date(days_ago: i64) -> String {
    (now() - Duration::days(days_ago)).format("%d/%m/%Y").to_string()
}

fn invoice_date(days_ago: i64) -> String {
    (now() - Duration::days(days_ago)).format("%Y-%m-%d").to_string()
}

fn write_csv(dir: &Path, name: &str, header: &str, rows: &[String]) {
    let mut contents = format!("{}\n", header);
    for row in rows {
        contents.push_str(row);
        contents.push('\n');
    }
    fs::write(dir.join(name), contents).unwrap();
}

fn excel_date(days_ago: i64) -> Result<ExcelDateTime, XlsxError> {
    let date = (now() - Duration::days(days_ago)).date();
    ExcelDateTime::from_ymd(date.year() as u16, date.month() as u8, date.day() as u8)
}

// (customer, qty, days ago, owner)
fn write_sales_workbook(path: &Path, rows: &[(&str, f64, i64, &str)]) -> Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let date = Format::new().set_num_format("dd/mm/yyyy");
    let sheet = workbook.add_worksheet();
    for (col, name) in SALES_HEADER.split(',').enumerate() {
        sheet.write_string(0, col as u16, name)?;
    }
    for (i, (customer, qty, days_ago, owner)) in rows.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, *customer)?;
        sheet.write_string(row, 1, "Bolts")?;
        sheet.write_number(row, 2, *qty)?;
        sheet.write_datetime_with_format(row, 3, &excel_date(*days_ago)?, &date)?;
        sheet.write_string(row, 4, *owner)?;
    }
    workbook.save(path)
}

fn desk(dir: &Path) -> Desk {
    let config = DeskConfig {
        sales_order_file: "open_orders.csv".to_string(),
        quarterly_extension: "csv".to_string(),
        ..DeskConfig::default()
    }
    .with_data_dir(dir);
    Desk::new(config).with_clock(now)
}

fn admin() -> AccessScope {
    AccessScope::new(Role::full_visibility("admin"), "")
}

fn standard(name: &str) -> AccessScope {
    AccessScope::new(Role::restricted("standard"), name)
}

#[test]
fn sales_orders_coerce_bad_quantities() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(
        dir.path(),
        "open_orders.csv",
        SALES_HEADER,
        &[
            format!("A,Bolts,10,{},bob", so_date(1)),
            format!("A,Nuts,bad,{},bob", so_date(1)),
        ],
    );

    let groups = desk(dir.path()).open_sales_orders(&standard("bob")).unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].customer_name, "A");
    assert_eq!(groups[0].order_qty, dec!(10));
    let qtys: Vec<Decimal> = groups[0].products.iter().map(|p| p.order_qty).collect();
    assert_eq!(qtys, vec![dec!(10), dec!(0)]);
}

#[test]
fn overflowing_sales_total_fails_the_report() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(
        dir.path(),
        "open_orders.csv",
        SALES_HEADER,
        &[
            format!("A,Bolts,7e28,{},bob", so_date(0)),
            format!("A,Nuts,7e28,{},bob", so_date(0)),
        ],
    );

    assert!(matches!(
        desk(dir.path()).open_sales_orders(&admin()),
        Err(DeskError::TotalOverflow { .. })
    ));
}

#[test]
fn out_of_range_volume_fails_the_report() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(
        dir.path(),
        "q1.csv",
        BILLING_HEADER,
        &[format!("A,INV-1,{},Bolts,1e30,bob", invoice_date(0))],
    );

    assert!(matches!(
        desk(dir.path()).billing_details(&admin()),
        Err(DeskError::Quantity { .. })
    ));
}

#[test]
fn sales_orders_read_from_a_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let config = DeskConfig::default().with_data_dir(dir.path());
    write_sales_workbook(
        &config.sales_order_path(),
        &[
            ("Fresh", 4.0, 2, "bob"),
            ("Stale", 1.0, 3, "bob"),
            ("Fresh", 1.5, 0, "bob"),
            ("Hidden", 9.0, 0, "alice"),
        ],
    )
    .unwrap();

    let groups = Desk::new(config)
        .with_clock(now)
        .open_sales_orders(&standard("bob"))
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].customer_name, "Fresh");
    assert_eq!(groups[0].order_qty, dec!(5.5));
    assert_eq!(groups[0].products[0].product_description, Cell::text("Bolts"));
}

#[test]
fn sales_orders_hide_other_owners() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(
        dir.path(),
        "open_orders.csv",
        SALES_HEADER,
        &[
            format!("A,Bolts,1,{},alice", so_date(0)),
            format!("B,Nuts,2,{},bob", so_date(0)),
            format!("C,Nuts,3,{},", so_date(0)),
        ],
    );
    let desk = desk(dir.path());

    let bob = desk.open_sales_orders(&standard("bob")).unwrap();
    assert_eq!(bob.len(), 1);
    assert_eq!(bob[0].customer_name, "B");

    let everyone = desk.open_sales_orders(&admin()).unwrap();
    assert_eq!(everyone.len(), 3);
}

#[test]
fn sales_orders_keep_first_encounter_order() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(
        dir.path(),
        "open_orders.csv",
        SALES_HEADER,
        &[
            format!("B,Bolts,1,{},bob", so_date(0)),
            format!("A,Nuts,2,{},bob", so_date(0)),
            format!("B,Washers,3,{},bob", so_date(0)),
        ],
    );

    let groups = desk(dir.path()).open_sales_orders(&admin()).unwrap();

    let names: Vec<_> = groups.iter().map(|g| g.customer_name.as_str()).collect();
    assert_eq!(names, vec!["B", "A"]);
    assert_eq!(groups[0].order_qty, dec!(4));
}

#[test]
fn sales_order_window_is_two_days() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(
        dir.path(),
        "open_orders.csv",
        SALES_HEADER,
        &[
            format!("Fresh,Bolts,1,{},bob", so_date(2)),
            format!("Stale,Bolts,1,{},bob", so_date(3)),
            "Undated,Bolts,1,someday,bob".to_string(),
            format!("Wrong Format,Bolts,1,{},bob", invoice_date(0)),
        ],
    );

    let groups = desk(dir.path()).open_sales_orders(&admin()).unwrap();

    let names: Vec<_> = groups.iter().map(|g| g.customer_name.as_str()).collect();
    assert_eq!(names, vec!["Fresh"]);
}

#[test]
fn billing_lists_rows_across_quarters() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(
        dir.path(),
        "q1_2025.csv",
        BILLING_HEADER,
        &[
            format!("A,INV-1,{},Bolts,5,bob", invoice_date(1)),
            format!("A,INV-1,{},Nuts,bad,bob", invoice_date(1)),
        ],
    );
    write_csv(
        dir.path(),
        "Q2_2025.csv",
        BILLING_HEADER,
        &[
            format!("B,INV-2,{},Bolts,3,bob", invoice_date(6)),
            format!("B,INV-3,{},Bolts,9,bob", invoice_date(7)),
            format!("C,INV-4,{},Bolts,1,alice", invoice_date(0)),
        ],
    );
    // not a quarterly file
    write_csv(
        dir.path(),
        "archive.csv",
        BILLING_HEADER,
        &[format!("Z,INV-9,{},Bolts,1,bob", invoice_date(0))],
    );

    let groups = desk(dir.path()).billing_details(&standard("bob")).unwrap();

    // Q2 sorts ahead of q1
    let names: Vec<_> = groups.iter().map(|g| g.customer_name.as_str()).collect();
    assert_eq!(names, vec!["B", "A"]);

    assert_eq!(groups[0].invoices.len(), 1);
    assert_eq!(groups[0].invoices[0].invoice_no, Cell::text("INV-2"));

    let a = &groups[1];
    assert_eq!(a.invoices.len(), 2);
    assert_eq!(a.invoices[0].invoice_no, Cell::text("INV-1"));
    assert_eq!(a.invoices[1].invoice_no, Cell::text("INV-1"));
    assert_eq!(a.invoices[0].product_volume, dec!(5));
    assert_eq!(a.invoices[1].product_volume, dec!(0));
    assert_eq!(a.invoices[1].products[0].product_name, Cell::text("Nuts"));
}

#[test]
fn invoice_search_merges_across_quarters() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(
        dir.path(),
        "q1.csv",
        BILLING_HEADER,
        &[
            "A,INV-1,2024-01-05,Bolts,5,bob".to_string(),
            "A,INV-2,2024-01-05,Bolts,8,bob".to_string(),
        ],
    );
    write_csv(
        dir.path(),
        "q2.csv",
        BILLING_HEADER,
        &[
            "A,INV-1,2024-04-01,Nuts,2.5,bob".to_string(),
            "A,INV-1,2024-04-01,Washers,4,alice".to_string(),
        ],
    );
    let desk = desk(dir.path());

    let found = desk.search_invoices(&standard("bob"), "INV-1").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].customer_name, "A");
    assert_eq!(found[0].invoice_date, Cell::text("2024-01-05"));
    assert_eq!(found[0].total_product_volume, dec!(7.5));
    assert_eq!(found[0].products.len(), 2);

    let everyone = desk.search_invoices(&admin(), " INV-1 ").unwrap();
    assert_eq!(everyone[0].total_product_volume, dec!(11.5));
    assert_eq!(everyone[0].products.len(), 3);
}

#[test]
fn invoice_search_without_match_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(
        dir.path(),
        "q1.csv",
        BILLING_HEADER,
        &["A,INV-2,2024-01-05,Bolts,5,bob".to_string()],
    );
    let desk = desk(dir.path());

    assert!(desk.search_invoices(&admin(), "INV-1").unwrap().is_empty());
    assert!(desk.search_invoices(&standard("alice"), "INV-2").unwrap().is_empty());
}

#[test]
fn invoice_search_needs_an_invoice_number() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(
        dir.path(),
        "q1.csv",
        BILLING_HEADER,
        &["A,,2024-01-05,Bolts,5,bob".to_string()],
    );
    let desk = desk(dir.path());

    assert!(matches!(
        desk.search_invoices(&admin(), ""),
        Err(DeskError::BlankInvoiceNo)
    ));
    assert!(matches!(
        desk.search_invoices(&admin(), "   "),
        Err(DeskError::BlankInvoiceNo)
    ));
}

#[test]
fn corrupt_quarter_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(
        dir.path(),
        "q1.csv",
        BILLING_HEADER,
        &[format!("A,INV-1,{},Bolts,5,bob", invoice_date(0))],
    );
    fs::write(dir.path().join("q2.csv"), [0xff, 0xfe, 0x00, b'\n', 0xff]).unwrap();

    let groups = desk(dir.path()).billing_details(&admin()).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].customer_name, "A");
}

#[test]
fn missing_data_dir_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let desk = desk(&dir.path().join("missing"));

    assert!(matches!(
        desk.billing_details(&admin()),
        Err(DeskError::DataDir { .. })
    ));
    // the single sales order file just reads as empty
    assert!(desk.open_sales_orders(&admin()).unwrap().is_empty());
}

#[test]
fn roster_scope_drives_reports() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("users.csv"),
        "username,password,role,filter_name\nbsmith,pw,standard,bob\nboss,pw,admin,\n",
    )
    .unwrap();
    write_csv(
        dir.path(),
        "open_orders.csv",
        SALES_HEADER,
        &[
            format!("A,Bolts,1,{},alice", so_date(0)),
            format!("B,Nuts,2,{},bob", so_date(0)),
        ],
    );
    let desk = desk(dir.path());
    let roster = Roster::load(&desk.config().roster_path()).unwrap();
    let roles = RoleBook::default();

    let bsmith = roster.scope_for("bsmith", &roles).unwrap();
    assert_eq!(desk.open_sales_orders(&bsmith).unwrap().len(), 1);

    let boss = roster.scope_for("boss", &roles).unwrap();
    assert_eq!(desk.open_sales_orders(&boss).unwrap().len(), 2);
}

#[test]
fn reports_serialize_as_json() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(
        dir.path(),
        "q1.csv",
        BILLING_HEADER,
        &[format!("A,1042,{},Bolts,5,bob", invoice_date(0))],
    );

    let groups = desk(dir.path()).billing_details(&admin()).unwrap();
    let json = serde_json::to_value(&groups).unwrap();

    assert_eq!(
        json,
        serde_json::json!([{
            "customerName": "A",
            "invoices": [{
                "invoiceNo": "1042",
                "invoiceDate": invoice_date(0),
                "productVolume": 5.0,
                "products": [{ "productName": "Bolts", "productVolume": 5.0 }],
            }],
        }])
    );
}
