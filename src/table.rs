//! Tabular Reader: turns a delimited file or the first sheet of a workbook
//! into [`Record`]s keyed by the header row.
//!
//! Read failures stay inside this module. [`read_records`] reports them in
//! the log and hands back an empty sequence, so one corrupt file never sinks
//! a whole report.

use std::path::Path;

use calamine::{open_workbook_auto, Data, DataType as _, Reader as _};
use csv::ReaderBuilder;
use log::{debug, warn};
use thiserror::Error;

use crate::record::{Cell, Record};

#[derive(Debug, Error)]
pub enum ReadError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Workbook(#[from] calamine::Error),
    #[error("workbook has no worksheet")]
    NoWorksheet,
    #[error("unsupported file extension '{0}'")]
    UnsupportedExtension(String),
}

pub trait TabularReader {
    fn read(&self, path: &Path) -> Result<Vec<Record>, ReadError>;
}

/// Comma (or otherwise) separated text with a header line.
#[derive(Debug, Clone, Copy)]
pub struct DelimitedReader {
    delimiter: u8,
}

impl DelimitedReader {
    pub fn new(delimiter: u8) -> Self {
        DelimitedReader { delimiter }
    }
}

impl Default for DelimitedReader {
    fn default() -> Self {
        DelimitedReader::new(b',')
    }
}

impl TabularReader for DelimitedReader {
    fn read(&self, path: &Path) -> Result<Vec<Record>, ReadError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .from_path(path)?;
        let headers = reader.headers()?.clone();

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let record: Record = headers
                .iter()
                .enumerate()
                .filter(|(_, name)| !name.is_empty())
                .map(|(index, name)| {
                    let cell = row.get(index).map(Cell::text).unwrap_or(Cell::Empty);
                    (name, cell)
                })
                .collect();
            records.push(record);
        }
        Ok(records)
    }
}

/// Spreadsheet workbooks (xlsx, xls, ods, ...). Only the first sheet is read.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkbookReader;

impl TabularReader for WorkbookReader {
    fn read(&self, path: &Path) -> Result<Vec<Record>, ReadError> {
        let mut workbook = open_workbook_auto(path)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(ReadError::NoWorksheet)??;

        let mut rows = range.rows();
        let headers: Vec<Option<String>> = match rows.next() {
            Some(header) => header
                .iter()
                .map(|data| {
                    let name = Cell::from(data).to_string();
                    if name.is_empty() {
                        None
                    } else {
                        Some(name)
                    }
                })
                .collect(),
            None => return Ok(Vec::new()),
        };

        Ok(rows
            .filter(|row| row.iter().any(|data| !matches!(data, Data::Empty)))
            .map(|row| {
                headers
                    .iter()
                    .zip(row)
                    .filter_map(|(name, data)| {
                        name.as_ref().map(|name| (name.as_str(), Cell::from(data)))
                    })
                    .collect::<Record>()
            })
            .collect())
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::String(value) | Data::DurationIso(value) => Cell::text(value.as_str()),
            Data::Float(value) => Cell::Number(*value),
            Data::Int(value) => Cell::Number(*value as f64),
            Data::Bool(value) => Cell::text(value.to_string()),
            Data::DateTime(_) | Data::DateTimeIso(_) => {
                data.as_datetime().map(Cell::Date).unwrap_or(Cell::Empty)
            }
        }
    }
}

pub fn reader_for(path: &Path) -> Result<Box<dyn TabularReader>, ReadError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "csv" | "txt" => Ok(Box::new(DelimitedReader::default())),
        "tsv" => Ok(Box::new(DelimitedReader::new(b'\t'))),
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(Box::new(WorkbookReader)),
        _ => Err(ReadError::UnsupportedExtension(extension)),
    }
}

/// Every record in `path`, or none at all if the file cannot be read.
pub fn read_records(path: &Path) -> Vec<Record> {
    match reader_for(path).and_then(|reader| reader.read(path)) {
        Ok(records) => {
            debug!("read {} records from '{}'", records.len(), path.display());
            records
        }
        Err(err) => {
            warn!(
                "error reading file '{}', treating it as empty: {}",
                path.display(),
                err
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
use std::io::Write;

#[cfg(test)]
fn fixture(name: &str, contents: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::File::create(&path)
        .and_then(|mut file| file.write_all(contents))
        .unwrap();
    (dir, path)
}

#[test]
fn delimited_rows_are_keyed_by_header() {
    let (_dir, path) = fixture(
        "orders.csv",
        b"Customer Name,Order Qty,SO Date\nAcme,10,28/10/2025\nGlobex,,01/10/2025\n",
    );

    let records = read_records(&path);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get("Customer Name"), &Cell::text("Acme"));
    assert_eq!(records[0].get("Order Qty"), &Cell::text("10"));
    assert_eq!(records[1].get("Order Qty"), &Cell::text(""));
    assert_eq!(
        records[0].columns().collect::<Vec<_>>(),
        vec!["Customer Name", "Order Qty", "SO Date"]
    );
}

#[test]
fn unnamed_header_columns_are_dropped() {
    let (_dir, path) = fixture("q1.csv", b"Invoice No,,Product Name\nINV-1,junk,Widget\n");

    let records = read_records(&path);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].len(), 2);
    assert_eq!(records[0].get("Invoice No"), &Cell::text("INV-1"));
    assert_eq!(records[0].get("Product Name"), &Cell::text("Widget"));
}

#[test]
fn short_rows_leave_cells_empty() {
    let (_dir, path) = fixture("q1.csv", b"Invoice No,Product Name\nINV-1\n");

    let records = read_records(&path);
    assert_eq!(records.len(), 1);
    assert!(records[0].get("Product Name").is_empty());
}

#[test]
fn missing_files_read_as_empty() {
    let dir = tempfile::tempdir().unwrap();

    assert!(read_records(&dir.path().join("absent.csv")).is_empty());
    assert!(read_records(&dir.path().join("absent.xlsx")).is_empty());
}

#[test]
fn corrupt_workbook_reads_as_empty() {
    let (_dir, path) = fixture("q2.xlsx", b"this is not a zip archive");

    assert!(read_records(&path).is_empty());
}

#[test]
fn unknown_extension_reads_as_empty() {
    let (_dir, path) = fixture("orders.json", b"[]");

    assert!(matches!(
        reader_for(&path),
        Err(ReadError::UnsupportedExtension(ext)) if ext == "json"
    ));
    assert!(read_records(&path).is_empty());
}

#[cfg(test)]
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, XlsxError};

#[cfg(test)]
fn write_workbook(path: &Path) -> Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let date = Format::new().set_num_format("yyyy-mm-dd");

    let orders = workbook.add_worksheet();
    orders.write_string(0, 0, "Customer Name")?;
    orders.write_string(0, 2, "Order Qty")?;
    orders.write_string(0, 3, "SO Date")?;
    orders.write_string(1, 0, "Acme")?;
    orders.write_string(1, 1, "junk")?;
    orders.write_number(1, 2, 12.5)?;
    orders.write_datetime_with_format(1, 3, &ExcelDateTime::from_ymd(2025, 10, 28)?, &date)?;
    // row 2 left blank
    orders.write_string(3, 0, "Globex")?;
    orders.write_number(3, 2, 3.0)?;

    let archive = workbook.add_worksheet();
    archive.write_string(0, 0, "Customer Name")?;
    archive.write_string(1, 0, "Initech")?;

    workbook.save(path)
}

#[test]
fn workbook_first_sheet_is_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Q3_2025.xlsx");
    write_workbook(&path).unwrap();

    let records = read_records(&path);

    assert_eq!(records.len(), 2);
    assert_eq!(
        records[0].columns().collect::<Vec<_>>(),
        vec!["Customer Name", "Order Qty", "SO Date"]
    );
    assert_eq!(records[0].get("Customer Name"), &Cell::text("Acme"));
    assert_eq!(records[0].get("Order Qty"), &Cell::Number(12.5));
    assert_eq!(
        records[0].get("SO Date"),
        &Cell::Date(
            chrono::NaiveDate::from_ymd_opt(2025, 10, 28)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap()
        )
    );
    assert_eq!(records[1].get("Customer Name"), &Cell::text("Globex"));
    assert_eq!(records[1].get("Order Qty"), &Cell::Number(3.0));
    assert!(records[1].get("SO Date").is_empty());
}

#[test]
fn workbook_cells_convert() {
    assert_eq!(Cell::from(&Data::Int(4)), Cell::Number(4.0));
    assert_eq!(Cell::from(&Data::Float(2.5)), Cell::Number(2.5));
    assert_eq!(Cell::from(&Data::String("Acme".into())), Cell::text("Acme"));
    assert_eq!(Cell::from(&Data::Empty), Cell::Empty);
    assert_eq!(Cell::from(&Data::Bool(true)), Cell::text("true"));
}
