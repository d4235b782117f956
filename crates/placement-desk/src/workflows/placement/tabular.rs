//! Header-plus-rows tables and their CSV/XLSX encodings.

use std::io::{Read, Write};
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::Workbook;
use serde::{Deserialize, Serialize};

use super::domain::render_number;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum TabularError {
    #[error("table io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("workbook error: {0}")]
    Workbook(String),
    #[error("table has no header row")]
    MissingHeader,
}

pub fn read_csv<R: Read>(reader: R) -> Result<Table, TabularError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(|header| header.is_empty()) {
        return Err(TabularError::MissingHeader);
    }

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Table { headers, rows })
}

pub fn write_csv<W: Write>(table: &Table, writer: W) -> Result<(), TabularError> {
    let mut csv_writer = csv::WriterBuilder::new().flexible(true).from_writer(writer);
    csv_writer.write_record(&table.headers)?;
    for row in &table.rows {
        csv_writer.write_record(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Reads the first worksheet of an xlsx/xls/ods workbook.
pub fn read_xlsx(path: &Path) -> Result<Table, TabularError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|err| TabularError::Workbook(err.to_string()))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(TabularError::MissingHeader)?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|err| TabularError::Workbook(format!("sheet '{sheet}': {err}")))?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<String>>());
    let headers = rows.next().ok_or(TabularError::MissingHeader)?;

    Ok(Table {
        headers,
        rows: rows.collect(),
    })
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(value) => value.trim().to_string(),
        Data::Float(value) => render_number(*value),
        Data::Int(value) => value.to_string(),
        Data::Bool(value) => (if *value { "TRUE" } else { "FALSE" }).to_string(),
        other => other.to_string(),
    }
}

/// Writes a single-sheet workbook. Cells that round-trip exactly through a
/// number are written as numbers, everything else as text.
pub fn write_xlsx(table: &Table, path: &Path) -> Result<(), TabularError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let map_err = |err: rust_xlsxwriter::XlsxError| TabularError::Workbook(err.to_string());

    for (col, header) in table.headers.iter().enumerate() {
        worksheet
            .write_string(0, col as u16, header.as_str())
            .map_err(map_err)?;
    }

    for (row_index, row) in table.rows.iter().enumerate() {
        let row_number = row_index as u32 + 1;
        for (col, cell) in row.iter().enumerate() {
            match cell.parse::<f64>() {
                Ok(number) if number.is_finite() && render_number(number) == *cell => {
                    worksheet
                        .write_number(row_number, col as u16, number)
                        .map_err(map_err)?;
                }
                _ if cell.is_empty() => {}
                _ => {
                    worksheet
                        .write_string(row_number, col as u16, cell.as_str())
                        .map_err(map_err)?;
                }
            }
        }
    }

    workbook.save(path).map_err(map_err)?;
    Ok(())
}
