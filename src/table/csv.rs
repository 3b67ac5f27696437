//! CSV reading and writing for tables

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::Result;
use crate::table::{Table, Value};

/// Read a CSV file with a header row into a table
pub fn read_csv(path: impl AsRef<Path>) -> Result<Table> {
    let file = File::open(path.as_ref())?;
    read_csv_reader(file)
}

/// Read CSV with a header row from any reader
pub fn read_csv_reader<R: Read>(reader: R) -> Result<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];
    for record in rdr.records() {
        let record = record?;
        for (i, field) in record.iter().enumerate() {
            if i < columns.len() {
                columns[i].push(Value::parse(field));
            }
        }
    }

    let mut table = Table::new();
    for (name, values) in headers.into_iter().zip(columns) {
        table.push_column(name, values)?;
    }
    Ok(table)
}

/// Write a table as CSV, creating parent directories as needed
pub fn write_csv(table: &Table, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(path)?;
    write_csv_writer(table, file)
}

/// Write a table as CSV to any writer
pub fn write_csv_writer<W: Write>(table: &Table, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(table.column_names())?;
    for i in 0..table.n_rows() {
        let fields: Vec<String> = table.row(i).iter().map(|(_, v)| v.to_field()).collect();
        wtr.write_record(&fields)?;
    }
    wtr.flush()?;
    Ok(())
}
