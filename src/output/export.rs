//! CSV export.
//!
//! The header row matches the table columns. [`read_csv`] reads an export
//! back into [`CsvRow`]s.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, ParseError};
use crate::evaluator::{CertificateRecord, Verdict};
use crate::output::{parse_timestamp, table, COLUMNS};

/// One exported row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvRow {
    #[serde(rename = "Host:Port")]
    pub host_port: String,
    #[serde(rename = "Certificate Name")]
    pub certificate_name: String,
    #[serde(rename = "Issue Date")]
    pub issue_date: String,
    #[serde(rename = "Expiry Date")]
    pub expiry_date: String,
    #[serde(rename = "Self-Signed")]
    pub self_signed: String,
    #[serde(rename = "Expired")]
    pub expired: String,
    #[serde(rename = "Error")]
    pub error: String,
}

/// Uses the table's cells, so both outputs render a record identically.
impl From<&CertificateRecord> for CsvRow {
    fn from(record: &CertificateRecord) -> Self {
        let [host_port, certificate_name, issue_date, expiry_date, self_signed, expired, error] =
            table::row(record);
        CsvRow {
            host_port,
            certificate_name,
            issue_date,
            expiry_date,
            self_signed,
            expired,
            error,
        }
    }
}

impl CsvRow {
    pub fn not_before(&self) -> Result<Option<chrono::DateTime<chrono::Utc>>, ParseError> {
        parse_timestamp(COLUMNS[2], &self.issue_date)
    }

    pub fn not_after(&self) -> Result<Option<chrono::DateTime<chrono::Utc>>, ParseError> {
        parse_timestamp(COLUMNS[3], &self.expiry_date)
    }

    pub fn self_signed(&self) -> Result<Option<bool>, ParseError> {
        parse_verdict(COLUMNS[4], &self.self_signed)
    }

    pub fn expired(&self) -> Result<Option<bool>, ParseError> {
        parse_verdict(COLUMNS[5], &self.expired)
    }
}

fn parse_verdict(field: &str, value: &str) -> Result<Option<bool>, ParseError> {
    value
        .parse::<Verdict>()
        .map(Option::from)
        .map_err(|_| ParseError::Verdict {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// Writes a header row followed by one row per record.
pub fn write_csv<W: Write>(writer: W, records: &[CertificateRecord]) -> Result<(), ExportError> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(writer);
    writer.write_record(COLUMNS)?;
    for record in records {
        writer.serialize(CsvRow::from(record))?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Creates (or truncates) `path` and writes the records to it.
pub fn export_csv<P: AsRef<Path>>(path: P, records: &[CertificateRecord]) -> Result<(), ExportError> {
    let file = File::create(path.as_ref()).map_err(|source| ExportError::Io {
        path: path.as_ref().to_path_buf(),
        source,
    })?;
    write_csv(file, records)
}

/// Reads rows written by [`write_csv`].
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<CsvRow>, ExportError> {
    let mut reader = ReaderBuilder::new().from_reader(reader);
    let rows = reader.deserialize().collect::<Result<Vec<CsvRow>, _>>()?;
    Ok(rows)
}
