use comfy_table::presets::ASCII_FULL;
use comfy_table::{ContentArrangement, Table};

use crate::evaluator::{CertificateRecord, Verdict};
use crate::output::{format_timestamp, COLUMNS};

const BANNER: &str = r#"
 ___ ___ _ __| |_ ___| |__   ___  ___| | __
/ __/ _ \ '__| __/ __| '_ \ / _ \/ __| |/ /
| (_|  __/ |  | || (__| | | |  __/ (__|   <
\___\___|_|   \__\___|_| |_|\___|\___|_|\_\
"#;

/// The startup banner with the crate version.
pub fn banner() -> String {
    format!("{}  v{}\n", BANNER, env!("CARGO_PKG_VERSION"))
}

/// One table/CSV row, in [`COLUMNS`] order.
pub fn row(record: &CertificateRecord) -> [String; 7] {
    [
        record.endpoint.to_string(),
        record.subject_cn.clone(),
        format_timestamp(record.not_before),
        format_timestamp(record.not_after),
        Verdict::from(record.self_signed).to_string(),
        Verdict::from(record.expired).to_string(),
        record.error.clone().unwrap_or_default(),
    ]
}

/// Renders records as an ASCII table, one row per record.
pub fn render(records: &[CertificateRecord]) -> String {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(COLUMNS);
    for record in records {
        table.add_row(row(record));
    }
    table.to_string()
}
