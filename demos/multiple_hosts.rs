//! Concurrent certificate checking example.
//!
//! This example checks several endpoints on a bounded worker pool and
//! renders the results as a table.
//!
//! Run with: cargo run --example multiple_hosts

use certcheck::output::table;
use certcheck::{scan, CertificateRecord, Endpoint, ScanOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Multi-Host Certificate Check ===\n");

    let endpoints = [
        "example.com:443",
        "self-signed.badssl.com:443",
        "expired.badssl.com:443",
        "github.com:443",
        "rust-lang.org:443",
    ]
    .iter()
    .map(|token| token.parse::<Endpoint>())
    .collect::<Result<Vec<_>, _>>()?;

    let options = ScanOptions {
        workers: 4,
        ..ScanOptions::default()
    };
    let records: Vec<CertificateRecord> = scan(&endpoints, &options)
        .into_iter()
        .map(|inspection| inspection.record)
        .collect();

    println!("{}", table::render(&records));
    Ok(())
}
