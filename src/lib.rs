//! Retrieve and evaluate the TLS certificates served by `host:port` endpoints.
//!
//! For every endpoint the [`connector`] completes a TLS handshake without
//! verifying the peer, reads the leaf certificate, and the [`evaluator`]
//! turns it into a [`CertificateRecord`]: subject Common Name, validity
//! window, and whether the certificate looks self-signed or has expired.
//! Failures never abort a run; they end up in the record's `error` field.
//!
//! ```no_run
//! use certcheck::{inspect, Endpoint, DEFAULT_TIMEOUT};
//!
//! let endpoint: Endpoint = "example.com:443".parse()?;
//! let record = inspect(&endpoint, DEFAULT_TIMEOUT).record;
//! println!("{} expired: {:?}", record.subject_cn, record.expired);
//! # Ok::<(), certcheck::InputError>(())
//! ```

pub mod config;
pub mod connector;
pub mod endpoint;
pub mod error;
pub mod evaluator;
pub mod output;
pub mod scan;

pub use config::{Config, ConfigError, OutputFormat, Settings};
pub use connector::{fetch_certificate, Transcript, DEFAULT_TIMEOUT};
pub use endpoint::{parse_endpoints, read_endpoints, sort_endpoints, Endpoint};
pub use error::{ConnectionError, ExportError, InputError, ParseError};
pub use evaluator::{
    evaluate, evaluate_at, extract_cn, CertificateFacts, CertificateRecord, DistinguishedName,
    Verdict,
};
pub use scan::{inspect, scan, scan_with, Inspection, ScanOptions};

/// Collects the endpoints named in `settings`: inline ones first, then the
/// lines of the input file.
///
/// Fails on the first malformed token, before anything is contacted.
pub fn load_endpoints(settings: &Settings) -> Result<Vec<Endpoint>, InputError> {
    let mut endpoints = settings
        .endpoints
        .iter()
        .map(|token| token.parse::<Endpoint>())
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(file) = &settings.file {
        endpoints.extend(read_endpoints(file)?);
    }
    if endpoints.is_empty() {
        return Err(InputError::NoEndpoints);
    }
    if settings.sort {
        sort_endpoints(&mut endpoints);
    }
    Ok(endpoints)
}
