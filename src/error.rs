//! Error types for certificate checking.
//!
//! Only [`InputError`] is fatal to a run. [`ConnectionError`] is folded into
//! the failing endpoint's record, and [`ParseError`] degrades a single field.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Bad user input. Surfaced before any connection is attempted.
#[derive(Debug, Error)]
pub enum InputError {
    /// A `host:port` token could not be parsed
    #[error("{}invalid endpoint '{token}': {reason}", line_prefix(.line))]
    Malformed {
        /// The offending token, as supplied
        token: String,
        /// 1-based line number when the token came from an input file
        line: Option<usize>,
        /// Why it was rejected
        reason: String,
    },

    /// The input file could not be read
    #[error("cannot read input file {}: {source}", .path.display())]
    Unreadable {
        /// Path of the input file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Neither a single endpoint nor an input file was supplied
    #[error("no endpoints supplied")]
    NoEndpoints,
}

fn line_prefix(line: &Option<usize>) -> String {
    line.map(|n| format!("line {}: ", n)).unwrap_or_default()
}

/// Failure to obtain a certificate from one endpoint.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// DNS resolution failed for the given hostname
    #[error("failed to resolve hostname {hostname}: {source}")]
    DnsResolution {
        /// The hostname that failed to resolve
        hostname: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// TCP connection failed to the target address
    #[error("connection to {address} failed: {source}")]
    ConnectionFailed {
        /// The address (host:port) that connection failed to
        address: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Network operation timeout
    #[error("{operation} timed out after {seconds:.1}s")]
    Timeout {
        /// Which operation timed out
        operation: String,
        /// The timeout that elapsed
        seconds: f64,
    },

    /// TLS handshake failed
    #[error("TLS handshake failed: {details}")]
    HandshakeFailed {
        /// Details about why the handshake failed
        details: String,
    },

    /// The handshake completed but the peer sent no certificate
    #[error("{address} presented no certificate")]
    NoCertificate {
        /// The endpoint that was contacted
        address: String,
    },

    /// OpenSSL error while preparing the session
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),
}

/// A certificate or export field that could not be decoded.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid {field} timestamp '{value}'")]
    Timestamp { field: String, value: String },

    #[error("invalid {field} value '{value}', expected Yes, No or Unknown")]
    Verdict { field: String, value: String },
}

/// Failure while writing or re-reading a CSV export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
