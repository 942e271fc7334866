//! Concurrent checking of many endpoints.
//!
//! A fixed number of worker threads pull endpoints by index and report
//! `(index, result)` pairs over a channel; results are slotted back into
//! input order, so every endpoint yields exactly one [`Inspection`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::connector::{fetch_certificate, Transcript, DEFAULT_TIMEOUT};
use crate::endpoint::Endpoint;
use crate::evaluator::{evaluate, CertificateRecord};

/// Default number of concurrent connections.
pub const DEFAULT_WORKERS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub timeout: Duration,
    pub workers: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            timeout: DEFAULT_TIMEOUT,
            workers: DEFAULT_WORKERS,
        }
    }
}

/// The record for one endpoint plus the diagnostic transcript gathered
/// while producing it.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub record: CertificateRecord,
    pub transcript: Vec<String>,
}

impl Inspection {
    fn failed(endpoint: &Endpoint, reason: &str) -> Self {
        Inspection {
            record: CertificateRecord::failed(endpoint, reason),
            transcript: vec![format!("error: {}", reason)],
        }
    }
}

/// Connects to a single endpoint and evaluates its certificate.
pub fn inspect(endpoint: &Endpoint, timeout: Duration) -> Inspection {
    let transcript = Transcript::new();
    let outcome = fetch_certificate(endpoint, timeout, &transcript);
    if let Err(ref err) = outcome {
        warn!("{}: {}", endpoint, err);
    }
    Inspection {
        record: evaluate(endpoint, outcome),
        transcript: transcript.lines(),
    }
}

/// Checks every endpoint with [`inspect`], returning results in input order.
pub fn scan(endpoints: &[Endpoint], options: &ScanOptions) -> Vec<Inspection> {
    let timeout = options.timeout;
    scan_with(endpoints, options.workers, |endpoint| {
        inspect(endpoint, timeout)
    })
}

/// Runs `check` over `endpoints` on at most `workers` threads.
///
/// A panicking check only fails its own endpoint.
pub fn scan_with<F>(endpoints: &[Endpoint], workers: usize, check: F) -> Vec<Inspection>
where
    F: Fn(&Endpoint) -> Inspection + Sync,
{
    let workers = workers.clamp(1, endpoints.len().max(1));
    debug!(
        "checking {} endpoints with {} workers",
        endpoints.len(),
        workers
    );

    let next = AtomicUsize::new(0);
    let (sender, receiver) = mpsc::channel();
    thread::scope(|scope| {
        for _ in 0..workers {
            let sender = sender.clone();
            let next = &next;
            let check = &check;
            scope.spawn(move || loop {
                let index = next.fetch_add(1, Ordering::Relaxed);
                let Some(endpoint) = endpoints.get(index) else {
                    break;
                };
                let inspection = panic::catch_unwind(AssertUnwindSafe(|| check(endpoint)))
                    .unwrap_or_else(|_| {
                        warn!("{}: check aborted unexpectedly", endpoint);
                        Inspection::failed(endpoint, "internal error while checking endpoint")
                    });
                if sender.send((index, inspection)).is_err() {
                    break;
                }
            });
        }
    });
    drop(sender);

    let mut slots: Vec<Option<Inspection>> = endpoints.iter().map(|_| None).collect();
    for (index, inspection) in receiver {
        slots[index] = Some(inspection);
    }
    slots
        .into_iter()
        .zip(endpoints)
        .map(|(slot, endpoint)| {
            slot.unwrap_or_else(|| Inspection::failed(endpoint, "endpoint was not checked"))
        })
        .collect()
}
