//! TLS connection and leaf certificate retrieval.
//!
//! Certificate verification is switched off on the per-connection
//! [`SslContext`] only: the checker must read untrusted and self-signed
//! certificates, and other TLS users in the process keep their defaults.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, trace};
use openssl::ssl::{HandshakeError, Ssl, SslContext, SslMethod, SslVerifyMode};
use openssl::x509::X509StoreContextRef;

use crate::endpoint::Endpoint;
use crate::error::ConnectionError;
use crate::evaluator::{CertificateFacts, DistinguishedName};

/// Default per-endpoint connect and handshake timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Diagnostic lines collected while probing one endpoint.
///
/// Cloning shares the same buffer, so the verify callback can append to it
/// from inside the handshake.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    lines: Arc<Mutex<Vec<String>>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, line: impl Into<String>) {
        let line = line.into();
        trace!("{}", line);
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

/// Connects to `endpoint`, completes a TLS handshake with SNI set to the
/// host, and returns the facts of the peer's leaf certificate.
///
/// `timeout` bounds the whole attempt: name resolution, every TCP connect
/// and the handshake share one deadline. No retries are made.
pub fn fetch_certificate(
    endpoint: &Endpoint,
    timeout: Duration,
    transcript: &Transcript,
) -> Result<CertificateFacts, ConnectionError> {
    let deadline = Deadline::after(timeout);
    let result = try_fetch(endpoint, &deadline, transcript);
    if let Err(ref err) = result {
        transcript.record(format!("error: {}", err));
    }
    result
}

/// A fixed point in time that every step of one attempt must finish by.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    timeout: Duration,
}

impl Deadline {
    fn after(timeout: Duration) -> Self {
        Deadline {
            at: Instant::now() + timeout,
            timeout,
        }
    }

    /// Time left, or a `TimedOut` error once the deadline has passed.
    fn remaining(&self) -> io::Result<Duration> {
        match self.at.checked_duration_since(Instant::now()) {
            Some(left) if !left.is_zero() => Ok(left),
            _ => Err(io::Error::new(io::ErrorKind::TimedOut, "deadline exceeded")),
        }
    }

    fn expired(&self, operation: String) -> ConnectionError {
        ConnectionError::Timeout {
            operation,
            seconds: self.timeout.as_secs_f64(),
        }
    }
}

/// A socket whose reads and writes never block past the deadline.
///
/// The socket timeout is reset to the time left before every call, so a
/// peer trickling bytes cannot stretch the handshake.
#[derive(Debug)]
struct DeadlineStream {
    inner: TcpStream,
    deadline: Deadline,
}

impl Read for DeadlineStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let left = self.deadline.remaining()?;
        self.inner.set_read_timeout(Some(left))?;
        self.inner.read(buf)
    }
}

impl Write for DeadlineStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let left = self.deadline.remaining()?;
        self.inner.set_write_timeout(Some(left))?;
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn try_fetch(
    endpoint: &Endpoint,
    deadline: &Deadline,
    transcript: &Transcript,
) -> Result<CertificateFacts, ConnectionError> {
    let tcp_stream = connect(endpoint, deadline, transcript)?;
    let tcp_stream = DeadlineStream {
        inner: tcp_stream,
        deadline: *deadline,
    };

    let context = unverified_context(transcript)?;
    let mut ssl = Ssl::new(&context)?;
    ssl.set_hostname(&endpoint.host)?;
    transcript.record(format!("TLS handshake with SNI {}", endpoint.host));

    let mut stream = ssl
        .connect(tcp_stream)
        .map_err(|err| handshake_error(endpoint, deadline, err))?;

    let ssl = stream.ssl();
    transcript.record(format!(
        "negotiated {} with cipher {}",
        ssl.version_str(),
        ssl.current_cipher().map(|c| c.name()).unwrap_or("(none)")
    ));

    let leaf = ssl
        .peer_certificate()
        .ok_or_else(|| ConnectionError::NoCertificate {
            address: endpoint.to_string(),
        })?;
    let facts = CertificateFacts::from_x509(&leaf);
    transcript.record(format!("subject={}", facts.subject));
    transcript.record(format!("issuer={}", facts.issuer));
    transcript.record(format!(
        "notBefore={} notAfter={}",
        leaf.not_before(),
        leaf.not_after()
    ));

    if let Err(err) = stream.shutdown() {
        debug!("{}: TLS shutdown failed: {}", endpoint, err);
    }
    Ok(facts)
}

/// Resolves the host on a helper thread, giving up at the deadline.
///
/// The system resolver cannot be cancelled; a lookup that outlives the
/// deadline finishes in the background and its result is dropped.
fn resolve(endpoint: &Endpoint, deadline: &Deadline) -> Result<Vec<SocketAddr>, ConnectionError> {
    let (sender, receiver) = mpsc::channel();
    let (host, port) = (endpoint.host.clone(), endpoint.port);
    thread::spawn(move || {
        let result = (host.as_str(), port)
            .to_socket_addrs()
            .map(|addresses| addresses.collect::<Vec<_>>());
        let _ = sender.send(result);
    });

    let left = deadline
        .remaining()
        .map_err(|_| deadline.expired(format!("resolving {}", endpoint.host)))?;
    match receiver.recv_timeout(left) {
        Ok(result) => result.map_err(|source| ConnectionError::DnsResolution {
            hostname: endpoint.host.clone(),
            source,
        }),
        Err(_) => Err(deadline.expired(format!("resolving {}", endpoint.host))),
    }
}

/// Resolves the host and tries each address in turn, all within the
/// deadline.
fn connect(
    endpoint: &Endpoint,
    deadline: &Deadline,
    transcript: &Transcript,
) -> Result<TcpStream, ConnectionError> {
    transcript.record(format!("resolving {}", endpoint));
    let addresses = resolve(endpoint, deadline)?;
    if addresses.is_empty() {
        return Err(ConnectionError::DnsResolution {
            hostname: endpoint.host.clone(),
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses returned"),
        });
    }

    let mut last_error = None;
    for address in addresses {
        let left = match deadline.remaining() {
            Ok(left) => left,
            Err(err) => {
                last_error = Some(err);
                break;
            }
        };
        transcript.record(format!("connecting to {}", address));
        match TcpStream::connect_timeout(&address, left) {
            Ok(stream) => {
                transcript.record(format!("connected to {}", address));
                return Ok(stream);
            }
            Err(err) => {
                transcript.record(format!("connect to {} failed: {}", address, err));
                last_error = Some(err);
            }
        }
    }

    match last_error {
        Some(err) if is_timeout(&err) => {
            Err(deadline.expired(format!("connect to {}", endpoint)))
        }
        Some(source) => Err(ConnectionError::ConnectionFailed {
            address: endpoint.to_string(),
            source,
        }),
        None => Err(ConnectionError::ConnectionFailed {
            address: endpoint.to_string(),
            source: io::Error::from(io::ErrorKind::NotConnected),
        }),
    }
}

/// A client context that accepts any peer certificate.
///
/// The verify callback still runs for every chain element so the result
/// OpenSSL would have reported ends up in the transcript.
fn unverified_context(transcript: &Transcript) -> Result<SslContext, ConnectionError> {
    let mut context = SslContext::builder(SslMethod::tls_client())?;
    let verify_transcript = transcript.clone();
    context.set_verify_callback(
        SslVerifyMode::PEER,
        move |preverify_ok, store: &mut X509StoreContextRef| {
            let subject = store
                .current_cert()
                .map(|cert| DistinguishedName::from_x509_name(cert.subject_name()).to_string())
                .unwrap_or_default();
            let status = if preverify_ok {
                "ok".to_string()
            } else {
                store.error().error_string().to_string()
            };
            verify_transcript.record(format!(
                "verify depth={} {}: {}",
                store.error_depth(),
                status,
                subject
            ));
            true
        },
    );
    Ok(context.build())
}

fn handshake_error(
    endpoint: &Endpoint,
    deadline: &Deadline,
    err: HandshakeError<DeadlineStream>,
) -> ConnectionError {
    let timed_out = || deadline.expired(format!("TLS handshake with {}", endpoint));
    match err {
        HandshakeError::SetupFailure(stack) => ConnectionError::OpenSsl(stack),
        HandshakeError::WouldBlock(_) => timed_out(),
        HandshakeError::Failure(mid) => {
            if mid.error().io_error().is_some_and(is_timeout) {
                timed_out()
            } else {
                ConnectionError::HandshakeFailed {
                    details: mid.error().to_string(),
                }
            }
        }
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}
