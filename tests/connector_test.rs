//! End-to-end checks against a local TLS server.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use certcheck::output::export::{read_csv, write_csv};
use certcheck::{
    fetch_certificate, scan, CertificateRecord, ConnectionError, Endpoint, ScanOptions,
    Transcript,
};
use chrono::DateTime;
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::ssl::{SslAcceptor, SslMethod};
use openssl::x509::{X509NameBuilder, X509};

const TIMEOUT: Duration = Duration::from_secs(5);

fn name(entries: &[(&str, &str)]) -> openssl::x509::X509Name {
    let mut builder = X509NameBuilder::new().unwrap();
    for (field, value) in entries {
        builder.append_entry_by_text(field, value).unwrap();
    }
    builder.build()
}

fn certificate(
    subject: &[(&str, &str)],
    issuer: &[(&str, &str)],
    not_before: &Asn1Time,
    not_after: &Asn1Time,
) -> (PKey<Private>, X509) {
    let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name(subject)).unwrap();
    builder.set_issuer_name(&name(issuer)).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(not_before).unwrap();
    builder.set_not_after(not_after).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();
    (key, builder.build())
}

/// Serves `cert` for `connections` TLS handshakes on a random local port.
fn serve(key: PKey<Private>, cert: X509, connections: usize) -> u16 {
    let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
    acceptor.set_private_key(&key).unwrap();
    acceptor.set_certificate(&cert).unwrap();
    let acceptor = acceptor.build();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        for stream in listener.incoming().take(connections).flatten() {
            if let Ok(mut tls) = acceptor.accept(stream) {
                let _ = tls.shutdown();
            }
        }
    });
    port
}

/// Relays one connection to `upstream`, passing the server's bytes back to
/// the client one at a time with `delay` between them.
fn trickle_relay(upstream: u16, delay: Duration) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        let Ok((client, _)) = listener.accept() else {
            return;
        };
        let Ok(server) = TcpStream::connect(("127.0.0.1", upstream)) else {
            return;
        };
        let mut client_read = client.try_clone().unwrap();
        let mut server_write = server.try_clone().unwrap();
        thread::spawn(move || {
            let _ = io::copy(&mut client_read, &mut server_write);
        });

        let (mut server_read, mut client_write) = (server, client);
        let mut byte = [0u8; 1];
        while let Ok(1) = server_read.read(&mut byte) {
            thread::sleep(delay);
            if client_write.write_all(&byte).is_err() {
                break;
            }
        }
    });
    port
}

#[test]
fn test_trickling_server_cannot_outlast_timeout() {
    let subject = [("CN", "slow.test")];
    let (key, cert) = certificate(
        &subject,
        &subject,
        &Asn1Time::days_from_now(0).unwrap(),
        &Asn1Time::days_from_now(30).unwrap(),
    );
    let server_port = serve(key, cert, 1);
    let relay_port = trickle_relay(server_port, Duration::from_millis(10));

    let endpoint = Endpoint::new("127.0.0.1", relay_port).unwrap();
    let timeout = Duration::from_secs(1);
    let started = Instant::now();
    let result = fetch_certificate(&endpoint, timeout, &Transcript::new());
    let elapsed = started.elapsed();

    assert!(
        elapsed < timeout * 3,
        "handshake took {:?} with a {:?} timeout",
        elapsed,
        timeout
    );
    assert!(
        matches!(result, Err(ConnectionError::Timeout { .. })),
        "expected timeout, got {:?}",
        result
    );
}

#[test]
fn test_fetch_self_signed_certificate() {
    let subject = [("C", "US"), ("O", "Test Org"), ("CN", "self-signed.test")];
    let (key, cert) = certificate(
        &subject,
        &subject,
        &Asn1Time::days_from_now(0).unwrap(),
        &Asn1Time::days_from_now(30).unwrap(),
    );
    let port = serve(key, cert, 1);

    let endpoint = Endpoint::new("127.0.0.1", port).unwrap();
    let transcript = Transcript::new();
    let facts = fetch_certificate(&endpoint, TIMEOUT, &transcript).unwrap();

    assert_eq!(facts.subject.to_string(), "C=US, O=Test Org, CN=self-signed.test");
    assert_eq!(facts.subject.common_name(), "self-signed.test");
    assert_eq!(facts.issuer.common_name(), "self-signed.test");

    let record = certcheck::evaluate(&endpoint, Ok(facts));
    assert_eq!(record.subject_cn, "self-signed.test");
    assert_eq!(record.self_signed, Some(true));
    assert_eq!(record.expired, Some(false));
    assert!(record.error.is_none());

    let lines = transcript.lines();
    assert!(lines.iter().any(|l| l.starts_with("TLS handshake with SNI 127.0.0.1")));
    assert!(lines.iter().any(|l| l.starts_with("verify depth=0")));
    assert!(lines.iter().any(|l| l.starts_with("subject=")));
}

#[test]
fn test_expired_certificate_from_other_issuer() {
    let (key, cert) = certificate(
        &[("CN", "expired.test")],
        &[("O", "Test CA Org"), ("CN", "Test Issuing CA")],
        &Asn1Time::from_unix(1_000_000_000).unwrap(),
        &Asn1Time::from_unix(1_100_000_000).unwrap(),
    );
    let port = serve(key, cert, 1);

    let endpoint = Endpoint::new("127.0.0.1", port).unwrap();
    let inspection = certcheck::inspect(&endpoint, TIMEOUT);
    let record = inspection.record;

    assert!(record.error.is_none(), "unexpected error: {:?}", record.error);
    assert_eq!(record.subject_cn, "expired.test");
    assert_eq!(record.issuer_cn, "Test Issuing CA");
    assert_eq!(record.self_signed, Some(false));
    assert_eq!(record.expired, Some(true));
    assert_eq!(record.not_before, DateTime::from_timestamp(1_000_000_000, 0));
    assert_eq!(record.not_after, DateTime::from_timestamp(1_100_000_000, 0));
    assert!(!inspection.transcript.is_empty());
}

#[test]
fn test_scan_mixes_success_and_failure() {
    let subject = [("CN", "local.test")];
    let (key, cert) = certificate(
        &subject,
        &subject,
        &Asn1Time::days_from_now(0).unwrap(),
        &Asn1Time::days_from_now(10).unwrap(),
    );
    let live_port = serve(key, cert, 1);

    let closed = TcpListener::bind("127.0.0.1:0").unwrap();
    let closed_port = closed.local_addr().unwrap().port();
    drop(closed);

    let endpoints = vec![
        Endpoint::new("127.0.0.1", closed_port).unwrap(),
        Endpoint::new("127.0.0.1", live_port).unwrap(),
    ];
    let options = ScanOptions {
        timeout: TIMEOUT,
        workers: 2,
    };
    let records: Vec<CertificateRecord> = scan(&endpoints, &options)
        .into_iter()
        .map(|i| i.record)
        .collect();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].endpoint, endpoints[0]);
    assert!(records[0].error.is_some());
    assert_eq!(records[0].self_signed, None);
    assert_eq!(records[1].endpoint, endpoints[1]);
    assert_eq!(records[1].self_signed, Some(true));

    let mut buffer = Vec::new();
    write_csv(&mut buffer, &records).unwrap();
    let rows = read_csv(buffer.as_slice()).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].self_signed, "Unknown");
    assert_eq!(rows[1].self_signed, "Yes");
    assert_eq!(rows[1].certificate_name, "local.test");
}
