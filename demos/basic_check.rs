//! Basic certificate checking example.
//!
//! This example demonstrates how to check the certificate of a single
//! endpoint and print the evaluated record.
//!
//! Run with: cargo run --example basic_check

use certcheck::{fetch_certificate, evaluate, Endpoint, Transcript, Verdict, DEFAULT_TIMEOUT};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Basic TLS Certificate Check ===\n");

    let endpoint: Endpoint = "example.com:443".parse()?;
    let transcript = Transcript::new();
    let outcome = fetch_certificate(&endpoint, DEFAULT_TIMEOUT, &transcript);

    if let Ok(facts) = &outcome {
        println!("Subject: {}", facts.subject);
        println!("Issuer: {}", facts.issuer);
    }

    let record = evaluate(&endpoint, outcome);
    println!("Certificate for: {}", record.endpoint);
    println!("Common name: {}", record.subject_cn);
    println!("Issued by: {}", record.issuer_cn);
    println!("Valid from: {:?}", record.not_before);
    println!("Valid to: {:?}", record.not_after);
    println!("Self-signed: {}", Verdict::from(record.self_signed));
    println!("Expired: {}", Verdict::from(record.expired));
    if let Some(error) = &record.error {
        println!("Error: {}", error);
    }
    println!();

    println!("Transcript:");
    for line in transcript.lines() {
        println!("  {}", line);
    }

    Ok(())
}
