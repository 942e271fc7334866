//! Certificate evaluation.
//!
//! Turns the facts read from a peer certificate into a [`CertificateRecord`]:
//! the subject Common Name, the validity window, and the derived self-signed
//! and expired verdicts.

use std::fmt;

use chrono::{DateTime, Utc};
use log::debug;
use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::x509::{X509NameRef, X509Ref};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::endpoint::Endpoint;
use crate::error::{ConnectionError, ParseError};

/// One `type=value` pair of a distinguished name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub kind: String,
    pub value: String,
}

/// Ordered attributes of a subject or issuer name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub attributes: Vec<Attribute>,
}

impl DistinguishedName {
    pub fn from_pairs<K: Into<String>, V: Into<String>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        DistinguishedName {
            attributes: pairs
                .into_iter()
                .map(|(kind, value)| Attribute {
                    kind: kind.into(),
                    value: value.into(),
                })
                .collect(),
        }
    }

    /// Reads every entry of an OpenSSL name, keeping certificate order.
    ///
    /// Values that are not valid UTF-8 are decoded lossily instead of
    /// dropping the attribute.
    pub fn from_x509_name(name: &X509NameRef) -> Self {
        let attributes = name
            .entries()
            .map(|entry| {
                let object = entry.object();
                let kind = object
                    .nid()
                    .short_name()
                    .map(str::to_string)
                    .unwrap_or_else(|_| object.to_string());
                let value = match entry.data().as_utf8() {
                    Ok(value) => value.to_string(),
                    Err(err) => {
                        debug!("attribute {} is not valid UTF-8: {}", kind, err);
                        String::from_utf8_lossy(entry.data().as_slice()).into_owned()
                    }
                };
                Attribute { kind, value }
            })
            .collect();
        DistinguishedName { attributes }
    }

    /// The Common Name, taken from the rendered name with [`extract_cn`].
    pub fn common_name(&self) -> String {
        extract_cn(&self.to_string())
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, attribute) in self.attributes.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", attribute.kind, attribute.value)?;
        }
        Ok(())
    }
}

/// Extracts the Common Name from a rendered distinguished name.
///
/// The value starts right after the first `CN=` and runs to the next `,` or
/// the end of the string, trimmed. Returns an empty string when there is no
/// `CN=`. A comma inside a quoted or escaped value truncates the result.
///
/// ```
/// use certcheck::extract_cn;
///
/// assert_eq!(extract_cn("Subject: C=US, CN=example.com, O=Org"), "example.com");
/// assert_eq!(extract_cn("O=Org"), "");
/// ```
pub fn extract_cn(name: &str) -> String {
    match name.find("CN=") {
        Some(start) => {
            let value = &name[start + 3..];
            let end = value.find(',').unwrap_or(value.len());
            value[..end].trim().to_string()
        }
        None => String::new(),
    }
}

/// Leaf certificate fields needed for evaluation.
///
/// A timestamp is `None` only when it could not be converted from the
/// certificate's ASN.1 time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateFacts {
    pub subject: DistinguishedName,
    pub issuer: DistinguishedName,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
}

impl CertificateFacts {
    pub fn from_x509(cert: &X509Ref) -> Self {
        CertificateFacts {
            subject: DistinguishedName::from_x509_name(cert.subject_name()),
            issuer: DistinguishedName::from_x509_name(cert.issuer_name()),
            not_before: degrade(asn1_to_utc("notBefore", cert.not_before())),
            not_after: degrade(asn1_to_utc("notAfter", cert.not_after())),
        }
    }
}

fn degrade(time: Result<DateTime<Utc>, ParseError>) -> Option<DateTime<Utc>> {
    time.map_err(|err| debug!("{}", err)).ok()
}

/// Converts an ASN.1 time by diffing it against the Unix epoch.
pub fn asn1_to_utc(field: &str, time: &Asn1TimeRef) -> Result<DateTime<Utc>, ParseError> {
    let invalid = || ParseError::Timestamp {
        field: field.to_string(),
        value: time.to_string(),
    };
    let epoch = Asn1Time::from_unix(0).map_err(|_| invalid())?;
    let diff = epoch.diff(time).map_err(|_| invalid())?;
    let seconds = i64::from(diff.days) * 86_400 + i64::from(diff.secs);
    DateTime::from_timestamp(seconds, 0).ok_or_else(invalid)
}

/// Three-valued yes/no answer, rendered as `Yes`, `No` or `Unknown`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
pub enum Verdict {
    Yes,
    No,
    Unknown,
}

impl From<Option<bool>> for Verdict {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Verdict::Yes,
            Some(false) => Verdict::No,
            None => Verdict::Unknown,
        }
    }
}

impl From<Verdict> for Option<bool> {
    fn from(value: Verdict) -> Self {
        match value {
            Verdict::Yes => Some(true),
            Verdict::No => Some(false),
            Verdict::Unknown => None,
        }
    }
}

/// The evaluation result for one endpoint.
///
/// Exactly one record exists per requested endpoint. When the connection
/// failed, `error` is set, the certificate fields are empty and both
/// verdicts are unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub endpoint: Endpoint,
    pub subject_cn: String,
    pub issuer_cn: String,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    pub self_signed: Option<bool>,
    pub expired: Option<bool>,
    pub error: Option<String>,
}

impl CertificateRecord {
    /// A record for an endpoint whose certificate could not be obtained.
    pub fn failed(endpoint: &Endpoint, error: impl fmt::Display) -> Self {
        CertificateRecord {
            endpoint: endpoint.clone(),
            subject_cn: String::new(),
            issuer_cn: String::new(),
            not_before: None,
            not_after: None,
            self_signed: None,
            expired: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expired == Some(true)
    }
}

/// Evaluates a connection outcome against the current system time.
pub fn evaluate(
    endpoint: &Endpoint,
    outcome: Result<CertificateFacts, ConnectionError>,
) -> CertificateRecord {
    evaluate_at(endpoint, outcome, Utc::now())
}

/// Evaluates a connection outcome against `now`.
///
/// Self-signed compares the subject and issuer Common Names exactly, so two
/// empty names count as equal. A certificate expires strictly after
/// `notAfter`.
pub fn evaluate_at(
    endpoint: &Endpoint,
    outcome: Result<CertificateFacts, ConnectionError>,
    now: DateTime<Utc>,
) -> CertificateRecord {
    let facts = match outcome {
        Ok(facts) => facts,
        Err(err) => return CertificateRecord::failed(endpoint, err),
    };

    let subject_cn = facts.subject.common_name();
    let issuer_cn = facts.issuer.common_name();
    if subject_cn.is_empty() {
        debug!("{}: subject has no CN ({})", endpoint, facts.subject);
    }

    CertificateRecord {
        endpoint: endpoint.clone(),
        self_signed: Some(subject_cn == issuer_cn),
        expired: facts.not_after.map(|not_after| not_after < now),
        subject_cn,
        issuer_cn,
        not_before: facts.not_before,
        not_after: facts.not_after,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn endpoint() -> Endpoint {
        Endpoint::new("example.com", 443).unwrap()
    }

    fn facts(subject_cn: &str, issuer_cn: &str, not_after: DateTime<Utc>) -> CertificateFacts {
        CertificateFacts {
            subject: DistinguishedName::from_pairs([("C", "US"), ("CN", subject_cn)]),
            issuer: DistinguishedName::from_pairs([("O", "Issuer Org"), ("CN", issuer_cn)]),
            not_before: Some(not_after - Duration::days(90)),
            not_after: Some(not_after),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_extract_cn() {
        assert_eq!(
            extract_cn("Subject: C=US, CN=example.com, O=Org"),
            "example.com"
        );
        assert_eq!(extract_cn("O=Org"), "");
        assert_eq!(extract_cn("CN=a,CN=b"), "a");
        assert_eq!(extract_cn("CN=  spaced.example  "), "spaced.example");
        assert_eq!(extract_cn(""), "");
    }

    #[test]
    fn test_extract_cn_truncates_at_embedded_comma() {
        assert_eq!(extract_cn(r#"CN="Widgets, Inc", O=Org"#), "\"Widgets");
    }

    #[test]
    fn test_distinguished_name_display() {
        let name = DistinguishedName::from_pairs([("C", "US"), ("O", "Org"), ("CN", "host")]);
        assert_eq!(name.to_string(), "C=US, O=Org, CN=host");
        assert_eq!(name.common_name(), "host");
        assert_eq!(DistinguishedName::default().common_name(), "");
    }

    #[test]
    fn test_self_signed_when_cns_match() {
        let record = evaluate_at(
            &endpoint(),
            Ok(facts("example.com", "example.com", now() + Duration::days(30))),
            now(),
        );
        assert_eq!(record.self_signed, Some(true));
        assert_eq!(record.subject_cn, "example.com");
        assert!(record.error.is_none());
    }

    #[test]
    fn test_not_self_signed_when_cns_differ() {
        let record = evaluate_at(
            &endpoint(),
            Ok(facts("example.com", "R3", now() + Duration::days(30))),
            now(),
        );
        assert_eq!(record.self_signed, Some(false));
        assert_eq!(record.issuer_cn, "R3");
    }

    #[test]
    fn test_self_signed_comparison_is_case_sensitive() {
        let record = evaluate_at(
            &endpoint(),
            Ok(facts("Example.com", "example.com", now())),
            now(),
        );
        assert_eq!(record.self_signed, Some(false));
    }

    #[test]
    fn test_both_cns_empty_counts_as_self_signed() {
        let outcome = Ok(CertificateFacts {
            subject: DistinguishedName::from_pairs([("O", "Org")]),
            issuer: DistinguishedName::default(),
            not_before: None,
            not_after: Some(now()),
        });
        let record = evaluate_at(&endpoint(), outcome, now());
        assert_eq!(record.subject_cn, "");
        assert_eq!(record.self_signed, Some(true));
    }

    #[test]
    fn test_expiry_boundaries() {
        let past = evaluate_at(
            &endpoint(),
            Ok(facts("a", "b", now() - Duration::seconds(1))),
            now(),
        );
        assert_eq!(past.expired, Some(true));
        assert!(past.is_expired());

        let future = evaluate_at(
            &endpoint(),
            Ok(facts("a", "b", now() + Duration::seconds(1))),
            now(),
        );
        assert_eq!(future.expired, Some(false));

        let exact = evaluate_at(&endpoint(), Ok(facts("a", "b", now())), now());
        assert_eq!(exact.expired, Some(false));
    }

    #[test]
    fn test_missing_not_after_is_unknown() {
        let mut certificate = facts("a", "a", now());
        certificate.not_after = None;
        let record = evaluate_at(&endpoint(), Ok(certificate), now());
        assert_eq!(record.expired, None);
        assert_eq!(record.self_signed, Some(true));
    }

    #[test]
    fn test_connection_error_yields_failed_record() {
        let err = ConnectionError::HandshakeFailed {
            details: "unexpected EOF".to_string(),
        };
        let record = evaluate(&endpoint(), Err(err));
        assert_eq!(record.endpoint, endpoint());
        assert_eq!(record.self_signed, None);
        assert_eq!(record.expired, None);
        assert!(record.not_before.is_none());
        assert!(record.not_after.is_none());
        assert_eq!(
            record.error.as_deref(),
            Some("TLS handshake failed: unexpected EOF")
        );
    }

    #[test]
    fn test_verdict_conversions() {
        assert_eq!(Verdict::from(Some(true)).to_string(), "Yes");
        assert_eq!(Verdict::from(Some(false)).to_string(), "No");
        assert_eq!(Verdict::from(None).to_string(), "Unknown");
        assert_eq!("Unknown".parse::<Verdict>().unwrap(), Verdict::Unknown);
        assert_eq!(Option::<bool>::from(Verdict::Yes), Some(true));
        assert!("maybe".parse::<Verdict>().is_err());
    }

    #[test]
    fn test_asn1_to_utc() {
        let time = Asn1Time::from_unix(1_700_000_000).unwrap();
        let converted = asn1_to_utc("notAfter", &time).unwrap();
        assert_eq!(converted.timestamp(), 1_700_000_000);
    }
}
