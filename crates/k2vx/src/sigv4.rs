// AI
//! 🔏 sigv4.rs — AWS Signature Version 4, the secret handshake of the storage world.
//!
//! 🚀 Every request the probe fires gets three headers from this module:
//! `authorization`, `x-amz-date`, and `x-amz-content-sha256`. The server
//! recomputes the whole dance on its side and compares. Byte-for-byte.
//! There is no partial credit. There is no "close enough". SigV4 is the
//! strictest grader you ever met, and it grades in constant time.
//!
//! The service name is `k2v` and the region rides along in the credential
//! scope — same scheme as S3, different nameplate on the door.
//!
//! ⚠️  Warning: changing ANY input — method, path, query, body, timestamp —
//! changes the signature. This is the point. This is the whole point.
//!
//! 🦆 The duck has read the canonical request spec. The duck has regrets.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

// -- 🔏 the algorithm label. it goes in the authorization header, the string
// -- to sign, and at least one nightmare per on-call rotation.
const ALGORITHM: &str = "AWS4-HMAC-SHA256";

// -- 📋 the headers we sign, alphabetical, semicolon-joined. minimal on
// -- purpose: anything outside this list can vary without re-signing, which
// -- is exactly what the causality-token header needs.
const SIGNED_HEADERS: &str = "host;x-amz-content-sha256;x-amz-date";

/// 🔑 A request-signing credential — immutable for the process lifetime.
///
/// Access key, secret key, region, service. Four strings that together can
/// authorize a write to a distributed store, which is more power than most
/// structs will ever know. Handle with the respect you'd give a car key
/// taped to a grenade.
#[derive(Debug, Clone)]
pub struct Credential {
    /// 🏷️ The public half — goes in the Credential= part of the header, visibly.
    pub access_key: String,
    /// 🔒 The secret half — never leaves this module except as HMAC output.
    pub secret_key: String,
    /// 🗺️ Region in the credential scope. The server has opinions about this.
    pub region: String,
    /// 📡 Service name — `k2v` for us. `s3` for the other probe in your life.
    pub service: String,
}

/// 📦 The three header values a signed request must carry.
///
/// The caller attaches all three, exactly as given. No trimming, no
/// re-casing, no improvements. Signatures do not appreciate improvements.
#[derive(Debug, Clone)]
pub struct SignatureParts {
    /// 🔏 `AWS4-HMAC-SHA256 Credential=..., SignedHeaders=..., Signature=...`
    pub authorization: String,
    /// 🕰️ The long-form timestamp (`%Y%m%dT%H%M%SZ`) that was signed.
    pub amz_date: String,
    /// 🧂 Lowercase hex SHA-256 of the request body. Empty body has a hash
    /// too — a famous one. It shows up in every SigV4 test suite on earth.
    pub content_sha256: String,
}

impl Credential {
    /// 🔏 Sign one request. Pure function of its inputs — same inputs, same
    /// signature, every time, on every machine. The `when` parameter exists
    /// so tests can pin the clock instead of chasing `Utc::now()` around.
    ///
    /// The choreography, in order of appearance:
    /// 1. Hash the body (hex SHA-256) — even when the body is nothing.
    /// 2. Build the canonical request: method, encoded path, sorted encoded
    ///    query, the three canonical headers, the signed-headers list, the
    ///    body hash. Newline-separated. The format is non-negotiable.
    /// 3. Build the string to sign: algorithm, timestamp, credential scope,
    ///    hash of the canonical request.
    /// 4. Derive the signing key: HMAC chain over date → region → service →
    ///    `aws4_request`, seeded with `AWS4` + secret.
    /// 5. HMAC the string to sign, hex it, wrap it in the header format.
    pub fn sign(
        &self,
        method: &str,
        path: &str,
        query: &[(&str, &str)],
        host: &str,
        body: &[u8],
        when: DateTime<Utc>,
    ) -> SignatureParts {
        // 🕰️ two timestamp renderings: short (scope) and long (header + signing)
        let date_str = when.format("%Y%m%d").to_string();
        let amz_date = when.format("%Y%m%dT%H%M%SZ").to_string();

        // 🧂 hash the body first — it appears twice downstream
        let content_sha256 = hex_sha256(body);

        // 🗺️ credential scope: date/region/service/aws4_request
        let credential_scope = format!(
            "{}/{}/{}/aws4_request",
            date_str, self.region, self.service
        );

        // -- 📋 canonical headers: lowercase name, colon, value, newline.
        // -- alphabetical by name, and they must match SIGNED_HEADERS exactly.
        let canonical_headers = format!(
            "host:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n",
            host, content_sha256, amz_date
        );

        // 🧾 the canonical request — six fields, newline-joined, zero slack
        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method,
            uri_encode_path(path),
            canonical_query_string(query),
            canonical_headers,
            SIGNED_HEADERS,
            content_sha256
        );

        // 🧾 string to sign: the canonical request, but hashed and chaperoned
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            credential_scope,
            hex_sha256(canonical_request.as_bytes())
        );

        // 🔑 the key-derivation chain. each link HMACs the next. breaking any
        // link changes everything downstream, which is why it's a chain and
        // not a suggestion.
        let k_date = hmac_sha256(format!("AWS4{}", self.secret_key).as_bytes(), date_str.as_bytes());
        let k_region = hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = hmac_sha256(&k_region, self.service.as_bytes());
        let k_signing = hmac_sha256(&k_service, b"aws4_request");
        let signature = hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes()));

        // ✅ assemble the authorization header — the bouncer reads this line first
        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.access_key, credential_scope, SIGNED_HEADERS, signature
        );

        SignatureParts {
            authorization,
            amz_date,
            content_sha256,
        }
    }
}

/// 🧾 Build the canonical query string: keys sorted, keys AND values
/// percent-encoded, `k=v` pairs joined with `&`. Empty input, empty output.
///
/// ⚠️  This exact string must ALSO be the query string on the wire — sign one
/// thing and send another and the server will return a 403 with the serene
/// confidence of a bureaucrat rejecting a form filled out in the wrong ink.
pub(crate) fn canonical_query_string(query: &[(&str, &str)]) -> String {
    // -- 🗂️ BTreeMap does the sorting. the probe never sends duplicate keys,
    // -- so last-write-wins semantics here are academic.
    let params: BTreeMap<String, String> = query
        .iter()
        .map(|(k, v)| (uri_encode_value(k), uri_encode_value(v)))
        .collect();
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// 🔡 URI-encode a path, preserving the `/` separators. Shared with the HTTP
/// store so the wire path and the signed path are the same bytes.
pub(crate) fn uri_encode_path(path: &str) -> String {
    use std::fmt::Write;
    let mut result = String::with_capacity(path.len() * 3);
    for c in path.chars() {
        match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' | '/' => {
                result.push(c);
            }
            _ => {
                // -- 🔡 multi-byte chars get one %XX per UTF-8 byte, as the spec demands
                let mut buf = [0u8; 4];
                let encoded = c.encode_utf8(&mut buf);
                for b in encoded.as_bytes() {
                    let _ = write!(result, "%{:02X}", b);
                }
            }
        }
    }
    result
}

/// 🔡 URI-encode a query key or value. Unlike paths, slashes get encoded —
/// a slash in a sort key is data, not structure.
fn uri_encode_value(value: &str) -> String {
    use std::fmt::Write;
    let mut result = String::with_capacity(value.len() * 3);
    for c in value.chars() {
        match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => {
                result.push(c);
            }
            _ => {
                let mut buf = [0u8; 4];
                let encoded = c.encode_utf8(&mut buf);
                for b in encoded.as_bytes() {
                    let _ = write!(result, "%{:02X}", b);
                }
            }
        }
    }
    result
}

/// 🧂 SHA-256, hex-encoded, lowercase. The workhorse.
fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// 🔏 HMAC-SHA256. Key in, data in, 32 bytes out.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // -- 🔏 safe expect: HMAC-SHA256 accepts keys of any length, this cannot fail
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // 🧪 Signer tests: structural and deterministic. We assert on the shape
    // and the physics (same in → same out), not on oracle hex strings.

    fn test_credential() -> Credential {
        Credential {
            access_key: "GK31c2f218a2e44f485b94239e".to_string(),
            secret_key: "b892c0665f0ada8a4755dae98baa3b133590e11dae3bcc1f9d769d67f16c3835"
                .to_string(),
            region: "us-east-1".to_string(),
            service: "k2v".to_string(),
        }
    }

    fn pinned_clock() -> DateTime<Utc> {
        // 🕰️ one timestamp to rule the tests — no Utc::now() flakiness allowed
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn sigv4_the_one_where_the_header_has_the_right_shape() {
        let parts = test_credential().sign(
            "GET",
            "/alex/root",
            &[("sort_key", "b")],
            "localhost:3812",
            b"",
            pinned_clock(),
        );

        assert!(parts.authorization.starts_with("AWS4-HMAC-SHA256 Credential="));
        assert!(parts
            .authorization
            .contains("Credential=GK31c2f218a2e44f485b94239e/20240115/us-east-1/k2v/aws4_request"));
        assert!(parts
            .authorization
            .contains("SignedHeaders=host;x-amz-content-sha256;x-amz-date"));
        assert_eq!(parts.amz_date, "20240115T120000Z");

        // -- 🔏 the signature itself: 64 lowercase hex chars, per the spec
        let signature = parts
            .authorization
            .rsplit("Signature=")
            .next()
            .expect("signature suffix exists");
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn sigv4_the_one_where_the_empty_body_hash_is_the_famous_one() {
        // 🧪 SHA-256 of zero bytes — the most photographed hash in cloud computing
        let parts = test_credential().sign("GET", "/alex", &[], "localhost:3812", b"", pinned_clock());
        assert_eq!(
            parts.content_sha256,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn sigv4_the_one_where_signing_is_deterministic() {
        // 🧪 same inputs, same signature. twice. physics still works.
        let a = test_credential().sign("PUT", "/alex/root", &[("sort_key", "b")], "localhost:3812", b"hello", pinned_clock());
        let b = test_credential().sign("PUT", "/alex/root", &[("sort_key", "b")], "localhost:3812", b"hello", pinned_clock());
        assert_eq!(a.authorization, b.authorization);
        assert_eq!(a.content_sha256, b.content_sha256);
    }

    #[test]
    fn sigv4_the_one_where_every_input_matters() {
        // 🧪 perturb each input, watch the signature flinch. it always flinches.
        let base = test_credential().sign("PUT", "/alex/root", &[("sort_key", "b")], "localhost:3812", b"hello", pinned_clock());

        let diff_body = test_credential().sign("PUT", "/alex/root", &[("sort_key", "b")], "localhost:3812", b"hullo", pinned_clock());
        assert_ne!(base.authorization, diff_body.authorization);

        let diff_query = test_credential().sign("PUT", "/alex/root", &[("sort_key", "c")], "localhost:3812", b"hello", pinned_clock());
        assert_ne!(base.authorization, diff_query.authorization);

        let diff_method = test_credential().sign("GET", "/alex/root", &[("sort_key", "b")], "localhost:3812", b"hello", pinned_clock());
        assert_ne!(base.authorization, diff_method.authorization);

        let diff_time = test_credential().sign(
            "PUT",
            "/alex/root",
            &[("sort_key", "b")],
            "localhost:3812",
            b"hello",
            Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 1).unwrap(),
        );
        assert_ne!(base.authorization, diff_time.authorization);
    }

    #[test]
    fn sigv4_the_one_where_encoding_knows_paths_from_values() {
        // 🧪 paths keep their slashes, values lose theirs. both fear spaces.
        assert_eq!(uri_encode_path("/alex/root"), "/alex/root");
        assert_eq!(uri_encode_value("a/b"), "a%2Fb");
        assert_eq!(uri_encode_value("hello world"), "hello%20world");
        assert_eq!(uri_encode_value("sort key+1"), "sort%20key%2B1");
    }

    #[test]
    fn sigv4_the_one_where_the_query_string_sorts_itself() {
        // 🧪 keys out of order in, alphabetical out. empty in, empty out.
        assert_eq!(
            canonical_query_string(&[("zeta", "1"), ("alpha", "2")]),
            "alpha=2&zeta=1"
        );
        assert_eq!(canonical_query_string(&[]), "");
    }
}
