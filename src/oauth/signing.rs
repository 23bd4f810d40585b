// ABOUTME: Pure OAuth1 request signing: percent encoding, base string, HMAC-SHA1
// ABOUTME: No network code here so signatures can be verified against known vectors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use ring::hmac;
use std::time::{SystemTime, UNIX_EPOCH};

/// Percent-encode per RFC 5849 §3.6: only ALPHA, DIGIT, `-`, `.`, `_`, `~`
/// pass through; everything else becomes uppercase `%XX`.
#[must_use]
pub fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char);
            }
            other => {
                out.push('%');
                out.push_str(&format!("{other:02X}"));
            }
        }
    }
    out
}

/// Build the signature base string `METHOD&enc(url)&enc(sorted-params)`.
///
/// Parameters are sorted by encoded name, then encoded value. The URL must
/// already be the base URL without query string; query parameters belong in
/// `params` alongside the `oauth_*` protocol parameters.
#[must_use]
pub fn signature_base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();
    let normalized = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(url),
        percent_encode(&normalized)
    )
}

/// Compute the HMAC-SHA1 signature over the base string.
///
/// The key is `enc(consumer_secret)&enc(token_secret)`, with an empty token
/// secret when none is known yet (the request-token leg).
#[must_use]
pub fn sign(
    method: &str,
    url: &str,
    params: &[(String, String)],
    consumer_secret: &str,
    token_secret: Option<&str>,
) -> String {
    let base = signature_base_string(method, url, params);
    let key_material = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret.unwrap_or(""))
    );
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, key_material.as_bytes());
    let tag = hmac::sign(&key, base.as_bytes());
    BASE64.encode(tag.as_ref())
}

/// Random nonce for a signed request. Required on every signed call, not
/// just the handshake.
#[must_use]
pub fn nonce() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Current epoch seconds as a string, for the `oauth_timestamp` parameter.
#[must_use]
pub fn timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
        .to_string()
}

/// Render an `Authorization: OAuth ...` header value from protocol params.
#[must_use]
pub fn authorization_header(params: &[(String, String)]) -> String {
    let rendered = params
        .iter()
        .filter(|(k, _)| k.starts_with("oauth_"))
        .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("OAuth {rendered}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(params: &[(&str, &str)]) -> Vec<(String, String)> {
        params
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn percent_encoding_matches_rfc_examples() {
        assert_eq!(percent_encode("Ladies + Gentlemen"), "Ladies%20%2B%20Gentlemen");
        assert_eq!(percent_encode("An encoded string!"), "An%20encoded%20string%21");
        assert_eq!(percent_encode("Dogs, Cats & Mice"), "Dogs%2C%20Cats%20%26%20Mice");
        assert_eq!(percent_encode("☃"), "%E2%98%83");
    }

    // RFC 5849 §1.2: temporary credentials request for photos.example.net.
    #[test]
    fn request_token_signature_matches_rfc5849_vector() {
        let params = owned(&[
            ("oauth_consumer_key", "dpf43f3p2l4k3l03"),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", "137131200"),
            ("oauth_nonce", "wIjqoS"),
            ("oauth_callback", "http://printer.example.com/ready"),
        ]);
        let signature = sign(
            "POST",
            "https://photos.example.net/initiate",
            &params,
            "kd94hf93k423kf44",
            None,
        );
        assert_eq!(signature, "74KNZJeDHnMBp0EMJ9ZHt/XKycU=");
    }

    // RFC 5849 §1.2: token credentials request, now with a token secret.
    #[test]
    fn access_token_signature_matches_rfc5849_vector() {
        let params = owned(&[
            ("oauth_consumer_key", "dpf43f3p2l4k3l03"),
            ("oauth_token", "hh5s93j4hdidpola"),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", "137131201"),
            ("oauth_nonce", "walatlh"),
            ("oauth_verifier", "hfdp7dh39dks9884"),
        ]);
        let signature = sign(
            "POST",
            "https://photos.example.net/token",
            &params,
            "kd94hf93k423kf44",
            Some("hdhd0244k9j7ao03"),
        );
        assert_eq!(signature, "gKgrFCywp7rO0OXSjdot/IHF7IU=");
    }

    #[test]
    fn base_string_sorts_parameters_by_encoded_name() {
        let params = owned(&[("b", "2"), ("a", "1"), ("a", "0")]);
        let base = signature_base_string("GET", "https://api.example.com/x", &params);
        assert_eq!(
            base,
            "GET&https%3A%2F%2Fapi.example.com%2Fx&a%3D0%26a%3D1%26b%3D2"
        );
    }

    #[test]
    fn nonces_are_unique_across_calls() {
        assert_ne!(nonce(), nonce());
    }
}
