//! Slack request signing (`v0`): HMAC-SHA256 over `v0:<timestamp>:<raw body>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Requests older (or newer) than this are treated as replays.
pub const MAX_CLOCK_SKEW_SECS: i64 = 60 * 5;

const VERSION: &str = "v0";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureCheck {
    Valid,
    MissingHeaders,
    Stale,
    Mismatch,
}

pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(base_string(timestamp).as_bytes());
    mac.update(body);
    Some(format!("{VERSION}={}", encode_hex(mac.finalize().into_bytes().as_slice())))
}

pub fn verify(
    secret: &str,
    timestamp: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
    now_unix: i64,
) -> SignatureCheck {
    let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
        return SignatureCheck::MissingHeaders;
    };

    let fresh = timestamp
        .parse::<i64>()
        .is_ok_and(|sent_at| (now_unix - sent_at).abs() <= MAX_CLOCK_SKEW_SECS);
    if !fresh {
        return SignatureCheck::Stale;
    }

    let Some(provided) =
        signature.strip_prefix(&format!("{VERSION}=")).and_then(decode_hex)
    else {
        return SignatureCheck::Mismatch;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return SignatureCheck::Mismatch;
    };
    mac.update(base_string(timestamp).as_bytes());
    mac.update(body);

    match mac.verify_slice(&provided) {
        Ok(()) => SignatureCheck::Valid,
        Err(_) => SignatureCheck::Mismatch,
    }
}

fn base_string(timestamp: &str) -> String {
    format!("{VERSION}:{timestamp}:")
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

fn decode_hex(input: &str) -> Option<Vec<u8>> {
    if input.len() % 2 != 0 {
        return None;
    }
    (0..input.len())
        .step_by(2)
        .map(|index| u8::from_str_radix(input.get(index..index + 2)?, 16).ok())
        .collect()
}
