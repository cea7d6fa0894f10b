//! Content-addressed document identity.
//!
//! A fingerprint is the hex-encoded prefix of a SHA-256 digest over the
//! document's identity tuple: customer (code, else name), branch, type code,
//! letter, point of sale, number, installment and pending amount. Nothing
//! else goes in, so re-exported or reordered sheets fingerprint identically.

use sha2::{Digest, Sha256};

use crate::models::document::{DocumentRecord, Fingerprint};

/// Digest bytes kept in the fingerprint (24 hex characters).
const FINGERPRINT_BYTES: usize = 12;

/// Field separator; cannot appear in normalized cell text.
const SEPARATOR: &[u8] = b"\x1f";

/// Compute the fingerprint of a document.
pub fn fingerprint(doc: &DocumentRecord) -> Fingerprint {
    let amount = doc.pending_amount.normalize().to_string();
    let fields: [&str; 8] = [
        doc.customer.identity(),
        doc.branch_name(),
        &doc.type_code,
        doc.letter.as_deref().unwrap_or_default(),
        doc.point_of_sale.as_deref().unwrap_or_default(),
        &doc.number,
        doc.installment.as_deref().unwrap_or_default(),
        &amount,
    ];

    let mut hasher = Sha256::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            hasher.update(SEPARATOR);
        }
        hasher.update(field.as_bytes());
    }
    let digest = hasher.finalize();

    Fingerprint(
        digest[..FINGERPRINT_BYTES]
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect(),
    )
}
