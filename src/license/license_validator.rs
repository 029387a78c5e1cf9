//! Consumer-side license check.
//!
//! Every failure collapses to `false`: a wrong key, tampered claims and a
//! corrupted signature are reported the same way.

use ed25519_dalek::{Signature, VerifyingKey, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};

use super::crypto::base64url_decode_array;
use super::license_claims::{canonicalize, LicenseClaims};
use super::signing_authority::SignedLicense;

fn parse_verification_key(encoded: &str) -> Option<VerifyingKey> {
    let bytes = base64url_decode_array::<PUBLIC_KEY_LENGTH>(encoded.trim()).ok()?;
    VerifyingKey::from_bytes(&bytes).ok()
}

fn verify_ed25519_signature(verification_key: &str, payload: &[u8], signature: &str) -> Option<()> {
    let vk = parse_verification_key(verification_key)?;
    let sig = base64url_decode_array::<SIGNATURE_LENGTH>(signature.trim()).ok()?;
    vk.verify_strict(payload, &Signature::from_bytes(&sig)).ok()
}

/// Re-canonicalizes `claims` and checks `signature` against `verification_key`.
pub fn verify(claims: &LicenseClaims, signature: &str, verification_key: &str) -> bool {
    verify_ed25519_signature(verification_key, &canonicalize(claims), signature).is_some()
}

/// Checks a signed license whose canonical text travels with it. The carried
/// canonical text must also hold the same claims it sits next to, though its
/// string escaping may differ from [`canonicalize`].
pub fn verify_signed(license: &SignedLicense, verification_key: &str) -> bool {
    license.claims.matches_canonical(&license.canonical)
        && verify_ed25519_signature(verification_key, license.canonical.as_bytes(), &license.signature)
            .is_some()
}
