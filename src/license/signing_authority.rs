//! Ed25519 signing authority.
//!
//! Holds at most one signing key at a time. Generating or loading a key
//! replaces the previous one. Keys are exchanged as url-safe base64 of the raw
//! 32-byte key; the verification key is always derived from the signing key.

use std::fmt;
use std::path::Path;

use ed25519_dalek::{Signer, SigningKey, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;

use super::crypto::{base64url_decode_array, base64url_encode};
use super::license_claims::{today_utc, LicenseClaims, LicenseDraft};
use crate::error::{Error, Result};
use crate::files::write_text_file;

/// Claims, canonical payload and signature of an issued license.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedLicense {
    pub claims: LicenseClaims,
    /// url-safe base64 of the raw 64-byte signature.
    pub signature: String,
    /// The exact text that was signed.
    pub canonical: String,
}

#[derive(Default)]
pub struct SigningAuthority {
    key: Option<SigningKey>,
}

impl fmt::Debug for SigningAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningAuthority")
            .field("verification_key", &self.export_verification_key().ok())
            .finish()
    }
}

impl SigningAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    /// Replaces the active key with a freshly generated one.
    pub fn generate(&mut self) {
        self.key = Some(SigningKey::generate(&mut OsRng));
        tracing::info!(verification_key = ?self.export_verification_key().ok(), "Generated signing key");
    }

    /// Loads a signing key from its url-safe base64 encoding.
    pub fn load_from_encoded(&mut self, encoded: &str) -> Result<()> {
        let bytes = base64url_decode_array::<SECRET_KEY_LENGTH>(encoded.trim())
            .map_err(Error::KeyDecode)?;
        self.key = Some(SigningKey::from_bytes(&bytes));
        Ok(())
    }

    /// Loads a key file holding a single encoded signing key.
    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        let contents = std::fs::read_to_string(path)?;
        self.load_from_encoded(&contents)?;
        tracing::info!(path = %path.display(), "Loaded signing key");
        Ok(())
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        write_text_file(path, &self.export_signing_key()?)?;
        tracing::info!(path = %path.display(), "Saved signing key");
        Ok(())
    }

    pub fn export_signing_key(&self) -> Result<String> {
        Ok(base64url_encode(&self.active_key()?.to_bytes()))
    }

    pub fn export_verification_key(&self) -> Result<String> {
        Ok(base64url_encode(self.active_key()?.verifying_key().as_bytes()))
    }

    /// Signs `bytes` as given. Callers pass canonical bytes; no
    /// canonicalization happens here.
    pub fn sign(&self, bytes: &[u8]) -> Result<String> {
        let signature = self.active_key()?.sign(bytes);
        Ok(base64url_encode(&signature.to_bytes()))
    }

    /// Builds claims from `draft`, signs their canonical form and returns the
    /// signed license.
    pub fn issue(&self, draft: LicenseDraft, issued_at: time::Date) -> Result<SignedLicense> {
        let key = self.active_key()?;
        let claims = draft.into_claims(issued_at);
        claims.validate()?;

        let canonical = claims.canonical_json();
        let signature = base64url_encode(&key.sign(canonical.as_bytes()).to_bytes());
        tracing::debug!(hwid = %claims.hwid, "Signed license");

        Ok(SignedLicense {
            claims,
            signature,
            canonical,
        })
    }

    /// [`issue`](Self::issue) stamped with today's UTC date.
    pub fn issue_today(&self, draft: LicenseDraft) -> Result<SignedLicense> {
        self.issue(draft, today_utc())
    }

    fn active_key(&self) -> Result<&SigningKey> {
        self.key.as_ref().ok_or(Error::NoActiveKey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license::license_claims::canonicalize;
    use crate::license::license_validator::verify;
    use time::macros::date;

    fn draft() -> LicenseDraft {
        LicenseDraft {
            customer: "Acme".to_string(),
            product: "Widget".to_string(),
            expires_at: Some(date!(2025 - 01 - 01)),
            features: "a,b".to_string(),
            hwid: "HWID-1".to_string(),
        }
    }

    #[test]
    fn empty_authority_reports_no_active_key() {
        let sa = SigningAuthority::new();
        assert!(!sa.has_key());
        assert!(matches!(sa.sign(b"x"), Err(Error::NoActiveKey)));
        assert!(matches!(sa.export_signing_key(), Err(Error::NoActiveKey)));
        assert!(matches!(sa.export_verification_key(), Err(Error::NoActiveKey)));
        assert!(matches!(
            sa.issue(draft(), date!(2024 - 01 - 01)),
            Err(Error::NoActiveKey)
        ));
    }

    #[test]
    fn exported_keys_are_padded_url_safe_base64() {
        let mut sa = SigningAuthority::new();
        sa.generate();
        assert_eq!(sa.export_signing_key().unwrap().len(), 44);
        assert_eq!(sa.export_verification_key().unwrap().len(), 44);
        assert_eq!(sa.sign(b"payload").unwrap().len(), 88);
    }

    #[test]
    fn known_seed_yields_known_verification_key() {
        // RFC 8032 test vector 1.
        let seed = [
            0x9d, 0x61, 0xb1, 0x9d, 0xef, 0xfd, 0x5a, 0x60, 0xba, 0x84, 0x4a, 0xf4, 0x92, 0xec,
            0x2c, 0xc4, 0x44, 0x49, 0xc5, 0x69, 0x7b, 0x32, 0x69, 0x19, 0x70, 0x3b, 0xac, 0x03,
            0x1c, 0xae, 0x7f, 0x60,
        ];
        let public = [
            0xd7, 0x5a, 0x98, 0x01, 0x82, 0xb1, 0x0a, 0xb7, 0xd5, 0x4b, 0xfe, 0xd3, 0xc9, 0x64,
            0x07, 0x3a, 0x0e, 0xe1, 0x72, 0xf3, 0xda, 0xa6, 0x23, 0x25, 0xaf, 0x02, 0x1a, 0x68,
            0xf7, 0x07, 0x51, 0x1a,
        ];
        let mut sa = SigningAuthority::new();
        sa.load_from_encoded(&base64url_encode(&seed)).unwrap();
        assert_eq!(sa.export_verification_key().unwrap(), base64url_encode(&public));
    }

    #[test]
    fn load_rejects_garbage_and_wrong_length() {
        let mut sa = SigningAuthority::new();
        assert!(matches!(sa.load_from_encoded("not base64!"), Err(Error::KeyDecode(_))));
        assert!(matches!(
            sa.load_from_encoded(&base64url_encode(&[7u8; 16])),
            Err(Error::KeyDecode(_))
        ));
        assert!(!sa.has_key());
    }

    #[test]
    fn failed_load_keeps_previous_key() {
        let mut sa = SigningAuthority::new();
        sa.generate();
        let before = sa.export_verification_key().unwrap();
        assert!(sa.load_from_encoded("AAAA").is_err());
        assert_eq!(sa.export_verification_key().unwrap(), before);
    }

    #[test]
    fn generate_replaces_active_key() {
        let mut sa = SigningAuthority::new();
        sa.generate();
        let first = sa.export_signing_key().unwrap();
        sa.generate();
        assert_ne!(sa.export_signing_key().unwrap(), first);
    }

    #[test]
    fn issue_stamps_date_and_signs_canonical_form() {
        let mut sa = SigningAuthority::new();
        sa.generate();
        let signed = sa.issue(draft(), date!(2024 - 01 - 01)).unwrap();

        assert_eq!(signed.claims.issued_at, date!(2024 - 01 - 01));
        assert_eq!(signed.canonical.as_bytes(), canonicalize(&signed.claims).as_slice());
        assert_eq!(signed.signature, sa.sign(signed.canonical.as_bytes()).unwrap());
        assert!(verify(
            &signed.claims,
            &signed.signature,
            &sa.export_verification_key().unwrap()
        ));
    }

    #[test]
    fn issue_rejects_empty_hwid() {
        let mut sa = SigningAuthority::new();
        sa.generate();
        let draft = LicenseDraft {
            hwid: String::new(),
            ..draft()
        };
        assert!(matches!(
            sa.issue(draft, date!(2024 - 01 - 01)),
            Err(Error::InvalidClaims(_))
        ));
    }

    #[test]
    fn debug_does_not_print_signing_key() {
        let mut sa = SigningAuthority::new();
        sa.generate();
        let printed = format!("{sa:?}");
        assert!(!printed.contains(&sa.export_signing_key().unwrap()));
        assert!(printed.contains(&sa.export_verification_key().unwrap()));
    }
}
