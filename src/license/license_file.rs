//! Portable `.lic` files for handing a license to a customer.
//!
//! A license file is a JSON object with the claim fields, the signature and the
//! canonical text that was signed. Store identifiers are never written.

use std::path::Path;

use ed25519_dalek::SIGNATURE_LENGTH;
use serde::{Deserialize, Serialize};

use super::crypto::base64url_decode_array;
use super::license_claims::{parse_date, LicenseClaims};
use super::signing_authority::SignedLicense;
use crate::error::{Error, Result};
use crate::files::write_text_file;

pub const LICENSE_FILE_EXTENSION: &str = "lic";

#[derive(Debug, Serialize, Deserialize)]
struct LicenseFile {
    customer: String,
    product: String,
    issued_at: String,
    #[serde(default)]
    expires_at: Option<String>,
    #[serde(default)]
    features: String,
    hwid: String,
    signature: String,
    /// Files written by older tools omit this; it is re-derived on import.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    canonical: Option<String>,
}

impl From<&SignedLicense> for LicenseFile {
    fn from(license: &SignedLicense) -> Self {
        let claims = &license.claims;
        Self {
            customer: claims.customer.clone(),
            product: claims.product.clone(),
            issued_at: claims.issued_at_str(),
            expires_at: Some(claims.expires_at_str()),
            features: claims.features.clone(),
            hwid: claims.hwid.clone(),
            signature: license.signature.clone(),
            canonical: Some(license.canonical.clone()),
        }
    }
}

impl TryFrom<LicenseFile> for SignedLicense {
    type Error = String;

    fn try_from(file: LicenseFile) -> Result<Self, String> {
        let issued_at = parse_date(&file.issued_at).map_err(|e| e.to_string())?;
        let expires_at = match file.expires_at.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(parse_date(s).map_err(|e| e.to_string())?),
        };
        let claims = LicenseClaims {
            customer: file.customer,
            product: file.product,
            issued_at,
            expires_at,
            features: file.features,
            hwid: file.hwid,
        };
        claims.validate().map_err(|e| e.to_string())?;

        base64url_decode_array::<SIGNATURE_LENGTH>(file.signature.trim())
            .map_err(|e| format!("invalid signature: {e}"))?;

        let canonical = match file.canonical {
            Some(carried) if !claims.matches_canonical(&carried) => {
                return Err("canonical payload does not match the license fields".to_string());
            }
            Some(carried) => carried,
            None => claims.canonical_json(),
        };

        Ok(SignedLicense {
            claims,
            signature: file.signature.trim().to_string(),
            canonical,
        })
    }
}

/// Serializes `license` as pretty-printed JSON.
pub fn to_license_json(license: &SignedLicense) -> String {
    // Only strings inside; serialization cannot fail.
    serde_json::to_string_pretty(&LicenseFile::from(license)).unwrap_or_default()
}

/// Parses the contents of a license file.
pub fn from_license_json(contents: &str) -> Result<SignedLicense> {
    let file: LicenseFile =
        serde_json::from_str(contents).map_err(|e| Error::MalformedLicenseFile(e.to_string()))?;
    SignedLicense::try_from(file).map_err(Error::MalformedLicenseFile)
}

/// Writes `license` to `path`.
pub fn export(license: &SignedLicense, path: &Path) -> Result<()> {
    write_text_file(path, &to_license_json(license))?;
    tracing::info!(path = %path.display(), hwid = %license.claims.hwid, "Exported license");
    Ok(())
}

/// Reads a license previously written by [`export`].
pub fn import(path: &Path) -> Result<SignedLicense> {
    let contents = std::fs::read_to_string(path)?;
    let license = from_license_json(&contents)?;
    tracing::info!(path = %path.display(), hwid = %license.claims.hwid, "Imported license");
    Ok(license)
}

/// Suggested file name for `license`: the hardware id with unsafe characters
/// replaced, plus the `.lic` extension.
pub fn default_file_name(license: &SignedLicense) -> String {
    let mut out = String::with_capacity(license.claims.hwid.len());
    for ch in license.claims.hwid.chars() {
        let ok = ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.';
        out.push(if ok { ch } else { '_' });
    }
    let trimmed = out.trim_matches('.');
    let stem = if trimmed.is_empty() { "license" } else { trimmed };
    format!("{stem}.{LICENSE_FILE_EXTENSION}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license::license_claims::LicenseDraft;
    use crate::license::signing_authority::SigningAuthority;
    use time::macros::date;

    fn signed(hwid: &str) -> SignedLicense {
        let mut sa = SigningAuthority::new();
        sa.generate();
        let draft = LicenseDraft {
            customer: "Acme".to_string(),
            product: "Widget".to_string(),
            expires_at: Some(date!(2025 - 01 - 01)),
            features: "a,b".to_string(),
            hwid: hwid.to_string(),
        };
        sa.issue(draft, date!(2024 - 01 - 01)).unwrap()
    }

    #[test]
    fn json_roundtrip_preserves_everything() {
        let license = signed("HWID-1");
        let parsed = from_license_json(&to_license_json(&license)).unwrap();
        assert_eq!(parsed, license);
    }

    #[test]
    fn written_json_has_no_identifier() {
        let value: serde_json::Value =
            serde_json::from_str(&to_license_json(&signed("HWID-1"))).unwrap();
        let obj = value.as_object().unwrap();
        assert!(!obj.contains_key("id"));
        for key in ["customer", "product", "issued_at", "expires_at", "features", "hwid", "signature", "canonical"] {
            assert!(obj.contains_key(key), "{key}");
        }
    }

    #[test]
    fn legacy_file_without_canonical_is_rederived() {
        let license = signed("HWID-1");
        let legacy = format!(
            r#"{{
    "customer": "Acme",
    "product": "Widget",
    "issued_at": "2024-01-01",
    "expires_at": "2025-01-01",
    "features": "a,b",
    "hwid": "HWID-1",
    "signature": "{}"
}}"#,
            license.signature
        );
        let parsed = from_license_json(&legacy).unwrap();
        assert_eq!(parsed.canonical, license.canonical);
    }

    #[test]
    fn empty_or_null_expiration_means_none() {
        let license = signed("HWID-1");
        for expires in [r#""expires_at": "","#, r#""expires_at": null,"#, ""] {
            let json = format!(
                r#"{{"customer":"A","product":"P","issued_at":"2024-01-01",{expires}"hwid":"H","signature":"{}"}}"#,
                license.signature
            );
            let parsed = from_license_json(&json).unwrap();
            assert_eq!(parsed.claims.expires_at, None, "{expires}");
            assert_eq!(parsed.claims.features, "");
        }
    }

    #[test]
    fn missing_required_field_is_malformed() {
        let err = from_license_json(r#"{"customer":"A","product":"P","issued_at":"2024-01-01","hwid":"H"}"#)
            .unwrap_err();
        assert!(matches!(err, Error::MalformedLicenseFile(_)));
    }

    #[test]
    fn non_json_is_malformed() {
        assert!(matches!(
            from_license_json("customer = Acme"),
            Err(Error::MalformedLicenseFile(_))
        ));
    }

    #[test]
    fn bad_date_empty_hwid_and_short_signature_are_malformed() {
        let license = signed("HWID-1");
        let mut value: serde_json::Value = serde_json::from_str(&to_license_json(&license)).unwrap();
        let cases = [
            ("issued_at", "01/01/2024"),
            ("hwid", ""),
            ("signature", "AAAA"),
        ];
        for (field, bad) in cases {
            let mut tampered = value.clone();
            tampered[field] = serde_json::Value::from(bad);
            assert!(
                matches!(from_license_json(&tampered.to_string()), Err(Error::MalformedLicenseFile(_))),
                "{field}"
            );
        }
        value["customer"] = serde_json::Value::from("Mallory");
        assert!(matches!(
            from_license_json(&value.to_string()),
            Err(Error::MalformedLicenseFile(_))
        ));
    }

    #[test]
    fn carried_canonical_with_escapes_is_kept() {
        let mut sa = SigningAuthority::new();
        sa.generate();
        let mut license = signed("HWID-1");
        license.claims.customer = "Zoë".to_string();
        license.canonical = license.claims.canonical_json().replace('ë', "\\u00eb");
        license.signature = sa.sign(license.canonical.as_bytes()).unwrap();

        let parsed = from_license_json(&to_license_json(&license)).unwrap();
        assert_eq!(parsed, license);
    }

    #[test]
    fn default_file_name_uses_hwid() {
        assert_eq!(default_file_name(&signed("HWID-1")), "HWID-1.lic");
        assert_eq!(default_file_name(&signed("../a b/c")), "_a_b_c.lic");
    }
}
