//! License claims and their canonical byte form.
//!
//! The canonical form is what gets signed. It is a JSON object with the keys
//! sorted lexicographically, no whitespace between tokens and UTF-8 output:
//!
//! ```text
//! {"customer":"Acme","expires_at":"2025-01-01","features":"a,b","hwid":"HWID-1","issued_at":"2024-01-01","product":"Widget"}
//! ```
//!
//! A license without an expiration date carries `"expires_at":""`; the key is
//! never omitted and never `null`.

use std::collections::BTreeMap;

use serde_json::Value;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::error::{Error, Result};

/// Parses an ISO-8601 calendar date (`YYYY-MM-DD`).
pub fn parse_date(s: &str) -> Result<Date> {
    Date::parse(s.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|e| Error::InvalidClaims(format!("invalid date {s:?}: {e}")))
}

pub fn format_date(d: Date) -> String {
    // A calendar date carries every component the description asks for.
    d.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_default()
}

pub fn today_utc() -> Date {
    OffsetDateTime::now_utc().date()
}

/// Field values supplied by whoever requests a license. `issued_at` is not
/// part of the draft: the issuer stamps it when signing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LicenseDraft {
    pub customer: String,
    pub product: String,
    pub expires_at: Option<Date>,
    /// Opaque to the core, usually comma separated tokens.
    pub features: String,
    pub hwid: String,
}

impl LicenseDraft {
    pub fn into_claims(self, issued_at: Date) -> LicenseClaims {
        LicenseClaims {
            customer: self.customer,
            product: self.product,
            issued_at,
            expires_at: self.expires_at,
            features: self.features,
            hwid: self.hwid,
        }
    }
}

/// The signable payload of a license.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseClaims {
    pub customer: String,
    pub product: String,
    pub issued_at: Date,
    pub expires_at: Option<Date>,
    pub features: String,
    pub hwid: String,
}

impl LicenseClaims {
    /// Rejects claims without a hardware binding.
    pub fn validate(&self) -> Result<()> {
        if self.hwid.trim().is_empty() {
            return Err(Error::InvalidClaims("hardware id cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn issued_at_str(&self) -> String {
        format_date(self.issued_at)
    }

    /// Expiration as stored and displayed; empty when the license never expires.
    pub fn expires_at_str(&self) -> String {
        self.expires_at.map(format_date).unwrap_or_default()
    }

    /// Every claim as text, keyed by field name and sorted by key.
    pub fn fields(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("customer", self.customer.clone()),
            ("product", self.product.clone()),
            ("issued_at", self.issued_at_str()),
            ("expires_at", self.expires_at_str()),
            ("features", self.features.clone()),
            ("hwid", self.hwid.clone()),
        ])
    }

    /// The canonical JSON text of these claims.
    pub fn canonical_json(&self) -> String {
        let mut out = String::from("{");
        for (i, (key, value)) in self.fields().into_iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&Value::from(key).to_string());
            out.push(':');
            out.push_str(&Value::from(value).to_string());
        }
        out.push('}');
        out
    }

    /// Whether `text` is a JSON object holding exactly these claims as strings.
    /// Key order and string escaping may differ from [`canonical_json`](Self::canonical_json),
    /// so `"Zo\u00eb"` matches a customer of `Zoë`.
    pub fn matches_canonical(&self, text: &str) -> bool {
        let Ok(carried) = serde_json::from_str::<BTreeMap<String, Value>>(text) else {
            return false;
        };
        let fields = self.fields();
        carried.len() == fields.len()
            && fields
                .iter()
                .all(|(key, value)| carried.get(*key).and_then(Value::as_str) == Some(value.as_str()))
    }
}

/// Canonical bytes of `claims`, the exact input to signing and verification.
pub fn canonicalize(claims: &LicenseClaims) -> Vec<u8> {
    claims.canonical_json().into_bytes()
}
