//! Shared helpers for integration tests.

#![allow(dead_code)]

use license_manager::license::license_claims::parse_date;
use license_manager::{LicenseDraft, SignedLicense, SigningAuthority};

/// An authority with a freshly generated key.
pub fn authority() -> SigningAuthority {
    let mut sa = SigningAuthority::new();
    sa.generate();
    sa
}

pub fn acme_draft() -> LicenseDraft {
    LicenseDraft {
        customer: "Acme".to_string(),
        product: "Widget".to_string(),
        expires_at: Some(parse_date("2025-01-01").unwrap()),
        features: "a,b".to_string(),
        hwid: "HWID-1".to_string(),
    }
}

/// The Acme license issued on 2024-01-01.
pub fn acme_license(sa: &SigningAuthority) -> SignedLicense {
    sa.issue(acme_draft(), parse_date("2024-01-01").unwrap())
        .unwrap()
}

pub fn license_for(sa: &SigningAuthority, customer: &str, hwid: &str) -> SignedLicense {
    let draft = LicenseDraft {
        customer: customer.to_string(),
        hwid: hwid.to_string(),
        ..acme_draft()
    };
    sa.issue(draft, parse_date("2024-01-01").unwrap()).unwrap()
}
