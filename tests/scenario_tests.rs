//! End-to-end issuing flow: key, canonical form, signature, store, file.

mod common;

use license_manager::license::license_claims::parse_date;
use license_manager::{canonicalize, license_file, verify, LicenseClaims, LicenseStore};

#[test]
fn issue_store_and_list_single_license() {
    let dir = tempfile::tempdir().unwrap();
    let sa = common::authority();
    let claims = LicenseClaims {
        customer: "Acme".to_string(),
        product: "Widget".to_string(),
        issued_at: parse_date("2024-01-01").unwrap(),
        expires_at: Some(parse_date("2025-01-01").unwrap()),
        features: "a,b".to_string(),
        hwid: "HWID-1".to_string(),
    };
    let canonical = canonicalize(&claims);
    assert_eq!(
        canonical,
        br#"{"customer":"Acme","expires_at":"2025-01-01","features":"a,b","hwid":"HWID-1","issued_at":"2024-01-01","product":"Widget"}"#
    );
    let signature = sa.sign(&canonical).unwrap();

    let license = common::acme_license(&sa);
    assert_eq!(license.claims, claims);
    assert_eq!(license.signature, signature);

    let store = LicenseStore::open(dir.path().join("licenses.db")).unwrap();
    store.add(&license).unwrap();

    let records = store.list().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, 1);
    assert_eq!(records[0].license.signature, signature);
}

#[test]
fn exported_record_reimports_with_identical_canonical_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let sa = common::authority();
    let store = LicenseStore::open(dir.path().join("licenses.db")).unwrap();
    let id = store.add(&common::acme_license(&sa)).unwrap();
    let stored = store.get(id).unwrap().unwrap();

    let path = dir.path().join(license_file::default_file_name(&stored.license));
    license_file::export(&stored.license, &path).unwrap();
    let imported = license_file::import(&path).unwrap();

    assert_eq!(imported.claims, stored.license.claims);
    assert_eq!(imported.signature, stored.license.signature);
    assert_eq!(
        canonicalize(&imported.claims),
        stored.license.canonical.as_bytes()
    );
    assert!(verify(
        &imported.claims,
        &imported.signature,
        &sa.export_verification_key().unwrap()
    ));
}
