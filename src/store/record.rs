use rusqlite::types::Type;
use rusqlite::Row;

use crate::license::license_claims::parse_date;
use crate::license::{LicenseClaims, SignedLicense};

/// Store-local identifier. Meaningless outside the database that assigned it.
pub type LicenseId = i64;

pub(crate) const SELECT_LICENSE: &str = "SELECT id, customer, product, issued_at, expires_at, \
     features, hwid, signature, canonical FROM licenses";

/// A signed license as persisted in a [`LicenseStore`](super::LicenseStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseRecord {
    pub id: LicenseId,
    pub license: SignedLicense,
}

impl LicenseRecord {
    /// Header labels matching [`display_fields`](Self::display_fields).
    pub const COLUMNS: [&'static str; 7] = [
        "Id",
        "Customer",
        "Product",
        "Issued At",
        "Expires At",
        "Features",
        "Hwid",
    ];

    pub fn claims(&self) -> &LicenseClaims {
        &self.license.claims
    }

    /// The values shown for a record, in [`COLUMNS`](Self::COLUMNS) order.
    pub fn display_fields(&self) -> [String; 7] {
        let c = self.claims();
        [
            self.id.to_string(),
            c.customer.clone(),
            c.product.clone(),
            c.issued_at_str(),
            c.expires_at_str(),
            c.features.clone(),
            c.hwid.clone(),
        ]
    }

    /// Case-insensitive substring match against any display field.
    /// `needle` must already be lowercase.
    pub(crate) fn matches_lowercase(&self, needle: &str) -> bool {
        needle.is_empty()
            || self
                .display_fields()
                .iter()
                .any(|field| field.to_lowercase().contains(needle))
    }
}

fn text_or_empty(row: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
}

fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<time::Date>> {
    let text = text_or_empty(row, idx)?;
    if text.trim().is_empty() {
        return Ok(None);
    }
    parse_date(&text)
        .map(Some)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn record_from_row(row: &Row<'_>) -> rusqlite::Result<LicenseRecord> {
    let issued_at = date_column(row, 3)?.ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(3, Type::Null, "missing issued_at".into())
    })?;
    let claims = LicenseClaims {
        customer: text_or_empty(row, 1)?,
        product: text_or_empty(row, 2)?,
        issued_at,
        expires_at: date_column(row, 4)?,
        features: text_or_empty(row, 5)?,
        hwid: row.get(6)?,
    };
    Ok(LicenseRecord {
        id: row.get(0)?,
        license: SignedLicense {
            claims,
            signature: row.get(7)?,
            canonical: row.get(8)?,
        },
    })
}
