pub mod crypto;
pub mod license_claims;
pub mod license_file;
pub mod license_validator;
pub mod signing_authority;

pub use license_claims::{canonicalize, LicenseClaims, LicenseDraft};
pub use signing_authority::{SignedLicense, SigningAuthority};
