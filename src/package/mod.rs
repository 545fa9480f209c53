//! Package assembly, signing and verification.
//!
//! A package is a gzip-compressed XML-like document carrying the exported
//! template, every file it depends on (base64 with a detached signature
//! each), the author's public key and a signature over the whole document.

pub mod builder;
pub mod document;
pub mod service;
pub mod verify;

pub use builder::{BuiltPackage, PackageBuilder};
pub use document::{clean_up_name, read_archive, PackageDocument, PackageFile, PackageInfo};
pub use service::{
    package_contents, prefill_metadata, save_package, ContentsReport, MetadataOverrides,
    PackageOutcome, PackageRequest,
};
pub use verify::{verify_archive, verify_document, VerificationReport};
