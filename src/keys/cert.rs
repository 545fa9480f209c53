//! Self-signed author certificates.

use std::time::Duration;

use rand_core::{OsRng, RngCore};
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::der::asn1::{Ia5StringRef, ObjectIdentifier, PrintableStringRef, SetOfVec, Utf8StringRef};
use x509_cert::der::pem::LineEnding;
use x509_cert::der::{Any, Decode, DecodePem, Encode, EncodePem};
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::Validity;
use x509_cert::Certificate;

use crate::error::{PkgError, Result};

const OID_COUNTRY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
const OID_STATE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
const OID_LOCALITY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
const OID_ORG: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const OID_ORG_UNIT: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");
const OID_COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
const OID_EMAIL: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.1");

const SECONDS_PER_DAY: u64 = 86_400;

/// Distinguished name fields of an author certificate.
///
/// A value of `.` leaves the attribute out, the way `openssl req` does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub country: String,
    pub state: String,
    pub locality: String,
    pub organization: String,
    pub unit: String,
    pub common_name: String,
    pub email: String,
}

impl Subject {
    fn to_name(&self) -> Result<Name> {
        let mut rdns = Vec::new();

        if let Some(value) = present(&self.country) {
            let value = PrintableStringRef::new(value)
                .map_err(|err| PkgError::Validation(format!("country {value}: {err}")))?;
            rdns.push(rdn(OID_COUNTRY, Any::encode_from(&value).map_err(der_error)?)?);
        }
        for (oid, value) in [
            (OID_STATE, &self.state),
            (OID_LOCALITY, &self.locality),
            (OID_ORG, &self.organization),
            (OID_ORG_UNIT, &self.unit),
            (OID_COMMON_NAME, &self.common_name),
        ] {
            if let Some(value) = present(value) {
                let value = Utf8StringRef::new(value).map_err(der_error)?;
                rdns.push(rdn(oid, Any::encode_from(&value).map_err(der_error)?)?);
            }
        }
        if let Some(value) = present(&self.email) {
            let value = Ia5StringRef::new(value)
                .map_err(|err| PkgError::Validation(format!("email {value}: {err}")))?;
            rdns.push(rdn(OID_EMAIL, Any::encode_from(&value).map_err(der_error)?)?);
        }

        Ok(RdnSequence(rdns))
    }
}

fn present(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty() && value != ".").then_some(value)
}

fn rdn(oid: ObjectIdentifier, value: Any) -> Result<RelativeDistinguishedName> {
    let set = SetOfVec::try_from(vec![AttributeTypeAndValue { oid, value }]).map_err(der_error)?;
    Ok(RelativeDistinguishedName(set))
}

fn der_error(err: x509_cert::der::Error) -> PkgError {
    PkgError::Crypto(err.to_string())
}

/// Issue a self-signed SHA-256/RSA certificate for `key`, valid `days` days
/// from now, and return it PEM encoded.
pub fn self_signed(key: &RsaPrivateKey, subject: &Subject, days: u32) -> Result<String> {
    let name = subject.to_name()?;

    let mut serial = [0_u8; 16];
    OsRng.fill_bytes(&mut serial);
    serial[0] = (serial[0] & 0x7f) | 0x01;
    let serial = SerialNumber::new(&serial).map_err(der_error)?;

    let validity = Validity::from_now(Duration::from_secs(u64::from(days) * SECONDS_PER_DAY))
        .map_err(der_error)?;

    let spki_der = key
        .to_public_key()
        .to_public_key_der()
        .map_err(|err| PkgError::Crypto(err.to_string()))?;
    let spki = SubjectPublicKeyInfoOwned::from_der(spki_der.as_bytes()).map_err(der_error)?;

    let signer = SigningKey::<Sha256>::new(key.clone());
    let builder = CertificateBuilder::new(Profile::Root, serial, validity, name, spki, &signer)
        .map_err(|err| PkgError::Crypto(format!("certificate builder: {err}")))?;
    let certificate = builder
        .build::<rsa::pkcs1v15::Signature>()
        .map_err(|err| PkgError::Crypto(format!("certificate signing: {err}")))?;

    certificate.to_pem(LineEnding::LF).map_err(der_error)
}

/// Public key embedded in a PEM certificate.
pub fn public_key(pem: &str) -> Result<RsaPublicKey> {
    let certificate = Certificate::from_pem(pem.as_bytes()).map_err(der_error)?;
    let der = certificate
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(der_error)?;
    RsaPublicKey::from_public_key_der(&der).map_err(|err| PkgError::Crypto(err.to_string()))
}

/// RFC 4514 rendering of a certificate's subject.
pub fn subject_line(pem: &str) -> Result<String> {
    let certificate = Certificate::from_pem(pem.as_bytes()).map_err(der_error)?;
    Ok(certificate.tbs_certificate.subject.to_string())
}
