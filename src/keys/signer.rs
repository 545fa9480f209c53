use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::error::{PkgError, Result};

/// Signs package content with the author's key. SHA-256 with RSA PKCS#1 v1.5
/// throughout.
#[derive(Debug, Clone)]
pub struct PackageSigner {
    owner: String,
    signing_key: SigningKey<Sha256>,
    public_key: RsaPublicKey,
    public_pem: String,
}

impl PackageSigner {
    /// Pair a private key with the public key that will be published.
    ///
    /// The public key is what travels in the package; it is taken as given
    /// so a mismatch shows up in self-verification.
    pub fn new(owner: impl Into<String>, private: RsaPrivateKey, public: RsaPublicKey) -> Result<Self> {
        let public_pem = public
            .to_public_key_pem(LineEnding::LF)
            .map_err(|err| PkgError::Crypto(format!("encode public key: {err}")))?;
        Ok(Self {
            owner: owner.into(),
            signing_key: SigningKey::<Sha256>::new(private),
            public_key: public,
            public_pem,
        })
    }

    /// Name published alongside the key.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// SubjectPublicKeyInfo PEM of the published key.
    #[must_use]
    pub fn public_pem(&self) -> &str {
        &self.public_pem
    }

    /// Detached signature over `data`.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signature = self
            .signing_key
            .try_sign(data)
            .map_err(|err| PkgError::Crypto(format!("sign: {err}")))?;
        Ok(signature.to_vec())
    }

    /// Check `signature` against the published key.
    #[must_use]
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        verify(&self.public_key, data, signature)
    }
}

/// Verify a detached signature. Malformed signatures simply fail.
#[must_use]
pub fn verify(public: &RsaPublicKey, data: &[u8], signature: &[u8]) -> bool {
    let Ok(signature) = Signature::try_from(signature) else {
        return false;
    };
    VerifyingKey::<Sha256>::new(public.clone())
        .verify(data, &signature)
        .is_ok()
}

/// Parse a private key in PKCS#8 or PKCS#1 PEM.
pub fn private_key_from_pem(pem: &str) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|err| PkgError::Crypto(format!("parse private key: {err}")))
}

/// Parse a public key from SubjectPublicKeyInfo PEM, PKCS#1 PEM or an X.509
/// certificate.
pub fn public_key_from_pem(pem: &str) -> Result<RsaPublicKey> {
    if pem.contains("BEGIN CERTIFICATE") {
        return super::cert::public_key(pem);
    }
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|err| PkgError::Crypto(format!("parse public key: {err}")))
}
