//! Author key material.
//!
//! One keypair per installation, kept in the key directory as:
//! - `package.key`: private key (PKCS#8 PEM), never distributed
//! - `package.pub`: public key (SubjectPublicKeyInfo PEM)
//! - `package.pem`: self-signed X.509 certificate
//! - `package.info`: `[info]` section with author, homepage and email

pub mod cert;
mod signer;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use rand_core::OsRng;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub use cert::Subject;
pub use signer::{private_key_from_pem, public_key_from_pem, verify, PackageSigner};

use crate::error::{PkgError, Result};

/// Locations of the key files inside a key directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPaths {
    dir: PathBuf,
}

impl KeyPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn private_key(&self) -> PathBuf {
        self.dir.join("package.key")
    }

    #[must_use]
    pub fn public_key(&self) -> PathBuf {
        self.dir.join("package.pub")
    }

    #[must_use]
    pub fn certificate(&self) -> PathBuf {
        self.dir.join("package.pem")
    }

    #[must_use]
    pub fn info(&self) -> PathBuf {
        self.dir.join("package.info")
    }

    /// Key files that are already on disk.
    #[must_use]
    pub fn existing(&self) -> Vec<PathBuf> {
        [self.private_key(), self.public_key(), self.certificate(), self.info()]
            .into_iter()
            .filter(|path| path.exists())
            .collect()
    }
}

/// Author identity published with every package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorInfo {
    pub author: String,
    pub homepage: String,
    pub email: String,
}

impl AuthorInfo {
    /// Parse the `[info]` section of an INI document.
    pub fn parse(text: &str) -> Result<Self> {
        let mut info = Self::default();
        let mut in_info = false;
        let mut seen_section = false;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                in_info = section.trim() == "info";
                seen_section |= in_info;
                continue;
            }
            if !in_info {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = unquote(value.trim()).to_string();
            match key.trim() {
                "author" => info.author = value,
                "homepage" => info.homepage = value,
                "email" => info.email = value,
                _ => {}
            }
        }

        if !seen_section {
            return Err(PkgError::Validation("package.info has no [info] section".into()));
        }
        Ok(info)
    }

    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "[info]\nauthor = {}\nhomepage = {}\nemail = {}\n",
            self.author, self.homepage, self.email
        )
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value.strip_prefix(quote).and_then(|v| v.strip_suffix(quote)) {
            return inner;
        }
    }
    value
}

/// Where key material comes from when installing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Fresh RSA key of the given size.
    Generate { bits: usize },
    /// Externally generated PEM pair.
    Import { private_key: PathBuf, public_key: PathBuf },
}

/// Everything needed to install a keypair.
#[derive(Debug, Clone)]
pub struct KeyRequest {
    pub author: AuthorInfo,
    pub country: String,
    pub state: String,
    pub organization: String,
    pub unit: String,
    pub days: u32,
    pub source: KeySource,
    pub replace: bool,
}

impl KeyRequest {
    /// Request with the key tool's default certificate fields.
    #[must_use]
    pub fn new(author: AuthorInfo, source: KeySource) -> Self {
        Self {
            author,
            country: "US".into(),
            state: "Zion".into(),
            organization: ".".into(),
            unit: ".".into(),
            days: 2048,
            source,
            replace: false,
        }
    }

    fn subject(&self) -> Subject {
        Subject {
            country: self.country.clone(),
            state: self.state.clone(),
            locality: self.author.homepage.clone(),
            organization: self.organization.clone(),
            unit: self.unit.clone(),
            common_name: self.author.author.clone(),
            email: self.author.email.clone(),
        }
    }
}

/// Files written by [`KeyStore::install`].
#[derive(Debug, Clone, Serialize)]
pub struct InstalledKeys {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
    pub certificate: PathBuf,
    pub info: PathBuf,
    pub imported: bool,
}

/// Reads and installs the installation keypair.
#[derive(Debug, Clone)]
pub struct KeyStore {
    paths: KeyPaths,
}

impl KeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            paths: KeyPaths::new(dir),
        }
    }

    #[must_use]
    pub const fn paths(&self) -> &KeyPaths {
        &self.paths
    }

    fn missing(&self) -> PkgError {
        PkgError::KeyMissing(self.paths.dir().to_path_buf())
    }

    fn read(&self, path: &Path) -> Result<String> {
        if !path.exists() {
            return Err(self.missing());
        }
        Ok(fs::read_to_string(path)?)
    }

    /// Author identity from `package.info`.
    pub fn author_info(&self) -> Result<AuthorInfo> {
        AuthorInfo::parse(&self.read(&self.paths.info())?)
    }

    pub fn signing_key(&self) -> Result<RsaPrivateKey> {
        private_key_from_pem(&self.read(&self.paths.private_key())?)
    }

    /// The published key: from the certificate when present, else `package.pub`.
    pub fn public_key(&self) -> Result<RsaPublicKey> {
        let certificate = self.paths.certificate();
        if certificate.exists() {
            return cert::public_key(&fs::read_to_string(certificate)?);
        }
        public_key_from_pem(&self.read(&self.paths.public_key())?)
    }

    /// Signer for the installed keypair, owned by `owner`.
    pub fn signer(&self, owner: &str) -> Result<PackageSigner> {
        let private = self.signing_key()?;
        let public = self.public_key()?;
        PackageSigner::new(owner, private, public)
    }

    /// Install a keypair, certificate and info file.
    ///
    /// Refuses when any key file exists unless `replace` is set. All
    /// material is produced before the first file is touched.
    pub fn install(&self, request: &KeyRequest) -> Result<InstalledKeys> {
        let existing = self.paths.existing();
        if !existing.is_empty() && !request.replace {
            debug!(files = ?existing, "Key files already present");
            return Err(PkgError::KeyExists(self.paths.dir().to_path_buf()));
        }

        let (private, public, imported) = match &request.source {
            KeySource::Generate { bits } => {
                info!(bits, "Generating RSA key pair");
                let private = RsaPrivateKey::new(&mut OsRng, *bits)
                    .map_err(|err| PkgError::Crypto(format!("generate key: {err}")))?;
                let public = private.to_public_key();
                (private, public, false)
            }
            KeySource::Import {
                private_key,
                public_key,
            } => {
                info!(private = %private_key.display(), public = %public_key.display(), "Using provided key pair");
                let (private, public) = import_pair(private_key, public_key)?;
                (private, public, true)
            }
        };

        let certificate = cert::self_signed(&private, &request.subject(), request.days)?;
        let private_pem = private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|err| PkgError::Crypto(format!("encode private key: {err}")))?;
        let public_pem = public
            .to_public_key_pem(LineEnding::LF)
            .map_err(|err| PkgError::Crypto(format!("encode public key: {err}")))?;

        fs::create_dir_all(self.paths.dir())?;
        write_atomic(&self.paths.info(), request.author.render().as_bytes(), false)?;
        write_atomic(&self.paths.certificate(), certificate.as_bytes(), false)?;
        write_atomic(&self.paths.private_key(), private_pem.as_bytes(), true)?;
        write_atomic(&self.paths.public_key(), public_pem.as_bytes(), false)?;

        info!(dir = %self.paths.dir().display(), "Key material installed");
        Ok(InstalledKeys {
            private_key: self.paths.private_key(),
            public_key: self.paths.public_key(),
            certificate: self.paths.certificate(),
            info: self.paths.info(),
            imported,
        })
    }
}

fn import_pair(private_path: &Path, public_path: &Path) -> Result<(RsaPrivateKey, RsaPublicKey)> {
    for path in [private_path, public_path] {
        if !path.is_file() {
            return Err(PkgError::Validation(format!(
                "key file '{}' does not exist",
                path.display()
            )));
        }
    }

    let private = private_key_from_pem(&fs::read_to_string(private_path)?)?;
    let public = public_key_from_pem(&fs::read_to_string(public_path)?)?;
    if private.to_public_key() != public {
        return Err(PkgError::Crypto(format!(
            "public key '{}' does not belong to private key '{}'",
            public_path.display(),
            private_path.display()
        )));
    }
    Ok((private, public))
}

fn write_atomic(path: &Path, contents: &[u8], private: bool) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.flush()?;

    if private {
        restrict_permissions(file.path())?;
    }

    file.persist(path).map_err(|err| PkgError::Io(err.error))?;
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// Small key shared by unit tests; generation is the slow part.
#[cfg(test)]
pub(crate) fn test_key() -> &'static RsaPrivateKey {
    use std::sync::OnceLock;
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 1024).unwrap())
}
