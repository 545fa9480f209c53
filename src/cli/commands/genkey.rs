//! genkey - install the package author's keypair and certificate

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::config::Config;
use crate::error::{PkgError, Result};
use crate::keys::{AuthorInfo, InstalledKeys, KeyRequest, KeySource, KeyStore};

/// Generates a Package Author's certificate information from a new or an
/// existing RSA key pair.
#[derive(Parser, Debug)]
#[command(name = "genkey", version, about, long_about = None)]
#[command(disable_version_flag = true)]
pub struct GenkeyArgs {
    /// Generate a new key pair
    #[arg(long)]
    pub generate: bool,

    /// Replace the existing key pair
    #[arg(long)]
    pub replace: bool,

    /// Registered Author Name
    #[arg(long)]
    pub author: Option<String>,

    /// Registered Author's Homepage
    #[arg(long)]
    pub homepage: Option<String>,

    /// Registered Author's Email
    #[arg(long)]
    pub email: Option<String>,

    /// Path to an existing private key
    #[arg(long, value_name = "PATH")]
    pub privkey: Option<PathBuf>,

    /// Path to an existing public key
    #[arg(long, value_name = "PATH")]
    pub pubkey: Option<PathBuf>,

    /// Country of the package author
    #[arg(long, default_value = "US")]
    pub country: String,

    /// State or province
    #[arg(long, default_value = "Zion")]
    pub state: String,

    /// Organization ("." to omit)
    #[arg(long, default_value = ".")]
    pub org: String,

    /// Organizational unit ("." to omit)
    #[arg(long, default_value = ".")]
    pub unit: String,

    /// Days the certificate remains valid
    #[arg(long)]
    pub days: Option<u32>,

    /// Config file path
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print version
    #[arg(short = 'v', short_alias = 'V', long, action = ArgAction::Version)]
    pub version: Option<bool>,
}

impl GenkeyArgs {
    /// Neither `--generate` nor `--replace`: nothing to do.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        !self.generate && !self.replace
    }

    fn required(value: Option<&String>, flag: &str) -> Result<String> {
        value
            .cloned()
            .ok_or_else(|| PkgError::Validation(format!("The parameter --{flag} is required.")))
    }

    fn source(&self, bits: usize) -> Result<KeySource> {
        match (&self.privkey, &self.pubkey) {
            (Some(private_key), Some(public_key)) => Ok(KeySource::Import {
                private_key: private_key.clone(),
                public_key: public_key.clone(),
            }),
            (None, None) => Ok(KeySource::Generate { bits }),
            _ => Err(PkgError::Validation(
                "You must specify both public and private keys if you wish to use them".into(),
            )),
        }
    }

    /// Validate the arguments into a key request.
    pub fn request(&self, config: &Config) -> Result<KeyRequest> {
        config.keys.validate()?;
        let author = AuthorInfo {
            author: Self::required(self.author.as_ref(), "author")?,
            homepage: Self::required(self.homepage.as_ref(), "homepage")?,
            email: Self::required(self.email.as_ref(), "email")?,
        };

        let mut request = KeyRequest::new(author, self.source(config.keys.bits)?);
        request.country.clone_from(&self.country);
        request.state.clone_from(&self.state);
        request.organization.clone_from(&self.org);
        request.unit.clone_from(&self.unit);
        request.days = self.days.unwrap_or(config.keys.days);
        request.replace = self.replace;
        Ok(request)
    }
}

/// Install the keypair described by `args`, printing progress notes.
pub fn run(args: &GenkeyArgs) -> Result<InstalledKeys> {
    let root = std::env::current_dir()?;
    let config = Config::load(args.config.as_deref(), &root)?;
    let request = args.request(&config)?;
    let store = KeyStore::new(config.key_dir());

    match request.source {
        KeySource::Import { .. } => println!("NOTE: Using user provided public/private key pair."),
        KeySource::Generate { .. } => println!("NOTE: Generating custom public/private key pair."),
    }

    let installed = store.install(&request)?;
    println!("NOTE: Generated certificate file package.pem.");
    println!("NOTE: Generated private key file package.key.");
    println!("NOTE: Generated public key file package.pub.");
    println!("NOTE: Wrote author information to package.info.");
    println!("SUCCESS!!");
    Ok(installed)
}
