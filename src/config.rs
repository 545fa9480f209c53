use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PkgError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub keys: KeysConfig,
}

impl Config {
    /// Load configuration for an installation rooted at `root`.
    ///
    /// An explicit path (or `TPLPACK_CONFIG`) replaces the global and
    /// project files. Environment overrides always apply last.
    pub fn load(explicit_path: Option<&Path>, root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("TPLPACK_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            match Self::load_patch(&path)? {
                Some(patch) => config.merge_patch(patch),
                None => {
                    return Err(PkgError::Config(format!(
                        "config file {} does not exist",
                        path.display()
                    )));
                }
            }
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_project(root)? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides()?;
        config.keys.validate()?;

        if config.paths.base_path.is_none() {
            config.paths.base_path = Some(root.to_path_buf());
        }

        Ok(config)
    }

    /// Installation base directory; every relative package path hangs off it.
    #[must_use]
    pub fn base_path(&self) -> PathBuf {
        self.paths
            .base_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Directory holding `package.key`, `package.pem`, `package.pub`,
    /// `package.info` and the metadata database.
    #[must_use]
    pub fn key_dir(&self) -> PathBuf {
        self.paths
            .key_dir
            .clone()
            .unwrap_or_else(|| self.base_path().join("cache").join("package"))
    }

    #[must_use]
    pub fn temp_dir(&self) -> PathBuf {
        self.paths.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Where finished `.xml.gz` archives land.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.paths.output_dir.clone().unwrap_or_else(|| self.temp_dir())
    }

    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.store
            .database
            .clone()
            .unwrap_or_else(|| self.key_dir().join("package.db"))
    }

    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.store
            .settings
            .clone()
            .unwrap_or_else(|| self.key_dir().join("settings.json"))
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("tplpack/config.toml"))
    }

    fn load_project(root: &Path) -> Result<Option<ConfigPatch>> {
        Self::load_patch(&root.join("tplpack.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| PkgError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| PkgError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.paths {
            self.paths.merge(patch);
        }
        if let Some(patch) = patch.resolver {
            self.resolver.merge(patch);
        }
        if let Some(patch) = patch.store {
            self.store.merge(patch);
        }
        if let Some(patch) = patch.keys {
            self.keys.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_path("TPLPACK_BASE_PATH") {
            self.paths.base_path = Some(value);
        }
        if let Some(value) = env_path("TPLPACK_KEY_DIR") {
            self.paths.key_dir = Some(value);
        }
        if let Some(value) = env_path("TPLPACK_TEMP_DIR") {
            self.paths.temp_dir = Some(value);
        }
        if let Some(value) = env_path("TPLPACK_OUTPUT_DIR") {
            self.paths.output_dir = Some(value);
        }

        if let Some(values) = env_list("TPLPACK_EXCLUDED_DIRS") {
            self.resolver.excluded_dirs = merge_unique(values, &self.resolver.excluded_dirs);
        }
        if let Some(values) = env_list("TPLPACK_EXCLUDED_NAMES") {
            self.resolver.excluded_names = merge_unique(values, &self.resolver.excluded_names);
        }

        if let Some(value) = env_string("TPLPACK_STORE_BACKEND") {
            self.store.backend = parse_backend(&value)?;
        }

        if let Some(value) = env_u32("TPLPACK_KEY_DAYS")? {
            self.keys.days = value;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default)]
    pub base_path: Option<PathBuf>,
    #[serde(default)]
    pub key_dir: Option<PathBuf>,
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

impl PathsConfig {
    fn merge(&mut self, patch: PathsPatch) {
        if let Some(value) = patch.base_path {
            self.base_path = Some(value);
        }
        if let Some(value) = patch.key_dir {
            self.key_dir = Some(value);
        }
        if let Some(value) = patch.temp_dir {
            self.temp_dir = Some(value);
        }
        if let Some(value) = patch.output_dir {
            self.output_dir = Some(value);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Path fragments marking system binary directories.
    #[serde(default)]
    pub excluded_dirs: Vec<String>,
    /// Interpreter and shell tool basenames never bundled into a package.
    #[serde(default)]
    pub excluded_names: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            excluded_dirs: ["/bin/", "/usr/bin/", "/usr/local/bin/"]
                .into_iter()
                .map(String::from)
                .collect(),
            excluded_names: [
                "bash",
                "snmpwalk",
                "snmpget",
                "snmpbulkwalk",
                "csh",
                "tcsh",
                "ksh",
                "sh",
                "python",
                "perl",
                "php",
                "grep",
                "awk",
                "wc",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl ResolverConfig {
    fn merge(&mut self, patch: ResolverPatch) {
        if let Some(values) = patch.excluded_dirs {
            self.excluded_dirs = merge_unique(values, &self.excluded_dirs);
        }
        if let Some(values) = patch.excluded_names {
            self.excluded_names = merge_unique(values, &self.excluded_names);
        }
    }
}

/// Which metadata backend to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Probe SQLite, fall back to the settings blob.
    #[default]
    Auto,
    Sqlite,
    Blob,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default)]
    pub database: Option<PathBuf>,
    #[serde(default)]
    pub settings: Option<PathBuf>,
}

impl StoreConfig {
    fn merge(&mut self, patch: StorePatch) {
        if let Some(value) = patch.backend {
            self.backend = value;
        }
        if let Some(value) = patch.database {
            self.database = Some(value);
        }
        if let Some(value) = patch.settings {
            self.settings = Some(value);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysConfig {
    /// RSA modulus size for generated keys.
    #[serde(default = "default_bits")]
    pub bits: usize,
    /// Default certificate validity in days.
    #[serde(default = "default_days")]
    pub days: u32,
}

/// Smallest RSA modulus accepted for signing keys.
pub const MIN_KEY_BITS: usize = 2048;

const fn default_bits() -> usize {
    MIN_KEY_BITS
}

const fn default_days() -> u32 {
    2048
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            bits: default_bits(),
            days: default_days(),
        }
    }
}

impl KeysConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bits < MIN_KEY_BITS {
            return Err(PkgError::Config(format!(
                "keys.bits = {} is too small; signing keys need at least {MIN_KEY_BITS} bits",
                self.bits
            )));
        }
        Ok(())
    }

    fn merge(&mut self, patch: KeysPatch) {
        if let Some(value) = patch.bits {
            self.bits = value;
        }
        if let Some(value) = patch.days {
            self.days = value;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub paths: Option<PathsPatch>,
    pub resolver: Option<ResolverPatch>,
    pub store: Option<StorePatch>,
    pub keys: Option<KeysPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PathsPatch {
    pub base_path: Option<PathBuf>,
    pub key_dir: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ResolverPatch {
    pub excluded_dirs: Option<Vec<String>>,
    pub excluded_names: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct StorePatch {
    pub backend: Option<StoreBackend>,
    pub database: Option<PathBuf>,
    pub settings: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct KeysPatch {
    pub bits: Option<usize>,
    pub days: Option<u32>,
}

fn merge_unique(values: Vec<String>, existing: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in values.into_iter().chain(existing.iter().cloned()) {
        if seen.insert(value.clone()) {
            out.push(value);
        }
    }
    out
}

fn parse_backend(value: &str) -> Result<StoreBackend> {
    match value.to_lowercase().as_str() {
        "auto" => Ok(StoreBackend::Auto),
        "sqlite" => Ok(StoreBackend::Sqlite),
        "blob" | "settings" => Ok(StoreBackend::Blob),
        _ => Err(PkgError::Config(format!(
            "invalid store backend {value} (expected auto|sqlite|blob)"
        ))),
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_string(key).map(PathBuf::from)
}

fn env_u32(key: &str) -> Result<Option<u32>> {
    match env_string(key) {
        Some(value) => value
            .parse::<u32>()
            .map(Some)
            .map_err(|err| PkgError::Config(format!("invalid {key} value {value}: {err}"))),
        None => Ok(None),
    }
}

fn env_list(key: &str) -> Option<Vec<String>> {
    env_string(key).map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(ToString::to_string)
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn resolver_defaults_cover_system_binaries() {
        let config = ResolverConfig::default();
        assert!(config.excluded_dirs.contains(&"/usr/bin/".to_string()));
        assert!(config.excluded_names.contains(&"snmpwalk".to_string()));
        assert_eq!(config.excluded_names.len(), 14);
    }

    #[test]
    fn key_dir_defaults_under_base_path() {
        let mut config = Config::default();
        config.paths.base_path = Some(PathBuf::from("/opt/app"));
        assert_eq!(config.key_dir(), PathBuf::from("/opt/app/cache/package"));
        assert_eq!(
            config.database_path(),
            PathBuf::from("/opt/app/cache/package/package.db")
        );
    }

    #[test]
    fn explicit_key_dir_wins() {
        let mut config = Config::default();
        config.paths.base_path = Some(PathBuf::from("/opt/app"));
        config.paths.key_dir = Some(PathBuf::from("/etc/keys"));
        assert_eq!(config.key_dir(), PathBuf::from("/etc/keys"));
        assert_eq!(config.settings_path(), PathBuf::from("/etc/keys/settings.json"));
    }

    #[test]
    fn keys_config_defaults() {
        let config = KeysConfig::default();
        assert_eq!(config.bits, 2048);
        assert_eq!(config.days, 2048);
    }

    #[test]
    fn merge_unique_prefers_new_order() {
        let existing = vec!["a".to_string(), "b".to_string()];
        let merged = merge_unique(vec!["b".to_string(), "c".to_string()], &existing);
        assert_eq!(merged, vec!["b", "c", "a"]);
    }

    #[test]
    fn parse_backend_variants() {
        assert_eq!(parse_backend("SQLite").unwrap(), StoreBackend::Sqlite);
        assert_eq!(parse_backend("settings").unwrap(), StoreBackend::Blob);
        assert!(parse_backend("redis").is_err());
    }

    #[test]
    fn load_patch_nonexistent_file() {
        let result = Config::load_patch(Path::new("/nonexistent/path/config.toml")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn load_patch_invalid_toml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "this is not valid toml [[[").unwrap();

        assert!(Config::load_patch(&path).is_err());
    }

    #[test]
    fn merge_patch_updates_only_given_values() {
        let mut config = Config::default();
        let patch = ConfigPatch {
            keys: Some(KeysPatch {
                bits: None,
                days: Some(365),
            }),
            store: Some(StorePatch {
                backend: Some(StoreBackend::Blob),
                ..Default::default()
            }),
            ..Default::default()
        };

        config.merge_patch(patch);
        assert_eq!(config.keys.days, 365);
        assert_eq!(config.keys.bits, 2048);
        assert_eq!(config.store.backend, StoreBackend::Blob);
    }

    #[test]
    fn load_from_explicit_path() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("custom.toml");
        std::fs::write(
            &config_path,
            r#"
[paths]
key_dir = "/srv/keys"

[store]
backend = "sqlite"
"#,
        )
        .unwrap();

        let config = Config::load(Some(&config_path), temp.path()).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.base_path(), temp.path());
    }

    #[test]
    fn load_missing_explicit_path_fails() {
        let temp = TempDir::new().unwrap();
        let result = Config::load(Some(&temp.path().join("absent.toml")), temp.path());
        assert!(matches!(result, Err(PkgError::Config(_))));
    }

    #[test]
    fn load_rejects_weak_key_size() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("weak.toml");
        std::fs::write(&config_path, "[keys]\nbits = 1024\n").unwrap();

        let err = Config::load(Some(&config_path), temp.path()).unwrap_err();
        assert!(matches!(err, PkgError::Config(ref msg) if msg.contains("2048")));
    }

    #[test]
    fn load_accepts_larger_key_size() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("strong.toml");
        std::fs::write(&config_path, "[keys]\nbits = 4096\n").unwrap();

        let config = Config::load(Some(&config_path), temp.path()).unwrap();
        assert_eq!(config.keys.bits, 4096);
    }

    #[test]
    fn load_project_config() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("tplpack.toml"),
            r#"
[resolver]
excluded_names = ["ruby"]
"#,
        )
        .unwrap();

        let config = Config::load(None, temp.path()).unwrap();
        assert_eq!(config.resolver.excluded_names[0], "ruby");
        assert!(config.resolver.excluded_names.contains(&"bash".to_string()));
    }
}
