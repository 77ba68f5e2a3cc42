//! Issuer configuration.

use std::env;
use std::path::PathBuf;

const DEFAULT_HOME: &str = "./.zkid";

/// Where the issuer keeps its trees, keys and emitted proof inputs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuerConfig {
    /// Sled database holding the identity trees.
    pub db_path: PathBuf,
    /// Directory of the private key and identity record.
    pub keys_dir: PathBuf,
    /// Directory the JSON proof inputs are written to.
    pub output_dir: PathBuf,
}

impl IssuerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let home = PathBuf::from(lookup("ZKID_HOME").unwrap_or_else(|| DEFAULT_HOME.to_string()));

        let db_path = lookup("ZKID_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("issuer.db"));
        let keys_dir = lookup("ZKID_KEYS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("keys"));
        let output_dir = lookup("ZKID_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("out"));

        Self {
            db_path,
            keys_dir,
            output_dir,
        }
    }
}
