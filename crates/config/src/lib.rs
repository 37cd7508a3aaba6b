//! Configuration loading and validation.
//!
//! The config file is JSON that may contain `//` and `/* */` comments. Values
//! can be overridden with `HV_`-prefixed environment variables, using `__` to
//! reach nested keys (e.g. `HV_PASSWORD__MEMORY_KIB=19456`).

pub mod error;
mod jsonc;

use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, Result};
pub use crate::jsonc::strip_comments;

/// Name of the config file looked up during discovery.
pub const CONFIG_FILE_NAME: &str = "config.json";
const ENV_PREFIX: &str = "HV_";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Public URL of the web client, used for CORS.
    pub frontend_url: String,
    /// SQLite database file. Relative paths are relative to the config file.
    pub database_path: PathBuf,
    pub port: u16,
    #[serde(default)]
    pub disable_registering: bool,
    #[serde(default)]
    pub password: PasswordConfig,
}

/// Argon2id cost used for new and verified password hashes.
///
/// Changing these invalidates every stored password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PasswordConfig {
    pub iterations: u32,
    pub memory_kib: u32,
    pub parallelism: u32,
}
impl Default for PasswordConfig {
    fn default() -> Self {
        Self { iterations: 3, memory_kib: 64 * 1024, parallelism: 4 }
    }
}

impl Config {
    /// Load from `path`, or from the first discovered `config.json`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => discover()?,
        };
        Self::from_file(&path)
    }

    /// Load one config file, with environment variables merged over it.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).or_raise(|| ErrorKind::Read(path.to_path_buf()))?;
        let base = path.parent().unwrap_or(Path::new("."));
        tracing::debug!(path = %path.display(), "loading configuration");
        let figment = Figment::new()
            .merge(Json::string(&strip_comments(&text)?))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(figment, base)
    }

    fn from_figment(figment: Figment, base: &Path) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Parse)?;
        config.validate(base)
    }

    fn validate(mut self, base: &Path) -> Result<Self> {
        if !is_url_valid(&self.frontend_url) {
            exn::bail!(ErrorKind::Invalid("frontend URL must have a scheme and a host"));
        }
        if self.port == 0 {
            exn::bail!(ErrorKind::Invalid("port must not be zero"));
        }
        if self.database_path.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("database path must not be empty"));
        }
        if self.password.iterations == 0 || self.password.parallelism == 0 {
            exn::bail!(ErrorKind::Invalid("password hashing needs at least one iteration and one lane"));
        }
        if self.password.memory_kib < 8 * self.password.parallelism {
            exn::bail!(ErrorKind::Invalid("password hashing needs at least 8 KiB of memory per lane"));
        }
        if self.database_path.is_relative() {
            self.database_path = base.join(&self.database_path);
        }
        Ok(self)
    }
}

/// `scheme://host[...]` with a non-empty scheme and host.
fn is_url_valid(url: &str) -> bool {
    let Some((scheme, rest)) = url.split_once("://") else {
        return false;
    };
    let mut scheme_chars = scheme.chars();
    let scheme_ok = scheme_chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && scheme_chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    scheme_ok && !host.is_empty() && !host.starts_with(':')
}

/// Directories searched for `config.json`, in order: the working directory,
/// the executable's directory, then the platform config directory.
pub fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) {
        dirs.push(exe_dir);
    }
    if let Some(project) = directories::ProjectDirs::from("", "", "hv") {
        dirs.push(project.config_dir().to_path_buf());
    }
    dirs
}

/// First `config.json` found in [`search_dirs`].
pub fn discover() -> Result<PathBuf> {
    find_in(&search_dirs())
}

fn find_in(dirs: &[PathBuf]) -> Result<PathBuf> {
    dirs.iter()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|path| path.is_file())
        .ok_or_raise(|| ErrorKind::NotFound(dirs.to_vec()))
}
