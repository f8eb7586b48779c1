//! Container env file (`.env`) holding credentials, memory sizing and the
//! host user/group ids the container runs as.
//!
//! The file is created on first setup and rewritten on every
//! [`EnvFile::load_or_create`]: known and unknown keys keep their values and
//! order, only `HOST_UID`/`HOST_GID` are refreshed to the current process.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const KEY_USERNAME: &str = "NEO4J_USERNAME";
pub const KEY_PASSWORD: &str = "NEO4J_PASSWORD";
pub const KEY_AUTH: &str = "NEO4J_AUTH";
pub const KEY_UID: &str = "HOST_UID";
pub const KEY_GID: &str = "HOST_GID";
pub const KEY_HEAP_INITIAL: &str = "NEO4J_HEAP_INITIAL_SIZE";
pub const KEY_HEAP_MAX: &str = "NEO4J_HEAP_MAX_SIZE";
pub const KEY_PAGE_CACHE: &str = "NEO4J_PAGECACHE_SIZE";

const DEFAULT_USERNAME: &str = "neo4j";
const DEFAULT_PASSWORD: &str = "yourpassword";
const DEFAULT_HEAP: &str = "4G";
const DEFAULT_PAGE_CACHE: &str = "2G";

/// Errors from reading or writing the env file.
#[derive(Error, Debug)]
pub enum EnvFileError {
    #[error("failed to read {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Numeric owner of the managed directories and container process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

impl Owner {
    /// The uid/gid of the running process.
    #[cfg(unix)]
    pub fn current() -> Self {
        // SAFETY: getuid/getgid cannot fail and touch no memory.
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
        Self { uid, gid }
    }

    #[cfg(not(unix))]
    pub fn current() -> Self {
        Self { uid: 0, gid: 0 }
    }
}

/// Parsed env file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub username: String,
    pub password: String,
    pub heap_initial: String,
    pub heap_max: String,
    pub page_cache: String,
    pub owner: Owner,
    /// Keys this tool does not interpret, in file order.
    pub extra: Vec<(String, String)>,
}

impl EnvConfig {
    /// Defaults for a fresh installation, owned by `owner`.
    pub fn defaults(owner: Owner) -> Self {
        Self {
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            heap_initial: DEFAULT_HEAP.to_string(),
            heap_max: DEFAULT_HEAP.to_string(),
            page_cache: DEFAULT_PAGE_CACHE.to_string(),
            owner,
            extra: Vec::new(),
        }
    }

    /// Composite `user/password` string Neo4j reads from `NEO4J_AUTH`.
    pub fn auth(&self) -> String {
        format!("{}/{}", self.username, self.password)
    }

    /// Builds a config from parsed pairs. Missing keys fall back to defaults
    /// with a warning; uid/gid always come from `owner`.
    fn from_pairs(pairs: Vec<(String, String)>, owner: Owner) -> Self {
        let mut config = Self::defaults(owner);
        let mut seen = Vec::new();

        for (key, value) in pairs {
            match key.as_str() {
                KEY_USERNAME => config.username = value,
                KEY_PASSWORD => config.password = value,
                KEY_HEAP_INITIAL => config.heap_initial = value,
                KEY_HEAP_MAX => config.heap_max = value,
                KEY_PAGE_CACHE => config.page_cache = value,
                // Derived or refreshed on every write
                KEY_AUTH | KEY_UID | KEY_GID => {}
                _ => {
                    config.extra.push((key.clone(), value));
                }
            }
            seen.push(key);
        }

        for key in [
            KEY_USERNAME,
            KEY_PASSWORD,
            KEY_HEAP_INITIAL,
            KEY_HEAP_MAX,
            KEY_PAGE_CACHE,
        ] {
            if !seen.iter().any(|k| k == key) {
                tracing::warn!(key, "Env file missing key, using default");
            }
        }

        config
    }

    fn render(&self) -> String {
        let mut out = String::from("# Managed by neo4j-manager. HOST_UID/HOST_GID are refreshed on every run.\n");
        let known = [
            (KEY_USERNAME, self.username.clone()),
            (KEY_PASSWORD, self.password.clone()),
            (KEY_AUTH, self.auth()),
            (KEY_UID, self.owner.uid.to_string()),
            (KEY_GID, self.owner.gid.to_string()),
            (KEY_HEAP_INITIAL, self.heap_initial.clone()),
            (KEY_HEAP_MAX, self.heap_max.clone()),
            (KEY_PAGE_CACHE, self.page_cache.clone()),
        ];
        for (key, value) in known.iter() {
            out.push_str(&format!("{}={}\n", key, quote(value)));
        }
        for (key, value) in &self.extra {
            out.push_str(&format!("{}={}\n", key, quote(value)));
        }
        out
    }
}

/// Quotes a value when dotenv would otherwise misread it. Values holding `$`
/// are single-quoted so they are never substituted on the next read.
fn quote(value: &str) -> String {
    let plain = !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\'' | '\\' | '$' | '`'));
    if plain {
        return value.to_string();
    }
    if value.contains('$') && !value.contains('\'') {
        return format!("'{}'", value);
    }
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('$', "\\$");
    format!("\"{}\"", escaped)
}

/// Literal text of a raw `KEY=value` line, with no variable substitution.
fn literal_value(raw: &str) -> String {
    let raw = raw.trim();
    if let Some(inner) = raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
        return inner.to_string();
    }
    if let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            match (c, chars.clone().next()) {
                ('\\', Some(next @ ('\\' | '"' | '$'))) => {
                    out.push(next);
                    chars.next();
                }
                _ => out.push(c),
            }
        }
        return out;
    }
    match raw.find(" #") {
        Some(comment) => raw[..comment].trim_end().to_string(),
        None => raw.to_string(),
    }
}

/// `$`-bearing values exactly as written, keyed by variable name.
fn literal_dollar_values(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, raw) = line.split_once('=')?;
            raw.contains('$')
                .then(|| (key.trim().to_string(), literal_value(raw)))
        })
        .collect()
}

/// Loader for the env file at a fixed path.
pub struct EnvFile {
    path: PathBuf,
}

impl EnvFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the file, creating it with defaults if absent, and rewrites it
    /// with the current process's uid/gid.
    pub fn load_or_create(&self) -> Result<EnvConfig, EnvFileError> {
        let owner = Owner::current();
        let config = if self.path.exists() {
            let pairs = self.parse()?;
            tracing::debug!(path = %self.path.display(), "Loaded env file");
            EnvConfig::from_pairs(pairs, owner)
        } else {
            tracing::info!(path = %self.path.display(), "Creating env file with defaults");
            EnvConfig::defaults(owner)
        };

        self.write(&config)?;
        Ok(config)
    }

    /// Read-only variant: never writes, falls back to defaults when the file
    /// is missing or unreadable.
    pub fn load_or_default(&self) -> EnvConfig {
        let owner = Owner::current();
        if !self.path.exists() {
            tracing::warn!(path = %self.path.display(), "Env file not found, using defaults");
            return EnvConfig::defaults(owner);
        }
        match self.parse() {
            Ok(pairs) => EnvConfig::from_pairs(pairs, owner),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read env file, using defaults");
                EnvConfig::defaults(owner)
            }
        }
    }

    fn parse(&self) -> Result<Vec<(String, String)>, EnvFileError> {
        let read_err = |reason: String| EnvFileError::Read {
            path: self.path.clone(),
            reason,
        };
        let pairs: Vec<(String, String)> = dotenvy::from_path_iter(&self.path)
            .map_err(|e| read_err(e.to_string()))?
            .map(|item| item.map_err(|e| read_err(e.to_string())))
            .collect::<Result<_, _>>()?;

        // dotenvy expands `$NAME`; credentials must survive a rewrite verbatim
        let content = fs::read_to_string(&self.path).map_err(|e| read_err(e.to_string()))?;
        let literals = literal_dollar_values(&content);
        Ok(pairs
            .into_iter()
            .map(|(key, value)| {
                match literals.iter().rev().find(|(k, _)| *k == key) {
                    Some((_, literal)) => (key, literal.clone()),
                    None => (key, value),
                }
            })
            .collect())
    }

    fn write(&self, config: &EnvConfig) -> Result<(), EnvFileError> {
        let write_err = |source| EnvFileError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(&self.path, config.render()).map_err(write_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_file_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvFile::new(dir.path().join(".env"));

        let config = env.load_or_create().unwrap();

        assert!(env.path().exists());
        assert_eq!(config.username, "neo4j");
        assert_eq!(config.password, "yourpassword");
        assert_eq!(config.heap_initial, "4G");
        assert_eq!(config.heap_max, "4G");
        assert_eq!(config.page_cache, "2G");
        assert_eq!(config.owner, Owner::current());

        let content = fs::read_to_string(env.path()).unwrap();
        assert!(content.contains("NEO4J_AUTH=neo4j/yourpassword"));
    }

    #[test]
    fn test_preserves_fields_and_refreshes_owner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(
            &path,
            "NEO4J_USERNAME=admin\n\
             NEO4J_PASSWORD=s3cret\n\
             HOST_UID=4242\n\
             HOST_GID=4343\n\
             NEO4J_HEAP_INITIAL_SIZE=1G\n\
             NEO4J_HEAP_MAX_SIZE=2G\n\
             NEO4J_PAGECACHE_SIZE=512M\n\
             CUSTOM_FLAG=on\n",
        )
        .unwrap();
        let env = EnvFile::new(&path);

        let first = env.load_or_create().unwrap();
        let second = env.load_or_create().unwrap();

        for config in [&first, &second] {
            assert_eq!(config.username, "admin");
            assert_eq!(config.password, "s3cret");
            assert_eq!(config.heap_initial, "1G");
            assert_eq!(config.heap_max, "2G");
            assert_eq!(config.page_cache, "512M");
            assert_eq!(config.owner, Owner::current());
            assert_eq!(
                config.extra,
                vec![("CUSTOM_FLAG".to_string(), "on".to_string())]
            );
        }

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains(&format!("HOST_UID={}", Owner::current().uid)));
        assert!(content.contains("NEO4J_AUTH=admin/s3cret"));
    }

    #[test]
    fn test_missing_optional_keys_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "NEO4J_PASSWORD=only-this\n").unwrap();

        let config = EnvFile::new(&path).load_or_default();

        assert_eq!(config.username, "neo4j");
        assert_eq!(config.password, "only-this");
        assert_eq!(config.page_cache, "2G");
    }

    #[test]
    fn test_special_characters_survive_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvFile::new(dir.path().join(".env"));
        let mut config = EnvConfig::defaults(Owner::current());
        config.password = "pa ss#w\"rd".to_string();
        env.write(&config).unwrap();

        let reloaded = env.load_or_create().unwrap();
        assert_eq!(reloaded.password, "pa ss#w\"rd");
    }

    #[test]
    fn test_dollar_in_password_is_not_expanded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(
            &path,
            "NEO4J_PASSWORD=pa$sword1\nNEO4J_USERNAME=\"ad\\$min\"\nTOKEN='x$y'\n",
        )
        .unwrap();
        let env = EnvFile::new(&path);

        let first = env.load_or_create().unwrap();
        let second = env.load_or_create().unwrap();

        for config in [&first, &second] {
            assert_eq!(config.password, "pa$sword1");
            assert_eq!(config.username, "ad$min");
            assert_eq!(config.extra, vec![("TOKEN".to_string(), "x$y".to_string())]);
        }
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("NEO4J_PASSWORD='pa$sword1'"));
        assert!(content.contains("NEO4J_AUTH='ad$min/pa$sword1'"));
    }

    #[test]
    fn test_quote_styles() {
        assert_eq!(quote("plain"), "plain");
        assert_eq!(quote("a$b"), "'a$b'");
        assert_eq!(quote("it's $5"), "\"it's \\$5\"");
        assert_eq!(literal_value("\"it's \\$5\""), "it's $5");
        assert_eq!(literal_value("a$b # note"), "a$b");
    }

    #[test]
    fn test_load_or_default_does_not_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvFile::new(dir.path().join(".env"));

        let config = env.load_or_default();

        assert_eq!(config, EnvConfig::defaults(Owner::current()));
        assert!(!env.path().exists());
    }

    #[test]
    fn test_write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        // A directory at the target path cannot be written as a file
        let path = dir.path().join("env-dir");
        fs::create_dir(&path).unwrap();

        let result = EnvFile::new(&path).load_or_create();
        assert!(result.is_err());
    }
}
