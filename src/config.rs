//! Configuration Module
//!
//! Loads the worker configuration from environment variables. The resulting
//! [`WorkerConfig`] is immutable and shared by the lifecycle manager, the
//! interceptor and the HTTP host, so several versions can live side by side.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;

// == Defaults ==
pub const DEFAULT_CACHE_NAME: &str = "todo-app-v2.0";
pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:8080";
pub const DEFAULT_ROOT_PATH: &str = "/todo-list-pwa/";
pub const DEFAULT_INDEX_PATH: &str = "/todo-list-pwa/index.html";
pub const DEFAULT_FALLBACK_ICON: &str = "/todo-list-pwa/icons/icon-192.png";
pub const DEFAULT_EXTENSION_SCHEME: &str = "chrome-extension";
pub const DEFAULT_SYNC_TAG: &str = "sync-data";

/// App shell assets pre-cached on install.
pub const DEFAULT_ASSETS: &[&str] = &[
    "/todo-list-pwa/",
    "/todo-list-pwa/index.html",
    "/todo-list-pwa/manifest.json",
    "/todo-list-pwa/icons/icon-192.png",
    "/todo-list-pwa/icons/icon-512.png",
];

/// Third-party hosts served cache-first without dynamic storage.
pub const DEFAULT_CDN_HOSTS: &[&str] = &[
    "cdn.jsdelivr.net",
    "cdnjs.cloudflare.com",
    "unpkg.com",
    "fonts.googleapis.com",
    "fonts.gstatic.com",
];

// == Install Policy ==
/// How install reacts to an asset that cannot be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallPolicy {
    /// Log and skip failing assets
    #[default]
    BestEffort,
    /// Abort install on the first failing asset, writing nothing
    AllOrNothing,
}

impl FromStr for InstallPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best-effort" | "best_effort" => Ok(Self::BestEffort),
            "all-or-nothing" | "all_or_nothing" | "atomic" => Ok(Self::AllOrNothing),
            other => bail!("unknown install policy '{}'", other),
        }
    }
}

// == Asset Manifest ==
/// Ordered list of asset paths pre-cached into one generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssetManifest {
    /// `{"assets": ["/a", "/b"]}`
    Object { assets: Vec<String> },
    /// `["/a", "/b"]`
    List(Vec<String>),
}

impl AssetManifest {
    /// Parses a manifest from its JSON text.
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("asset manifest is not valid JSON")
    }

    /// Reads and parses a manifest file.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read asset manifest {}", path.display()))?;
        Self::from_json(&text)
    }

    pub fn into_assets(self) -> Vec<String> {
        match self {
            AssetManifest::Object { assets } | AssetManifest::List(assets) => assets,
        }
    }
}

// == Worker Config ==
/// Worker configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Name of the current cache generation; bump it on every release
    pub cache_name: String,
    /// Origin of the app; only same-origin responses are cached dynamically
    pub origin: Url,
    /// App shell root page
    pub root_path: String,
    /// Main document served for offline navigations when the root is missing
    pub index_path: String,
    /// Icon served for image requests that miss the cache while offline
    pub fallback_icon: String,
    /// Assets pre-cached on install, in order
    pub assets: Vec<String>,
    /// Host patterns routed cache-first
    pub cdn_hosts: Vec<String>,
    /// URL scheme that is never intercepted
    pub extension_scheme: String,
    /// Sync tag that triggers the sync routine
    pub sync_tag: String,
    /// Reaction to failing assets during install
    pub install_policy: InstallPolicy,
    /// Maximum entries a single generation may hold
    pub max_entries: usize,
    /// Directory where generations persist across restarts (memory only when unset)
    pub cache_dir: Option<PathBuf>,
    /// HTTP proxy port
    pub server_port: u16,
    /// Optional network timeout in seconds (none by default)
    pub fetch_timeout: Option<u64>,
    /// Register the worker when the proxy starts
    pub auto_register: bool,
}

impl WorkerConfig {
    /// Creates a new WorkerConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_NAME` - Current generation name (default: todo-app-v2.0)
    /// - `UPSTREAM_ORIGIN` - App origin (default: http://127.0.0.1:8080)
    /// - `ROOT_PATH`, `INDEX_PATH`, `FALLBACK_ICON` - Offline fallbacks
    /// - `ASSET_MANIFEST_PATH` - JSON manifest file, takes precedence over
    /// - `ASSET_MANIFEST` - Comma separated asset paths
    /// - `CDN_HOSTS` - Comma separated cache-first hosts
    /// - `EXTENSION_SCHEME` - Scheme never intercepted (default: chrome-extension)
    /// - `SYNC_TAG` - Background sync tag (default: sync-data)
    /// - `INSTALL_POLICY` - best-effort | all-or-nothing (default: best-effort)
    /// - `MAX_ENTRIES` - Entries per generation (default: 1000)
    /// - `CACHE_DIR` - Snapshot directory for generations (default: none, memory only)
    /// - `SERVER_PORT` - Proxy port (default: 3000)
    /// - `FETCH_TIMEOUT_SECS` - Network timeout (default: none)
    /// - `AUTO_REGISTER` - Register on startup (default: true)
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let origin = match env::var("UPSTREAM_ORIGIN") {
            Ok(raw) => Url::parse(&raw).with_context(|| format!("invalid UPSTREAM_ORIGIN '{}'", raw))?,
            Err(_) => defaults.origin,
        };

        let assets = if let Ok(path) = env::var("ASSET_MANIFEST_PATH") {
            AssetManifest::from_json_file(path)?.into_assets()
        } else if let Ok(list) = env::var("ASSET_MANIFEST") {
            split_list(&list)
        } else {
            defaults.assets
        };

        let install_policy = match env::var("INSTALL_POLICY") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.install_policy,
        };

        Ok(Self {
            cache_name: env::var("CACHE_NAME").unwrap_or(defaults.cache_name),
            origin,
            root_path: env::var("ROOT_PATH").unwrap_or(defaults.root_path),
            index_path: env::var("INDEX_PATH").unwrap_or(defaults.index_path),
            fallback_icon: env::var("FALLBACK_ICON").unwrap_or(defaults.fallback_icon),
            assets,
            cdn_hosts: env::var("CDN_HOSTS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.cdn_hosts),
            extension_scheme: env::var("EXTENSION_SCHEME").unwrap_or(defaults.extension_scheme),
            sync_tag: env::var("SYNC_TAG").unwrap_or(defaults.sync_tag),
            install_policy,
            max_entries: env::var("MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_entries),
            cache_dir: env::var("CACHE_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
            fetch_timeout: env::var("FETCH_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok()),
            auto_register: env::var("AUTO_REGISTER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.auto_register),
        })
    }

    /// Same configuration under another generation name.
    pub fn with_cache_name(mut self, name: impl Into<String>) -> Self {
        self.cache_name = name.into();
        self
    }

    /// Resolves a path (or absolute URL) against the configured origin.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        Ok(self.origin.join(path)?)
    }

    pub fn root_url(&self) -> Result<Url> {
        self.resolve(&self.root_path)
    }

    pub fn index_url(&self) -> Result<Url> {
        self.resolve(&self.index_path)
    }

    pub fn fallback_icon_url(&self) -> Result<Url> {
        self.resolve(&self.fallback_icon)
    }

    /// True when `url` shares scheme, host and port with the app origin.
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }

    /// True when `url`'s host equals a CDN pattern or is a subdomain of one.
    pub fn is_cdn_host(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        self.cdn_hosts.iter().any(|pattern| {
            let pattern = pattern.trim_start_matches("*.");
            host == pattern || host.ends_with(&format!(".{}", pattern))
        })
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            origin: Url::parse(DEFAULT_ORIGIN).expect("default origin is a valid URL"),
            root_path: DEFAULT_ROOT_PATH.to_string(),
            index_path: DEFAULT_INDEX_PATH.to_string(),
            fallback_icon: DEFAULT_FALLBACK_ICON.to_string(),
            assets: DEFAULT_ASSETS.iter().map(|s| s.to_string()).collect(),
            cdn_hosts: DEFAULT_CDN_HOSTS.iter().map(|s| s.to_string()).collect(),
            extension_scheme: DEFAULT_EXTENSION_SCHEME.to_string(),
            sync_tag: DEFAULT_SYNC_TAG.to_string(),
            install_policy: InstallPolicy::BestEffort,
            max_entries: 1000,
            cache_dir: None,
            server_port: 3000,
            fetch_timeout: None,
            auto_register: true,
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
