//! Layered settings and the immutable harness configuration.
//!
//! Settings resolve from, highest priority first: `--set KEY=VALUE`
//! overrides, environment variables, a JSON config file, built-in defaults.
//! An empty value counts as unset.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use figment::providers::{Env, Format, Json, Serialized};
use figment::{Figment, Provider};
use serde::Deserialize;

use crate::error::HarnessError;
use crate::probe::DEFAULT_MAX_ATTEMPTS;

/// Keys read from the environment and the config file.
pub const RECOGNIZED_KEYS: &[&str] = &[
    "CLOUD_BUCKET",
    "DATA_BACKEND",
    "GCLOUD_PROJECT",
    "MEMCACHE_URL",
    "MONGO_URL",
    "MONGO_COLLECTION",
    "MYSQL_USER",
    "MYSQL_PASSWORD",
    "MYSQL_HOST",
    "OAUTH2_CLIENT_ID",
    "OAUTH2_CLIENT_SECRET",
    "OAUTH2_CALLBACK",
    "PORT",
    "SECRET",
];

/// Keys that are never printed.
pub const SECRET_KEYS: &[&str] = &["MYSQL_PASSWORD", "OAUTH2_CLIENT_SECRET", "SECRET"];

/// Config file used when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

const DEFAULTS: &[(&str, &str)] = &[
    ("DATA_BACKEND", "datastore"),
    ("MEMCACHE_URL", "127.0.0.1:11211"),
    ("MONGO_URL", "mongodb://localhost:27017"),
    ("MONGO_COLLECTION", "books"),
    ("PORT", "8080"),
];

const ALWAYS_REQUIRED: &[&str] =
    &["GCLOUD_PROJECT", "CLOUD_BUCKET", "OAUTH2_CLIENT_ID", "OAUTH2_CLIENT_SECRET"];

/// Storage backend the applications under test are configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBackend {
    /// Cloud Datastore; needs nothing extra.
    Datastore,
    /// Cloud SQL; needs MySQL credentials.
    CloudSql,
    /// MongoDB; needs a connection URL and collection.
    MongoDb,
}

impl DataBackend {
    fn parse(value: &str) -> Result<Self, HarnessError> {
        match value {
            "datastore" => Ok(Self::Datastore),
            "cloudsql" => Ok(Self::CloudSql),
            "mongodb" => Ok(Self::MongoDb),
            other => Err(HarnessError::Config(format!(
                "Unknown DATA_BACKEND `{other}`; expected datastore, cloudsql or mongodb"
            ))),
        }
    }

    fn required_keys(self) -> &'static [&'static str] {
        match self {
            Self::Datastore => &[],
            Self::CloudSql => &["MYSQL_USER", "MYSQL_PASSWORD", "MYSQL_HOST"],
            Self::MongoDb => &["MONGO_URL", "MONGO_COLLECTION"],
        }
    }
}

/// Where settings come from, highest priority first.
#[derive(Debug, Clone, Default)]
pub struct SettingsSources {
    /// `KEY=VALUE` overrides from the command line.
    pub overrides: Vec<(String, String)>,
    /// Config file to read, if any.
    pub config_file: Option<PathBuf>,
}

impl SettingsSources {
    /// Uses `config_file` when given, else `config.json` if it exists.
    #[must_use]
    pub fn new(overrides: Vec<(String, String)>, config_file: Option<PathBuf>) -> Self {
        let config_file = config_file.or_else(|| {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            default.exists().then_some(default)
        });
        Self { overrides, config_file }
    }
}

/// Resolved key/value settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    values: BTreeMap<String, String>,
}

/// A setting as it appears in any layer. The config file and the
/// environment may both carry numbers or flags.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
    Flag(bool),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Flag(b) => write!(f, "{b}"),
        }
    }
}

impl Settings {
    /// Resolves settings from `sources` and the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    pub fn load(sources: &SettingsSources) -> Result<Self, HarnessError> {
        Self::resolve(sources, Env::raw().only(RECOGNIZED_KEYS).lowercase(false))
    }

    /// Resolves settings with `env` as the environment layer.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or a layer holds
    /// something other than a scalar.
    pub fn resolve(sources: &SettingsSources, env: impl Provider) -> Result<Self, HarnessError> {
        let defaults: BTreeMap<&str, &str> = DEFAULTS.iter().copied().collect();
        let mut figment = Figment::from(Serialized::defaults(defaults));

        if let Some(path) = &sources.config_file {
            if !path.is_file() {
                return Err(HarnessError::Config(format!(
                    "Failed to read config file {}: not a file",
                    path.display()
                )));
            }
            figment = figment.merge(Json::file(path));
        }

        let overrides: BTreeMap<&str, &str> =
            sources.overrides.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let layered: BTreeMap<String, Scalar> = figment
            .merge(env)
            .merge(Serialized::defaults(overrides))
            .extract()
            .map_err(|e| HarnessError::Config(format!("Failed to resolve settings: {e}")))?;

        let values = layered
            .into_iter()
            .map(|(key, value)| (key, value.to_string()))
            .filter(|(_, value)| !value.is_empty())
            .collect();
        Ok(Self { values })
    }

    /// Builds settings directly from pairs, without defaults.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self { values: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }

    /// Value of `key`, if set and non-empty.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Value of `key`, or the standard "you must set" error.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] if `key` is unset.
    pub fn require(&self, key: &str) -> Result<&str, HarnessError> {
        self.get(key).ok_or_else(|| {
            HarnessError::Config(format!(
                "You must set the {key} environment variable or add it to config.json!"
            ))
        })
    }

    /// Checks the always-required keys and those of the selected backend.
    ///
    /// # Errors
    ///
    /// Returns the first missing key, or an unknown backend.
    pub fn validate(&self) -> Result<DataBackend, HarnessError> {
        for key in ALWAYS_REQUIRED {
            self.require(key)?;
        }
        let backend = DataBackend::parse(self.get("DATA_BACKEND").unwrap_or("datastore"))?;
        for key in backend.required_keys() {
            self.require(key)?;
        }
        Ok(backend)
    }

    /// Resolved pairs with secret values masked.
    #[must_use]
    pub fn redacted(&self) -> Vec<(String, String)> {
        self.values
            .iter()
            .map(|(k, v)| {
                let shown = if SECRET_KEYS.contains(&k.as_str()) { "********" } else { v };
                (k.clone(), shown.to_string())
            })
            .collect()
    }
}

/// Fixed delays of the workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Wait between starting a local app and probing it.
    pub startup_grace: Duration,
    /// Wait between killing a local app and reporting.
    pub shutdown_drain: Duration,
    /// Wait between a finished deployment and probing it.
    pub warm_up: Duration,
    /// Longest gap between checks while waiting for the deployment log.
    pub log_poll_interval: Duration,
    /// How long a finished command waits for a deployment log to be saved.
    pub log_settle: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            startup_grace: Duration::from_millis(3000),
            shutdown_drain: Duration::from_millis(1000),
            warm_up: Duration::from_millis(5000),
            log_poll_interval: Duration::from_millis(1000),
            log_settle: Duration::from_secs(10),
        }
    }
}

/// Everything a workflow needs to know, resolved once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Cloud project deployments go to.
    pub project_id: String,
    /// Suppresses echoing child stderr.
    pub ci_mode: bool,
    /// Directory deployment logs are written to.
    pub log_dir: PathBuf,
    /// Port local apps listen on.
    pub local_port: u16,
    /// Probe attempt budget.
    pub max_attempts: u32,
    /// Workflow delays.
    pub timings: Timings,
    /// Dependency installer.
    pub install_program: String,
    /// Deployment CLI.
    pub deploy_program: String,
}

impl HarnessConfig {
    /// Derives the configuration from validated settings.
    ///
    /// # Errors
    ///
    /// Returns an error if `GCLOUD_PROJECT` is unset or `PORT` is not a port number.
    pub fn from_settings(settings: &Settings, ci_mode: bool) -> Result<Self, HarnessError> {
        let project_id = settings.require("GCLOUD_PROJECT")?.to_string();
        let port = settings.get("PORT").unwrap_or("8080");
        let local_port = port
            .parse()
            .map_err(|_| HarnessError::Config(format!("PORT must be a port number, got `{port}`")))?;
        Ok(Self {
            project_id,
            ci_mode,
            log_dir: PathBuf::from("."),
            local_port,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timings: Timings::default(),
            install_program: "npm".to_string(),
            deploy_program: "gcloud".to_string(),
        })
    }

    /// Writes deployment logs to `dir`.
    #[must_use]
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    /// URL of a locally running app.
    #[must_use]
    pub fn local_url(&self) -> String {
        format!("http://localhost:{}", self.local_port)
    }

    /// Versioned URL of a deployed target.
    #[must_use]
    pub fn deployed_url(&self, target: &str) -> String {
        format!("http://{target}-dot-{}.appspot.com", self.project_id)
    }
}

/// Returns `true` when running under a CI service.
pub fn ci_detected<F>(env: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    ["TRAVIS", "CI"].iter().any(|key| env(key).is_some_and(|v| !v.is_empty()))
}

/// Splits a `KEY=VALUE` argument.
///
/// # Errors
///
/// Returns a message when there is no `=` or the key is empty.
pub fn parse_override(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |key| map.get(key).cloned()
    }

    fn env_layer(pairs: &[(&str, &str)]) -> Serialized<BTreeMap<String, String>> {
        Serialized::defaults(
            pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect(),
        )
    }

    fn no_file() -> SettingsSources {
        SettingsSources::default()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("GCLOUD_PROJECT", "demo-project"),
            ("CLOUD_BUCKET", "demo-bucket"),
            ("OAUTH2_CLIENT_ID", "client"),
            ("OAUTH2_CLIENT_SECRET", "shh"),
        ]
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("appcheck-config-{name}-{}", std::process::id()))
    }

    #[test]
    fn defaults_fill_unset_keys() {
        let settings = Settings::resolve(&no_file(), env_layer(&[])).unwrap();
        assert_eq!(settings.get("DATA_BACKEND"), Some("datastore"));
        assert_eq!(settings.get("PORT"), Some("8080"));
        assert_eq!(settings.get("MONGO_COLLECTION"), Some("books"));
        assert_eq!(settings.get("GCLOUD_PROJECT"), None);
    }

    #[test]
    fn layers_apply_in_priority_order() {
        let path = temp_path("layers.json");
        std::fs::write(&path, r#"{"PORT": 3000, "GCLOUD_PROJECT": "from-file", "SECRET": "file"}"#)
            .unwrap();
        let sources = SettingsSources {
            overrides: vec![("PORT".into(), "9090".into())],
            config_file: Some(path.clone()),
        };

        let settings =
            Settings::resolve(&sources, env_layer(&[("PORT", "4000"), ("SECRET", "env")])).unwrap();

        assert_eq!(settings.get("PORT"), Some("9090"));
        assert_eq!(settings.get("SECRET"), Some("env"));
        assert_eq!(settings.get("GCLOUD_PROJECT"), Some("from-file"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn numbers_and_flags_read_as_text() {
        let path = temp_path("scalars.json");
        std::fs::write(&path, r#"{"PORT": 3000, "SECRET": true}"#).unwrap();
        let sources = SettingsSources { overrides: vec![], config_file: Some(path.clone()) };

        let settings = Settings::resolve(&sources, env_layer(&[])).unwrap();

        assert_eq!(settings.get("PORT"), Some("3000"));
        assert_eq!(settings.get("SECRET"), Some("true"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let sources =
            SettingsSources { overrides: vec![], config_file: Some(temp_path("absent.json")) };
        let err = Settings::resolve(&sources, env_layer(&[])).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn missing_required_key_names_it() {
        let settings = Settings::from_pairs([("GCLOUD_PROJECT", "p")]);
        let err = settings.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "You must set the CLOUD_BUCKET environment variable or add it to config.json!"
        );
    }

    #[test]
    fn backend_specific_keys_are_required() {
        let mut pairs = required();
        pairs.push(("DATA_BACKEND", "cloudsql"));
        pairs.push(("MYSQL_USER", "root"));
        let err = Settings::from_pairs(pairs.clone()).validate().unwrap_err();
        assert!(err.to_string().contains("MYSQL_PASSWORD"));

        pairs.push(("MYSQL_PASSWORD", "pw"));
        pairs.push(("MYSQL_HOST", "10.0.0.1"));
        assert_eq!(Settings::from_pairs(pairs).validate().unwrap(), DataBackend::CloudSql);
    }

    #[test]
    fn empty_values_count_as_unset() {
        let env: Vec<_> = required()
            .into_iter()
            .map(|(k, v)| if k == "CLOUD_BUCKET" { (k, "") } else { (k, v) })
            .collect();
        let settings = Settings::resolve(&no_file(), env_layer(&env)).unwrap();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let mut pairs = required();
        pairs.push(("DATA_BACKEND", "redis"));
        let err = Settings::from_pairs(pairs).validate().unwrap_err();
        assert!(err.to_string().contains("redis"));
    }

    #[test]
    fn harness_config_urls() {
        let mut pairs = required();
        pairs.push(("PORT", "8081"));
        let config = HarnessConfig::from_settings(&Settings::from_pairs(pairs), false).unwrap();
        assert_eq!(config.local_url(), "http://localhost:8081");
        assert_eq!(
            config.deployed_url("1-hello-world"),
            "http://1-hello-world-dot-demo-project.appspot.com"
        );
        assert_eq!(config.max_attempts, 8);
    }

    #[test]
    fn bad_port_is_a_config_error() {
        let mut pairs = required();
        pairs.push(("PORT", "eighty"));
        let err = HarnessConfig::from_settings(&Settings::from_pairs(pairs), false).unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
    }

    #[test]
    fn secrets_are_redacted() {
        let settings = Settings::from_pairs([("SECRET", "keyboardcat"), ("PORT", "8080")]);
        let shown = settings.redacted();
        assert!(shown.contains(&("SECRET".to_string(), "********".to_string())));
        assert!(shown.contains(&("PORT".to_string(), "8080".to_string())));
    }

    #[test]
    fn ci_detection_and_overrides() {
        assert!(ci_detected(env_from(&[("TRAVIS", "true")])));
        assert!(!ci_detected(env_from(&[("CI", "")])));
        assert_eq!(parse_override("PORT=1").unwrap(), ("PORT".to_string(), "1".to_string()));
        assert!(parse_override("=1").is_err());
        assert!(parse_override("PORT").is_err());
    }
}
