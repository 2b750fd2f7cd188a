//! The target manifest: which sample apps exist and what each must serve.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;

use crate::error::HarnessError;
use crate::ports::CommandSpec;
use crate::probe::VerificationSpec;

/// Manifest file used when none is given.
pub const DEFAULT_MANIFEST: &str = "appcheck.yaml";

/// All targets known to the harness.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    /// Targets in declaration order.
    pub targets: Vec<Target>,
}

/// One sample application.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Target {
    /// Name; also the deployed version and the log file prefix.
    pub name: String,
    /// Directory of the app; defaults to `name` next to the manifest.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Program that runs the app locally.
    #[serde(default = "default_cmd")]
    pub cmd: String,
    /// Arguments for `cmd`.
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Text the response body must contain.
    pub msg: String,
    /// Status accepted in addition to 200.
    #[serde(default)]
    pub code: Option<u16>,
    /// Regular expression the body must match.
    #[serde(default)]
    pub pattern: Option<String>,
    /// Whether a deployment receives traffic.
    #[serde(default)]
    pub promote: bool,
}

fn default_cmd() -> String {
    "node".to_string()
}

fn default_args() -> Vec<String> {
    vec!["app.js".to_string()]
}

impl Target {
    /// A target with default command and no optional checks.
    pub fn new(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            cmd: default_cmd(),
            args: default_args(),
            msg: msg.into(),
            code: None,
            pattern: None,
            promote: false,
        }
    }

    /// Directory the target's processes run in.
    #[must_use]
    pub fn dir(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| PathBuf::from(&self.name))
    }

    /// Command that starts the app locally.
    #[must_use]
    pub fn local_command(&self) -> CommandSpec {
        CommandSpec::new(&self.cmd, &self.args, self.dir())
    }

    /// What a response from this target must look like.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Manifest`] if `pattern` is not a valid regex.
    pub fn verification_spec(&self) -> Result<VerificationSpec, HarnessError> {
        let mut spec = VerificationSpec::new(&self.name, &self.msg);
        if let Some(code) = self.code {
            spec = spec.with_alternate_status(code);
        }
        if let Some(pattern) = &self.pattern {
            let re = Regex::new(pattern).map_err(|e| {
                HarnessError::Manifest(format!("{}: invalid pattern `{pattern}`: {e}", self.name))
            })?;
            spec = spec.with_body_pattern(re);
        }
        Ok(spec)
    }
}

impl Manifest {
    /// Reads and checks the manifest at `path`.
    ///
    /// Relative target paths are resolved against the manifest's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, repeats
    /// a target name, or carries an invalid pattern.
    pub fn load(path: &Path) -> Result<Self, HarnessError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::Manifest(format!("Failed to read manifest {}: {e}", path.display()))
        })?;
        let mut manifest = Self::parse(&content).map_err(|e| match e {
            HarnessError::Manifest(msg) => {
                HarnessError::Manifest(format!("{}: {msg}", path.display()))
            }
            other => other,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for target in &mut manifest.targets {
            let dir = target.dir();
            if dir.is_relative() {
                target.path = Some(base.join(dir));
            }
        }
        Ok(manifest)
    }

    /// Parses manifest YAML.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed YAML, duplicate names or invalid patterns.
    pub fn parse(yaml: &str) -> Result<Self, HarnessError> {
        let manifest: Self = serde_yaml::from_str(yaml)
            .map_err(|e| HarnessError::Manifest(format!("invalid manifest: {e}")))?;
        for (i, target) in manifest.targets.iter().enumerate() {
            if manifest.targets[..i].iter().any(|t| t.name == target.name) {
                return Err(HarnessError::Manifest(format!(
                    "target `{}` is declared more than once",
                    target.name
                )));
            }
            target.verification_spec()?;
        }
        Ok(manifest)
    }

    /// Looks up a target by name.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Manifest`] listing the known names.
    pub fn target(&self, name: &str) -> Result<&Target, HarnessError> {
        self.targets.iter().find(|t| t.name == name).ok_or_else(|| {
            let known: Vec<&str> = self.targets.iter().map(|t| t.name.as_str()).collect();
            HarnessError::Manifest(format!(
                "unknown target `{name}`; known targets: {}",
                known.join(", ")
            ))
        })
    }
}
