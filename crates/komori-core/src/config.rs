use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use crate::interpreters::InterpreterEntry;
use crate::paths;
use crate::types::SupervisionConfig;

/// A registered service: one command line wrapped as a supervised process.
/// Persisted as JSON, one file per service under the config dir.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDefinition {
	pub name: String,
	pub command: String,
	#[serde(default)]
	pub dir: Option<PathBuf>,
	#[serde(default)]
	pub env: HashMap<String, String>,
	#[serde(default)]
	pub stdout_log: Option<PathBuf>,
	#[serde(default)]
	pub stderr_log: Option<PathBuf>,
	#[serde(default = "default_stop_grace_secs")]
	pub stop_grace_secs: u64,
	/// Extension → interpreter overrides merged over the built-in table.
	#[serde(default)]
	pub interpreters: HashMap<String, InterpreterEntry>,
}

fn default_stop_grace_secs() -> u64 {
	10
}

impl ServiceDefinition {
	pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			command: command.into(),
			dir: None,
			env: HashMap::new(),
			stdout_log: None,
			stderr_log: None,
			stop_grace_secs: default_stop_grace_secs(),
			interpreters: HashMap::new(),
		}
	}

	/// Turn the stored definition into supervisor input. Unset log paths
	/// default into the state log dir so `install` without flags still
	/// captures output.
	pub fn into_supervision_config(self) -> SupervisionConfig {
		let log_dir = paths::log_dir().join(&self.name);
		SupervisionConfig {
			stdout_log: self
				.stdout_log
				.or_else(|| Some(log_dir.join(format!("{}.out.log", self.name)))),
			stderr_log: self
				.stderr_log
				.or_else(|| Some(log_dir.join(format!("{}.err.log", self.name)))),
			command: self.command,
			working_dir: self.dir,
			env: self.env,
			stop_grace: std::time::Duration::from_secs(self.stop_grace_secs),
		}
	}
}

#[derive(Debug)]
pub enum ConfigError {
	/// No definition file for this service name.
	NotFound(String),
	Io(io::Error),
	/// Definition file exists but is not valid JSON.
	Parse(String),
}

impl std::fmt::Display for ConfigError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ConfigError::NotFound(name) => write!(f, "unknown service: {}", name),
			ConfigError::Io(e) => write!(f, "io error: {}", e),
			ConfigError::Parse(e) => write!(f, "invalid service definition: {}", e),
		}
	}
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
	fn from(e: io::Error) -> Self {
		ConfigError::Io(e)
	}
}

fn definition_path(dir: &std::path::Path, name: &str) -> PathBuf {
	dir.join(format!("{}.json", name))
}

pub fn save_definition(def: &ServiceDefinition) -> Result<(), ConfigError> {
	save_definition_in(&paths::config_dir(), def)
}

pub fn save_definition_in(
	dir: &std::path::Path,
	def: &ServiceDefinition,
) -> Result<(), ConfigError> {
	std::fs::create_dir_all(dir)?;
	let json = serde_json::to_string_pretty(def).map_err(|e| ConfigError::Parse(e.to_string()))?;
	std::fs::write(definition_path(dir, &def.name), json)?;
	Ok(())
}

pub fn load_definition(name: &str) -> Result<ServiceDefinition, ConfigError> {
	load_definition_in(&paths::config_dir(), name)
}

pub fn load_definition_in(
	dir: &std::path::Path,
	name: &str,
) -> Result<ServiceDefinition, ConfigError> {
	let path = definition_path(dir, name);
	if !path.exists() {
		return Err(ConfigError::NotFound(name.to_string()));
	}
	let content = std::fs::read_to_string(&path)?;
	serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
}

pub fn remove_definition(name: &str) -> Result<(), ConfigError> {
	let path = definition_path(&paths::config_dir(), name);
	if !path.exists() {
		return Err(ConfigError::NotFound(name.to_string()));
	}
	std::fs::remove_file(path)?;
	Ok(())
}

/// All registered service names, sorted.
pub fn list_definitions() -> Vec<String> {
	let dir = paths::config_dir();
	let entries = match std::fs::read_dir(&dir) {
		Ok(e) => e,
		Err(_) => return Vec::new(),
	};
	let mut names: Vec<String> = entries
		.flatten()
		.filter_map(|e| {
			let path = e.path();
			if path.extension().and_then(|x| x.to_str()) != Some("json") {
				return None;
			}
			path.file_stem().and_then(|s| s.to_str()).map(String::from)
		})
		.collect();
	names.sort();
	names
}
