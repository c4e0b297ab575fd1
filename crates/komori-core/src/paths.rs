use std::path::PathBuf;

const APP_NAME: &str = "komori";

/// Where service definitions live: `$XDG_CONFIG_HOME/komori` or
/// `~/.config/komori`.
pub fn config_dir() -> PathBuf {
	if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
		PathBuf::from(dir).join(APP_NAME)
	} else if let Some(home) = home_dir() {
		home.join(".config").join(APP_NAME)
	} else {
		PathBuf::from("/tmp").join(APP_NAME).join("config")
	}
}

/// Where default log files land: `$XDG_STATE_HOME/komori/logs` or
/// `~/.local/state/komori/logs`.
pub fn log_dir() -> PathBuf {
	state_dir().join("logs")
}

pub fn state_dir() -> PathBuf {
	if let Ok(dir) = std::env::var("XDG_STATE_HOME") {
		PathBuf::from(dir).join(APP_NAME)
	} else if let Some(home) = home_dir() {
		home.join(".local").join("state").join(APP_NAME)
	} else {
		PathBuf::from("/tmp").join(APP_NAME)
	}
}

/// User systemd unit directory (`~/.config/systemd/user`).
pub fn systemd_unit_dir() -> PathBuf {
	if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
		PathBuf::from(dir).join("systemd").join("user")
	} else if let Some(home) = home_dir() {
		home.join(".config").join("systemd").join("user")
	} else {
		PathBuf::from("/tmp").join("systemd-user")
	}
}

fn home_dir() -> Option<PathBuf> {
	std::env::var("HOME").ok().map(PathBuf::from)
}
