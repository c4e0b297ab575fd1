use std::path::{Path, PathBuf};
use std::process::Command;

use komori_core::paths;

/// Render the user unit that makes systemd start `komori run <name>` at boot
/// and route start/stop through systemctl. The supervisor handles the child
/// tree itself, so the unit only ever signals the wrapper process.
pub fn render_unit(name: &str, wrapper_bin: &Path) -> String {
	format!(
		"[Unit]\n\
		Description=komori wrapped service: {name}\n\
		After=network.target\n\
		\n\
		[Service]\n\
		Type=exec\n\
		ExecStart={bin} run {name}\n\
		Restart=no\n\
		TimeoutStopSec=30\n\
		KillMode=mixed\n\
		\n\
		[Install]\n\
		WantedBy=default.target\n",
		name = name,
		bin = wrapper_bin.display(),
	)
}

pub fn unit_name(service: &str) -> String {
	format!("komori-{}.service", service)
}

pub fn unit_path(service: &str) -> PathBuf {
	paths::systemd_unit_dir().join(unit_name(service))
}

pub fn install_unit(service: &str) -> Result<(), String> {
	let bin = std::env::current_exe().map_err(|e| format!("cannot locate own binary: {}", e))?;
	let dir = paths::systemd_unit_dir();
	std::fs::create_dir_all(&dir).map_err(|e| format!("cannot create {}: {}", dir.display(), e))?;
	let path = unit_path(service);
	std::fs::write(&path, render_unit(service, &bin))
		.map_err(|e| format!("cannot write {}: {}", path.display(), e))?;

	systemctl(&["daemon-reload"])?;
	systemctl(&["enable", &unit_name(service)])?;
	Ok(())
}

pub fn remove_unit(service: &str) -> Result<(), String> {
	let unit = unit_name(service);
	// stop/disable may legitimately fail when the unit was never loaded
	let _ = systemctl(&["stop", &unit]);
	let _ = systemctl(&["disable", &unit]);
	let path = unit_path(service);
	if path.exists() {
		std::fs::remove_file(&path)
			.map_err(|e| format!("cannot remove {}: {}", path.display(), e))?;
	}
	systemctl(&["daemon-reload"])
}

pub fn is_active(service: &str) -> bool {
	Command::new("systemctl")
		.args(["--user", "is-active", "--quiet", &unit_name(service)])
		.status()
		.map(|s| s.success())
		.unwrap_or(false)
}

pub fn systemctl(args: &[&str]) -> Result<(), String> {
	let output = Command::new("systemctl")
		.arg("--user")
		.args(args)
		.output()
		.map_err(|e| format!("failed to run systemctl: {}", e))?;
	if output.status.success() {
		Ok(())
	} else {
		Err(format!(
			"systemctl {} failed: {}",
			args.join(" "),
			String::from_utf8_lossy(&output.stderr).trim()
		))
	}
}
