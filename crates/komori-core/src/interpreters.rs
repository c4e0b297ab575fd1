use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How to launch a script with a given extension: an interpreter binary and
/// an argument template. `{file}` in the template is replaced with the quoted
/// script path at resolve time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpreterEntry {
	pub executable: String,
	pub args: String,
}

impl InterpreterEntry {
	pub fn new(executable: impl Into<String>, args: impl Into<String>) -> Self {
		Self {
			executable: executable.into(),
			args: args.into(),
		}
	}
}

/// Built-in extension → interpreter table. Keys are lowercase and include
/// the leading dot.
pub fn default_interpreters() -> HashMap<String, InterpreterEntry> {
	let mut map = HashMap::new();
	map.insert(".ps1".into(), InterpreterEntry::new("powershell.exe", "-NoProfile -File {file}"));
	map.insert(".bat".into(), InterpreterEntry::new("cmd.exe", "/c {file}"));
	map.insert(".cmd".into(), InterpreterEntry::new("cmd.exe", "/c {file}"));
	map.insert(".py".into(), InterpreterEntry::new("python", "{file}"));
	map.insert(".sh".into(), InterpreterEntry::new("sh", "{file}"));
	map
}

/// Defaults overlaid with host-supplied entries; the override wins on key
/// collision. Returns a plain value so the resolver stays a pure function of
/// its inputs (no global cache).
pub fn merged_interpreters(
	custom: &HashMap<String, InterpreterEntry>,
) -> HashMap<String, InterpreterEntry> {
	let mut map = default_interpreters();
	for (ext, entry) in custom {
		map.insert(ext.to_lowercase(), entry.clone());
	}
	map
}
