use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Everything the supervisor needs to run one child process.
///
/// Immutable input: the host builds it once, the supervisor only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisionConfig {
	/// Raw command line, resolved by the command resolver before launch.
	pub command: String,
	/// Working directory for the child. Inherited from the supervisor if unset.
	pub working_dir: Option<PathBuf>,
	/// Environment overrides. Entries replace or add to the inherited
	/// environment; unspecified inherited entries are never removed.
	#[serde(default)]
	pub env: HashMap<String, String>,
	/// Append-only log file for the child's stdout. Unset means the stream
	/// is not captured.
	pub stdout_log: Option<PathBuf>,
	/// Append-only log file for the child's stderr.
	pub stderr_log: Option<PathBuf>,
	/// How long to wait for the process tree to die after a stop request
	/// before escalating to SIGKILL.
	#[serde(default = "default_stop_grace", with = "secs")]
	pub stop_grace: Duration,
}

fn default_stop_grace() -> Duration {
	Duration::from_secs(10)
}

mod secs {
	use serde::{Deserialize, Deserializer, Serializer};
	use std::time::Duration;

	pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
		s.serialize_u64(d.as_secs())
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
		Ok(Duration::from_secs(u64::deserialize(d)?))
	}
}

impl SupervisionConfig {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			working_dir: None,
			env: HashMap::new(),
			stdout_log: None,
			stderr_log: None,
			stop_grace: default_stop_grace(),
		}
	}
}

/// Supervision state machine. `Starting` never goes back to `NotStarted`;
/// a failed launch lands directly in `Stopped`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SupervisorState {
	NotStarted,
	Starting,
	Running { pid: u32 },
	Stopping,
	Stopped,
}

impl SupervisorState {
	pub fn is_running(&self) -> bool {
		matches!(self, SupervisorState::Running { .. })
	}

	pub fn is_terminal(&self) -> bool {
		matches!(self, SupervisorState::Stopped)
	}
}

/// Final result of one supervision run. Produced exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExitOutcome {
	/// The child exited on its own with this code.
	Exited(i32),
	/// The child was terminated by the supervisor (or died to a signal
	/// during shutdown).
	Killed,
	/// The child never launched.
	FailedToStart(String),
}

impl std::fmt::Display for ExitOutcome {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ExitOutcome::Exited(code) => write!(f, "exited with code {}", code),
			ExitOutcome::Killed => write!(f, "killed"),
			ExitOutcome::FailedToStart(cause) => write!(f, "failed to start: {}", cause),
		}
	}
}
