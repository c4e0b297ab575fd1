use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use komori_core::interpreters::{merged_interpreters, InterpreterEntry};
use komori_core::types::{ExitOutcome, SupervisionConfig, SupervisorState};

use crate::relay::{self, LogSink};
use crate::resolver;
use crate::terminate;

/// How long a force-killed tree gets to be reaped before the supervisor
/// stops waiting and reports `Killed` anyway. The process may be leaked at
/// that point; best effort only.
const KILL_CONFIRM_WAIT: Duration = Duration::from_secs(2);

/// Supervises exactly one child process for its entire lifetime.
///
/// `supervise` consumes the supervisor, so one instance can only ever own
/// one child and produce one [`ExitOutcome`]. Control and observation happen
/// through a clonable [`Handle`].
pub struct Supervisor {
	config: SupervisionConfig,
	interpreters: HashMap<String, InterpreterEntry>,
	state_tx: watch::Sender<SupervisorState>,
	stop_tx: watch::Sender<bool>,
	stop_rx: watch::Receiver<bool>,
}

/// Clonable control handle: deliver a stop request, read the current state,
/// or wait (bounded) for the supervisor to report `Stopped`.
#[derive(Clone)]
pub struct Handle {
	stop: watch::Sender<bool>,
	state: watch::Receiver<SupervisorState>,
}

impl Handle {
	/// Request shutdown. Idempotent; harmless after the child already exited.
	pub fn stop(&self) {
		let _ = self.stop.send(true);
	}

	pub fn state(&self) -> SupervisorState {
		self.state.borrow().clone()
	}

	/// Wait until the supervisor reports `Stopped`, bounded by `bound`.
	/// Returns false if the bound elapsed first; the host may then abandon
	/// the supervisor rather than block forever.
	pub async fn wait_stopped(&mut self, bound: Duration) -> bool {
		let deadline = tokio::time::Instant::now() + bound;
		loop {
			if self.state.borrow().is_terminal() {
				return true;
			}
			match tokio::time::timeout_at(deadline, self.state.changed()).await {
				Ok(Ok(())) => continue,
				// sender dropped: supervise returned, state is final
				Ok(Err(_)) => return self.state.borrow().is_terminal(),
				Err(_) => return false,
			}
		}
	}
}

impl Supervisor {
	/// `interpreters` are host overrides merged over the built-in table at
	/// start time; pass an empty map for the defaults alone.
	pub fn new(config: SupervisionConfig, interpreters: HashMap<String, InterpreterEntry>) -> Self {
		let (state_tx, _) = watch::channel(SupervisorState::NotStarted);
		let (stop_tx, stop_rx) = watch::channel(false);
		Self {
			config,
			interpreters,
			state_tx,
			stop_tx,
			stop_rx,
		}
	}

	pub fn handle(&self) -> Handle {
		Handle {
			stop: self.stop_tx.clone(),
			state: self.state_tx.subscribe(),
		}
	}

	fn set_state(&self, state: SupervisorState) {
		let _ = self.state_tx.send(state);
	}

	fn fail_start(&self, cause: String) -> ExitOutcome {
		tracing::error!(command = %self.config.command, %cause, "failed to start child");
		self.set_state(SupervisorState::Stopped);
		ExitOutcome::FailedToStart(cause)
	}

	/// Run the child to completion and report the outcome.
	///
	/// Launch failures land directly in `Stopped` with `FailedToStart`. The
	/// outcome is only returned after both output relays finished or were
	/// cancelled, so log files are complete by the time the caller sees it.
	pub async fn supervise(self) -> ExitOutcome {
		self.set_state(SupervisorState::Starting);

		// queried once per start; merged fresh so host refreshes take effect
		// across restarts
		let interpreters = merged_interpreters(&self.interpreters);
		let resolved = match resolver::resolve(&self.config.command, &interpreters) {
			Ok(r) => r,
			Err(e) => return self.fail_start(e.to_string()),
		};

		let stdout_sink = open_sink(self.config.stdout_log.as_deref(), "stdout");
		let stderr_sink = open_sink(self.config.stderr_log.as_deref(), "stderr");

		let mut cmd = Command::new(&resolved.executable);
		cmd.args(resolver::split_args(&resolved.args))
			.stdin(Stdio::null())
			.stdout(stdio_for(&stdout_sink))
			.stderr(stdio_for(&stderr_sink))
			// own process group so the whole tree can be signalled at once
			.process_group(0);
		if let Some(dir) = &self.config.working_dir {
			cmd.current_dir(dir);
		}
		for (key, val) in &self.config.env {
			cmd.env(key, val);
		}

		let mut child = match cmd.spawn() {
			Ok(c) => c,
			Err(e) => return self.fail_start(format!("spawn failed: {}", e)),
		};

		let pid = child.id().unwrap_or(0);
		self.set_state(SupervisorState::Running { pid });
		tracing::info!(pid, executable = %resolved.executable, "child started");

		let (relay_cancel_tx, relay_cancel_rx) = watch::channel(false);
		let mut relays: Vec<JoinHandle<()>> = Vec::new();
		if let Some(sink) = stdout_sink {
			if let Some(stdout) = child.stdout.take() {
				relays.push(tokio::spawn(relay::relay_lines(
					stdout,
					sink,
					relay_cancel_rx.clone(),
				)));
			}
		}
		if let Some(sink) = stderr_sink {
			if let Some(stderr) = child.stderr.take() {
				relays.push(tokio::spawn(relay::relay_lines(
					stderr,
					sink,
					relay_cancel_rx.clone(),
				)));
			}
		}
		drop(relay_cancel_rx);

		let mut stop_rx = self.stop_rx.clone();
		let grace = self.config.stop_grace;
		let (outcome, reaped) =
			await_exit(&mut child, pid, grace, &mut stop_rx, &self.state_tx).await;

		if !reaped {
			// the child may still hold the pipes open; don't wait for EOF
			let _ = relay_cancel_tx.send(true);
		}
		for handle in relays {
			let _ = handle.await;
		}
		// handle released on every path, confirmed exit or not
		drop(child);

		self.set_state(SupervisorState::Stopped);
		match &outcome {
			ExitOutcome::Exited(0) => tracing::info!(pid, "child exited cleanly"),
			// nonzero is a warning, not a failure: plenty of commands exit
			// nonzero under expected shutdown
			ExitOutcome::Exited(code) => tracing::warn!(pid, code, "child exited nonzero"),
			ExitOutcome::Killed => tracing::info!(pid, "child terminated"),
			ExitOutcome::FailedToStart(_) => {}
		}
		outcome
	}
}

/// Race natural exit against the stop watch. Returns the outcome and whether
/// the child's exit was actually observed (false means it may be leaked).
async fn await_exit(
	child: &mut Child,
	pid: u32,
	grace: Duration,
	stop_rx: &mut watch::Receiver<bool>,
	state_tx: &watch::Sender<SupervisorState>,
) -> (ExitOutcome, bool) {
	// Re-check after wiring up: the child can exit in the window between
	// spawn and this wait, and a racing stop request must still observe the
	// real exit code.
	if let Ok(Some(status)) = child.try_wait() {
		return (natural_outcome(status), true);
	}
	if *stop_rx.borrow() {
		return stop_child(child, pid, grace, state_tx).await;
	}

	tokio::select! {
		status = child.wait() => match status {
			Ok(status) => (natural_outcome(status), true),
			Err(e) => {
				tracing::warn!(pid, error = %e, "wait on child failed");
				(ExitOutcome::Killed, false)
			}
		},
		_ = stop_rx.changed() => stop_child(child, pid, grace, state_tx).await,
	}
}

async fn stop_child(
	child: &mut Child,
	pid: u32,
	grace: Duration,
	state_tx: &watch::Sender<SupervisorState>,
) -> (ExitOutcome, bool) {
	let _ = state_tx.send(SupervisorState::Stopping);
	tracing::info!(pid, "stop requested, signalling process tree");
	terminate::signal_tree(pid);

	match tokio::time::timeout(grace, child.wait()).await {
		Ok(Ok(status)) => match status.code() {
			// an exit code means the child finished on its own terms before
			// the signal took effect; the code wins over Killed
			Some(code) => (ExitOutcome::Exited(code), true),
			None => (ExitOutcome::Killed, true),
		},
		Ok(Err(e)) => {
			tracing::warn!(pid, error = %e, "wait on child failed during stop");
			(ExitOutcome::Killed, false)
		}
		Err(_) => {
			tracing::warn!(pid, "grace period elapsed, force-killing process tree");
			terminate::kill_tree(pid);
			match tokio::time::timeout(KILL_CONFIRM_WAIT, child.wait()).await {
				Ok(Ok(_)) => (ExitOutcome::Killed, true),
				_ => {
					tracing::warn!(pid, "child never confirmed exit and may be leaked");
					(ExitOutcome::Killed, false)
				}
			}
		}
	}
}

fn natural_outcome(status: std::process::ExitStatus) -> ExitOutcome {
	ExitOutcome::Exited(status.code().unwrap_or(-1))
}

fn open_sink(path: Option<&Path>, stream: &str) -> Option<LogSink> {
	let path = path?;
	match LogSink::open(path) {
		Ok(sink) => Some(sink),
		Err(e) => {
			tracing::warn!(
				path = %path.display(),
				stream,
				error = %e,
				"log sink unavailable, stream will not be captured"
			);
			None
		}
	}
}

fn stdio_for(sink: &Option<LogSink>) -> Stdio {
	if sink.is_some() {
		Stdio::piped()
	} else {
		Stdio::null()
	}
}
