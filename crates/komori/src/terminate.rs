use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;

/// Ask the whole process tree to exit: SIGTERM to the child's process group
/// (the supervisor spawns children with `process_group(0)`, so the group id
/// is the child's pid). Falls back to signalling the root process alone when
/// the group cannot be addressed; descendants may survive that path, which
/// is logged rather than hidden. Returns whether any signal was delivered.
/// Never fails upward, and signalling an already-exited pid is a no-op.
pub fn signal_tree(pid: u32) -> bool {
	deliver(pid, Signal::SIGTERM)
}

/// Forceful variant, used once the grace period has elapsed.
pub fn kill_tree(pid: u32) -> bool {
	deliver(pid, Signal::SIGKILL)
}

fn deliver(pid: u32, signal: Signal) -> bool {
	// pid 0 would address our own process group
	if pid == 0 {
		return false;
	}
	let target = Pid::from_raw(pid as i32);
	match killpg(target, signal) {
		Ok(()) => true,
		// process (group) already gone
		Err(Errno::ESRCH) => false,
		Err(e) => {
			tracing::warn!(
				pid,
				?signal,
				error = %e,
				"process group signal failed, signalling root process only"
			);
			kill(target, signal).is_ok()
		}
	}
}
