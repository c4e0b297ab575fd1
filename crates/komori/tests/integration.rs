use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use komori::supervisor::Handle;
use komori::{terminate, ExitOutcome, SupervisionConfig, Supervisor, SupervisorState};

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

fn temp_dir(name: &str) -> PathBuf {
	let n = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
	fresh_dir(std::env::temp_dir().join(format!("komori-test-{}-{}", n, name)))
}

// sinks append, so stale files from a previous run of this suite would leak
// into the log assertions; every test dir starts empty
fn fresh_dir(dir: PathBuf) -> PathBuf {
	let _ = std::fs::remove_dir_all(&dir);
	let _ = std::fs::create_dir_all(&dir);
	dir
}

#[test]
fn test_dirs_never_carry_stale_state() {
	let dir = std::env::temp_dir().join("komori-test-stale");
	let _ = std::fs::create_dir_all(&dir);
	std::fs::write(dir.join("out.log"), "stale\n").unwrap();

	let dir = fresh_dir(dir);
	assert!(dir.exists());
	assert!(!dir.join("out.log").exists());
}

fn config(command: &str) -> SupervisionConfig {
	SupervisionConfig::new(command)
}

fn supervisor(command: &str) -> Supervisor {
	Supervisor::new(config(command), HashMap::new())
}

async fn wait_for_running(handle: &Handle) -> u32 {
	for _ in 0..500 {
		if let SupervisorState::Running { pid } = handle.state() {
			return pid;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
	panic!("child never reached Running");
}

// --- Start failures ---

#[tokio::test]
async fn empty_command_fails_before_touching_a_process() {
	let sup = supervisor("   ");
	let handle = sup.handle();
	let outcome = sup.supervise().await;
	match outcome {
		ExitOutcome::FailedToStart(cause) => assert!(cause.contains("invalid command line")),
		other => panic!("expected FailedToStart, got {:?}", other),
	}
	assert_eq!(handle.state(), SupervisorState::Stopped);
}

#[tokio::test]
async fn missing_binary_fails_to_start() {
	let sup = supervisor("/definitely/not/a/binary-xyz --flag");
	let handle = sup.handle();
	let outcome = sup.supervise().await;
	assert!(matches!(outcome, ExitOutcome::FailedToStart(_)));
	assert_eq!(handle.state(), SupervisorState::Stopped);
}

#[tokio::test]
async fn unavailable_sink_does_not_prevent_start() {
	let mut cfg = config(r#"sh -c "exit 0""#);
	// /dev/null is not a directory, so the sink can never be opened
	cfg.stdout_log = Some(PathBuf::from("/dev/null/nope/out.log"));
	let sup = Supervisor::new(cfg, HashMap::new());
	assert_eq!(sup.supervise().await, ExitOutcome::Exited(0));
}

// --- Natural exit and log capture ---

#[tokio::test]
async fn three_lines_captured_in_order() {
	let dir = temp_dir("three-lines");
	let log = dir.join("out.log");
	let mut cfg = config(r#"sh -c "echo one; echo two; echo three""#);
	cfg.stdout_log = Some(log.clone());

	let sup = Supervisor::new(cfg, HashMap::new());
	let outcome = sup.supervise().await;

	assert_eq!(outcome, ExitOutcome::Exited(0));
	// outcome is only reported once the relay drained to EOF, so the file
	// must already be complete
	let content = std::fs::read_to_string(&log).unwrap();
	assert_eq!(content, "one\ntwo\nthree\n");
}

#[tokio::test]
async fn stderr_goes_to_its_own_sink() {
	let dir = temp_dir("stderr");
	let out = dir.join("out.log");
	let err = dir.join("err.log");
	let mut cfg = config(r#"sh -c "echo fine; echo oops >&2; exit 3""#);
	cfg.stdout_log = Some(out.clone());
	cfg.stderr_log = Some(err.clone());

	let sup = Supervisor::new(cfg, HashMap::new());
	assert_eq!(sup.supervise().await, ExitOutcome::Exited(3));

	assert_eq!(std::fs::read_to_string(&out).unwrap(), "fine\n");
	assert_eq!(std::fs::read_to_string(&err).unwrap(), "oops\n");
}

#[tokio::test]
async fn env_overrides_reach_the_child() {
	let dir = temp_dir("env");
	let log = dir.join("out.log");
	let mut cfg = config(r#"sh -c "echo $KOMORI_TEST_VALUE""#);
	cfg.env.insert("KOMORI_TEST_VALUE".into(), "hello".into());
	cfg.stdout_log = Some(log.clone());

	let sup = Supervisor::new(cfg, HashMap::new());
	assert_eq!(sup.supervise().await, ExitOutcome::Exited(0));
	assert_eq!(std::fs::read_to_string(&log).unwrap(), "hello\n");
}

#[tokio::test]
async fn working_directory_is_applied() {
	let dir = temp_dir("workdir");
	let log = dir.join("out.log");
	let mut cfg = config("pwd");
	cfg.working_dir = Some(dir.clone());
	cfg.stdout_log = Some(log.clone());

	let sup = Supervisor::new(cfg, HashMap::new());
	assert_eq!(sup.supervise().await, ExitOutcome::Exited(0));
	let content = std::fs::read_to_string(&log).unwrap();
	assert_eq!(content.trim_end(), dir.canonicalize().unwrap().to_string_lossy());
}

// --- Stop semantics ---

#[tokio::test]
async fn stop_kills_a_sleeping_child() {
	let sup = supervisor("sleep 60");
	let mut handle = sup.handle();
	let task = tokio::spawn(sup.supervise());

	wait_for_running(&handle).await;
	handle.stop();

	let outcome = task.await.unwrap();
	assert_eq!(outcome, ExitOutcome::Killed);
	assert!(handle.wait_stopped(Duration::from_secs(1)).await);
}

#[tokio::test]
async fn exit_code_wins_when_stop_races_a_finishing_child() {
	// the shell ignores SIGTERM and exits on its own terms; the observed
	// code must win over Killed
	let sup = supervisor(r#"sh -c "trap '' TERM; sleep 0.2; exit 2""#);
	let handle = sup.handle();
	let task = tokio::spawn(sup.supervise());

	wait_for_running(&handle).await;
	handle.stop();

	assert_eq!(task.await.unwrap(), ExitOutcome::Exited(2));
}

#[tokio::test]
async fn stop_after_exit_still_reports_the_exit_code() {
	let sup = supervisor(r#"sh -c "exit 2""#);
	let handle = sup.handle();
	let task = tokio::spawn(sup.supervise());

	// let the child finish first, then deliver a (now pointless) stop
	tokio::time::sleep(Duration::from_millis(500)).await;
	handle.stop();

	assert_eq!(task.await.unwrap(), ExitOutcome::Exited(2));
}

#[tokio::test]
async fn grace_timeout_escalates_to_sigkill() {
	// the shell ignores SIGTERM and respawns sleeps forever; only the
	// SIGKILL escalation after the grace period can end it
	let mut cfg = config(r#"sh -c "trap '' TERM; while true; do sleep 1; done""#);
	cfg.stop_grace = Duration::from_secs(1);
	let sup = Supervisor::new(cfg, HashMap::new());
	let mut handle = sup.handle();
	let task = tokio::spawn(sup.supervise());

	wait_for_running(&handle).await;
	handle.stop();

	assert_eq!(task.await.unwrap(), ExitOutcome::Killed);
	assert!(handle.wait_stopped(Duration::from_secs(1)).await);
}

#[tokio::test]
async fn stop_is_idempotent() {
	let sup = supervisor("sleep 60");
	let handle = sup.handle();
	let task = tokio::spawn(sup.supervise());

	wait_for_running(&handle).await;
	handle.stop();
	handle.stop();
	handle.stop();

	assert_eq!(task.await.unwrap(), ExitOutcome::Killed);
}

#[tokio::test]
async fn wait_stopped_times_out_while_running() {
	let sup = supervisor("sleep 60");
	let mut handle = sup.handle();
	let task = tokio::spawn(sup.supervise());

	wait_for_running(&handle).await;
	assert!(!handle.wait_stopped(Duration::from_millis(100)).await);

	handle.stop();
	assert!(handle.wait_stopped(Duration::from_secs(5)).await);
	let _ = task.await;
}

// --- Terminator ---

#[tokio::test]
async fn terminating_an_exited_child_is_a_no_op_twice_over() {
	use std::os::unix::process::CommandExt;

	let mut cmd = std::process::Command::new("sleep");
	cmd.arg("0.05").process_group(0);
	let mut child = cmd.spawn().unwrap();
	let pid = child.id();
	child.wait().unwrap();

	// both calls see a dead process (group) and swallow it
	assert!(!terminate::signal_tree(pid));
	assert!(!terminate::signal_tree(pid));
	assert!(!terminate::kill_tree(pid));
}

#[test]
fn pid_zero_is_never_signalled() {
	// 0 is the unknown-pid sentinel; signalling it would hit our own
	// process group
	assert!(!terminate::signal_tree(0));
	assert!(!terminate::kill_tree(0));
}

// --- Logs survive the whole lifecycle ---

#[tokio::test]
async fn lines_before_stop_are_not_truncated() {
	let dir = temp_dir("no-truncation");
	let log = dir.join("out.log");
	let mut cfg = config(r#"sh -c "echo first; echo second; sleep 60""#);
	cfg.stdout_log = Some(log.clone());

	let sup = Supervisor::new(cfg, HashMap::new());
	let handle = sup.handle();
	let task = tokio::spawn(sup.supervise());

	wait_for_running(&handle).await;
	// give the child a moment to emit before killing it
	tokio::time::sleep(Duration::from_millis(300)).await;
	handle.stop();

	assert_eq!(task.await.unwrap(), ExitOutcome::Killed);
	let content = std::fs::read_to_string(&log).unwrap();
	assert_eq!(content, "first\nsecond\n");
}
