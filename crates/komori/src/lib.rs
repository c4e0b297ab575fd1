//! # komori
//!
//! Single-child process supervisor.
//!
//! Resolve a raw command line (rewriting script invocations through an
//! interpreter table), spawn the child in its own process group, relay its
//! stdout/stderr line-by-line into append-only log files, and race natural
//! exit against an external stop request. On stop, the whole process tree is
//! signalled and given a bounded grace period before SIGKILL.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use komori::{Supervisor, SupervisionConfig};
//! use std::collections::HashMap;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut config = SupervisionConfig::new(r#"sh -c "echo hello""#);
//! config.stdout_log = Some("/tmp/myapp/out.log".into());
//!
//! let sup = Supervisor::new(config, HashMap::new());
//! let handle = sup.handle();
//!
//! let outcome = sup.supervise().await;
//! println!("{}", outcome);
//! # let _ = handle;
//! # }
//! ```

pub mod relay;
pub mod resolver;
pub mod supervisor;
pub mod terminate;

pub use komori_core::types::{ExitOutcome, SupervisionConfig, SupervisorState};
pub use relay::LogSink;
pub use resolver::{resolve, ResolveError, ResolvedCommand};
pub use supervisor::{Handle, Supervisor};
