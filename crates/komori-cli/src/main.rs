mod systemd;

use std::collections::HashMap;
use std::path::PathBuf;

use komori::{ExitOutcome, Supervisor};
use komori_core::config::{self, ServiceDefinition};
use komori_core::interpreters::InterpreterEntry;
use owo_colors::OwoColorize;

fn main() {
	let args: Vec<String> = std::env::args().skip(1).collect();

	if args.is_empty() {
		print_usage();
		return;
	}

	match args[0].as_str() {
		"help" | "--help" | "-h" => print_usage(),
		"version" | "--version" | "-V" => println!("komori {}", env!("CARGO_PKG_VERSION")),
		"install" | "add" => cmd_install(&args[1..]),
		"remove" | "rm" | "uninstall" => cmd_remove(&args[1..]),
		"start" => cmd_systemctl("start", &args[1..]),
		"stop" => cmd_systemctl("stop", &args[1..]),
		"restart" => cmd_systemctl("restart", &args[1..]),
		"status" | "st" => cmd_status(&args[1..]),
		"show" => cmd_show(&args[1..]),
		"run" => cmd_run(&args[1..]),
		other => {
			eprintln!("unknown command: {}", other);
			print_usage();
			std::process::exit(2);
		}
	}
}

fn print_usage() {
	eprintln!("komori — wrap any command line as a supervised service");
	eprintln!();
	eprintln!("usage: komori <command> [options]");
	eprintln!();
	eprintln!("{}", "services".cyan().bold());
	eprintln!("  {} <name> [opts] -- <cmd>  Register a command as a service", "install".bold());
	eprintln!("  {} <name>                   Unregister and delete a service", "remove".bold());
	eprintln!("  {} <name>                    Start via systemd", "start".bold());
	eprintln!("  {} <name>                     Stop via systemd", "stop".bold());
	eprintln!("  {} <name>                  Restart via systemd", "restart".bold());
	eprintln!("  {} [name]                   Show registered services", "status".bold());
	eprintln!("  {} <name>                     Print the stored definition", "show".bold());
	eprintln!();
	eprintln!("{}", "install options".cyan().bold());
	eprintln!("  --dir <path>                 Working directory for the child");
	eprintln!("  --env <K=V>                  Environment override (repeatable)");
	eprintln!("  --stdout <path>              stdout log file (default: state dir)");
	eprintln!("  --stderr <path>              stderr log file");
	eprintln!("  --grace <secs>               Stop grace period (default 10)");
	eprintln!("  --interpreter <.ext=exe:tpl> Extension → interpreter override");
	eprintln!();
	eprintln!("{}", "internal".cyan().bold());
	eprintln!("  {} <name>                      Supervise in the foreground", "run".bold());
	eprintln!("                               (systemd calls this; you rarely do)");
}

fn cmd_install(args: &[String]) {
	let Some(name) = args.first().filter(|a| !a.starts_with('-')).cloned() else {
		eprintln!("usage: komori install <name> [options] -- <command...>");
		std::process::exit(2);
	};

	let mut def = ServiceDefinition::new(name.as_str(), "");
	let mut i = 1;
	while i < args.len() {
		match args[i].as_str() {
			"--" => {
				def.command = args[i + 1..].join(" ");
				break;
			}
			"--dir" => {
				def.dir = Some(PathBuf::from(take_value(args, &mut i, "--dir")));
			}
			"--env" => {
				let pair = take_value(args, &mut i, "--env");
				match pair.split_once('=') {
					Some((k, v)) => {
						def.env.insert(k.to_string(), v.to_string());
					}
					None => {
						eprintln!("--env expects K=V, got: {}", pair);
						std::process::exit(2);
					}
				}
			}
			"--stdout" => {
				def.stdout_log = Some(PathBuf::from(take_value(args, &mut i, "--stdout")));
			}
			"--stderr" => {
				def.stderr_log = Some(PathBuf::from(take_value(args, &mut i, "--stderr")));
			}
			"--grace" => {
				let secs = take_value(args, &mut i, "--grace");
				match secs.parse() {
					Ok(v) => def.stop_grace_secs = v,
					Err(_) => {
						eprintln!("--grace expects seconds, got: {}", secs);
						std::process::exit(2);
					}
				}
			}
			"--interpreter" => {
				let spec = take_value(args, &mut i, "--interpreter");
				match parse_interpreter(&spec) {
					Some((ext, entry)) => {
						def.interpreters.insert(ext, entry);
					}
					None => {
						eprintln!("--interpreter expects .ext=executable:template, got: {}", spec);
						std::process::exit(2);
					}
				}
			}
			other => {
				eprintln!("unknown install option: {}", other);
				std::process::exit(2);
			}
		}
		i += 1;
	}

	if def.command.trim().is_empty() {
		eprintln!("no command given (everything after -- is the command line)");
		std::process::exit(2);
	}

	if let Err(e) = config::save_definition(&def) {
		eprintln!("error: {}", e);
		std::process::exit(1);
	}
	if let Err(e) = systemd::install_unit(&name) {
		eprintln!("error: {}", e);
		std::process::exit(1);
	}
	println!("{} installed ({})", name.bold(), def.command);
	println!("start it with: komori start {}", name);
}

fn take_value(args: &[String], i: &mut usize, flag: &str) -> String {
	*i += 1;
	match args.get(*i) {
		Some(v) => v.clone(),
		None => {
			eprintln!("{} expects a value", flag);
			std::process::exit(2);
		}
	}
}

/// `.ext=executable:template`, e.g. `.py=python3:-u {file}`.
fn parse_interpreter(spec: &str) -> Option<(String, InterpreterEntry)> {
	let (ext, rest) = spec.split_once('=')?;
	if !ext.starts_with('.') {
		return None;
	}
	let (exe, template) = match rest.split_once(':') {
		Some((exe, tpl)) => (exe, tpl.to_string()),
		None => (rest, "{file}".to_string()),
	};
	if exe.is_empty() {
		return None;
	}
	Some((ext.to_lowercase(), InterpreterEntry::new(exe, template)))
}

fn cmd_remove(args: &[String]) {
	let Some(name) = args.first() else {
		eprintln!("usage: komori remove <name>");
		std::process::exit(2);
	};
	if let Err(e) = systemd::remove_unit(name) {
		eprintln!("warning: {}", e);
	}
	match config::remove_definition(name) {
		Ok(()) => println!("{} removed", name.bold()),
		Err(e) => {
			eprintln!("error: {}", e);
			std::process::exit(1);
		}
	}
}

fn cmd_systemctl(action: &str, args: &[String]) {
	let Some(name) = args.first() else {
		eprintln!("usage: komori {} <name>", action);
		std::process::exit(2);
	};
	if let Err(e) = config::load_definition(name) {
		eprintln!("error: {}", e);
		std::process::exit(1);
	}
	match systemd::systemctl(&[action, &systemd::unit_name(name)]) {
		Ok(()) => println!("{}: {}", name.bold(), action),
		Err(e) => {
			eprintln!("error: {}", e);
			std::process::exit(1);
		}
	}
}

fn cmd_status(args: &[String]) {
	let names = match args.first() {
		Some(name) => vec![name.clone()],
		None => config::list_definitions(),
	};
	if names.is_empty() {
		println!("no services registered (try: komori install <name> -- <command>)");
		return;
	}

	let width = names.iter().map(String::len).max().unwrap_or(4).max(4);
	for name in names {
		let def = match config::load_definition(&name) {
			Ok(d) => d,
			Err(e) => {
				eprintln!("error: {}", e);
				std::process::exit(1);
			}
		};
		if systemd::is_active(&name) {
			println!("{} {:<width$} {}", "●".green(), name, def.command.dimmed(), width = width);
		} else {
			println!("{} {:<width$} {}", "●".red(), name, def.command.dimmed(), width = width);
		}
	}
}

fn cmd_show(args: &[String]) {
	let Some(name) = args.first() else {
		eprintln!("usage: komori show <name>");
		std::process::exit(2);
	};
	match config::load_definition(name) {
		Ok(def) => match serde_json::to_string_pretty(&def) {
			Ok(json) => println!("{}", json),
			Err(e) => eprintln!("error: {}", e),
		},
		Err(e) => {
			eprintln!("error: {}", e);
			std::process::exit(1);
		}
	}
}

fn cmd_run(args: &[String]) {
	let Some(name) = args.first() else {
		eprintln!("usage: komori run <name>");
		std::process::exit(2);
	};

	tracing_subscriber::fmt().init();

	let def = match config::load_definition(name) {
		Ok(d) => d,
		Err(e) => {
			eprintln!("error: {}", e);
			std::process::exit(1);
		}
	};
	let interpreters = def.interpreters.clone();
	let supervision = def.into_supervision_config();

	let outcome = tokio::runtime::Runtime::new()
		.unwrap()
		.block_on(run_supervised(supervision, interpreters));

	match outcome {
		ExitOutcome::FailedToStart(cause) => {
			// nonzero exit so the service manager records a failed start
			eprintln!("error: failed to start: {}", cause);
			std::process::exit(1);
		}
		ExitOutcome::Exited(code) if code != 0 => {
			tracing::warn!(code, "service exited nonzero");
		}
		_ => {}
	}
}

async fn run_supervised(
	config: komori::SupervisionConfig,
	interpreters: HashMap<String, InterpreterEntry>,
) -> ExitOutcome {
	let supervisor = Supervisor::new(config, interpreters);
	let handle = supervisor.handle();

	tokio::spawn(async move {
		let mut sigterm =
			tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).unwrap();
		tokio::select! {
			_ = tokio::signal::ctrl_c() => {}
			_ = sigterm.recv() => {}
		}
		tracing::info!("shutdown signal received");
		handle.stop();
	});

	supervisor.supervise().await
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn interpreter_spec_parses() {
		let (ext, entry) = parse_interpreter(".py=python3:-u {file}").unwrap();
		assert_eq!(ext, ".py");
		assert_eq!(entry.executable, "python3");
		assert_eq!(entry.args, "-u {file}");
	}

	#[test]
	fn interpreter_spec_defaults_template() {
		let (_, entry) = parse_interpreter(".rb=ruby").unwrap();
		assert_eq!(entry.args, "{file}");
	}

	#[test]
	fn interpreter_spec_rejects_bad_shapes() {
		assert!(parse_interpreter("py=python").is_none());
		assert!(parse_interpreter(".py=").is_none());
		assert!(parse_interpreter("nonsense").is_none());
	}
}
