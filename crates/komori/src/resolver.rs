use std::collections::HashMap;

use komori_core::interpreters::InterpreterEntry;

/// A command line split into the executable and its raw argument string,
/// after any interpreter rewrite.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCommand {
	pub executable: String,
	pub args: String,
}

#[derive(Debug, PartialEq)]
pub enum ResolveError {
	/// The command line was empty after trimming.
	InvalidCommandLine,
}

impl std::fmt::Display for ResolveError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ResolveError::InvalidCommandLine => write!(f, "invalid command line"),
		}
	}
}

impl std::error::Error for ResolveError {}

/// Split a raw command line into executable and arguments, rewriting script
/// invocations through the interpreter table.
///
/// The executable token is either a double-quoted span or everything up to
/// the first whitespace. A quoted token with no closing quote takes the rest
/// of the line. If the token's extension (lowercased, with the dot) matches
/// an interpreter entry, the entry's executable replaces it and the entry's
/// argument template is prepended, with `{file}` substituted by the quoted
/// original token.
pub fn resolve(
	raw: &str,
	interpreters: &HashMap<String, InterpreterEntry>,
) -> Result<ResolvedCommand, ResolveError> {
	let trimmed = raw.trim();
	if trimmed.is_empty() {
		return Err(ResolveError::InvalidCommandLine);
	}

	let (token, rest) = if let Some(stripped) = trimmed.strip_prefix('"') {
		match stripped.find('"') {
			Some(end) => (&stripped[..end], &stripped[end + 1..]),
			None => (stripped, ""),
		}
	} else {
		match trimmed.find(char::is_whitespace) {
			Some(end) => (&trimmed[..end], &trimmed[end..]),
			None => (trimmed, ""),
		}
	};
	let args = rest.trim().to_string();

	if let Some(entry) = file_extension(token).and_then(|ext| interpreters.get(&ext)) {
		let quoted = format!("\"{}\"", token);
		let prefix = entry.args.replace("{file}", &quoted);
		let args = if args.is_empty() {
			prefix
		} else {
			format!("{} {}", prefix, args)
		};
		return Ok(ResolvedCommand {
			executable: entry.executable.clone(),
			args,
		});
	}

	Ok(ResolvedCommand {
		executable: token.to_string(),
		args,
	})
}

/// Lowercased extension of the token's final path component, including the
/// leading dot. A leading dot alone (dotfiles) does not count.
fn file_extension(token: &str) -> Option<String> {
	let name = token.rsplit(['/', '\\']).next().unwrap_or(token);
	let idx = name.rfind('.')?;
	if idx == 0 {
		return None;
	}
	Some(name[idx..].to_lowercase())
}

/// Quote-aware split of an argument string into argv entries. Double quotes
/// group whitespace into one argument and are stripped.
pub fn split_args(args: &str) -> Vec<String> {
	let mut out = Vec::new();
	let mut current = String::new();
	let mut in_quotes = false;
	let mut seen_quote = false;

	for c in args.chars() {
		match c {
			'"' => {
				in_quotes = !in_quotes;
				seen_quote = true;
			}
			c if c.is_whitespace() && !in_quotes => {
				if !current.is_empty() || seen_quote {
					out.push(std::mem::take(&mut current));
				}
				seen_quote = false;
			}
			c => current.push(c),
		}
	}
	if !current.is_empty() || seen_quote {
		out.push(current);
	}
	out
}
