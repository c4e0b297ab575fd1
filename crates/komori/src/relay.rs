use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::watch;

/// Append-only log file for one child stream.
pub struct LogSink {
	file: File,
	path: PathBuf,
}

impl LogSink {
	/// Open for appending, creating parent directories as needed. An error
	/// here means the stream goes uncaptured; it must never block a start.
	pub fn open(path: &Path) -> io::Result<Self> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)?;
		}
		let file = OpenOptions::new().create(true).append(true).open(path)?;
		Ok(Self {
			file,
			path: path.to_path_buf(),
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// One write and flush per line so the file tracks the child in near
	/// real time.
	fn write_line(&mut self, line: &str) {
		let _ = self.file.write_all(line.as_bytes());
		let _ = self.file.write_all(b"\n");
		let _ = self.file.flush();
	}
}

/// Drain one child stream line-by-line into its sink. Ends on end-of-stream
/// (the normal case), on a read error, or when the cancel watch flips.
/// Lines are written in the order the child produced them.
pub async fn relay_lines<R>(reader: R, mut sink: LogSink, mut cancel: watch::Receiver<bool>)
where
	R: AsyncRead + Unpin,
{
	let mut lines = BufReader::new(reader).lines();
	loop {
		tokio::select! {
			line = lines.next_line() => match line {
				Ok(Some(line)) => sink.write_line(&line),
				Ok(None) => break,
				Err(_) => break,
			},
			_ = cancel.changed() => break,
		}
	}
}
