use std::fs::{File, OpenOptions};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;

use crate::error::{Direction, RedirectError};
use crate::types::Redirects;

/// `None` means the stage inherits the shell's descriptor.
#[derive(Debug, Default)]
pub struct Resolved {
	pub stdin: Option<File>,
	pub stdout: Option<File>,
	pub stderr: Option<File>,
}

impl Resolved {
	pub fn raw_fds(&self) -> Vec<RawFd> {
		[self.stdin.as_ref(), self.stdout.as_ref(), self.stderr.as_ref()].into_iter()
			.flatten()
			.map(|f| f.as_raw_fd())
			.collect()
	}
}

fn open(path: &Path, direction: Direction) -> Result<File, RedirectError> {
	let mut oopt = OpenOptions::new();
	let _ = match direction {
		Direction::Stdin => oopt.read(true),
		Direction::Stdout => oopt.write(true).create(true).truncate(true),
		Direction::Stderr => oopt.append(true).create(true),
	};
	oopt.open(path).map_err(|e| RedirectError { path: path.to_owned(), direction: direction, source: e })
}

// Input first: a missing input file must leave no output file behind.
pub fn resolve(redirects: &Redirects) -> Result<Resolved, RedirectError> {
	let stdin = redirects.stdin.as_deref().map(|p| open(p, Direction::Stdin)).transpose()?;
	let stdout = redirects.stdout.as_deref().map(|p| open(p, Direction::Stdout)).transpose()?;
	let stderr = redirects.stderr.as_deref().map(|p| open(p, Direction::Stderr)).transpose()?;
	Ok(Resolved { stdin: stdin, stdout: stdout, stderr: stderr })
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use std::io::{ErrorKind, Write};

	#[test]
	fn nothing_requested() {
		let resolved = resolve(&Redirects::default()).unwrap();
		assert!(resolved.raw_fds().is_empty());
	}

	#[test]
	fn missing_input_fails_before_output_is_created() {
		let dir = tempfile::tempdir().unwrap();
		let redirects = Redirects {
			stdin: Some(dir.path().join("missing")),
			stdout: Some(dir.path().join("out")),
			stderr: None,
		};
		let err = resolve(&redirects).unwrap_err();
		assert_eq!(err.direction, Direction::Stdin);
		assert_eq!(err.source.kind(), ErrorKind::NotFound);
		assert!(!dir.path().join("out").exists());
	}

	#[test]
	fn stdout_truncates() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("out");
		fs::write(&path, b"previous content").unwrap();
		let redirects = Redirects { stdout: Some(path.clone()), ..Redirects::default() };
		let mut resolved = resolve(&redirects).unwrap();
		resolved.stdout.as_mut().unwrap().write_all(b"new").unwrap();
		drop(resolved);
		assert_eq!(fs::read(&path).unwrap(), b"new");
	}

	#[test]
	fn stderr_appends() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("err");
		for chunk in &[&b"first\n"[..], &b"second\n"[..]] {
			let redirects = Redirects { stderr: Some(path.clone()), ..Redirects::default() };
			let mut resolved = resolve(&redirects).unwrap();
			resolved.stderr.as_mut().unwrap().write_all(chunk).unwrap();
		}
		assert_eq!(fs::read(&path).unwrap(), b"first\nsecond\n");
	}
}
