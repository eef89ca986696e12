use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
	#[error("empty command")]
	EmptyCommand,
	#[error("empty redirect target")]
	EmptyRedirectTarget,
	#[error("unsupported redirect: {0}")]
	UnsupportedRedirect(String),
	#[error("{0} redirect is only allowed on the {1} command of a pipeline")]
	MisplacedRedirect(&'static str, &'static str),
	#[error("character after '&': '{0}'")]
	TrailingCharacters(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction { Stdin, Stdout, Stderr }

impl Direction {
	fn describe(&self) -> &'static str {
		match *self {
			Direction::Stdin => "reading",
			Direction::Stdout => "writing",
			Direction::Stderr => "appending",
		}
	}
}

#[derive(Debug, Error)]
#[error("{}: cannot open for {}: {source}", .path.display(), .direction.describe())]
pub struct RedirectError {
	pub path: PathBuf,
	pub direction: Direction,
	#[source]
	pub source: io::Error,
}

#[derive(Debug, Error)]
pub enum EvalError {
	#[error(transparent)]
	Redirect(#[from] RedirectError),
	#[error("fork failed at stage {stage}: {source}")]
	Spawn { stage: usize, source: nix::Error },
	#[error("pipe failed: {0}")]
	Pipe(nix::Error),
	#[error("argument contains a nul byte: {0}")]
	Argument(#[from] std::ffi::NulError),
	#[error("cd: {}: {source}", .path.display())]
	Cd { path: PathBuf, source: io::Error },
	#[error("cd: HOME not set")]
	NoHome,
}

impl EvalError {
	/// Errors after which the shell must not keep running.
	pub fn is_fatal(&self) -> bool {
		match *self {
			EvalError::Pipe(_) => true,
			_ => false,
		}
	}
}
