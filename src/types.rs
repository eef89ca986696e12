use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
	argv: Vec<OsString>,
}

impl Invocation {
	pub fn new<I, S>(argv: I) -> Invocation where I: IntoIterator<Item = S>, S: Into<OsString> {
		let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
		assert!(!argv.is_empty(), "invocation without a program name");
		Invocation { argv: argv }
	}

	pub fn program(&self) -> &OsStr {
		&self.argv[0]
	}

	pub fn args(&self) -> &[OsString] {
		&self.argv[1..]
	}

	pub fn argv(&self) -> &[OsString] {
		&self.argv
	}
}

/// Stages in execution order: stage 0 reads the pipeline's input, the last
/// stage writes its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
	stages: Vec<Invocation>,
}

impl Pipeline {
	pub fn new(stages: Vec<Invocation>) -> Pipeline {
		assert!(!stages.is_empty(), "empty pipeline");
		Pipeline { stages: stages }
	}

	pub fn stages(&self) -> &[Invocation] {
		&self.stages
	}

	pub fn len(&self) -> usize {
		self.stages.len()
	}

	pub fn single(&self) -> Option<&Invocation> {
		match self.stages.as_slice() {
			[only] => Some(only),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Redirects {
	pub stdin: Option<PathBuf>,
	pub stdout: Option<PathBuf>,
	pub stderr: Option<PathBuf>,
}

impl Redirects {
	pub fn is_empty(&self) -> bool {
		self.stdin.is_none() && self.stdout.is_none() && self.stderr.is_none()
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
	pub pipeline: Pipeline,
	pub redirects: Redirects,
	pub is_background: bool,
}

impl CommandRequest {
	pub fn new(pipeline: Pipeline) -> CommandRequest {
		CommandRequest { pipeline: pipeline, redirects: Redirects::default(), is_background: false }
	}

	pub fn stdin<P: AsRef<Path>>(mut self, path: P) -> CommandRequest {
		self.redirects.stdin = Some(path.as_ref().to_owned());
		self
	}

	pub fn stdout<P: AsRef<Path>>(mut self, path: P) -> CommandRequest {
		self.redirects.stdout = Some(path.as_ref().to_owned());
		self
	}

	pub fn stderr<P: AsRef<Path>>(mut self, path: P) -> CommandRequest {
		self.redirects.stderr = Some(path.as_ref().to_owned());
		self
	}

	pub fn background(mut self, is_background: bool) -> CommandRequest {
		self.is_background = is_background;
		self
	}
}

impl fmt::Display for CommandRequest {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		for (i, stage) in self.pipeline.stages().iter().enumerate() {
			if i > 0 {
				write!(f, " | ")?;
			}
			let argv: Vec<_> = stage.argv().iter().map(|a| a.to_string_lossy()).collect();
			write!(f, "{}", argv.join(" "))?;
		}
		if let Some(ref path) = self.redirects.stdin {
			write!(f, " < {}", path.display())?;
		}
		if let Some(ref path) = self.redirects.stdout {
			write!(f, " > {}", path.display())?;
		}
		if let Some(ref path) = self.redirects.stderr {
			write!(f, " 2> {}", path.display())?;
		}
		if self.is_background {
			write!(f, " &")?;
		}
		Ok(())
	}
}
