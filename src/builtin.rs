use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::error::EvalError;
use crate::types::Pipeline;

/// Commands the shell runs itself. Only recognized when they make up the
/// whole pipeline.
#[derive(Debug, PartialEq, Eq)]
pub enum Builtin {
	Cd(Option<PathBuf>),
	Exit(Option<OsString>),
}

impl Builtin {
	pub fn recognize(pipeline: &Pipeline) -> Option<Builtin> {
		let invocation = pipeline.single()?;
		let first_arg = invocation.args().first().cloned();
		match invocation.program().as_encoded_bytes() {
			b"cd" => Some(Builtin::Cd(first_arg.map(PathBuf::from))),
			b"exit" => Some(Builtin::Exit(first_arg)),
			_ => None,
		}
	}
}

pub fn builtin_cd(target: Option<&PathBuf>) -> Result<(), EvalError> {
	let path = match target {
		Some(path) => path.clone(),
		None => env::var_os("HOME").map(PathBuf::from).ok_or(EvalError::NoHome)?,
	};
	env::set_current_dir(&path).map_err(|e| EvalError::Cd { path: path, source: e })
}

/// Exit status requested by `exit`, or the error text for a bad argument.
pub fn builtin_exit(arg: Option<&OsString>) -> Result<i32, String> {
	match arg {
		None => Ok(0),
		Some(arg) => arg.to_str().and_then(|s| s.parse().ok())
			.ok_or_else(|| format!("exit: {}: numeric argument required", arg.to_string_lossy())),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::Invocation;

	fn pipeline(stages: &[&[&str]]) -> Pipeline {
		Pipeline::new(stages.iter().map(|argv| Invocation::new(argv.iter().copied())).collect())
	}

	#[test]
	fn recognizes_single_stage_builtins() {
		assert_eq!(Builtin::recognize(&pipeline(&[&["cd", "/tmp", "extra"]])),
		           Some(Builtin::Cd(Some(PathBuf::from("/tmp")))));
		assert_eq!(Builtin::recognize(&pipeline(&[&["cd"]])), Some(Builtin::Cd(None)));
		assert_eq!(Builtin::recognize(&pipeline(&[&["exit", "3"]])),
		           Some(Builtin::Exit(Some(OsString::from("3")))));
	}

	#[test]
	fn ignores_builtins_inside_pipelines() {
		assert_eq!(Builtin::recognize(&pipeline(&[&["cd", "/tmp"], &["cat"]])), None);
		assert_eq!(Builtin::recognize(&pipeline(&[&["echo"], &["exit"]])), None);
		assert_eq!(Builtin::recognize(&pipeline(&[&["ls"]])), None);
	}

	#[test]
	fn exit_status() {
		assert_eq!(builtin_exit(None), Ok(0));
		assert_eq!(builtin_exit(Some(&OsString::from("42"))), Ok(42));
		assert!(builtin_exit(Some(&OsString::from("x"))).is_err());
	}

	#[test]
	fn cd_to_missing_directory_fails() {
		let before = env::current_dir().unwrap();
		let r = builtin_cd(Some(&PathBuf::from("/nonexistent/forksh/dir")));
		assert!(matches!(r, Err(EvalError::Cd { .. })));
		assert_eq!(env::current_dir().unwrap(), before);
	}
}
