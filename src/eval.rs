use std::ffi::{CStr, CString};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};

use log::{debug, warn};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::unistd::{self, Pid};

use crate::builtin::{self, Builtin};
use crate::error::EvalError;
use crate::global;
use crate::job::{self, WaitStatusExt};
use crate::redirect;
use crate::types::{CommandRequest, Pipeline};

/// Status of a child whose program could not be found.
pub const STATUS_NOT_FOUND: i32 = 127;
/// Status of a child whose program was found but could not be run.
pub const STATUS_NOT_EXECUTABLE: i32 = 126;

#[derive(Debug, PartialEq, Eq)]
pub enum EvalResult {
	/// Foreground pipeline finished; status of its last stage.
	Done(i32),
	Background { id: usize, pid: Pid },
	Exit(i32),
}

/// Argument vector converted before forking, so the child only wires
/// descriptors and execs.
struct PreparedStage {
	argv: Vec<CString>,
}

impl PreparedStage {
	fn program(&self) -> &CStr {
		&self.argv[0]
	}
}

fn prepare(pipeline: &Pipeline) -> Result<Vec<PreparedStage>, EvalError> {
	pipeline.stages().iter().map(|invocation| -> Result<PreparedStage, EvalError> {
		let argv: Result<Vec<CString>, _> = invocation.argv().iter().map(|a| CString::new(a.as_bytes())).collect();
		Ok(PreparedStage { argv: argv? })
	}).collect()
}

/// What a child puts on 0, 1 and 2; `None` keeps the inherited descriptor.
#[derive(Debug, Clone, Copy)]
struct StageIo {
	stdin: Option<RawFd>,
	stdout: Option<RawFd>,
	stderr: Option<RawFd>,
	reset_signals: bool,
}

fn write_stderr(parts: &[&[u8]]) {
	for part in parts {
		unsafe { libc::write(libc::STDERR_FILENO, part.as_ptr() as *const libc::c_void, part.len()) };
	}
}

/// Wires the child's standard descriptors and closes every descriptor it
/// inherited from pipeline construction.
fn install_io(io: StageIo, held: &[RawFd]) -> nix::Result<()> {
	let slots = [
		(io.stdin, libc::STDIN_FILENO),
		(io.stdout, libc::STDOUT_FILENO),
		(io.stderr, libc::STDERR_FILENO),
	];
	for &(src, slot) in &slots {
		if let Some(src) = src {
			if src != slot {
				unistd::dup2(src, slot)?;
			}
		}
	}
	for &fd in held {
		if fd > libc::STDERR_FILENO {
			unistd::close(fd)?;
		}
	}
	// The Rust runtime ignores SIGPIPE and that disposition survives exec.
	unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) }?;
	if io.reset_signals {
		for &sig in &[Signal::SIGINT, Signal::SIGQUIT] {
			unsafe { signal::signal(sig, SigHandler::SigDfl) }?;
		}
	}
	Ok(())
}

/// Runs in the forked child. Never returns: either the program replaces the
/// process or the child exits with 126/127.
fn exec_stage(stage: &PreparedStage, io: StageIo, held: &[RawFd]) -> ! {
	let name = stage.program().to_bytes();
	if let Err(e) = install_io(io, held) {
		write_stderr(&[name, b": ", e.desc().as_bytes(), b"\n"]);
		unsafe { libc::_exit(STATUS_NOT_EXECUTABLE) }
	}
	let e = match unistd::execvp(stage.program(), &stage.argv) {
		Ok(never) => match never {},
		Err(e) => e,
	};
	let s = match e {
		Errno::ENOENT | Errno::ENOTDIR => {
			write_stderr(&[name, b": command not found\n"]);
			STATUS_NOT_FOUND
		},
		_ => {
			write_stderr(&[name, b": ", e.desc().as_bytes(), b"\n"]);
			STATUS_NOT_EXECUTABLE
		},
	};
	unsafe { libc::_exit(s) }
}

fn raw<F: AsRawFd>(fd: Option<&F>) -> Option<RawFd> {
	fd.map(AsRawFd::as_raw_fd)
}

/// Forks the stages left to right. Pipe `i` is created right before stage `i`
/// is forked; afterwards the parent keeps only its read end for stage `i + 1`.
fn spawn_stages(stages: &[PreparedStage], resolved: &redirect::Resolved, is_background: bool,
                job_builder: &mut job::JobBuilder) -> Result<(), EvalError> {
	let last = stages.len() - 1;
	let mut prev_read: Option<OwnedFd> = None;
	for (i, stage) in stages.iter().enumerate() {
		let (next_read, cur_write) = if i < last {
			let (pipe_read, pipe_write) = unistd::pipe2(OFlag::O_CLOEXEC).map_err(EvalError::Pipe)?;
			(Some(pipe_read), Some(pipe_write))
		} else {
			(None, None)
		};

		let io = StageIo {
			stdin: if i == 0 { raw(resolved.stdin.as_ref()) } else { raw(prev_read.as_ref()) },
			stdout: if i == last { raw(resolved.stdout.as_ref()) } else { raw(cur_write.as_ref()) },
			stderr: raw(resolved.stderr.as_ref()),
			reset_signals: !is_background,
		};
		let mut held = resolved.raw_fds();
		held.extend([raw(prev_read.as_ref()), raw(next_read.as_ref()), raw(cur_write.as_ref())].into_iter().flatten());

		match job_builder.push_fork().map_err(|e| EvalError::Spawn { stage: i, source: e })? {
			unistd::ForkResult::Parent { child } => {
				debug!("stage {} forked as pid {}", i, child);
			},
			unistd::ForkResult::Child => exec_stage(stage, io, &held),
		}

		// Both ends wired into stage i are closed here; the parent keeps only
		// the read end meant for stage i + 1.
		drop(cur_write);
		prev_read = next_read;
	}
	Ok(())
}

fn eval_builtin(state: &mut global::State, builtin: Builtin) -> Result<EvalResult, EvalError> {
	match builtin {
		Builtin::Cd(target) => {
			builtin::builtin_cd(target.as_ref())?;
			state.last_status = 0;
			Ok(EvalResult::Done(0))
		},
		Builtin::Exit(arg) => match builtin::builtin_exit(arg.as_ref()) {
			Ok(s) => Ok(EvalResult::Exit(s)),
			Err(msg) => {
				eprintln!("forksh: {}", msg);
				Ok(EvalResult::Exit(2))
			},
		},
	}
}

/// Runs one command line: built-ins in the shell itself, everything else as a
/// pipeline of child processes.
pub fn eval(state: &mut global::State, request: &CommandRequest) -> Result<EvalResult, EvalError> {
	debug!("eval {:?}", request);
	if let Some(builtin) = Builtin::recognize(&request.pipeline) {
		return eval_builtin(state, builtin);
	}

	let stages = prepare(&request.pipeline)?;
	let resolved = redirect::resolve(&request.redirects)?;

	let mut job_builder = job::JobBuilder::new(stages.len(), request.to_string());
	let spawned = spawn_stages(&stages, &resolved, request.is_background, &mut job_builder);
	drop(resolved);

	if let Err(e) = spawned {
		if !job_builder.is_empty() {
			let job = job_builder.build();
			warn!("terminating {} already started stage(s) of '{}'", job.processes.len(), job.line);
			job.terminate();
			state.job_set.push(job);
		}
		return Err(e);
	}

	let mut job = job_builder.build();
	if request.is_background {
		let pid = job.processes.last().map(|pr| pr.pid).unwrap_or_else(|| Pid::from_raw(0));
		let id = state.job_set.push(job);
		Ok(EvalResult::Background { id: id, pid: pid })
	} else {
		job.wait();
		let s = job.code();
		debug!("'{}' finished with status {} ({:?})", job.line, s,
		       job.processes.iter().map(|pr| pr.status.code()).collect::<Vec<_>>());
		state.last_status = s;
		Ok(EvalResult::Done(s))
	}
}
