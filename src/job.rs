use log::{debug, info, warn};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{self, Pid};

pub trait WaitStatusExt {
	fn is_terminated(&self) -> bool;
	fn code(&self) -> i32;
}

impl WaitStatusExt for WaitStatus {
	fn is_terminated(&self) -> bool {
		match *self {
			WaitStatus::Exited(..) | WaitStatus::Signaled(..) => true,
			_ => false,
		}
	}

	/// Shell-style status: the exit code, or 128 + signal number.
	fn code(&self) -> i32 {
		match *self {
			WaitStatus::Exited(_, code) => code,
			WaitStatus::Signaled(_, sig, _) => 128 + sig as i32,
			_ => -1,
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Process {
	pub pid: Pid,
	pub status: WaitStatus,
}

impl Process {
	fn wait(&mut self, flag: Option<WaitPidFlag>) {
		loop {
			match waitpid(self.pid, flag) {
				Ok(WaitStatus::StillAlive) => return,
				Ok(status) => {
					if status.is_terminated() {
						self.status = status;
					}
					if flag.is_some() || status.is_terminated() {
						return;
					}
				},
				Err(Errno::EINTR) => {},
				Err(e) => {
					warn!("waitpid({}) failed: {}", self.pid, e);
					self.status = WaitStatus::Exited(self.pid, -1);
					return;
				},
			}
		}
	}
}

#[derive(Debug)]
pub struct Job {
	pub processes: Vec<Process>,
	pub line: String,
}

impl Job {
	pub fn is_terminated(&self) -> bool {
		self.processes.iter().all(|pr| pr.status.is_terminated())
	}

	pub fn code(&self) -> i32 {
		self.processes.last().map_or(-1, |pr| pr.status.code())
	}

	pub fn wait(&mut self) {
		for pr in self.processes.iter_mut().filter(|pr| !pr.status.is_terminated()) {
			pr.wait(None);
			debug!("reaped {} with status {}", pr.pid, pr.status.code());
		}
	}

	/// Reaps whatever has already terminated without blocking.
	pub fn poll(&mut self) -> bool {
		for pr in self.processes.iter_mut().filter(|pr| !pr.status.is_terminated()) {
			pr.wait(Some(WaitPidFlag::WNOHANG));
		}
		self.is_terminated()
	}

	pub fn terminate(&self) {
		for pr in self.processes.iter().filter(|pr| !pr.status.is_terminated()) {
			if let Err(e) = signal::kill(pr.pid, Signal::SIGTERM) {
				warn!("kill({}) failed: {}", pr.pid, e);
			}
		}
	}
}

#[derive(Debug)]
pub struct JobBuilder {
	imp: Job,
}

impl JobBuilder {
	pub fn new(size_hint: usize, line: String) -> JobBuilder {
		JobBuilder {
			imp: Job { processes: Vec::with_capacity(size_hint), line: line }
		}
	}

	pub fn push_fork(&mut self) -> nix::Result<unistd::ForkResult> {
		// SAFETY: the child only rewires descriptors and then execs or
		// calls _exit; it never unwinds back into the caller.
		let r = unsafe { unistd::fork() }?;
		if let unistd::ForkResult::Parent { child } = r {
			self.imp.processes.push(Process { pid: child, status: WaitStatus::StillAlive });
		}
		Ok(r)
	}

	pub fn is_empty(&self) -> bool {
		self.imp.processes.is_empty()
	}

	pub fn build(self) -> Job {
		self.imp
	}
}

/// Background jobs that still have to be reaped. Ids are 1-based and reused
/// once a job is gone.
#[derive(Debug, Default)]
pub struct JobSet {
	jobs: Vec<Option<Job>>,
}

impl JobSet {
	pub fn new() -> JobSet {
		JobSet { jobs: vec![] }
	}

	pub fn push(&mut self, job: Job) -> usize {
		let jobs = &mut self.jobs;
		let idx = match jobs.iter().position(|o| o.is_none()) {
			Some(i) => {
				jobs[i] = Some(job);
				i
			},
			None => {
				jobs.push(Some(job));
				jobs.len() - 1
			},
		};
		idx + 1
	}

	pub fn get(&self, id: usize) -> Option<&Job> {
		self.jobs.get(id.checked_sub(1)?)?.as_ref()
	}

	pub fn len(&self) -> usize {
		self.jobs.iter().filter(|o| o.is_some()).count()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn reap(&mut self) -> Vec<(usize, Job)> {
		let mut done = vec![];
		for (i, slot) in self.jobs.iter_mut().enumerate() {
			let finished = match *slot {
				Some(ref mut job) => job.poll(),
				None => false,
			};
			if finished {
				if let Some(job) = slot.take() {
					info!("background job [{}] finished with status {}", i + 1, job.code());
					done.push((i + 1, job));
				}
			}
		}
		let len = self.jobs.iter().rposition(|o| o.is_some()).map_or(0, |i| i + 1);
		self.jobs.truncate(len);
		done
	}
}
