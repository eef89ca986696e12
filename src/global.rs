use crate::job;

/// Per-shell state that outlives a single command line.
#[derive(Debug, Default)]
pub struct State {
	pub job_set: job::JobSet,
	pub last_status: i32,
}

impl State {
	pub fn new() -> State {
		let job_set = job::JobSet::new();
		State { job_set: job_set, last_status: 0 }
	}

	/// Collects background jobs that have finished since the last call.
	pub fn reap_background(&mut self) -> Vec<(usize, job::Job)> {
		self.job_set.reap()
	}
}
