use std::path::PathBuf;
use std::process;

use anyhow::Context;
use argh::FromArgs;
use log::debug;
use nix::sys::signal::{self, SigHandler, Signal};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use forksh::{eval, parse, EvalResult, State};

const STATUS_PARSE_ERROR: i32 = 2;
const STATUS_FAILURE: i32 = 1;

/// A small shell running pipelines of external programs.
#[derive(FromArgs)]
struct Args {
	/// run a single command line and exit with its status
	#[argh(option, short = 'c')]
	command: Option<String>,

	/// file to load history from and save it to
	#[argh(option)]
	history: Option<PathBuf>,

	/// prompt string
	#[argh(option, default = "String::from(\"> \")")]
	prompt: String,
}

enum Step {
	Continue,
	Exit(i32),
}

fn run_line(state: &mut State, line: &str) -> Step {
	let request = match parse(line.as_bytes()) {
		Ok(Some(request)) => request,
		Ok(None) => return Step::Continue,
		Err(e) => {
			eprintln!("forksh: parse error: {}", e);
			state.last_status = STATUS_PARSE_ERROR;
			return Step::Continue;
		},
	};
	match eval(state, &request) {
		Ok(EvalResult::Done(_)) => Step::Continue,
		Ok(EvalResult::Background { id, pid }) => {
			println!("[{}] {}", id, pid);
			Step::Continue
		},
		Ok(EvalResult::Exit(s)) => Step::Exit(s),
		Err(e) => {
			eprintln!("forksh: {}", e);
			state.last_status = STATUS_FAILURE;
			if e.is_fatal() { Step::Exit(STATUS_FAILURE) } else { Step::Continue }
		},
	}
}

fn report_background(state: &mut State) {
	for (id, job) in state.reap_background() {
		println!("[{}] Done {}  {}", id, job.code(), job.line);
	}
}

fn ignore_interactive_signals() -> nix::Result<()> {
	for &sig in &[Signal::SIGINT, Signal::SIGQUIT] {
		unsafe { signal::signal(sig, SigHandler::SigIgn) }?;
	}
	Ok(())
}

fn repl(state: &mut State, args: &Args) -> anyhow::Result<i32> {
	let mut rl = DefaultEditor::new().context("cannot initialize line editor")?;
	if let Some(ref path) = args.history {
		if path.exists() {
			rl.load_history(path).with_context(|| format!("cannot load history from {}", path.display()))?;
		}
	}
	ignore_interactive_signals().context("cannot set signal dispositions")?;

	let s = loop {
		report_background(state);
		match rl.readline(&args.prompt) {
			Ok(line) => {
				let line = line.trim();
				if line.is_empty() {
					continue;
				}
				rl.add_history_entry(line)?;
				if let Step::Exit(s) = run_line(state, line) {
					break s;
				}
			},
			Err(ReadlineError::Interrupted) => continue,
			Err(ReadlineError::Eof) => break state.last_status,
			Err(e) => return Err(e).context("cannot read input"),
		}
	};

	if let Some(ref path) = args.history {
		rl.save_history(path).with_context(|| format!("cannot save history to {}", path.display()))?;
	}
	Ok(s)
}

fn main() {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
	let args: Args = argh::from_env();
	let mut state = State::new();

	let s = match args.command {
		Some(ref line) => match run_line(&mut state, line.trim()) {
			Step::Exit(s) => s,
			Step::Continue => state.last_status,
		},
		None => repl(&mut state, &args).unwrap_or_else(|e| {
			eprintln!("forksh: {:#}", e);
			STATUS_FAILURE
		}),
	};
	debug!("exiting with status {}, {} background job(s) left", s, state.job_set.len());
	process::exit(s)
}
