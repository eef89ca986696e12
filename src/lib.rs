//! Execution engine of a small interactive shell: pipelines of external
//! programs wired with pipes, outer redirections, and background jobs.

pub mod builtin;
pub mod error;
pub mod eval;
pub mod global;
pub mod job;
pub mod parser;
pub mod redirect;
pub mod types;

pub use error::{EvalError, ParseError};
pub use eval::{eval, EvalResult};
pub use global::State;
pub use parser::parse;
pub use types::{CommandRequest, Invocation, Pipeline, Redirects};
