use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;
use std::path::PathBuf;

use crate::error::ParseError;
use crate::types::*;

type ParseResult<T> = Result<T, ParseError>;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum Slot { Stdin, Stdout, Stderr }

#[derive(Debug)]
struct Redirect {
	slot: Slot,
	target: PathBuf,
}

#[derive(Debug)]
struct Stage {
	words: Vec<OsString>,
	redirects: Vec<Redirect>,
}

struct Parser<'a> {
	line: &'a [u8],
	i: usize,
}

impl<'a> Parser<'a> {
	fn proceed_while<F>(&mut self, f: F) where F: Fn(u8) -> bool {
		while let Some(c) = self.line.get(self.i) {
			if !f(*c) { break; }
			self.i += 1;
		}
	}

	fn is_whitespace(c: u8) -> bool {
		match c {
			b' ' | b'\t' | b'\n' | b'\r' => true,
			_ => false,
		}
	}

	fn is_letter(c: u8) -> bool {
		match c {
			b'>' | b'<' | b'&' | b'|' => false,
			_ => !Parser::is_whitespace(c),
		}
	}

	fn skip_whitespaces(&mut self) {
		self.proceed_while(Parser::is_whitespace);
	}

	fn read_word(&mut self) -> &'a [u8] {
		let orig = self.i;
		self.proceed_while(Parser::is_letter);
		&self.line[orig .. self.i]
	}

	fn read_number(&mut self) -> &'a [u8] {
		let orig = self.i;
		self.proceed_while(|c| c.is_ascii_digit());
		&self.line[orig .. self.i]
	}

	/// Rewinds and returns `Ok(None)` when the input at the cursor is not a
	/// redirection, so that `2` in `echo 2` stays an ordinary word.
	fn parse_redirect(&mut self) -> ParseResult<Option<Redirect>> {
		let orig = self.i;
		let num = self.read_number();

		let slot = match (self.line.get(self.i), num) {
			(Some(&b'<'), b"") | (Some(&b'<'), b"0") => Slot::Stdin,
			(Some(&b'>'), b"") | (Some(&b'>'), b"1") => Slot::Stdout,
			(Some(&b'>'), b"2") => Slot::Stderr,
			(Some(&c), _) if c == b'<' || c == b'>' => {
				let mut op = String::from_utf8_lossy(num).into_owned();
				op.push(c as char);
				return Err(ParseError::UnsupportedRedirect(op));
			},
			_ => {
				self.i = orig;
				return Ok(None);
			},
		};
		self.i += 1;

		self.skip_whitespaces();
		let target = self.read_word();
		if target.is_empty() {
			return Err(ParseError::EmptyRedirectTarget);
		}

		Ok(Some(Redirect { slot: slot, target: PathBuf::from(OsString::from_vec(target.to_vec())) }))
	}

	fn parse_stage(&mut self) -> ParseResult<Stage> {
		let mut words: Vec<OsString> = vec![];
		let mut redirects: Vec<Redirect> = vec![];

		loop {
			self.skip_whitespaces();
			if let Some(redirect) = self.parse_redirect()? {
				redirects.push(redirect);
				continue;
			}
			let word = self.read_word();
			if word.is_empty() {
				break;
			}
			words.push(OsString::from_vec(word.to_vec()));
		}

		if words.is_empty() {
			return Err(ParseError::EmptyCommand);
		}
		Ok(Stage { words: words, redirects: redirects })
	}

	fn parse_request(&mut self) -> ParseResult<CommandRequest> {
		let mut stages: Vec<Stage> = vec![];
		let mut is_background = false;

		loop {
			stages.push(self.parse_stage()?);
			match self.line.get(self.i) {
				Some(&b'|') => { self.i += 1; },
				Some(&b'&') => {
					self.i += 1;
					is_background = true;
					self.skip_whitespaces();
					if let Some(&c) = self.line.get(self.i) {
						return Err(ParseError::TrailingCharacters(c as char));
					}
					break;
				},
				Some(&c) => { return Err(ParseError::TrailingCharacters(c as char)); },
				None => { break; },
			}
		}

		let last = stages.len() - 1;
		let mut redirects = Redirects::default();
		let mut invocations = Vec::with_capacity(stages.len());
		for (i, stage) in stages.into_iter().enumerate() {
			for redirect in stage.redirects {
				match redirect.slot {
					Slot::Stdin if i != 0 => return Err(ParseError::MisplacedRedirect("input", "first")),
					Slot::Stdout if i != last => return Err(ParseError::MisplacedRedirect("output", "last")),
					Slot::Stdin => redirects.stdin = Some(redirect.target),
					Slot::Stdout => redirects.stdout = Some(redirect.target),
					Slot::Stderr => redirects.stderr = Some(redirect.target),
				}
			}
			invocations.push(Invocation::new(stage.words));
		}

		Ok(CommandRequest {
			pipeline: Pipeline::new(invocations),
			redirects: redirects,
			is_background: is_background,
		})
	}
}

/// Parses one input line. Returns `Ok(None)` for a blank line.
pub fn parse(line: &[u8]) -> ParseResult<Option<CommandRequest>> {
	let mut parser = Parser { line: line, i: 0 };
	parser.skip_whitespaces();
	if parser.i == line.len() {
		return Ok(None);
	}
	parser.parse_request().map(Some)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::path::Path;

	fn parse_ok(line: &str) -> CommandRequest {
		parse(line.as_bytes()).unwrap().unwrap()
	}

	fn argv(request: &CommandRequest, stage: usize) -> Vec<&str> {
		request.pipeline.stages()[stage].argv().iter().map(|a| a.to_str().unwrap()).collect()
	}

	#[test]
	fn blank_line() {
		assert_eq!(parse(b"").unwrap(), None);
		assert_eq!(parse(b"  \t ").unwrap(), None);
	}

	#[test]
	fn single_command() {
		let r = parse_ok("ls -l /tmp");
		assert_eq!(r.pipeline.len(), 1);
		assert_eq!(argv(&r, 0), vec!["ls", "-l", "/tmp"]);
		assert!(r.redirects.is_empty());
		assert!(!r.is_background);
	}

	#[test]
	fn pipeline_in_execution_order() {
		let r = parse_ok("cat file|grep x | wc -l");
		assert_eq!(r.pipeline.len(), 3);
		assert_eq!(argv(&r, 0), vec!["cat", "file"]);
		assert_eq!(argv(&r, 1), vec!["grep", "x"]);
		assert_eq!(argv(&r, 2), vec!["wc", "-l"]);
	}

	#[test]
	fn redirects_and_background() {
		let r = parse_ok("sort < in.txt | uniq > out.txt 2> err.log &");
		assert_eq!(r.redirects.stdin.as_deref(), Some(Path::new("in.txt")));
		assert_eq!(r.redirects.stdout.as_deref(), Some(Path::new("out.txt")));
		assert_eq!(r.redirects.stderr.as_deref(), Some(Path::new("err.log")));
		assert!(r.is_background);
		assert_eq!(argv(&r, 1), vec!["uniq"]);
	}

	#[test]
	fn redirect_before_name_and_without_space() {
		let r = parse_ok("<in cat >out");
		assert_eq!(argv(&r, 0), vec!["cat"]);
		assert_eq!(r.redirects.stdin.as_deref(), Some(Path::new("in")));
		assert_eq!(r.redirects.stdout.as_deref(), Some(Path::new("out")));
	}

	#[test]
	fn digits_are_words_unless_redirecting() {
		let r = parse_ok("echo 2 12");
		assert_eq!(argv(&r, 0), vec!["echo", "2", "12"]);
		assert!(r.redirects.is_empty());
	}

	#[test]
	fn last_redirect_wins() {
		let r = parse_ok("echo a > first > second");
		assert_eq!(r.redirects.stdout.as_deref(), Some(Path::new("second")));
	}

	#[test]
	fn stderr_redirect_from_any_stage() {
		let r = parse_ok("a 2> err | b");
		assert_eq!(r.redirects.stderr.as_deref(), Some(Path::new("err")));
	}

	#[test]
	fn errors() {
		assert_eq!(parse(b"| wc"), Err(ParseError::EmptyCommand));
		assert_eq!(parse(b"ls |"), Err(ParseError::EmptyCommand));
		assert_eq!(parse(b"ls >"), Err(ParseError::EmptyRedirectTarget));
		assert_eq!(parse(b"ls >> f"), Err(ParseError::EmptyRedirectTarget));
		assert_eq!(parse(b"ls 3> f"), Err(ParseError::UnsupportedRedirect("3>".to_string())));
		assert_eq!(parse(b"ls 2< f"), Err(ParseError::UnsupportedRedirect("2<".to_string())));
		assert_eq!(parse(b"sleep 1 & ls"), Err(ParseError::TrailingCharacters('l')));
		assert_eq!(parse(b"a | b < f"), Err(ParseError::MisplacedRedirect("input", "first")));
		assert_eq!(parse(b"a > f | b"), Err(ParseError::MisplacedRedirect("output", "last")));
	}
}
