//! A minimal template dialect rendered without any external engine.
//!
//! ```text
//! Hello, {{ name }}!
//! {{ if admin }}You are an admin.{{ else }}Welcome back.{{ end }}
//! {{ range users -}}
//!   - {{ .name }} ({{ $.site.domain }})
//! {{ end -}}
//! {{/* comments render nothing */}}
//! ```
//!
//! Paths are resolved against the current value (`.`), which is the whole
//! variable space at the top level and the current element inside `range`.
//! `$` always refers to the whole variable space. `{{-` and `-}}` trim the
//! whitespace next to an action.
//!
//! Keys that are not identifiers, such as `db.host` or `server-name` from a
//! `key=value` file, and sequence positions are reached with `index`:
//!
//! ```text
//! {{ index . "db.host" }}
//! {{ range index $ "server-names" }}{{ . }}{{ end }}
//! {{ index .users 0 "display-name" }}
//! ```

use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::vec::IntoIter;

use logos::Logos;

use super::RenderOutcome;
use super::RenderPhase;
use super::RenderRequest;
use super::Renderer;
use super::read_template;
use crate::MooltahError;
use crate::MooltahResult;
use crate::Value;
use crate::VariableSpace;

const ACTION_OPEN: &str = "{{";
const ACTION_CLOSE: &str = "}}";

/// Tokens that may appear between `{{` and `}}`.
#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum ActionToken {
	#[token("if")]
	If,
	#[token("else")]
	Else,
	#[token("end")]
	End,
	#[token("range")]
	Range,
	#[token("index")]
	Index,
	#[token(".")]
	Dot,
	#[regex(r"\$(\.[A-Za-z_][A-Za-z0-9_]*)*", |lex| lex.slice().to_string())]
	RootPath(String),
	#[regex(r"(\.[A-Za-z_][A-Za-z0-9_]*)+", |lex| lex.slice().to_string())]
	DotPath(String),
	#[regex(r"[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*", |lex| lex.slice().to_string())]
	Path(String),
	#[regex(r#""([^"\\]|\\.)*""#, |lex| unquote(lex.slice()))]
	Quoted(String),
	#[regex(r"[0-9]+", |lex| lex.slice().parse::<usize>().ok())]
	Position(usize),
}

/// Strip the quotes of a string literal and resolve `\"` and `\\` escapes.
fn unquote(literal: &str) -> String {
	let inner = &literal[1..literal.len() - 1];
	let mut unquoted = String::with_capacity(inner.len());
	let mut chars = inner.chars();

	while let Some(c) = chars.next() {
		if c == '\\' {
			if let Some(escaped) = chars.next() {
				unquoted.push(escaped);
			}
		} else {
			unquoted.push(c);
		}
	}

	unquoted
}

/// One step of a [`ValuePath`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
	/// A mapping key.
	Key(String),
	/// A zero based sequence position.
	Position(usize),
}

impl fmt::Display for Segment {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Key(key) => f.write_str(key),
			Self::Position(position) => write!(f, "{position}"),
		}
	}
}

/// A reference to a value, e.g. `.`, `name`, `.site.domain`, `$.users`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ValuePath {
	from_root: bool,
	segments: Vec<Segment>,
}

impl ValuePath {
	fn parse(raw: &str) -> Self {
		let (from_root, rest) = match raw.strip_prefix('$') {
			Some(rest) => (true, rest),
			None => (false, raw),
		};

		Self {
			from_root,
			segments: rest
				.split('.')
				.filter(|segment| !segment.is_empty())
				.map(|segment| Segment::Key(segment.to_string()))
				.collect(),
		}
	}
}

impl fmt::Display for ValuePath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let starts_with_name =
			matches!(self.segments.first(), Some(Segment::Key(key)) if is_identifier(key));
		if self.from_root {
			f.write_str("$")?;
		} else if self.segments.is_empty() {
			return f.write_str(".");
		} else if !starts_with_name {
			f.write_str(".")?;
		}

		for segment in &self.segments {
			match segment {
				Segment::Key(key) if is_identifier(key) => write!(f, ".{key}")?,
				Segment::Key(key) => write!(f, "[{key:?}]")?,
				Segment::Position(position) => write!(f, "[{position}]")?,
			}
		}

		Ok(())
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
	Print(ValuePath),
	If(ValuePath),
	Range(ValuePath),
	Else,
	End,
}

#[derive(Debug)]
enum Item {
	Text(String),
	Action { action: Action, line: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
	Text(String),
	Print(ValuePath),
	If {
		condition: ValuePath,
		then: Vec<Node>,
		otherwise: Vec<Node>,
	},
	Range {
		target: ValuePath,
		body: Vec<Node>,
		otherwise: Vec<Node>,
	},
}

enum Terminator {
	Else(usize),
	End(usize),
	Eof,
}

/// A parsed native template, ready to be evaluated any number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeTemplate {
	nodes: Vec<Node>,
}

impl NativeTemplate {
	/// Parse template source. Fails on unterminated actions, unknown
	/// keywords and unbalanced `if`/`range`/`end` blocks.
	pub fn parse(source: &str) -> MooltahResult<Self> {
		let items = split_items(source)?;
		let mut items = items.into_iter();

		match parse_nodes(&mut items)? {
			(nodes, Terminator::Eof) => Ok(Self { nodes }),
			(_, Terminator::Else(line)) => {
				Err(template_error(line, "`else` without `if` or `range`"))
			}
			(_, Terminator::End(line)) => {
				Err(template_error(line, "`end` without `if` or `range`"))
			}
		}
	}

	/// Evaluate the template into `out`.
	pub fn render_to(
		&self,
		variables: &VariableSpace,
		out: &mut impl Write,
	) -> MooltahResult<()> {
		let root = variables.to_value();
		let mut evaluator = Evaluator { root: &root, out };
		evaluator.eval(&self.nodes, &root)
	}

	/// Evaluate the template into a string.
	pub fn render(&self, variables: &VariableSpace) -> MooltahResult<String> {
		let mut buffer = Vec::new();
		self.render_to(variables, &mut buffer)?;
		String::from_utf8(buffer).map_err(|e| MooltahError::Template(e.to_string()))
	}
}

/// Renders the native dialect straight into the destination file.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeRenderer;

impl NativeRenderer {
	pub fn new() -> Self {
		Self
	}
}

impl Renderer for NativeRenderer {
	fn render(&self, request: &RenderRequest) -> MooltahResult<RenderOutcome> {
		let source = read_template(&request.template)?;

		tracing::debug!(phase = %RenderPhase::Parsing, template = %request.template.display());
		let template = NativeTemplate::parse(&source)?;

		tracing::debug!(phase = %RenderPhase::Evaluating, output = %request.output.display());
		let file =
			File::create(&request.output).map_err(|e| MooltahError::file(&request.output, e))?;
		let result = {
			let mut writer = BufWriter::new(file);
			template
				.render_to(&request.variables, &mut writer)
				.and_then(|()| {
					writer
						.flush()
						.map_err(|e| MooltahError::file(&request.output, e))
				})
		};

		if let Err(e) = result {
			// Never leave a half rendered destination behind.
			let _ = std::fs::remove_file(&request.output);
			return Err(e);
		}

		Ok(RenderOutcome::WrittenByBackend)
	}
}

struct Evaluator<'a, W: Write> {
	root: &'a Value,
	out: &'a mut W,
}

impl<'a, W: Write> Evaluator<'a, W> {
	fn eval(&mut self, nodes: &[Node], dot: &Value) -> MooltahResult<()> {
		for node in nodes {
			match node {
				Node::Text(text) => self.write(text)?,
				Node::Print(path) => {
					let value = self.resolve(path, dot)?;
					let text = display_value(value)?;
					self.write(&text)?;
				}
				Node::If {
					condition,
					then,
					otherwise,
				} => {
					let branch = if is_truthy(self.resolve(condition, dot)?) {
						then
					} else {
						otherwise
					};
					self.eval(branch, dot)?;
				}
				Node::Range {
					target,
					body,
					otherwise,
				} => {
					let items: Vec<&Value> = match self.resolve(target, dot)? {
						Value::Array(items) => items.iter().collect(),
						Value::Object(map) => map.values().collect(),
						Value::Null => Vec::new(),
						other => {
							return Err(MooltahError::Template(format!(
								"cannot range over `{target}`: it is {}",
								kind_of(other)
							)));
						}
					};

					if items.is_empty() {
						self.eval(otherwise, dot)?;
					}

					for item in items {
						self.eval(body, item)?;
					}
				}
			}
		}

		Ok(())
	}

	fn resolve<'v>(&self, path: &ValuePath, dot: &'v Value) -> MooltahResult<&'v Value>
	where
		'a: 'v,
	{
		let mut current: &'v Value = if path.from_root { self.root } else { dot };

		for segment in &path.segments {
			current = match (current, segment) {
				(Value::Object(map), Segment::Key(key)) => {
					map.get(key).ok_or_else(|| {
						MooltahError::Template(format!("undefined variable `{path}`"))
					})?
				}
				(Value::Array(items), Segment::Position(position)) => {
					items.get(*position).ok_or_else(|| {
						MooltahError::Template(format!(
							"position {position} is out of range in `{path}`"
						))
					})?
				}
				(other, _) => {
					return Err(MooltahError::Template(format!(
						"cannot read `{segment}` of `{path}`: value is {}",
						kind_of(other)
					)));
				}
			};
		}

		Ok(current)
	}

	fn write(&mut self, text: &str) -> MooltahResult<()> {
		self.out.write_all(text.as_bytes()).map_err(MooltahError::Io)
	}
}

/// Split the source into literal text and actions, applying trim markers
/// and dropping comments.
fn split_items(source: &str) -> MooltahResult<Vec<Item>> {
	let mut items = Vec::new();
	let mut rest = source;
	let mut line = 1;
	let mut trim_next_text = false;

	loop {
		let Some(open) = rest.find(ACTION_OPEN) else {
			push_text(&mut items, rest, trim_next_text);
			break;
		};

		line += count_lines(&rest[..open]);
		let after_open = &rest[open + ACTION_OPEN.len()..];
		let Some(close) = after_open.find(ACTION_CLOSE) else {
			return Err(template_error(line, "unterminated action, missing `}}`"));
		};

		let raw_inner = &after_open[..close];
		let mut inner = raw_inner;
		let trim_before = inner.starts_with('-');
		if trim_before {
			inner = &inner[1..];
		}
		let trim_after = inner.ends_with('-');
		if trim_after {
			inner = &inner[..inner.len() - 1];
		}

		let mut text = &rest[..open];
		if trim_before {
			text = text.trim_end();
		}
		push_text(&mut items, text, trim_next_text);

		let inner = inner.trim();
		let is_comment = inner.starts_with("/*") && inner.ends_with("*/") && inner.len() >= 4;
		if !is_comment {
			items.push(Item::Action {
				action: parse_action(inner, line)?,
				line,
			});
		}

		trim_next_text = trim_after;
		line += count_lines(raw_inner);
		rest = &after_open[close + ACTION_CLOSE.len()..];
	}

	Ok(items)
}

fn push_text(items: &mut Vec<Item>, text: &str, trim_start: bool) {
	let text = if trim_start { text.trim_start() } else { text };
	if !text.is_empty() {
		items.push(Item::Text(text.to_string()));
	}
}

fn parse_action(inner: &str, line: usize) -> MooltahResult<Action> {
	let mut tokens = Vec::new();
	for (token, span) in ActionToken::lexer(inner).spanned() {
		let token = token.map_err(|()| {
			template_error(line, &format!("unexpected `{}` in action", &inner[span]))
		})?;
		tokens.push(token);
	}

	match tokens.as_slice() {
		[] => Err(template_error(line, "empty action")),
		[ActionToken::Else] => Ok(Action::Else),
		[ActionToken::End] => Ok(Action::End),
		[ActionToken::If] | [ActionToken::Range] => {
			Err(template_error(line, "`if` and `range` need a value to test"))
		}
		[ActionToken::If, value @ ..] => Ok(Action::If(parse_value(value, inner, line)?)),
		[ActionToken::Range, value @ ..] => Ok(Action::Range(parse_value(value, inner, line)?)),
		value => Ok(Action::Print(parse_value(value, inner, line)?)),
	}
}

/// Parse a single path, or `index <path> <key-or-position>...`.
fn parse_value(tokens: &[ActionToken], inner: &str, line: usize) -> MooltahResult<ValuePath> {
	match tokens {
		[ActionToken::Index, base, keys @ ..] => {
			if keys.is_empty() {
				return Err(template_error(line, "`index` needs at least one key"));
			}

			let mut path = into_path(base, line)?;
			for key in keys {
				let segment = match key {
					ActionToken::Quoted(key) => Segment::Key(key.clone()),
					ActionToken::Position(position) => Segment::Position(*position),
					_ => {
						return Err(template_error(
							line,
							"`index` keys must be quoted strings or positions",
						));
					}
				};
				path.segments.push(segment);
			}

			Ok(path)
		}
		[ActionToken::Index] => Err(template_error(line, "`index` needs a value and a key")),
		[single] => into_path(single, line),
		_ => Err(template_error(line, &format!("unexpected action `{{{{ {inner} }}}}`"))),
	}
}

fn into_path(token: &ActionToken, line: usize) -> MooltahResult<ValuePath> {
	match token {
		ActionToken::Dot => Ok(ValuePath::parse(".")),
		ActionToken::RootPath(raw) | ActionToken::DotPath(raw) | ActionToken::Path(raw) => {
			Ok(ValuePath::parse(raw))
		}
		ActionToken::Quoted(_) | ActionToken::Position(_) => {
			Err(template_error(line, "literals can only be used as `index` keys"))
		}
		ActionToken::If
		| ActionToken::Else
		| ActionToken::End
		| ActionToken::Range
		| ActionToken::Index => Err(template_error(line, "expected a value, found a keyword")),
	}
}

type Items = IntoIter<Item>;

fn parse_nodes(items: &mut Items) -> MooltahResult<(Vec<Node>, Terminator)> {
	let mut nodes = Vec::new();

	while let Some(item) = items.next() {
		let (action, line) = match item {
			Item::Text(text) => {
				nodes.push(Node::Text(text));
				continue;
			}
			Item::Action { action, line } => (action, line),
		};

		match action {
			Action::Print(path) => nodes.push(Node::Print(path)),
			Action::Else => return Ok((nodes, Terminator::Else(line))),
			Action::End => return Ok((nodes, Terminator::End(line))),
			Action::If(condition) => {
				let (then, otherwise) = parse_block(items, "if", line)?;
				nodes.push(Node::If {
					condition,
					then,
					otherwise,
				});
			}
			Action::Range(target) => {
				let (body, otherwise) = parse_block(items, "range", line)?;
				nodes.push(Node::Range {
					target,
					body,
					otherwise,
				});
			}
		}
	}

	Ok((nodes, Terminator::Eof))
}

/// Parse the body of an `if`/`range` block and its optional `else` branch.
fn parse_block(
	items: &mut Items,
	keyword: &str,
	opened_at: usize,
) -> MooltahResult<(Vec<Node>, Vec<Node>)> {
	let unclosed =
		|| template_error(opened_at, &format!("`{keyword}` is never closed with `end`"));

	let (body, terminator) = parse_nodes(items)?;
	match terminator {
		Terminator::End(_) => Ok((body, Vec::new())),
		Terminator::Eof => Err(unclosed()),
		Terminator::Else(_) => {
			let (otherwise, terminator) = parse_nodes(items)?;
			match terminator {
				Terminator::End(_) => Ok((body, otherwise)),
				Terminator::Else(line) => {
					Err(template_error(line, &format!("`{keyword}` has more than one `else`")))
				}
				Terminator::Eof => Err(unclosed()),
			}
		}
	}
}

fn display_value(value: &Value) -> MooltahResult<String> {
	match value {
		Value::Null => Ok(String::new()),
		Value::Bool(b) => Ok(b.to_string()),
		Value::Number(n) => Ok(n.to_string()),
		Value::String(s) => Ok(s.clone()),
		Value::Array(_) | Value::Object(_) => {
			serde_json::to_string(value).map_err(|e| MooltahError::Serialize(e.to_string()))
		}
	}
}

fn is_truthy(value: &Value) -> bool {
	match value {
		Value::Null => false,
		Value::Bool(b) => *b,
		Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
		Value::String(s) => !s.is_empty(),
		Value::Array(items) => !items.is_empty(),
		Value::Object(map) => !map.is_empty(),
	}
}

fn kind_of(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "a sequence",
		Value::Object(_) => "a mapping",
	}
}

fn count_lines(text: &str) -> usize {
	text.bytes().filter(|&byte| byte == b'\n').count()
}

fn is_identifier(key: &str) -> bool {
	let mut chars = key.chars();
	chars
		.next()
		.is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
		&& chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn template_error(line: usize, message: &str) -> MooltahError {
	MooltahError::Template(format!("line {line}: {message}"))
}
