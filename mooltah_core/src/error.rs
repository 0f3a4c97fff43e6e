use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum MooltahError {
	#[error(transparent)]
	#[diagnostic(code(mooltah::io_error))]
	Io(#[from] std::io::Error),

	#[error("failed to access `{path}`: {source}")]
	#[diagnostic(code(mooltah::file))]
	File {
		path: String,
		#[source]
		source: std::io::Error,
	},

	#[error("no data to parse: input is empty")]
	#[diagnostic(
		code(mooltah::empty_input),
		help("key=value files need at least one `KEY=VALUE` line")
	)]
	EmptyInput,

	#[error("input is not valid utf-8 (first invalid byte at offset {0})")]
	#[diagnostic(code(mooltah::invalid_utf8))]
	InvalidUtf8(usize),

	#[error("line {line} is not a `key=value` pair: `{content}`")]
	#[diagnostic(
		code(mooltah::malformed_line),
		help("use `KEY=VALUE`, or start the line with `#` to comment it out")
	)]
	MalformedLine { line: usize, content: String },

	#[error("failed to decode {format} file `{path}`: {reason}")]
	#[diagnostic(code(mooltah::decode))]
	Decode {
		path: String,
		format: String,
		reason: String,
	},

	#[error("unconvertible float value in `{path}`: {value}")]
	#[diagnostic(
		code(mooltah::unconvertible_float),
		help("NaN and Infinity cannot be represented as template variables")
	)]
	UnconvertibleFloat { path: String, value: String },

	#[error("failed to parse config file `{path}`: {reason}")]
	#[diagnostic(
		code(mooltah::config_parse),
		help("check that the config is valid TOML with an optional [external] section")
	)]
	ConfigParse { path: String, reason: String },

	#[error("failed to serialize variables: {0}")]
	#[diagnostic(code(mooltah::serialize))]
	Serialize(String),

	#[error("template rendering failed: {0}")]
	#[diagnostic(code(mooltah::template))]
	Template(String),

	#[error("template helper executable not found: `{path}`")]
	#[diagnostic(
		code(mooltah::helper_not_found),
		help(
			"place the helper next to the mooltah binary or set `helper` in the [external] \
			 config section"
		)
	)]
	HelperNotFound { path: String },

	#[error("failed to execute template helper `{path}`: {source}")]
	#[diagnostic(code(mooltah::subprocess_spawn))]
	SubprocessSpawn {
		path: String,
		#[source]
		source: std::io::Error,
	},

	#[error("template helper `{path}` exited with {status}:\n{output}")]
	#[diagnostic(code(mooltah::subprocess_failed))]
	SubprocessFailed {
		path: String,
		status: String,
		output: String,
	},

	#[error("template helper `{path}` did not finish within {timeout} and was killed")]
	#[diagnostic(
		code(mooltah::subprocess_timeout),
		help("raise `timeout_secs` in the [external] config section or pass --timeout")
	)]
	SubprocessTimeout { path: String, timeout: String },
}

impl MooltahError {
	/// Wrap an I/O error with the path that produced it.
	pub fn file(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
		Self::File {
			path: path.as_ref().display().to_string(),
			source,
		}
	}
}

pub type MooltahResult<T> = Result<T, MooltahError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
