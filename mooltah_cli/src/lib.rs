use std::path::PathBuf;

use clap::Parser;
use clap::ValueEnum;
use mooltah_core::Backend;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Render a template with variables merged from YAML, JSON, TOML, and key=value files.",
	long_about = "mooltah loads one or more variable files, merges them into a single namespace \
	              and renders a template against it.\n\nFiles are merged in the order given and \
	              the last file wins on conflicting top-level keys. The format of each file is \
	              picked from its extension: .yaml/.yml, .json, .toml, or .kv/.txt for \
	              key=value files. Files with any other extension are skipped with a \
	              warning.\n\nExamples:\n  mooltah -v defaults.yaml -v local.kv -o nginx.conf \
	              nginx.conf.j2\n  mooltah -t native -v vars.toml -o motd motd.tmpl\n  mooltah \
	              -v defaults.yaml -v local.kv --dump"
)]
pub struct MooltahCli {
	/// Template file to render.
	pub template: Option<PathBuf>,

	/// Variable file to load. Repeat to load several files; later files
	/// override earlier ones.
	#[arg(short = 'v', long = "variable", value_name = "FILE")]
	pub variables: Vec<PathBuf>,

	/// File the rendered template is written to.
	#[arg(short, long, value_name = "FILE")]
	pub output: Option<PathBuf>,

	/// Rendering backend. Defaults to the config file's `template_type`,
	/// then `jinja2`.
	#[arg(short = 't', long, value_enum, value_name = "TYPE")]
	pub template_type: Option<TemplateType>,

	/// Config file to use instead of discovering `mooltah.toml` in the
	/// current directory.
	#[arg(long, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Seconds the external helper may run before it is killed. Must be at
	/// least 1.
	#[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
	pub timeout: Option<u64>,

	/// Path of the external helper executable.
	#[arg(long, value_name = "PATH")]
	pub helper: Option<PathBuf>,

	/// Print the merged variables as JSON and exit without rendering.
	#[arg(long, default_value_t = false)]
	pub dump: bool,

	/// Enable verbose output.
	#[arg(long, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TemplateType {
	/// In-process jinja-like engine.
	#[value(name = "jinja2", alias = "jinja")]
	Jinja2,
	/// Built-in minimal dialect: `{{ .path }}`, `if`, `range`, `end`.
	#[value(alias = "text")]
	Native,
	/// The `minijinja-cli_<arch>` helper executable.
	#[value(alias = "minijinja-cli")]
	External,
}

impl From<TemplateType> for Backend {
	fn from(value: TemplateType) -> Self {
		match value {
			TemplateType::Jinja2 => Self::Jinja,
			TemplateType::Native => Self::Native,
			TemplateType::External => Self::External,
		}
	}
}
