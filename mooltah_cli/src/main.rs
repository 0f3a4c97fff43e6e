use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use clap::Parser;
use mooltah_cli::MooltahCli;
use mooltah_core::Backend;
use mooltah_core::ConfigFile;
use mooltah_core::ExternalSettings;
use mooltah_core::MooltahConfig;
use mooltah_core::MooltahError;
use mooltah_core::MooltahResult;
use mooltah_core::load_sources;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive.
const LOG_ENV: &str = "MOOLTAH_LOG";

static USE_COLOR: AtomicBool = AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = MooltahCli::parse();

	// Respect NO_COLOR env var and --no-color flag.
	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, Ordering::Relaxed);
	}

	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	init_tracing(args.verbose, use_color);

	let config_file = load_config_file(&args).unwrap_or_else(|e| fail(e));
	let mut sources = config_file.variables;
	sources.extend(args.variables.iter().cloned());

	if args.dump {
		if let Err(e) = run_dump(&sources) {
			fail(e);
		}
		return;
	}

	let (Some(template), Some(output)) = (args.template.clone(), args.output.clone()) else {
		eprintln!(
			"{} both a template and {} are required. Run `mooltah --help` for usage.",
			colored!("error:", red),
			colored!("--output", bold)
		);
		process::exit(1);
	};

	let mut external = ExternalSettings::from(config_file.external);
	if let Some(helper) = &args.helper {
		external.helper = Some(helper.clone());
	}
	if let Some(secs) = args.timeout {
		external.timeout = Duration::from_secs(secs);
	}

	let backend = args
		.template_type
		.map(Backend::from)
		.or(config_file.template_type)
		.unwrap_or_default();

	let config = MooltahConfig {
		sources,
		template,
		output,
		backend,
		external,
	};

	match mooltah_core::run(&config) {
		Ok(summary) => {
			tracing::info!(
				output = %summary.output.display(),
				loaded = summary.loaded.len(),
				skipped = summary.skipped.len(),
				variables = summary.variable_count,
				"template rendered"
			);
		}
		Err(e) => fail(e),
	}
}

/// Log to stderr. `MOOLTAH_LOG` takes precedence; otherwise only warnings
/// are shown, or debug output from mooltah itself with `--verbose`.
fn init_tracing(verbose: bool, use_color: bool) {
	let default_directive = if verbose {
		"warn,mooltah=debug,mooltah_core=debug"
	} else {
		"warn"
	};
	let filter =
		EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directive));

	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.with_target(false)
		.try_init();
}

/// An explicit `--config` file must exist. Without one, the current
/// directory is searched and a missing config is not an error.
fn load_config_file(args: &MooltahCli) -> MooltahResult<ConfigFile> {
	if let Some(path) = &args.config {
		return ConfigFile::load(path);
	}

	let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
	let discovered = ConfigFile::discover(&root)?;

	Ok(discovered.map_or_else(ConfigFile::default, |(path, config)| {
		tracing::debug!(path = %path.display(), "using discovered config file");
		config
	}))
}

fn run_dump(sources: &[PathBuf]) -> MooltahResult<()> {
	let loaded = load_sources(sources)?;
	let json = serde_json::to_string_pretty(&loaded.variables)
		.map_err(|e| MooltahError::Serialize(e.to_string()))?;
	println!("{json}");

	Ok(())
}

/// Render the error through miette and exit with the processing failure
/// code.
fn fail(error: MooltahError) -> ! {
	let report: miette::Report = error.into();
	eprintln!("{report:?}");
	process::exit(2);
}
