use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::Backend;
use crate::MooltahError;
use crate::MooltahResult;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] =
	["mooltah.toml", ".mooltah.toml", ".config/mooltah.toml"];

/// How long the external helper may run before it is killed.
pub const DEFAULT_HELPER_TIMEOUT: Duration = Duration::from_secs(120);

/// Optional defaults loaded from a `mooltah.toml` file.
///
/// ```toml
/// variables = ["defaults.yaml", "site.kv"]
/// template_type = "external"
///
/// [external]
/// helper = "bin/minijinja-cli_amd64"
/// helper_args = []
/// timeout_secs = 30
/// temp_dir = ".cache"
/// ```
///
/// Relative paths are resolved against the directory holding the config
/// file.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
	/// Variable files loaded before any given on the command line.
	#[serde(default)]
	pub variables: Vec<PathBuf>,
	/// Default backend when `--template-type` is not passed.
	#[serde(default)]
	pub template_type: Option<Backend>,
	/// Settings for the external helper backend.
	#[serde(default)]
	pub external: ExternalConfig,
}

/// The `[external]` section of the config file.
#[derive(Debug, Default, Deserialize)]
pub struct ExternalConfig {
	/// Explicit helper executable. Skips the lookup next to the running
	/// binary.
	#[serde(default)]
	pub helper: Option<PathBuf>,
	/// Arguments placed before `-o <output> <template> <datafile>`.
	#[serde(default)]
	pub helper_args: Vec<String>,
	/// Directory searched for `minijinja-cli_<arch>` instead of the
	/// directory of the running binary.
	#[serde(default)]
	pub helper_dir: Option<PathBuf>,
	/// Architecture suffix of the helper name, e.g. `amd64`.
	#[serde(default)]
	pub arch: Option<String>,
	/// Seconds before the helper is killed. Must be at least 1.
	#[serde(default)]
	pub timeout_secs: Option<u64>,
	/// Where the temporary YAML data file is written.
	#[serde(default)]
	pub temp_dir: Option<PathBuf>,
}

impl ConfigFile {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if no candidate exists.
	pub fn discover(root: &Path) -> MooltahResult<Option<(PathBuf, ConfigFile)>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let config = Self::load(&config_path)?;
		Ok(Some((config_path, config)))
	}

	/// Load a config file from an explicit path, resolving relative paths
	/// inside it against the file's directory.
	pub fn load(path: &Path) -> MooltahResult<ConfigFile> {
		let content = std::fs::read_to_string(path).map_err(|e| MooltahError::file(path, e))?;
		let mut config: ConfigFile = toml::from_str(&content).map_err(|e| {
			MooltahError::ConfigParse {
				path: path.display().to_string(),
				reason: e.to_string(),
			}
		})?;

		if config.external.timeout_secs == Some(0) {
			return Err(MooltahError::ConfigParse {
				path: path.display().to_string(),
				reason: "`timeout_secs` must be at least 1".to_string(),
			});
		}

		let base = path.parent().unwrap_or_else(|| Path::new("."));
		config.resolve_relative_paths(base);
		tracing::debug!(path = %path.display(), "loaded config file");

		Ok(config)
	}

	fn resolve_relative_paths(&mut self, base: &Path) {
		for variable in &mut self.variables {
			*variable = base.join(&*variable);
		}

		let external = &mut self.external;
		for path in [
			&mut external.helper,
			&mut external.helper_dir,
			&mut external.temp_dir,
		]
		.into_iter()
		.flatten()
		{
			*path = base.join(&*path);
		}
	}
}

/// Settings for the external helper backend, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalSettings {
	pub helper: Option<PathBuf>,
	pub helper_args: Vec<String>,
	pub helper_dir: Option<PathBuf>,
	pub arch: String,
	pub timeout: Duration,
	pub temp_dir: PathBuf,
}

impl Default for ExternalSettings {
	fn default() -> Self {
		Self {
			helper: None,
			helper_args: Vec::new(),
			helper_dir: None,
			arch: helper_arch(std::env::consts::ARCH).to_string(),
			timeout: DEFAULT_HELPER_TIMEOUT,
			temp_dir: std::env::temp_dir(),
		}
	}
}

impl From<ExternalConfig> for ExternalSettings {
	fn from(config: ExternalConfig) -> Self {
		let defaults = Self::default();

		Self {
			helper: config.helper,
			helper_args: config.helper_args,
			helper_dir: config.helper_dir,
			arch: config.arch.unwrap_or(defaults.arch),
			timeout: config
				.timeout_secs
				.map_or(defaults.timeout, Duration::from_secs),
			temp_dir: config.temp_dir.unwrap_or(defaults.temp_dir),
		}
	}
}

/// Everything a single invocation needs. Built once by the caller and
/// passed by reference into the pipeline.
#[derive(Debug, Clone)]
pub struct MooltahConfig {
	/// Variable files in merge order; the last one wins.
	pub sources: Vec<PathBuf>,
	pub template: PathBuf,
	pub output: PathBuf,
	pub backend: Backend,
	pub external: ExternalSettings,
}

/// Map a Rust target architecture name to the suffix used by the helper
/// binaries (`minijinja-cli_amd64`, `minijinja-cli_arm64`, ...).
pub fn helper_arch(rust_arch: &str) -> &str {
	match rust_arch {
		"x86_64" => "amd64",
		"aarch64" => "arm64",
		"x86" => "386",
		"powerpc64" => "ppc64",
		"loongarch64" => "loong64",
		other => other,
	}
}
