use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use crate::MooltahError;
use crate::MooltahResult;
use crate::Value;
use crate::VariableSpace;
use crate::merge;
use crate::parse_key_values;

/// The decoder used for a variable file, inferred from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
	Yaml,
	Json,
	Toml,
	KeyValue,
}

impl SourceFormat {
	/// Select a format from the path's extension. Matching is case
	/// sensitive: `data.YAML` is not recognized.
	pub fn from_path(path: &Path) -> Option<Self> {
		match path.extension()?.to_str()? {
			"yaml" | "yml" => Some(Self::Yaml),
			"json" => Some(Self::Json),
			"toml" => Some(Self::Toml),
			"kv" | "txt" => Some(Self::KeyValue),
			_ => None,
		}
	}

	/// Short name used in diagnostics.
	pub fn name(self) -> &'static str {
		match self {
			Self::Yaml => "yaml",
			Self::Json => "json",
			Self::Toml => "toml",
			Self::KeyValue => "kv",
		}
	}

	/// Decode raw file contents into a variable space. `path_display` is
	/// only used to label errors.
	pub fn decode(self, data: &[u8], path_display: &str) -> MooltahResult<VariableSpace> {
		let decode_error = |reason: String| {
			MooltahError::Decode {
				path: path_display.to_string(),
				format: self.name().to_string(),
				reason,
			}
		};

		match self {
			Self::KeyValue => parse_key_values(data).map_err(|e| decode_error(e.to_string())),
			Self::Json => {
				let value: Value =
					serde_json::from_slice(data).map_err(|e| decode_error(e.to_string()))?;
				into_space(value, self, path_display)
			}
			Self::Yaml => {
				let content = std::str::from_utf8(data).map_err(|e| decode_error(e.to_string()))?;
				if content.trim().is_empty() {
					return Ok(VariableSpace::new());
				}
				let mut value: serde_yaml_ng::Value =
					serde_yaml_ng::from_str(content).map_err(|e| decode_error(e.to_string()))?;
				value
					.apply_merge()
					.map_err(|e| decode_error(e.to_string()))?;
				into_space(yaml_to_json(value, path_display)?, self, path_display)
			}
			Self::Toml => {
				let content = std::str::from_utf8(data).map_err(|e| decode_error(e.to_string()))?;
				let table: toml::Table =
					toml::from_str(content).map_err(|e| decode_error(e.to_string()))?;
				let mut variables = VariableSpace::new();
				for (key, value) in table {
					variables.insert(key, toml_to_json(value, path_display)?);
				}
				Ok(variables)
			}
		}
	}
}

impl fmt::Display for SourceFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// A variable file together with the format used to decode it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
	pub path: PathBuf,
	pub format: SourceFormat,
}

impl SourceFile {
	/// Returns `None` when the extension is not a supported format.
	pub fn new(path: impl Into<PathBuf>) -> Option<Self> {
		let path = path.into();
		let format = SourceFormat::from_path(&path)?;
		Some(Self { path, format })
	}

	/// Read and decode the file.
	pub fn load(&self) -> MooltahResult<VariableSpace> {
		let data = std::fs::read(&self.path).map_err(|e| MooltahError::file(&self.path, e))?;
		self.format.decode(&data, &self.path.display().to_string())
	}
}

/// The outcome of loading every variable file of an invocation.
#[derive(Debug, Clone, Default)]
pub struct LoadedVariables {
	/// All loaded files merged in the order given.
	pub variables: VariableSpace,
	/// Files that were read and merged.
	pub loaded: Vec<SourceFile>,
	/// Files skipped because their extension is not supported.
	pub skipped: Vec<PathBuf>,
}

/// Load every file in `paths` and merge them left to right.
///
/// Unsupported extensions are skipped with a warning. The first read or
/// decode failure aborts the whole load.
pub fn load_sources<P: AsRef<Path>>(paths: &[P]) -> MooltahResult<LoadedVariables> {
	let mut result = LoadedVariables::default();

	for path in paths {
		let path = path.as_ref();
		let Some(source) = SourceFile::new(path) else {
			tracing::warn!(path = %path.display(), "unsupported variable file format, skipping");
			result.skipped.push(path.to_path_buf());
			continue;
		};

		tracing::debug!(path = %path.display(), format = %source.format, "loading variable file");
		let variables = source.load().inspect_err(|e| {
			tracing::error!(path = %path.display(), error = %e, "failed to load variable file");
		})?;

		result.variables = merge(std::mem::take(&mut result.variables), variables);
		result.loaded.push(source);
	}

	Ok(result)
}

/// Require a decoded document to be a mapping. An empty document (`null`)
/// is treated as an empty mapping.
fn into_space(
	value: Value,
	format: SourceFormat,
	path_display: &str,
) -> MooltahResult<VariableSpace> {
	match value {
		Value::Object(map) => Ok(VariableSpace::from(map)),
		Value::Null => Ok(VariableSpace::new()),
		other => {
			Err(MooltahError::Decode {
				path: path_display.to_string(),
				format: format.name().to_string(),
				reason: format!("top-level value must be a mapping, found {}", kind_of(&other)),
			})
		}
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

/// Convert a `serde_yaml_ng::Value` with merge keys already applied to a
/// `serde_json::Value`. Scalar mapping keys are stringified and tags are
/// dropped.
fn yaml_to_json(value: serde_yaml_ng::Value, path_display: &str) -> MooltahResult<Value> {
	use serde_yaml_ng::Value as Yaml;

	let json = match value {
		Yaml::Null => Value::Null,
		Yaml::Bool(b) => Value::Bool(b),
		Yaml::Number(n) => {
			if let Some(i) = n.as_i64() {
				Value::Number(i.into())
			} else if let Some(u) = n.as_u64() {
				Value::Number(u.into())
			} else {
				let f = n.as_f64().unwrap_or(f64::NAN);
				Value::Number(serde_json::Number::from_f64(f).ok_or_else(|| {
					MooltahError::UnconvertibleFloat {
						path: path_display.to_string(),
						value: n.to_string(),
					}
				})?)
			}
		}
		Yaml::String(s) => Value::String(s),
		Yaml::Sequence(items) => {
			let items: MooltahResult<Vec<Value>> = items
				.into_iter()
				.map(|v| yaml_to_json(v, path_display))
				.collect();
			Value::Array(items?)
		}
		Yaml::Mapping(mapping) => {
			let mut map = serde_json::Map::new();
			for (k, v) in mapping {
				map.insert(yaml_key(k, path_display)?, yaml_to_json(v, path_display)?);
			}
			Value::Object(map)
		}
		Yaml::Tagged(tagged) => yaml_to_json(tagged.value, path_display)?,
	};

	Ok(json)
}

fn yaml_key(key: serde_yaml_ng::Value, path_display: &str) -> MooltahResult<String> {
	use serde_yaml_ng::Value as Yaml;

	match key {
		Yaml::String(s) => Ok(s),
		Yaml::Bool(b) => Ok(b.to_string()),
		Yaml::Number(n) => Ok(n.to_string()),
		Yaml::Null => Ok("null".to_string()),
		Yaml::Tagged(tagged) => yaml_key(tagged.value, path_display),
		Yaml::Sequence(_) | Yaml::Mapping(_) => {
			Err(MooltahError::Decode {
				path: path_display.to_string(),
				format: SourceFormat::Yaml.name().to_string(),
				reason: "mapping keys must be scalars".to_string(),
			})
		}
	}
}

/// Convert a `toml::Value` to a `serde_json::Value`.
fn toml_to_json(value: toml::Value, path_display: &str) -> MooltahResult<Value> {
	let json = match value {
		toml::Value::String(s) => Value::String(s),
		toml::Value::Integer(i) => Value::Number(i.into()),
		toml::Value::Float(f) => {
			Value::Number(serde_json::Number::from_f64(f).ok_or_else(|| {
				MooltahError::UnconvertibleFloat {
					path: path_display.to_string(),
					value: f.to_string(),
				}
			})?)
		}
		toml::Value::Boolean(b) => Value::Bool(b),
		toml::Value::Datetime(dt) => Value::String(dt.to_string()),
		toml::Value::Array(arr) => {
			let items: MooltahResult<Vec<Value>> = arr
				.into_iter()
				.map(|v| toml_to_json(v, path_display))
				.collect();
			Value::Array(items?)
		}
		toml::Value::Table(table) => {
			let mut map = serde_json::Map::new();
			for (k, v) in table {
				map.insert(k, toml_to_json(v, path_display)?);
			}
			Value::Object(map)
		}
	};

	Ok(json)
}
