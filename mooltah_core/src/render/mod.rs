//! Template rendering backends.
//!
//! Every backend implements [`Renderer`]. The backend is chosen explicitly
//! through [`Backend`]; nothing is auto-detected from the template.
//!
//! - [`jinja`]: in-process `minijinja` engine, returns the rendered text.
//! - [`native`]: in-process minimal dialect, writes the destination itself.
//! - [`external`]: out-of-process helper executable, writes the destination
//!   itself.

use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::ExternalSettings;
use crate::MooltahError;
use crate::MooltahResult;
use crate::VariableSpace;

pub mod external;
pub mod jinja;
pub mod native;

pub use external::ExternalRenderer;
pub use jinja::JinjaRenderer;
pub use native::NativeRenderer;

/// Selects the rendering strategy for an invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
	/// In-process jinja-like engine.
	#[default]
	#[serde(rename = "jinja2", alias = "jinja")]
	Jinja,
	/// In-process minimal templating dialect.
	#[serde(alias = "text")]
	Native,
	/// Helper executable run as a subprocess.
	#[serde(alias = "minijinja-cli")]
	External,
}

impl Backend {
	pub fn name(self) -> &'static str {
		match self {
			Self::Jinja => "jinja2",
			Self::Native => "native",
			Self::External => "external",
		}
	}
}

impl fmt::Display for Backend {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// The lifecycle of a single render. Logged at debug level as a render
/// progresses; there are no retries once `Failed` is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
	Idle,
	Parsing,
	Evaluating,
	Written,
	Failed,
}

impl fmt::Display for RenderPhase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Idle => "idle",
			Self::Parsing => "parsing",
			Self::Evaluating => "evaluating",
			Self::Written => "written",
			Self::Failed => "failed",
		};
		f.write_str(name)
	}
}

/// Everything a backend needs to render one template.
#[derive(Debug, Clone)]
pub struct RenderRequest {
	pub template: PathBuf,
	pub variables: VariableSpace,
	pub output: PathBuf,
	pub backend: Backend,
}

/// What a backend produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
	/// Rendered text that the caller still has to write.
	Rendered(String),
	/// The backend already wrote the destination file.
	WrittenByBackend,
}

/// A template rendering strategy.
pub trait Renderer {
	/// Render `request.template` against `request.variables`.
	fn render(&self, request: &RenderRequest) -> MooltahResult<RenderOutcome>;
}

/// Build the renderer for `backend`.
pub fn renderer_for(backend: Backend, external: &ExternalSettings) -> Box<dyn Renderer> {
	match backend {
		Backend::Jinja => Box::new(JinjaRenderer::new()),
		Backend::Native => Box::new(NativeRenderer::new()),
		Backend::External => Box::new(ExternalRenderer::new(external.clone())),
	}
}

/// Render the request with its selected backend and make sure the output
/// file exists afterwards.
pub fn render_to_destination(
	request: &RenderRequest,
	external: &ExternalSettings,
) -> MooltahResult<()> {
	let renderer = renderer_for(request.backend, external);
	render_with(renderer.as_ref(), request)
}

/// Same as [`render_to_destination`] with an explicit renderer.
pub fn render_with(renderer: &dyn Renderer, request: &RenderRequest) -> MooltahResult<()> {
	tracing::debug!(
		phase = %RenderPhase::Idle,
		backend = %request.backend,
		template = %request.template.display(),
		"starting render"
	);

	let outcome = renderer.render(request).inspect_err(|e| {
		tracing::debug!(phase = %RenderPhase::Failed, error = %e, "render failed");
	})?;

	if let RenderOutcome::Rendered(text) = outcome {
		write_output(&request.output, &text)?;
	}

	tracing::debug!(
		phase = %RenderPhase::Written,
		output = %request.output.display(),
		"render complete"
	);

	Ok(())
}

/// Write rendered text to `path`.
pub fn write_output(path: &Path, text: &str) -> MooltahResult<()> {
	std::fs::write(path, text).map_err(|e| MooltahError::file(path, e))
}

/// Read a template file, labelling failures with its path.
pub(crate) fn read_template(path: &Path) -> MooltahResult<String> {
	std::fs::read_to_string(path).map_err(|e| MooltahError::file(path, e))
}
