use std::path::PathBuf;

use crate::MooltahConfig;
use crate::MooltahResult;
use crate::RenderRequest;
use crate::SourceFile;
use crate::load_sources;
use crate::render_to_destination;

/// Result of a completed invocation.
#[derive(Debug)]
pub struct RunSummary {
	/// Variable files that were loaded, in merge order.
	pub loaded: Vec<SourceFile>,
	/// Variable files skipped because of an unsupported extension.
	pub skipped: Vec<PathBuf>,
	/// Number of top-level variables passed to the template.
	pub variable_count: usize,
	/// The file that was written.
	pub output: PathBuf,
}

/// Load and merge every variable file, then render the template to the
/// output file with the configured backend. The first failure aborts the
/// invocation.
pub fn run(config: &MooltahConfig) -> MooltahResult<RunSummary> {
	let loaded = load_sources(&config.sources)?;
	let variable_count = loaded.variables.len();
	tracing::debug!(
		loaded = loaded.loaded.len(),
		skipped = loaded.skipped.len(),
		variable_count,
		"variables merged"
	);

	let request = RenderRequest {
		template: config.template.clone(),
		variables: loaded.variables,
		output: config.output.clone(),
		backend: config.backend,
	};
	render_to_destination(&request, &config.external)?;

	Ok(RunSummary {
		loaded: loaded.loaded,
		skipped: loaded.skipped,
		variable_count,
		output: request.output,
	})
}
