use minijinja::Environment;
use minijinja::UndefinedBehavior;

use super::RenderOutcome;
use super::RenderPhase;
use super::RenderRequest;
use super::Renderer;
use super::read_template;
use crate::MooltahError;
use crate::MooltahResult;
use crate::VariableSpace;

/// Renders jinja templates in process with `minijinja`.
///
/// Undefined variables are errors rather than empty strings, so a typo in a
/// template never silently produces output.
#[derive(Debug, Default, Clone, Copy)]
pub struct JinjaRenderer;

impl JinjaRenderer {
	pub fn new() -> Self {
		Self
	}

	/// Render template source held in memory. `name` is used in error
	/// messages.
	pub fn render_str(
		&self,
		name: &str,
		source: &str,
		variables: &VariableSpace,
	) -> MooltahResult<String> {
		let mut env = Environment::new();
		env.set_keep_trailing_newline(true);
		env.set_undefined_behavior(UndefinedBehavior::Strict);

		tracing::debug!(phase = %RenderPhase::Parsing, template = name, "parsing jinja template");
		env.add_template(name, source)
			.map_err(|e| MooltahError::Template(e.to_string()))?;
		let template = env
			.get_template(name)
			.map_err(|e| MooltahError::Template(e.to_string()))?;

		tracing::debug!(
			phase = %RenderPhase::Evaluating,
			template = name,
			"evaluating jinja template"
		);
		let ctx = minijinja::Value::from_serialize(variables);
		template
			.render(ctx)
			.map_err(|e| MooltahError::Template(e.to_string()))
	}
}

impl Renderer for JinjaRenderer {
	fn render(&self, request: &RenderRequest) -> MooltahResult<RenderOutcome> {
		let source = read_template(&request.template)?;
		let name = request.template.display().to_string();
		let rendered = self.render_str(&name, &source, &request.variables)?;

		Ok(RenderOutcome::Rendered(rendered))
	}
}
