use std::fs::File;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::Child;
use std::process::Command;
use std::process::ExitStatus;
use std::process::Stdio;
use std::time::Duration;
use std::time::Instant;

use sha2::Digest;
use sha2::Sha256;
use tempfile::NamedTempFile;

use super::RenderOutcome;
use super::RenderPhase;
use super::RenderRequest;
use super::Renderer;
use crate::ExternalSettings;
use crate::MooltahError;
use crate::MooltahResult;
use crate::VariableSpace;

/// Name of the helper binary without its architecture suffix.
pub const HELPER_NAME_PREFIX: &str = "minijinja-cli";

/// Number of digest bytes kept in the data file name.
const DIGEST_BYTES: usize = 5;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Renders by handing the template to a helper executable.
///
/// The variables are written to a temporary YAML file and the helper is run
/// as `<helper> [args..] -o <output> <template> <datafile>`. The helper
/// writes the destination itself. The data file is removed when the render
/// returns, whether it succeeded or not.
#[derive(Debug, Clone, Default)]
pub struct ExternalRenderer {
	settings: ExternalSettings,
}

impl ExternalRenderer {
	pub fn new(settings: ExternalSettings) -> Self {
		Self { settings }
	}

	/// Resolve the helper executable: the configured path if any, otherwise
	/// `minijinja-cli_<arch>` in the helper directory (by default the
	/// directory holding the running binary).
	pub fn helper_path(&self) -> MooltahResult<PathBuf> {
		if let Some(helper) = &self.settings.helper {
			return Ok(helper.clone());
		}

		let dir = match &self.settings.helper_dir {
			Some(dir) => dir.clone(),
			None => {
				let exe = std::env::current_exe()?;
				exe.parent()
					.map_or_else(|| PathBuf::from("."), Path::to_path_buf)
			}
		};

		Ok(dir.join(helper_file_name(&self.settings.arch)))
	}

	fn write_data_file(&self, variables: &VariableSpace) -> MooltahResult<NamedTempFile> {
		let yaml = serde_yaml_ng::to_string(variables)
			.map_err(|e| MooltahError::Serialize(e.to_string()))?;
		let digest = data_digest(yaml.as_bytes());
		let temp_dir = &self.settings.temp_dir;

		let mut file = tempfile::Builder::new()
			.prefix(&format!("mooltah-{digest}-"))
			.suffix(".yaml")
			.tempfile_in(temp_dir)
			.map_err(|e| MooltahError::file(temp_dir, e))?;
		file.write_all(yaml.as_bytes())
			.and_then(|()| file.flush())
			.map_err(|e| MooltahError::file(file.path(), e))?;

		Ok(file)
	}

	fn run_helper(
		&self,
		helper: &Path,
		request: &RenderRequest,
		data_file: &Path,
	) -> MooltahResult<()> {
		let helper_display = helper.display().to_string();
		// stdout and stderr share one file so the output keeps its
		// interleaving.
		let mut capture = tempfile::tempfile_in(&self.settings.temp_dir)
			.map_err(|e| MooltahError::file(&self.settings.temp_dir, e))?;

		let mut command = Command::new(helper);
		command
			.args(&self.settings.helper_args)
			.arg("-o")
			.arg(&request.output)
			.arg(&request.template)
			.arg(data_file)
			.stdin(Stdio::null())
			.stdout(Stdio::from(capture.try_clone()?))
			.stderr(Stdio::from(capture.try_clone()?));
		tracing::debug!(?command, "running template helper");

		let mut child = command.spawn().map_err(|source| {
			MooltahError::SubprocessSpawn {
				path: helper_display.clone(),
				source,
			}
		})?;
		drop(command);

		let status = wait_with_timeout(&mut child, self.settings.timeout)?;
		let output = read_capture(&mut capture)?;

		match status {
			Some(status) if status.success() => {
				tracing::debug!(output = %output.trim_end(), "template helper finished");
				Ok(())
			}
			Some(status) => {
				Err(MooltahError::SubprocessFailed {
					path: helper_display,
					status: status.to_string(),
					output,
				})
			}
			None => {
				Err(MooltahError::SubprocessTimeout {
					path: helper_display,
					timeout: format!("{:?}", self.settings.timeout),
				})
			}
		}
	}
}

impl Renderer for ExternalRenderer {
	fn render(&self, request: &RenderRequest) -> MooltahResult<RenderOutcome> {
		let helper = self.helper_path()?;
		if !helper.is_file() {
			return Err(MooltahError::HelperNotFound {
				path: helper.display().to_string(),
			});
		}

		tracing::debug!(phase = %RenderPhase::Parsing, "serializing variables for helper");
		let data_file = self.write_data_file(&request.variables)?;

		tracing::debug!(
			phase = %RenderPhase::Evaluating,
			helper = %helper.display(),
			data_file = %data_file.path().display()
		);
		self.run_helper(&helper, request, data_file.path())?;

		Ok(RenderOutcome::WrittenByBackend)
	}
}

/// File name of the helper for an architecture, e.g.
/// `minijinja-cli_amd64`.
pub fn helper_file_name(arch: &str) -> String {
	format!(
		"{HELPER_NAME_PREFIX}_{arch}{}",
		std::env::consts::EXE_SUFFIX
	)
}

/// Truncated hex SHA-256 digest of serialized variable data.
pub fn data_digest(data: &[u8]) -> String {
	let digest = Sha256::digest(data);
	digest[..DIGEST_BYTES]
		.iter()
		.map(|byte| format!("{byte:02x}"))
		.collect()
}

/// Wait for `child`, killing it once `timeout` has elapsed. Returns `None`
/// when the child was killed.
fn wait_with_timeout(
	child: &mut Child,
	timeout: Duration,
) -> MooltahResult<Option<ExitStatus>> {
	let started = Instant::now();

	loop {
		if let Some(status) = child.try_wait()? {
			return Ok(Some(status));
		}

		if started.elapsed() >= timeout {
			tracing::warn!(pid = child.id(), ?timeout, "template helper timed out, killing it");
			// The child may exit between `try_wait` and `kill`.
			let _ = child.kill();
			child.wait()?;
			return Ok(None);
		}

		std::thread::sleep(POLL_INTERVAL);
	}
}

fn read_capture(capture: &mut File) -> MooltahResult<String> {
	let mut bytes = Vec::new();
	capture.seek(SeekFrom::Start(0))?;
	capture.read_to_end(&mut bytes)?;

	Ok(String::from_utf8_lossy(&bytes).into_owned())
}
