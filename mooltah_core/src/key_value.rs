use crate::MooltahError;
use crate::MooltahResult;
use crate::Value;
use crate::VariableSpace;

/// Parse a line oriented `key=value` document.
///
/// Every line is trimmed. Blank lines and lines starting with `#` are
/// skipped. The line is split on the first `=` only, so values may contain
/// `=` themselves. Keys and values are trimmed and every value is kept as a
/// string; no type inference is attempted.
pub fn parse_key_values(data: &[u8]) -> MooltahResult<VariableSpace> {
	if data.is_empty() {
		return Err(MooltahError::EmptyInput);
	}

	let content =
		std::str::from_utf8(data).map_err(|e| MooltahError::InvalidUtf8(e.valid_up_to()))?;
	let mut variables = VariableSpace::new();

	for (index, raw_line) in content.split('\n').enumerate() {
		let line = raw_line.trim();
		if line.is_empty() || line.starts_with('#') {
			continue;
		}

		let Some((key, value)) = line.split_once('=') else {
			return Err(MooltahError::MalformedLine {
				line: index + 1,
				content: line.to_string(),
			});
		};

		let key = key.trim();
		tracing::debug!(key, "parsed key=value entry");
		variables.insert(key.to_string(), Value::String(value.trim().to_string()));
	}

	Ok(variables)
}
