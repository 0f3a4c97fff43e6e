use crate::Value;
use crate::VariableSpace;

/// Merge `overlay` on top of `base`.
///
/// The overlay wins on every key it defines and keys only present in `base`
/// are kept. The merge is shallow: a nested mapping in the overlay replaces
/// the base mapping under the same key wholesale, and each replacement is
/// logged at debug level.
pub fn merge(base: VariableSpace, overlay: VariableSpace) -> VariableSpace {
	let mut merged = base;

	for (key, value) in overlay {
		if let Some(previous @ Value::Object(_)) = merged.get(&key) {
			if previous != &value {
				tracing::debug!(key = %key, "overlay replaces nested mapping without merging");
			}
		}

		merged.insert(key, value);
	}

	merged
}

/// Fold `spaces` left to right, so the last space has the highest
/// precedence.
pub fn merge_all(spaces: impl IntoIterator<Item = VariableSpace>) -> VariableSpace {
	spaces.into_iter().fold(VariableSpace::new(), merge)
}
