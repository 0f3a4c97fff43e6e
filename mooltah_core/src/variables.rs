use std::collections::BTreeMap;

use derive_more::Deref;
use derive_more::DerefMut;
use serde::Deserialize;
use serde::Serialize;
pub use serde_json::Value;

/// The merged namespace handed to a template.
///
/// Keys are kept sorted so that anything iterating the namespace (the
/// `--dump` output, `range` over a mapping, YAML serialization for the
/// external helper) is deterministic for a fixed input set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Deref, DerefMut)]
#[serde(transparent)]
pub struct VariableSpace(BTreeMap<String, Value>);

impl VariableSpace {
	pub fn new() -> Self {
		Self::default()
	}

	/// Convert the space into a single mapping value.
	pub fn to_value(&self) -> Value {
		Value::Object(
			self.0
				.iter()
				.map(|(key, value)| (key.clone(), value.clone()))
				.collect(),
		)
	}
}

impl From<BTreeMap<String, Value>> for VariableSpace {
	fn from(map: BTreeMap<String, Value>) -> Self {
		Self(map)
	}
}

impl From<serde_json::Map<String, Value>> for VariableSpace {
	fn from(map: serde_json::Map<String, Value>) -> Self {
		Self(map.into_iter().collect())
	}
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for VariableSpace {
	fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
		Self(
			iter.into_iter()
				.map(|(key, value)| (key.into(), value.into()))
				.collect(),
		)
	}
}

impl IntoIterator for VariableSpace {
	type IntoIter = std::collections::btree_map::IntoIter<String, Value>;
	type Item = (String, Value);

	fn into_iter(self) -> Self::IntoIter {
		self.0.into_iter()
	}
}
