use serde::{Deserialize, Serialize};

/// Derived snapshot persisted for external consumers (web status page, bots).
/// Field names are a wire contract with those consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerStatus {
	pub list: Vec<String>,
	pub on: bool,
	pub version: Option<String>,
}
