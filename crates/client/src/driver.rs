//! Bridge process discovery.
//!
//! The actual WhatsApp handshake runs in a Node.js bridge (wrapping
//! whatsapp-web.js). This module locates the Node executable and the bridge
//! entry script, preferring explicit environment overrides over installed
//! copies.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::warn;

use crate::error::{Error, Result};

/// Name of the npm package containing the bridge entry script.
const BRIDGE_PACKAGE: &str = "wa-bridge";

/// Locates the bridge, returning `(node_executable, bridge_js)`.
///
/// Search order:
/// 1. `WA_BRIDGE_NODE` + `WA_BRIDGE_JS` environment variables
/// 2. `WA_BRIDGE_PATH` (directory containing `bridge.js`)
/// 3. Global npm installation (`npm root -g`)
/// 4. Local npm installation (`npm root`)
///
/// Environment overrides take precedence so environments with unusual Node
/// installs can point at a working binary.
pub fn resolve_bridge() -> Result<(PathBuf, PathBuf)> {
	if let (Ok(node), Ok(js)) = (
		std::env::var("WA_BRIDGE_NODE"),
		std::env::var("WA_BRIDGE_JS"),
	) {
		let node = PathBuf::from(node);
		let js = PathBuf::from(js);
		if node.exists() && js.exists() {
			return Ok((node, js));
		}
		warn!(
			target = "wa.driver",
			"WA_BRIDGE_NODE/WA_BRIDGE_JS set but paths do not exist; continuing search"
		);
	}

	if let Ok(dir) = std::env::var("WA_BRIDGE_PATH") {
		let js = Path::new(&dir).join("bridge.js");
		if js.exists() {
			return Ok((find_node()?, js));
		}
		warn!(
			target = "wa.driver",
			path = %js.display(),
			"WA_BRIDGE_PATH set but bridge.js not found; continuing search"
		);
	}

	for root in [npm_root(true), npm_root(false)].into_iter().flatten() {
		let js = root.join(BRIDGE_PACKAGE).join("bridge.js");
		if js.exists() {
			return Ok((find_node()?, js));
		}
	}

	Err(Error::BridgeNotFound)
}

fn find_node() -> Result<PathBuf> {
	which::which("node").map_err(|_| Error::BridgeNotFound)
}

/// Returns the npm module root (`npm root [-g]`), if npm is available.
fn npm_root(global: bool) -> Option<PathBuf> {
	let mut command = Command::new("npm");
	command.arg("root");
	if global {
		command.arg("-g");
	}

	let output = command.output().ok()?;
	if !output.status.success() {
		return None;
	}

	let root = String::from_utf8(output.stdout).ok()?;
	let root = PathBuf::from(root.trim());
	root.exists().then_some(root)
}
