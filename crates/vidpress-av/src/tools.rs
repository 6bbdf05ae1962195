//! External tool detection and management.

use std::path::{Path, PathBuf};
use std::process::Command;

use vidpress_common::{Error, Result};

/// Information about an external tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// Name of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// Version string if available.
    pub version: Option<String>,
    /// Path to the tool executable.
    pub path: Option<PathBuf>,
}

/// Check if a tool is available and get its information.
///
/// # Example
///
/// ```no_run
/// use vidpress_av::check_tool;
///
/// let info = check_tool("ffmpeg", None);
/// if info.available {
///     println!("ffmpeg version: {:?}", info.version);
/// }
/// ```
pub fn check_tool(name: &str, config_path: Option<&Path>) -> ToolInfo {
    let version_arg = match name {
        "ffmpeg" => "-version",
        _ => "--version",
    };

    let Ok(path) = get_tool_path(name, config_path) else {
        return unavailable(name);
    };

    match Command::new(&path).arg(version_arg).output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|s| s.to_string());

            ToolInfo {
                name: name.to_string(),
                available: true,
                version,
                path: Some(path),
            }
        }
        _ => unavailable(name),
    }
}

fn unavailable(name: &str) -> ToolInfo {
    ToolInfo {
        name: name.to_string(),
        available: false,
        version: None,
        path: None,
    }
}

/// Check every tool vidpress shells out to.
pub fn check_tools(ffmpeg_path: Option<&Path>) -> Vec<ToolInfo> {
    vec![check_tool("ffmpeg", ffmpeg_path)]
}

/// Require that a tool is available, returning its path.
///
/// # Errors
///
/// Returns an error if the tool is not found.
pub fn require_tool(name: &str) -> Result<PathBuf> {
    which::which(name)
        .map_err(|_| Error::tool(name, format!("{name} not found; is it installed and in PATH?")))
}

/// Get the path to a tool, preferring a configured path over PATH lookup.
pub fn get_tool_path(name: &str, config_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = config_path {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        tracing::warn!("Configured {} path {:?} does not exist; searching PATH", name, path);
    }

    require_tool(name)
}
