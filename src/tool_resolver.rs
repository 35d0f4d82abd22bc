//! # Tool Path Resolver
//!
//! This module finds the external helpers used by the repack strategies:
//! - `7z` (archive packer)
//! - `optipng` (PNG optimizer)
//! - `jpegtran` (JPEG optimizer)
//! - `h5repack` (HDF5 repacker)
//!
//! Resolution happens once at startup and produces an immutable [`ToolTable`]
//! that is handed to the classifier and to every strategy.

use crate::error::OptimizeError;
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable pointing at a directory of bundled helpers
pub const TOOLS_DIR_ENV: &str = "RYPAK_TOOLS_DIR";

/// External helpers known to rypak
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tool {
    Packer,
    PngOptimizer,
    JpegOptimizer,
    Hdf5Repacker,
}

impl Tool {
    pub const ALL: [Tool; 4] = [
        Tool::Packer,
        Tool::PngOptimizer,
        Tool::JpegOptimizer,
        Tool::Hdf5Repacker,
    ];

    /// Executable name without platform suffix
    pub fn binary_name(&self) -> &'static str {
        match self {
            Tool::Packer => "7z",
            Tool::PngOptimizer => "optipng",
            Tool::JpegOptimizer => "jpegtran",
            Tool::Hdf5Repacker => "h5repack",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Tool::Packer => "ZIP repacking (built-in writer used when missing)",
            Tool::PngOptimizer => "PNG/BMP/GIF/TIFF optimization",
            Tool::JpegOptimizer => "JPEG optimization",
            Tool::Hdf5Repacker => "HDF5 repacking",
        }
    }

    fn install_hint(&self) -> &'static str {
        match self {
            Tool::Packer => "sudo apt-get install p7zip-full",
            Tool::PngOptimizer => "sudo apt-get install optipng",
            Tool::JpegOptimizer => "sudo apt-get install libjpeg-turbo-progs",
            Tool::Hdf5Repacker => "sudo apt-get install hdf5-tools",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// Resolved helper paths. Built once, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolTable {
    paths: BTreeMap<Tool, PathBuf>,
}

impl ToolTable {
    /// A table with no helpers at all; every strategy uses its fallback
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builder used by tests and embedders to register a helper explicitly
    pub fn with(mut self, tool: Tool, path: impl Into<PathBuf>) -> Self {
        self.paths.insert(tool, path.into());
        self
    }

    pub fn get(&self, tool: Tool) -> Option<&Path> {
        self.paths.get(&tool).map(PathBuf::as_path)
    }

    /// Path of a helper a strategy cannot run without
    pub fn require(&self, tool: Tool) -> Result<&Path, OptimizeError> {
        self.get(tool).ok_or_else(|| {
            OptimizeError::MissingDependency(format!("{} (install with: {})", tool, tool.install_hint()))
        })
    }

    pub fn contains(&self, tool: Tool) -> bool {
        self.paths.contains_key(&tool)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Tool, &Path)> {
        self.paths.iter().map(|(tool, path)| (*tool, path.as_path()))
    }

    /// Human readable availability report
    pub fn tools_report(&self) -> String {
        let mut report = String::from("Tool availability:\n");
        for tool in Tool::ALL {
            match self.get(tool) {
                Some(path) => {
                    report.push_str(&format!("  ✅ {} -> {} ({})\n", tool, path.display(), tool.description()));
                }
                None => {
                    report.push_str(&format!(
                        "  ❌ {} not found ({}; install with: {})\n",
                        tool,
                        tool.description(),
                        tool.install_hint()
                    ));
                }
            }
        }
        report
    }
}

/// Looks helpers up in an optional tools directory and then in `PATH`
pub struct ToolPathResolver {
    tools_dir: Option<PathBuf>,
    search_path: Vec<PathBuf>,
}

impl ToolPathResolver {
    /// Create a resolver from the process environment
    pub fn new() -> Self {
        let tools_dir = env::var_os(TOOLS_DIR_ENV)
            .map(PathBuf::from)
            .filter(|dir| dir.is_dir());
        let search_path = env::var_os("PATH")
            .map(|paths| env::split_paths(&paths).collect())
            .unwrap_or_default();

        debug!("Tools directory: {:?}", tools_dir);
        Self::with_search_path(tools_dir, search_path)
    }

    /// Create a resolver over explicit directories
    pub fn with_search_path(tools_dir: Option<PathBuf>, search_path: Vec<PathBuf>) -> Self {
        Self { tools_dir, search_path }
    }

    /// Resolve every known helper into a [`ToolTable`]
    pub fn resolve_all(&self) -> ToolTable {
        Tool::ALL.into_iter().fold(ToolTable::empty(), |table, tool| {
            match self.resolve_tool(tool) {
                Some(path) => table.with(tool, path),
                None => table,
            }
        })
    }

    /// Resolve the path to a specific tool
    pub fn resolve_tool(&self, tool: Tool) -> Option<PathBuf> {
        let file_name = format!("{}{}", tool.binary_name(), env::consts::EXE_SUFFIX);

        if let Some(ref tools_dir) = self.tools_dir {
            let bundled = tools_dir.join(&file_name);
            if is_executable(&bundled) {
                debug!("Using bundled tool: {} -> {:?}", tool, bundled);
                return Some(bundled);
            }
        }

        let found = self
            .search_path
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|path| is_executable(path));

        match found {
            Some(ref path) => debug!("Using system tool: {} -> {:?}", tool, path),
            None => debug!("Tool not found: {}", tool),
        }
        found
    }
}

impl Default for ToolPathResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
