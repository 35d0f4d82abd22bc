//! HDF5 repacking through `h5repack`.

use crate::image_processor::{compare_output, ToolOutcome};
use crate::process::run_tool;
use crate::tool_resolver::{Tool, ToolTable};
use anyhow::Result;
use std::path::Path;
use tracing::debug;

pub const DEFAULT_FILTER: &str = "GZIP=9";

pub struct Hdf5Repacker<'a> {
    tools: &'a ToolTable,
}

impl<'a> Hdf5Repacker<'a> {
    pub fn new(tools: &'a ToolTable) -> Self {
        Self { tools }
    }

    /// Repack `src` into `dst` applying `filter` to every dataset
    pub async fn repack(&self, src: &Path, dst: &Path, filter: &str) -> Result<ToolOutcome> {
        let Some(h5repack) = self.tools.get(Tool::Hdf5Repacker) else {
            debug!("{} unavailable, skipping {}", Tool::Hdf5Repacker, src.display());
            return Ok(ToolOutcome::Unavailable);
        };

        let args = crate::args!["-f", filter, src.display(), dst.display()];
        let success = run_tool(h5repack, &args, None).await?;
        compare_output(src, dst, success).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_unavailable_without_h5repack() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("data.h5");
        tokio::fs::write(&src, b"\x89HDF\r\n\x1a\n").await.unwrap();

        let tools = ToolTable::empty();
        let outcome = Hdf5Repacker::new(&tools)
            .repack(&src, &dir.path().join("out.h5"), DEFAULT_FILTER)
            .await
            .unwrap();
        assert_eq!(outcome, ToolOutcome::Unavailable);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tool_without_output_is_no_change() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("data.h5");
        tokio::fs::write(&src, b"\x89HDF\r\n\x1a\n").await.unwrap();

        // `true` exits successfully without writing anything
        let tools = ToolTable::empty().with(Tool::Hdf5Repacker, "true");
        let outcome = Hdf5Repacker::new(&tools)
            .repack(&src, &dir.path().join("out.h5"), DEFAULT_FILTER)
            .await
            .unwrap();
        assert_eq!(outcome, ToolOutcome::NoChange);
    }
}
