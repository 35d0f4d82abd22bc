//! # External Process Module
//!
//! Argument building and invocation of the external helpers. Every helper
//! call in the crate goes through [`run_tool`], so logging of command lines
//! and timings lives in one place.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, warn};

/// Builds a `Vec<String>` from heterogeneous arguments.
///
/// ```rust
/// let level = 5;
/// let args = rypak::args!["-o", level, "-quiet"];
/// assert_eq!(args, vec!["-o", "5", "-quiet"]);
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        vec![$($item.to_string()),*]
    };
}

/// Runs a helper to completion.
///
/// Returns `Ok(true)` on a zero exit status and `Ok(false)` when the helper
/// ran and failed. Only a failure to spawn the process is an error.
pub async fn run_tool(tool_path: &Path, args: &[String], working_dir: Option<&Path>) -> Result<bool> {
    debug!("Running {:?} {:?}", tool_path, args);

    let mut command = Command::new(tool_path);
    command.args(args).stdin(std::process::Stdio::null());
    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }

    let start_time = Instant::now();
    let output = command
        .output()
        .await
        .with_context(|| format!("Failed to spawn {}", tool_path.display()))?;
    let elapsed = start_time.elapsed();

    if output.status.success() {
        debug!("{} completed successfully in {:?}", tool_path.display(), elapsed);
        Ok(true)
    } else {
        warn!(
            "{} failed after {:?} ({}): {}",
            tool_path.display(),
            elapsed,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_macro() {
        let level = 5;
        let result = args!["-o", level, "-quiet"];
        assert_eq!(result, vec!["-o".to_string(), "5".to_string(), "-quiet".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_reports_exit_status() {
        assert!(run_tool(Path::new("true"), &[], None).await.unwrap());
        assert!(!run_tool(Path::new("false"), &[], None).await.unwrap());
    }

    #[tokio::test]
    async fn test_run_tool_spawn_failure_is_error() {
        let result = run_tool(Path::new("/definitely/not/a/tool"), &[], None).await;
        assert!(result.is_err());
    }
}
