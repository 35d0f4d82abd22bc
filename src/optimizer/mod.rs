//! # Optimizer Module
//!
//! Separa le responsabilità del driver in sottomoduli:
//! - `batch_optimizer`: Orchestratore del run su un pattern glob
//! - `task_optimizer`: Worker per singoli file (backup, strategia, finalize)
//! - `path_resolver`: Calcolo dei path derivati (backup, ZIP da TAR)

pub mod batch_optimizer;
pub mod path_resolver;
pub mod task_optimizer;

pub use batch_optimizer::BatchOptimizer;
pub use path_resolver::PathResolver;
pub use task_optimizer::{FileAction, FileReport, TaskOptimizer};
