//! # Optimizer Module
//!
//! Separa le responsabilità in sottomoduli:
//! - `pipeline`: orchestratore dei pass
//! - `tree_walker`: mirroring ricorsivo di una directory
//! - `task_optimizer`: File Task per singoli file
//! - `concurrency`: semafori per encode e video
//! - `progress_tracker`: progress bar, log per file ed eventi JSON
//! - `path_resolver`: calcolo dei path di output

pub mod concurrency;
pub mod path_resolver;
pub mod pipeline;
pub mod progress_tracker;
pub mod task_optimizer;
pub mod tree_walker;

pub use concurrency::ConcurrencyManager;
pub use path_resolver::PathResolver;
pub use pipeline::{AssetPipeline, BuildSummary};
pub use progress_tracker::ProgressTracker;
pub use task_optimizer::{Adapters, TaskOptimizer};
pub use tree_walker::TreeWalker;
