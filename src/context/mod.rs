//! Folder context: turning a directory into ordered context items.
//!
//! The provider walks a folder through a [`Workspace`](crate::io::Workspace),
//! filters it with the [`FileClassifier`](crate::io::FileClassifier), and
//! hands the surviving paths to the aggregator, which enforces the file
//! count and byte budgets.

pub mod aggregator;
pub mod provider;

pub use aggregator::{Aggregation, ContextAggregator};
pub use provider::FolderContextProvider;
