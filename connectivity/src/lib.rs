pub mod check;
pub mod engine;
pub mod graph;
pub mod incremental;
pub mod mst;
pub mod progress;
pub mod record;
pub mod unionfind;

pub use engine::{ConnectivityEngine, RatsnestEdge, RecalcError};
pub use graph::{Cluster, NetConflict, Phase};
pub use progress::{LogProgress, NoProgress, ProgressReporter};
