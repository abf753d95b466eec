pub mod config;
pub mod runtime;

pub use config::{ChainConfig, NodeConfig};
pub use runtime::{build_engine, run_pass};
