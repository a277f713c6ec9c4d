pub mod settings;

pub use settings::{Config, FileConfig, OutputFormat, ParityConfig};
