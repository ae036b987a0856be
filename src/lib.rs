pub mod config;
pub mod error;
pub mod store;
pub mod gateway;
pub mod project;
pub mod bootstrap;
pub mod record;
pub mod audit;
pub mod pipeline;
pub mod notify;
pub mod doctor;

pub use config::Config;
pub use error::{MemoryError, Result};
pub use gateway::{NoteTool, ObsidianCli};
pub use project::ProjectIdentity;
pub use store::{MappingStore, Resolution};
