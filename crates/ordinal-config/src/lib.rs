pub mod loader;
pub mod model;

pub use loader::ConfigLoader;
pub use model::{ConfigOverlay, DEFAULT_FOLDER, DEFAULT_TABLE, MigrateConfig, SplitMode};
