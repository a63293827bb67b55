pub mod config;
pub mod data_dir;
pub mod domain;
pub mod export;
pub mod game;
pub mod import;
pub mod schema;
pub mod sheets;

#[cfg(test)]
mod testgltf;

pub use game::GameData;
pub use import::{ImportReport, NodeOutcome, SkipReason};
