pub mod api;
pub mod camera;
pub mod classifier;
pub mod db;
pub mod migrate;
pub mod tracker;

pub use api::{router, AppState};
