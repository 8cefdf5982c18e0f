pub mod db;
pub mod decompose;
pub mod detect;
pub mod error;
pub mod extract;
pub mod models;
pub mod nutrition;
pub mod progress;
pub mod service;
pub mod snapshot;
pub mod window;
