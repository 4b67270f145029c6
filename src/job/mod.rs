pub mod engine;
pub mod model;
pub mod runner;
pub mod store;
