pub mod config;
pub mod driver;
pub mod engine;
pub mod node;
pub mod overlay;
pub mod stats;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
