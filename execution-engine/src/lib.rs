pub mod engine;
pub mod market;
pub mod monitor;
pub mod risk;
