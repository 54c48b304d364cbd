pub mod config;
pub mod countries;
pub mod data;
pub mod error;
pub mod geo;
pub mod impact;
pub mod load;
pub mod metrics;
pub mod rank;

pub use error::{Error, Result};
