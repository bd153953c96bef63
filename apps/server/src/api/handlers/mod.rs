//! Request handlers for API endpoints

pub mod chart;
pub mod launch;
pub mod vitals;

pub use chart::*;
pub use launch::*;
pub use vitals::*;
