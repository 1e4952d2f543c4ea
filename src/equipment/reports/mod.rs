pub mod config;
pub mod error;
pub mod history;
pub mod io;
pub mod model;
pub mod pipeline;
pub mod pricing;
pub mod report;

pub use error::{ReportError, Result};
