mod config;
pub use config::*;

mod error;
pub use error::*;

mod probe;
pub use probe::*;

mod report;
pub use report::*;
