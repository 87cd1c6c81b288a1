pub mod aggregate;
pub mod constants;
pub mod error;
pub mod junit;
pub mod model;
pub mod upload;

pub use error::{Error, Result};
pub use model::{Framework, Outcome, ParsingInfo, Testrun};
