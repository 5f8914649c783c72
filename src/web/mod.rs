mod error;
pub mod log;
pub mod midware;
pub mod routes;
pub mod serve;
pub mod submission;
pub mod types;

pub use error::{ClientError, Error, WebResult};

pub const REQUEST_ID_HEADER: &str = "x-request-id";
/// Where browsers are sent back to after a form submission.
pub const LANDING_SUCCESS_PATH: &str = "/?success=1";
