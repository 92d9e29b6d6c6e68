//! Library side of the `shelf` binary: logging setup and the staged
//! analysis run, shared with the integration tests.

pub mod logging;
pub mod pipeline;
