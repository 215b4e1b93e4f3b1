//! App layer - runs one invocation from resolved config to printed output
//!
//! [`App`] owns the config and a transport. It builds the request, then
//! either prints the exchange, downloads the body to a file or runs the
//! benchmark.

pub mod session;

pub use session::{App, Streams};
