//! Network layer - request execution, downloads and benchmark fan-out
//!
//! Everything goes through the [`Transport`] trait so the rest of the crate
//! can run against an in-memory implementation.

pub mod bench;
pub mod client;
pub mod download;

pub use bench::{BenchOptions, BenchReport};
pub use client::{BodyStream, HttpResponse, ReqwestTransport, Transport};
