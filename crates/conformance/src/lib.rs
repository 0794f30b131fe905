//! Conformance harness for chunked transfer encoding with trailers.
//!
//! A scenario starts a `chunkcheck-http` server in one of four threading modes,
//! fetches `GET /hello_world` with libcurl and checks what arrived:
//!
//! - a body of ten 128-byte segments `'A'..='J'`, byte for byte
//! - a `Transfer-Encoding: chunked` header line, also when the client sent `Connection: close`
//! - the `Footer: working` trailer after the last chunk
//!
//! ```no_run
//! use chunkcheck::scenario::{DriveMode, Scenario};
//! use chunkcheck::verify::run_scenario;
//!
//! let report = run_scenario(&Scenario::new(DriveMode::External).with_conn_close(true));
//! assert!(report.passed(), "failure code {}", report.code());
//! ```
//!
//! # Architecture
//!
//! - [`pattern`]: the deterministic content generator
//! - [`adapter`] and [`assembler`]: the handler that defers the response to its second call
//! - [`capture`]: the libcurl callbacks collecting body and header lines
//! - [`drive`]: blocking and multiplexed transfers
//! - [`verify`]: checks, failure codes and the full run
//! - [`scenario`], [`config`] and [`cli`]: configuration and the binaries' entry point

pub mod adapter;
pub mod assembler;
pub mod capture;
pub mod cli;
pub mod config;
pub mod drive;
pub mod pattern;
pub mod scenario;
pub mod verify;
