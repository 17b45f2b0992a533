//! Retro-broadcast appliance core: a deterministic program-grid scheduler
//! and the hot-path channel switcher that serves it, exposed over a small
//! [HTTP API].
//!
//! [HTTP API]: crate::server

#![deny(
    broken_intra_doc_links,
    missing_debug_implementations,
    nonstandard_style,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![warn(
    deprecated_in_future,
    missing_docs,
    unreachable_pub,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod api;
pub mod catalog;
pub mod cli;
pub mod cursor;
pub mod error;
pub mod fairness;
pub mod lookup;
pub mod planner;
pub mod server;
pub mod service;
pub mod store;
pub mod switcher;
pub mod util;

pub use self::error::Error;

/// Runs the application.
///
/// # Errors
///
/// If running has failed and could not be performed. The appropriate error
/// is logged.
pub fn run() -> Result<(), cli::Failure> {
    let opts = cli::Opts::from_args();

    // This guard should be held till the end of the program for the logger
    // to present in global context.
    let _log_guard = kinescope_log::init(opts.verbose);

    server::run(opts)
}
