//! Status console of the RTPproxy call monitor
//!
//! Serves the closed intervals of the history window over HTTP:
//!
//! * `GET /json`: JSON array of `{"unixtime", "received", "ooo", "delay"}`
//!   objects, oldest first
//! * `GET /`: the same rows as an HTML table
//!
//! The console only reads the window; the accumulator stays its sole writer.

pub mod error;
pub mod routes;
pub mod server;

pub use error::{Error, Result};
pub use routes::router;
pub use server::StatusServer;
