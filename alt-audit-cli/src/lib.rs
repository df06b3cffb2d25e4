//! Command-line front end and HTTP admin surface for `alt-audit`.

pub mod cli;
pub mod logging;
pub mod server;
