//! Development node serving the masternode API over TCP.
//!
//! The library half is shared by the `node` binary and the tests:
//! - `devchain`: in-memory chain backing the registry and collateral calls
//! - `handler`: per-connection request loop
//! - `config`: TOML accounts file
//! - `util`: logging setup

pub mod config;
pub mod devchain;
pub mod handler;
pub mod util;

pub use mnlib;
pub use tokio;
