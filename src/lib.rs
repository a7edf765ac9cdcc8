pub mod cache;
pub mod config;
pub mod crypto;
pub mod data;
mod lib_constants;
pub mod logging;
pub mod remote;
pub mod rng;
pub mod serde;
pub mod session;
pub mod sync;
pub mod util;
