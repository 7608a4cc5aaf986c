//! HTTP client and assertion layer used to execute test definitions.

pub mod assert;
pub mod client;

pub use client::{App, ChainableRequest, ExchangeError};
pub use decl_e2e_core;
