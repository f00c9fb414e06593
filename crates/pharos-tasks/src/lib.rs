//! `pharos-tasks`: generic job capabilities (`http`, `rpc`, `noop`) and the
//! catalog builder that turns `[[jobs]]` entries into a job table.

pub mod catalog;
pub mod classify;
pub mod client;
pub mod http;
pub mod noop;
pub mod rpc;

pub use catalog::{build_definitions, build_table};
pub use http::HttpJob;
pub use noop::NoopJob;
pub use rpc::RpcJob;
