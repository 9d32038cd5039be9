//! # kardex-client
//!
//! HTTP transport for the kardex synchronizer. Two REST collaborators are
//! consumed here:
//!
//! - the **source automation platform** (Basic auth), which enumerates
//!   inventories and the hosts behind them ([`source::SourceClient`]);
//! - the **destination CMDB** (token auth), which holds the VM, network and
//!   organizational entities being kept in sync ([`cmdb::CmdbClient`]).
//!
//! Both speak the same `{count, results, next}` list envelope, handled by
//! [`page::PagedFetcher`]: complete collection across pages, relative or
//! absolute `next` links, a single offset-tracked retry on timeout, and a
//! hard page ceiling.

pub mod auth;
pub mod cmdb;
pub mod error;
pub mod models;
pub mod page;
pub mod source;

pub use error::{ClientError, ClientResult};
