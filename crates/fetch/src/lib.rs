//! Getting assets from the origin into the cache.
//!
//! - [`AssetService`] answers a request from the cache, or proxies it through
//!   [`ProxyCacheFetcher`], which streams the origin body to the client and
//!   into the cache in one pass.
//! - [`fetch_to_cache`] downloads a single asset, decoded, for warming.
//! - [`BulkDownloader`] runs many of those through a fixed worker pool.
//!
//! All three share a [`DownloadCoordinator`], so no destination is ever
//! written by two fetches at once.

mod bulk;
mod coordinator;
pub mod error;
mod origin;
mod proxy;
mod response;
mod service;
mod single;

pub use crate::bulk::{BulkDownloader, BulkReport, DEFAULT_WORKERS};
pub use crate::coordinator::{Claim, DownloadCoordinator};
pub use crate::origin::{MAX_RESPONSE_SIZE, Origin, UPSTREAM_TIMEOUT, join_url};
pub use crate::proxy::ProxyCacheFetcher;
pub use crate::response::{AssetRequest, AssetResponse, Body, reader_body};
pub use crate::service::AssetService;
pub use crate::single::{Fetched, fetch_to_cache};
