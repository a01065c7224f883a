//! Small [`futures::io`] adapters used on the proxy's streaming path.
//!
//! - [`TeeReader`] copies every byte read from an inner reader into a sink,
//!   so one pass over an upstream body can feed both a client and a cache file.
//! - [`CappedReader`] enforces a hard byte limit and fails loudly (with
//!   [`LimitExceeded`]) instead of silently truncating.

mod capped;
mod tee;

pub use crate::capped::{CappedReader, LimitExceeded};
pub use crate::tee::TeeReader;
