//! Output of read-path results for downstream consumers.
//!
//! - [`json`]: serializes [`ArticleRecord`](crate::models::ArticleRecord)
//!   lists to stdout or to a file.

pub mod json;
