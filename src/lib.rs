#![deny(
    missing_docs,
    clippy::missing_safety_doc,
    unsafe_op_in_unsafe_fn,
    deprecated_in_future
)]

//! Adaptive radix tree index over fixed-width binary keys.
//!
//! The tree maps keys to opaque integer values. Values are not stored in
//! allocated leaf nodes; instead each value is packed directly into the node
//! reference word with a tag bit, and the full key bytes of any stored value
//! are reconstructed on demand through the [`KeySource`] hook. Inner nodes
//! adapt their fan-out representation (4, 16, 48, or 256 children) to the
//! number of children they hold, and runs of one-way nodes are compressed
//! into per-node prefixes.
//!
//! # References
//!
//!  - Leis, V., Kemper, A., & Neumann, T. (2013, April). The adaptive radix
//!    tree: ARTful indexing for main-memory databases. In 2013 IEEE 29th
//!    International Conference on Data Engineering (ICDE) (pp. 38-49). IEEE.
//!    [Link to PDF][ART paper]
//!
//! [ART paper]: https://www-db.in.tum.de/~leis/papers/ART.pdf

mod bytes;
mod map;
mod nodes;
mod rust_nightly_apis;
pub mod tagged_pointer;
#[doc(hidden)]
pub mod tests_common;

pub use bytes::*;
pub use map::*;
pub use nodes::*;
