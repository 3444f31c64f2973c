//! Nether-WLD: byte-exact codec for the legacy WLD scene container
//!
//! A WLD file packs a zone, its models, skeletons, materials and lights into
//! one directory of typed "fragments". This crate decodes every fragment into
//! a structured value and encodes it back to the same bytes, so tools can
//! inspect, edit and rewrite containers without losing data.
//!
//! # Key Features
//!
//! - **Byte-exact**: decode then encode reproduces the input, including
//!   reserved header words and bytes after the directory
//! - **Both dialects**: old-world and new-world layouts, chosen by the header
//!   version
//! - **Lossless fallback**: unknown codes and payloads that do not match their
//!   layout are carried as opaque bytes
//! - **Parallel**: fragment payloads decode and lay out on the rayon pool
//!
//! # Format Overview
//!
//! - 28-byte header: magic, version, fragment count, name blob length
//! - Name blob: zero-terminated strings XOR'd with a fixed key; fragments
//!   refer to names by negated byte offset
//! - Directory: `size`, `code`, then `size` payload bytes, per fragment
//!
//! Fragments refer to each other by 1-based directory index. [`Wld::edges`]
//! lists those references as a graph.
//!
//! # Usage
//!
//! ```ignore
//! use nether_wld::{Fragment, decode, encode};
//!
//! let bytes = std::fs::read("gfaydark.wld").unwrap();
//! let wld = decode(&bytes).unwrap();
//!
//! for (i, fragment) in wld.fragments.iter().enumerate() {
//!     println!("{:>5} {} {:?}", i + 1, fragment.code(), fragment.name());
//! }
//!
//! assert_eq!(encode(&wld).unwrap(), bytes);
//! ```

mod binary;
mod container;
mod error;
mod fragment;
mod header;
mod name_table;
mod options;
pub mod quantize;
mod refs;
mod registry;

pub use binary::{DecodeContext, EncodedPayload, FragmentReader, FragmentWriter, NamePatch};
pub use container::{Wld, decode, decode_with, encode, encode_with};
pub use error::{EncodeError, ReadError, Result, WldError};
pub use fragment::*;
pub use header::{Dialect, Header, NEW_WORLD_VERSION, OLD_WORLD_VERSION, Reserved, WLD_MAGIC};
pub use name_table::{HASH_KEY, NameTable, hash_bytes, unhash_bytes};
pub use options::{DecodeOptions, EncodeOptions};
pub use refs::{BONE_CHILD, Edge, FragmentReference};
pub use registry::{FragmentCode, REGISTRY, RegistryEntry, entry};
