//! Cursor-style payload reader and writer shared by every fragment codec

mod reader;
mod writer;

pub use reader::{DecodeContext, FragmentReader};
pub use writer::{EncodedPayload, FragmentWriter, NamePatch};
