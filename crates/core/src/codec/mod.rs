//! Codec modules for PDF stream compression.
//!
//! - `ascii85`: ASCII85 and ASCIIHex decoding
//! - `flate`: zlib inflate with output bound and lenient fallback
//! - `lzw`: LZW decompression
//! - `runlength`: Run-length decoding

pub mod ascii85;
pub mod flate;
pub mod lzw;
pub mod runlength;

pub use ascii85::{ascii85decode, asciihexdecode};
pub use flate::flatedecode;
pub use lzw::lzwdecode_with_earlychange;
pub use runlength::rldecode;
