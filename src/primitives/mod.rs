//! Low-level primitives shared by the checker.
//!
//! Bit packing for the node cache blocks plus the varint cursor used by the
//! schema rule codec.

/// Byte-level utilities and encoding/decoding.
pub mod bytes;
