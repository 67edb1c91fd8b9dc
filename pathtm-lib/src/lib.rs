//! Decode, inspect, and re-partition PTH-framed CCSDS telemetry archives.
//!
//! Ground-segment relays deliver spacecraft telemetry as length-prefixed
//! records: a 10-byte transport header ([`packet::PthHeader`]) wrapping a
//! standard CCSDS space packet, whose data field may start with a 10-byte ESA
//! secondary header carrying the on-board timestamp and source id.
//!
//! The [`decoder::Decoder`] reads such records one at a time from any byte
//! source, typically an archive walk produced by [`archive::browse`], applying
//! a pluggable acceptance [`filter::Filter`]. On top of that sit the gap
//! analyzer ([`gap`]), the time-bucketed rotating sink ([`take`]), and the
//! offset-indexed chronological merge ([`merge`]).

mod error;

pub mod archive;
pub mod decoder;
pub mod filter;
pub mod gap;
pub mod merge;
pub mod packet;
pub mod take;
pub mod time;

pub use error::{Error, Result};
