//! Common token primitives shared across bearer-token consumers.

#![warn(clippy::pedantic)]

/// Module for JWT utilities (segment decoding, size limits, temporal claims)
pub mod jwt;
