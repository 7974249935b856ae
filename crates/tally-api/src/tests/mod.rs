//! Tests for the finance client.
//!
//! Organized by concern:
//! - harness: stub backend and client wiring
//! - queries: cached reads and their request shapes
//! - mutations: writes and the queries they invalidate


mod queries;
