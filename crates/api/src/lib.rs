//! HTTP surface for the groupbuy engine.
//!
//! Thin I/O wrapper: every handler parses a request, calls one service
//! operation, and maps the typed result (or `DomainError`) onto a JSON
//! response. No business rules live here.

pub mod app;
