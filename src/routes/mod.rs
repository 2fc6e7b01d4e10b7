//! Router Module Index
//!
//! Splits the route table by who may call it. The authentication guard is
//! layered over `members` in `create_router`; `public` stays outside it.

/// Routes served without any key check (API documentation).
pub mod public;

/// The member resource plus the health probe, all behind the API key guard.
pub mod members;
