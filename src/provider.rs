//! Provider-facing descriptors (data) and strategies (behavior).
//!
//! `descriptor` exposes validated endpoint metadata for the meeting platform (authorization,
//! token, and API base URLs plus the client authentication mode). `strategy` defines
//! [`ProviderStrategy`], an HTTP-client-agnostic hook used by the refresh flow to decorate the
//! token request and map failures into the broker error taxonomy.

pub mod descriptor;
pub mod strategy;

pub use descriptor::*;
pub use strategy::*;
