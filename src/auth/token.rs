//! Token material held in memory: redacted secrets and the per-user credential.

pub mod credential;
pub mod secret;
