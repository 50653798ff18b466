//! Auth-domain identifiers, scope sets, scope bundles, and the in-memory credential model.

pub mod catalog;
pub mod id;
pub mod scope;
pub mod token;

pub use catalog::*;
pub use id::*;
pub use scope::*;
pub use token::{credential::*, secret::*};
