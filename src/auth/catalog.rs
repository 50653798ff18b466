//! Static registry of capability scopes and the named bundles API surfaces ask for.

// self
use crate::{_prelude::*, auth::ScopeSet, error::ConfigError};

/// Read access to meetings.
pub const MEETING_READ: &str = "meeting:read";
/// Create and update meetings.
pub const MEETING_WRITE: &str = "meeting:write";
/// Read access to the user profile.
pub const USER_READ: &str = "user:read";
/// Update the user profile.
pub const USER_WRITE: &str = "user:write";
/// Read access to cloud recordings.
pub const RECORDING_READ: &str = "recording:read";

const STANDARD_BUNDLES: &[(&str, &[&str])] = &[
	("meeting_read", &[MEETING_READ, USER_READ]),
	("meeting_write", &[MEETING_WRITE, USER_READ]),
	("recording_read", &[RECORDING_READ, USER_READ]),
	("user_read", &[USER_READ]),
	("user_write", &[USER_WRITE, USER_READ]),
];

/// Named group of scopes required by one API surface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeBundle {
	/// Bundle name, e.g. `meeting_read`.
	pub name: String,
	/// Scopes the bundle requires.
	pub scopes: ScopeSet,
}

/// Lookup table from bundle names to concrete scope sets.
#[derive(Clone, Debug)]
pub struct ScopeCatalog {
	bundles: BTreeMap<String, ScopeBundle>,
}
impl ScopeCatalog {
	/// Catalog with no registered bundles.
	pub fn empty() -> Self {
		Self { bundles: BTreeMap::new() }
	}

	/// Catalog preloaded with the meeting platform's standard bundles.
	pub fn standard() -> Self {
		let bundles = STANDARD_BUNDLES
			.iter()
			.map(|(name, scopes)| {
				let bundle = ScopeBundle {
					name: (*name).to_owned(),
					scopes: ScopeSet::parse_lenient(scopes.iter()),
				};

				((*name).to_owned(), bundle)
			})
			.collect();

		Self { bundles }
	}

	/// Registers (or replaces) a bundle, validating every scope string.
	pub fn with_bundle<I, S>(
		mut self,
		name: impl Into<String>,
		scopes: I,
	) -> Result<Self, ConfigError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let name = name.into();
		let scopes = ScopeSet::new(scopes)?;

		self.bundles.insert(name.clone(), ScopeBundle { name, scopes });

		Ok(self)
	}

	/// Looks up a bundle by name.
	pub fn bundle(&self, name: &str) -> Result<&ScopeBundle, ConfigError> {
		self.bundles
			.get(name)
			.ok_or_else(|| ConfigError::UnknownScopeBundle { name: name.to_owned() })
	}

	/// Resolves a bundle name to the scopes it requires.
	pub fn scopes_for(&self, name: &str) -> Result<ScopeSet, ConfigError> {
		self.bundle(name).map(|bundle| bundle.scopes.clone())
	}

	/// Registered bundle names in sorted order.
	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.bundles.keys().map(String::as_str)
	}

	/// Union of every scope referenced by any bundle.
	pub fn all_scopes(&self) -> ScopeSet {
		self.bundles.values().fold(ScopeSet::default(), |acc, bundle| acc.union(&bundle.scopes))
	}
}
impl Default for ScopeCatalog {
	fn default() -> Self {
		Self::standard()
	}
}
