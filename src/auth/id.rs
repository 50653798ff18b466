//! Identifiers for user records and the services their tokens belong to.
//!
//! User ids come from the host application's database (ObjectIds, UUIDs, numeric keys) and
//! are treated as opaque. Service keys name a slot under `user.tokens` and double as a
//! segment in modified-field paths such as `tokens.zoom.expiry_date`, so they are limited to
//! lowercase ASCII letters, digits, `_`, and `-`.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $validate:path) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				$validate(view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				$validate(&value)?;

				Ok(Self(value))
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
	};
}

const USER_ID_MAX_LEN: usize = 128;
const SERVICE_KEY_MAX_LEN: usize = 32;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (user, service).
		kind: &'static str,
	},
	/// The identifier contains whitespace or control characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (user, service).
		kind: &'static str,
	},
	/// The identifier contains a character outside its permitted alphabet.
	#[error("{kind} identifier contains unsupported character {character:?}.")]
	UnsupportedCharacter {
		/// Kind of identifier (user, service).
		kind: &'static str,
		/// First offending character.
		character: char,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (user, service).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { UserId, "Opaque identifier of a user record in the user repository.", validate_user_id }
def_id! {
	ServiceKey,
	"Key of the external service a token sub-record belongs to (e.g. `zoom`).",
	validate_service_key
}

impl Debug for UserId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "UserId({})", self.0)
	}
}
impl Debug for ServiceKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "ServiceKey({})", self.0)
	}
}

fn validate_user_id(view: &str) -> Result<(), IdentifierError> {
	const KIND: &str = "User";

	if view.is_empty() {
		return Err(IdentifierError::Empty { kind: KIND });
	}
	if view.chars().any(|c| c.is_whitespace() || c.is_control()) {
		return Err(IdentifierError::ContainsWhitespace { kind: KIND });
	}
	if view.len() > USER_ID_MAX_LEN {
		return Err(IdentifierError::TooLong { kind: KIND, max: USER_ID_MAX_LEN });
	}

	Ok(())
}

fn validate_service_key(view: &str) -> Result<(), IdentifierError> {
	const KIND: &str = "Service";

	if view.is_empty() {
		return Err(IdentifierError::Empty { kind: KIND });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind: KIND });
	}
	if let Some(character) = view
		.chars()
		.find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-')))
	{
		return Err(IdentifierError::UnsupportedCharacter { kind: KIND, character });
	}
	if view.len() > SERVICE_KEY_MAX_LEN {
		return Err(IdentifierError::TooLong { kind: KIND, max: SERVICE_KEY_MAX_LEN });
	}

	Ok(())
}
