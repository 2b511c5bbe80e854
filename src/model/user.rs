use snafu::Snafu;

use super::*;

/// A handle typed by the operator, before the platform resolved it to a [UserId].
///
/// Parsing trims surrounding whitespace and a single leading `@`, so `@someone` and `someone` name the same account.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(String);

impl std::str::FromStr for Username {
    type Err = ParseUsername;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let name = trimmed.strip_prefix('@').unwrap_or(trimmed);

        if name.is_empty() {
            return EmptySnafu { text: input }.fail();
        }

        if name.chars().any(|c| c.is_whitespace() || c == '/' || c == '@') {
            return InvalidCharacterSnafu { text: input }.fail();
        }

        Ok(Username(name.to_string()))
    }
}

impl std::fmt::Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ParseUsername {
    #[snafu(display("username `{text}` is empty"))]
    Empty { text: String },

    #[snafu(display("username `{text}` contains whitespace, `/` or an inner `@`"))]
    InvalidCharacter { text: String },
}

/// The platform-internal identifier of an account.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Name of the directory the user's videos are stored in.
    pub fn directory_name(&self) -> String {
        path_component(&self.0)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
