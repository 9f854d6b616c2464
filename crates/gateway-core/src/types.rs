use serde::{Deserialize, Serialize};

/// An upstream LLM provider, or the absence of one (pre-dispatch failures
/// are recorded against `Unknown`, per the gateway's retained design
/// decision to keep that sentinel visible in usage records).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
	OpenAi,
	Anthropic,
	Unknown,
}

impl Provider {
	pub fn as_str(&self) -> &'static str {
		match self {
			Provider::OpenAi => "openai",
			Provider::Anthropic => "anthropic",
			Provider::Unknown => "unknown",
		}
	}
}

impl std::str::FromStr for Provider {
	type Err = ();
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"openai" => Ok(Provider::OpenAi),
			"anthropic" => Ok(Provider::Anthropic),
			"unknown" => Ok(Provider::Unknown),
			_ => Err(()),
		}
	}
}

impl std::fmt::Display for Provider {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Tag supplied by the caller to pick a provider, or `Auto` to let the
/// router pick the first configured upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderTag {
	Auto,
	OpenAi,
	Anthropic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
	Active,
	Suspended,
	Deleted,
}

impl UserStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			UserStatus::Active => "active",
			UserStatus::Suspended => "suspended",
			UserStatus::Deleted => "deleted",
		}
	}
}

impl std::str::FromStr for UserStatus {
	type Err = ();
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"active" => Ok(UserStatus::Active),
			"suspended" => Ok(UserStatus::Suspended),
			"deleted" => Ok(UserStatus::Deleted),
			_ => Err(()),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
	Active,
	Revoked,
}

impl KeyStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			KeyStatus::Active => "active",
			KeyStatus::Revoked => "revoked",
		}
	}
}

impl std::str::FromStr for KeyStatus {
	type Err = ();
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"active" => Ok(KeyStatus::Active),
			"revoked" => Ok(KeyStatus::Revoked),
			_ => Err(()),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageStatus {
	Success,
	Error,
}

impl UsageStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			UsageStatus::Success => "success",
			UsageStatus::Error => "error",
		}
	}
}
