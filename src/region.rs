//! Region selection and the fixed endpoint table behind it.
//!
//! Every [`Region`] maps to exactly one [`RegionEndpoints`] triple (OAuth host, API host,
//! locale). Region ordinals are persisted by callers, so the discriminants below are pinned
//! and must never be reordered. Anything that is not one of the five known regions, including
//! the unset ordinal `0`, resolves to the US endpoints.

// self
use crate::_prelude::*;

/// Geographic API partition served by its own Battle.net cluster.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Region {
	/// North America.
	#[default]
	US = 1,
	/// Europe.
	EU = 2,
	/// Korea.
	KR = 3,
	/// Taiwan.
	TW = 4,
	/// Mainland China.
	CN = 5,
}
impl Region {
	/// Every known region in ordinal order.
	pub const ALL: [Region; 5] = [Region::US, Region::EU, Region::KR, Region::TW, Region::CN];

	/// Returns the pinned ordinal for the region.
	pub const fn code(self) -> u8 {
		self as u8
	}

	/// Looks up a region by its pinned ordinal.
	pub const fn from_code(code: u8) -> Option<Self> {
		match code {
			1 => Some(Region::US),
			2 => Some(Region::EU),
			3 => Some(Region::KR),
			4 => Some(Region::TW),
			5 => Some(Region::CN),
			_ => None,
		}
	}

	/// Returns a stable lowercase label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Region::US => "us",
			Region::EU => "eu",
			Region::KR => "kr",
			Region::TW => "tw",
			Region::CN => "cn",
		}
	}

	/// Resolves the endpoint triple for this region.
	pub fn endpoints(self) -> RegionEndpoints {
		resolve(self)
	}
}
impl Display for Region {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl From<Region> for u8 {
	fn from(value: Region) -> Self {
		value.code()
	}
}
impl TryFrom<u8> for Region {
	type Error = RegionError;

	fn try_from(value: u8) -> Result<Self, Self::Error> {
		Region::from_code(value).ok_or(RegionError::UnknownCode { code: value })
	}
}
impl FromStr for Region {
	type Err = RegionError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let trimmed = s.trim();

		Region::ALL
			.into_iter()
			.find(|region| region.as_str().eq_ignore_ascii_case(trimmed))
			.ok_or_else(|| RegionError::UnknownName { name: trimmed.to_owned() })
	}
}

/// Error returned when a region cannot be parsed from an ordinal or a name.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RegionError {
	/// Ordinal outside `1..=5`.
	#[error("Region code {code} is not recognized.")]
	UnknownCode {
		/// Rejected ordinal.
		code: u8,
	},
	/// Name that does not match any region label.
	#[error("Region `{name}` is not recognized.")]
	UnknownName {
		/// Rejected name.
		name: String,
	},
}

/// OAuth host, API host, and locale tag used by a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionEndpoints {
	/// Base URL of the OAuth server (token endpoint lives under `/oauth/token`).
	pub oauth_base: Cow<'static, str>,
	/// Base URL prepended to every API path.
	pub api_base: Cow<'static, str>,
	/// Locale tag passed through the `locale` query parameter.
	pub locale: Cow<'static, str>,
}
impl RegionEndpoints {
	const fn fixed(oauth_base: &'static str, api_base: &'static str, locale: &'static str) -> Self {
		Self {
			oauth_base: Cow::Borrowed(oauth_base),
			api_base: Cow::Borrowed(api_base),
			locale: Cow::Borrowed(locale),
		}
	}

	/// Builds an endpoint triple that does not come from the fixed table (proxies, mocks).
	pub fn custom(
		oauth_base: impl Into<String>,
		api_base: impl Into<String>,
		locale: impl Into<String>,
	) -> Self {
		Self {
			oauth_base: Cow::Owned(oauth_base.into()),
			api_base: Cow::Owned(api_base.into()),
			locale: Cow::Owned(locale.into()),
		}
	}

	/// Returns the client-credentials token endpoint.
	pub fn token_url(&self) -> Result<Url, url::ParseError> {
		Url::parse(&format!("{}/oauth/token", self.oauth_base.trim_end_matches('/')))
	}

	/// Joins `path` onto the API base URL.
	pub fn api_url(&self, path: &str) -> Result<Url, url::ParseError> {
		Url::parse(&format!("{}{path}", self.api_base.trim_end_matches('/')))
	}
}

const US: RegionEndpoints =
	RegionEndpoints::fixed("https://us.battle.net", "https://us.api.blizzard.com", "en_US");
const EU: RegionEndpoints =
	RegionEndpoints::fixed("https://eu.battle.net", "https://eu.api.blizzard.com", "en_GB");
const KR: RegionEndpoints =
	RegionEndpoints::fixed("https://kr.battle.net", "https://kr.api.blizzard.com", "ko_KR");
const TW: RegionEndpoints =
	RegionEndpoints::fixed("https://tb.battle.net", "https://tb.api.blizzard.com", "zh_TW");
const CN: RegionEndpoints =
	RegionEndpoints::fixed("https://www.battle.net.cn", "https://api.blizzard.com.cn", "zh_CN");

/// Maps a region to its endpoint triple.
pub fn resolve(region: Region) -> RegionEndpoints {
	match region {
		Region::US => US,
		Region::EU => EU,
		Region::KR => KR,
		Region::TW => TW,
		Region::CN => CN,
	}
}

/// Maps a raw region ordinal to its endpoint triple.
///
/// Unknown ordinals (including `0`) deliberately resolve to the US endpoints instead of failing.
pub fn resolve_code(code: u8) -> RegionEndpoints {
	match Region::from_code(code) {
		Some(region) => resolve(region),
		None => US,
	}
}
