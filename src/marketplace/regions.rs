//! Marketplace lookup table and the API regions/profiles they route to.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Selling Partner API regional endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Na,
    Eu,
    Fe,
}

impl Region {
    /// Returns the production base URL for this region.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Region::Na => "https://sellingpartnerapi-na.amazon.com",
            Region::Eu => "https://sellingpartnerapi-eu.amazon.com",
            Region::Fe => "https://sellingpartnerapi-fe.amazon.com",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Region::Na => "na",
            Region::Eu => "eu",
            Region::Fe => "fe",
        };
        write!(f, "{}", code)
    }
}

/// Seller account within a region. Far East storefronts are usually
/// registered under separate accounts, so each needs its own credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Default,
    Jp,
    Au,
    Sg,
}

/// Cache key for a region client: one handle per (region, profile).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionKey {
    pub region: Region,
    pub profile: Profile,
}

impl RegionKey {
    pub fn new(region: Region, profile: Profile) -> Self {
        Self { region, profile }
    }
}

/// Renders as `eu` or `fe-jp`; this is also the key used in config tables.
impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.profile {
            Profile::Default => write!(f, "{}", self.region),
            Profile::Jp => write!(f, "{}-jp", self.region),
            Profile::Au => write!(f, "{}-au", self.region),
            Profile::Sg => write!(f, "{}-sg", self.region),
        }
    }
}

/// Marketplaces reachable through the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marketplace {
    Us,
    Ca,
    Mx,
    Br,
    Uk,
    De,
    Fr,
    It,
    Es,
    Nl,
    Se,
    Pl,
    Be,
    Tr,
    Ae,
    Sa,
    Eg,
    In,
    Jp,
    Au,
    Sg,
}

impl Marketplace {
    /// Returns the marketplace identifier used on the wire.
    pub fn id(&self) -> &'static str {
        match self {
            Marketplace::Us => "ATVPDKIKX0DER",
            Marketplace::Ca => "A2EUQ1WTGCTBG2",
            Marketplace::Mx => "A1AM78C64UM0Y8",
            Marketplace::Br => "A2Q3Y263D00KWC",
            Marketplace::Uk => "A1F83G8C2ARO7P",
            Marketplace::De => "A1PA6795UKMFR9",
            Marketplace::Fr => "A13V1IB3VIYZZH",
            Marketplace::It => "APJ6JRA9NG5V4",
            Marketplace::Es => "A1RKKUPIHCS9HS",
            Marketplace::Nl => "A1805IZSGTT6HS",
            Marketplace::Se => "A2NODRKZP88ZB9",
            Marketplace::Pl => "A1C3SOZRARQ6R3",
            Marketplace::Be => "AMEN7PMS3EDWL",
            Marketplace::Tr => "A33AVAJ2PDY3EV",
            Marketplace::Ae => "A2VIGQ35RCS4UG",
            Marketplace::Sa => "A17E79C6D8DWNP",
            Marketplace::Eg => "ARBP9OOSHTCHU",
            Marketplace::In => "A21TJRUUN4KGV",
            Marketplace::Jp => "A1VC38T7YXB528",
            Marketplace::Au => "A39IBJ37TRP1C6",
            Marketplace::Sg => "A19VAU5U5O7RUS",
        }
    }

    /// Returns the API region serving this marketplace.
    pub fn region(&self) -> Region {
        match self {
            Marketplace::Us | Marketplace::Ca | Marketplace::Mx | Marketplace::Br => Region::Na,
            Marketplace::Jp | Marketplace::Au | Marketplace::Sg => Region::Fe,
            _ => Region::Eu,
        }
    }

    /// Returns the seller profile used for this marketplace.
    pub fn profile(&self) -> Profile {
        match self {
            Marketplace::Jp => Profile::Jp,
            Marketplace::Au => Profile::Au,
            Marketplace::Sg => Profile::Sg,
            _ => Profile::Default,
        }
    }

    /// Returns the client cache key for this marketplace.
    pub fn region_key(&self) -> RegionKey {
        RegionKey::new(self.region(), self.profile())
    }

    /// Returns the storefront currency code.
    pub fn currency(&self) -> &'static str {
        match self {
            Marketplace::Us => "USD",
            Marketplace::Ca => "CAD",
            Marketplace::Mx => "MXN",
            Marketplace::Br => "BRL",
            Marketplace::Uk => "GBP",
            Marketplace::De
            | Marketplace::Fr
            | Marketplace::It
            | Marketplace::Es
            | Marketplace::Nl
            | Marketplace::Be => "EUR",
            Marketplace::Se => "SEK",
            Marketplace::Pl => "PLN",
            Marketplace::Tr => "TRY",
            Marketplace::Ae => "AED",
            Marketplace::Sa => "SAR",
            Marketplace::Eg => "EGP",
            Marketplace::In => "INR",
            Marketplace::Jp => "JPY",
            Marketplace::Au => "AUD",
            Marketplace::Sg => "SGD",
        }
    }

    /// Looks up a marketplace by wire id or short code.
    ///
    /// Unknown keys are an error; there is no fallback region.
    pub fn lookup(key: &str) -> Result<Marketplace, Error> {
        key.parse().map_err(|_| Error::UnknownMarketplace(key.to_string()))
    }

    /// Returns all supported marketplaces.
    pub fn all() -> &'static [Marketplace] {
        &[
            Marketplace::Us,
            Marketplace::Ca,
            Marketplace::Mx,
            Marketplace::Br,
            Marketplace::Uk,
            Marketplace::De,
            Marketplace::Fr,
            Marketplace::It,
            Marketplace::Es,
            Marketplace::Nl,
            Marketplace::Se,
            Marketplace::Pl,
            Marketplace::Be,
            Marketplace::Tr,
            Marketplace::Ae,
            Marketplace::Sa,
            Marketplace::Eg,
            Marketplace::In,
            Marketplace::Jp,
            Marketplace::Au,
            Marketplace::Sg,
        ]
    }
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Marketplace::Us => "us",
            Marketplace::Ca => "ca",
            Marketplace::Mx => "mx",
            Marketplace::Br => "br",
            Marketplace::Uk => "uk",
            Marketplace::De => "de",
            Marketplace::Fr => "fr",
            Marketplace::It => "it",
            Marketplace::Es => "es",
            Marketplace::Nl => "nl",
            Marketplace::Se => "se",
            Marketplace::Pl => "pl",
            Marketplace::Be => "be",
            Marketplace::Tr => "tr",
            Marketplace::Ae => "ae",
            Marketplace::Sa => "sa",
            Marketplace::Eg => "eg",
            Marketplace::In => "in",
            Marketplace::Jp => "jp",
            Marketplace::Au => "au",
            Marketplace::Sg => "sg",
        };
        write!(f, "{}", code)
    }
}

impl FromStr for Marketplace {
    type Err = MarketplaceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        if let Some(m) = Marketplace::all().iter().find(|m| m.id() == key) {
            return Ok(*m);
        }

        match key.to_lowercase().as_str() {
            "us" => Ok(Marketplace::Us),
            "ca" => Ok(Marketplace::Ca),
            "mx" => Ok(Marketplace::Mx),
            "br" => Ok(Marketplace::Br),
            "uk" | "gb" => Ok(Marketplace::Uk),
            "de" => Ok(Marketplace::De),
            "fr" => Ok(Marketplace::Fr),
            "it" => Ok(Marketplace::It),
            "es" => Ok(Marketplace::Es),
            "nl" => Ok(Marketplace::Nl),
            "se" => Ok(Marketplace::Se),
            "pl" => Ok(Marketplace::Pl),
            "be" => Ok(Marketplace::Be),
            "tr" => Ok(Marketplace::Tr),
            "ae" => Ok(Marketplace::Ae),
            "sa" => Ok(Marketplace::Sa),
            "eg" => Ok(Marketplace::Eg),
            "in" => Ok(Marketplace::In),
            "jp" => Ok(Marketplace::Jp),
            "au" => Ok(Marketplace::Au),
            "sg" => Ok(Marketplace::Sg),
            _ => Err(MarketplaceParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarketplaceParseError(String);

impl fmt::Display for MarketplaceParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown marketplace '{}'. Use a marketplace id or a code such as us, uk, de, jp", self.0)
    }
}

impl std::error::Error for MarketplaceParseError {}
