//! Supported countries and macro-regions.
//!
//! Closed enumerations mapping ISO-3166 country codes to their default
//! currency and macro-region. The reverse mapping (macro-region to
//! countries) is derived from `Country::ALL`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::AppError;
use crate::services::currency::Currency;

/// Countries with at least one registered extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Country {
    BR,
    US,
    PT,
    ES,
    DE,
    GB,
}

/// Named groups of countries used by the selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MacroRegion {
    EU,
    NA,
    LATAM,
    NONE,
}

impl Country {
    /// Every supported country, in a stable order.
    pub const ALL: [Country; 6] = [
        Country::BR,
        Country::US,
        Country::PT,
        Country::ES,
        Country::DE,
        Country::GB,
    ];

    /// ISO-3166 alpha-2 code.
    pub fn code(&self) -> &'static str {
        match self {
            Country::BR => "BR",
            Country::US => "US",
            Country::PT => "PT",
            Country::ES => "ES",
            Country::DE => "DE",
            Country::GB => "GB",
        }
    }

    /// Currency offers from this country default to when no symbol or site
    /// hint says otherwise.
    pub fn default_currency(&self) -> Currency {
        match self {
            Country::BR => Currency::BRL,
            Country::US => Currency::USD,
            Country::PT | Country::ES | Country::DE => Currency::EUR,
            Country::GB => Currency::GBP,
        }
    }

    pub fn macro_region(&self) -> MacroRegion {
        match self {
            Country::BR => MacroRegion::LATAM,
            Country::US => MacroRegion::NA,
            Country::PT | Country::ES | Country::DE | Country::GB => MacroRegion::EU,
        }
    }
}

impl MacroRegion {
    /// Countries belonging to this macro-region, in `Country::ALL` order.
    pub fn countries(&self) -> Vec<Country> {
        Country::ALL
            .iter()
            .copied()
            .filter(|c| c.macro_region() == *self)
            .collect()
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Country {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BR" => Ok(Country::BR),
            "US" => Ok(Country::US),
            "PT" => Ok(Country::PT),
            "ES" => Ok(Country::ES),
            "DE" => Ok(Country::DE),
            "GB" => Ok(Country::GB),
            other => Err(AppError::Validation(format!(
                "Unsupported country code: {}",
                other
            ))),
        }
    }
}
