//! Where a price history entry came from.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Origin of a price history entry.
///
/// Stored as `TEXT` (`Scraper` / `Manual`) and serialized the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PriceSource {
    /// Recorded by a marketplace scrape or batch import.
    #[default]
    Scraper,
    /// Entered by a user editing the product.
    Manual,
}

/// Error returned for an unrecognized [`PriceSource`] string.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown price source: {0}")]
pub struct UnknownPriceSource(pub String);

impl PriceSource {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Scraper => "Scraper",
            Self::Manual => "Manual",
        }
    }
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceSource {
    type Err = UnknownPriceSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Scraper" => Ok(Self::Scraper),
            "Manual" => Ok(Self::Manual),
            other => Err(UnknownPriceSource(other.to_owned())),
        }
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for PriceSource {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for PriceSource {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(s.parse()?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for PriceSource {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips_through_str() {
        for source in [PriceSource::Scraper, PriceSource::Manual] {
            assert_eq!(source.as_str().parse::<PriceSource>().unwrap(), source);
        }
        assert!("scraper".parse::<PriceSource>().is_err());
    }

    #[test]
    fn test_serializes_as_variant_name() {
        assert_eq!(
            serde_json::to_string(&PriceSource::Manual).unwrap(),
            "\"Manual\""
        );
    }
}
