//! Catalog
//!
//! YAML property definitions: the rooms a property offers and the coupon
//! codes it honours, parsed into a ready [`RoomRegistry`] and
//! [`CouponBook`].
//!
//! ```yaml
//! currency: USD
//! rooms:
//!   - number: 101
//!     type: Double
//!     price: "150.00"
//!     amenities: [WiFi, TV]
//! coupons:
//!   - code: DISCOUNT10
//!     percent_off: "10"
//! ```

use std::{fs, path::Path};

use rust_decimal::Decimal;
use rusty_money::{Money, iso};
use serde::Deserialize;
use thiserror::Error;

use crate::{
    coupons::CouponBook,
    money::to_minor_units,
    rooms::{Room, RoomError, RoomNumber, RoomRegistry, RoomType},
};

/// Catalog parsing errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// IO error reading a catalog file.
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// A price that is not a valid decimal for the catalog currency.
    #[error("invalid price: {0}")]
    InvalidPrice(String),

    /// A coupon percentage that is not a valid decimal.
    #[error("invalid percentage: {0}")]
    InvalidPercentage(String),

    /// Unknown ISO currency code.
    #[error("unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Room construction or registration error.
    #[error(transparent)]
    Room(#[from] RoomError),
}

/// Room entry in a catalog file.
#[derive(Debug, Deserialize)]
pub struct RoomDefinition {
    /// Room number.
    pub number: u32,

    /// Room category.
    #[serde(rename = "type")]
    pub room_type: RoomType,

    /// Nightly price in major units, e.g. `"150.00"`.
    pub price: String,

    /// Amenities; duplicates collapse.
    #[serde(default)]
    pub amenities: Vec<String>,
}

/// Coupon entry in a catalog file.
#[derive(Debug, Deserialize)]
pub struct CouponDefinition {
    /// Coupon code.
    pub code: String,

    /// Whole percentage points off, e.g. `"10"`.
    pub percent_off: String,
}

/// A parsed property definition.
#[derive(Debug, Deserialize)]
pub struct Catalog {
    /// ISO alpha code for every price in the catalog.
    pub currency: String,

    /// Rooms the property offers.
    #[serde(default)]
    pub rooms: Vec<RoomDefinition>,

    /// Coupon codes the property honours.
    #[serde(default)]
    pub coupons: Vec<CouponDefinition>,
}

impl Catalog {
    /// Parse a catalog from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Yaml`] on malformed YAML.
    pub fn parse(yaml: &str) -> Result<Self, CatalogError> {
        Ok(serde_norway::from_str(yaml)?)
    }

    /// Read and parse a catalog file.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Io`] if the file cannot be read and
    /// [`CatalogError::Yaml`] if it cannot be parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let yaml = fs::read_to_string(path)?;

        Self::parse(&yaml)
    }

    /// Build the room registry and coupon book this catalog describes.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownCurrency`] for an unrecognised
    /// currency code, [`CatalogError::InvalidPrice`] /
    /// [`CatalogError::InvalidPercentage`] for malformed amounts, and
    /// wrapped [`RoomError`]s for invalid or duplicate rooms.
    pub fn build(self) -> Result<(RoomRegistry, CouponBook), CatalogError> {
        let currency = iso::find(&self.currency)
            .ok_or_else(|| CatalogError::UnknownCurrency(self.currency.clone()))?;

        let mut registry = RoomRegistry::new(currency);
        for definition in self.rooms {
            let minor = definition
                .price
                .trim()
                .parse::<Decimal>()
                .ok()
                .and_then(|amount| to_minor_units(amount, currency.exponent))
                .ok_or_else(|| CatalogError::InvalidPrice(definition.price.clone()))?;

            let mut room = Room::new(
                RoomNumber(definition.number),
                definition.room_type,
                Money::from_minor(minor, currency),
            )?;
            for amenity in definition.amenities {
                room.add_amenity(amenity);
            }

            registry.add_room(room)?;
        }

        let mut coupons = CouponBook::new();
        for definition in self.coupons {
            let percent_off = definition
                .percent_off
                .trim()
                .parse::<Decimal>()
                .ok()
                .ok_or_else(|| CatalogError::InvalidPercentage(definition.percent_off.clone()))?;

            coupons.insert(definition.code, percent_off);
        }

        Ok((registry, coupons))
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::USD;
    use testresult::TestResult;

    use crate::rooms::Room;

    use super::*;

    const PROPERTY: &str = r#"
currency: USD
rooms:
  - number: 101
    type: Double
    price: "150.00"
    amenities: [WiFi, TV]
  - number: 102
    type: Suite
    price: "250.00"
coupons:
  - code: DISCOUNT10
    percent_off: "10"
"#;

    #[test]
    fn parse_and_build_a_property() -> TestResult {
        let (registry, coupons) = Catalog::parse(PROPERTY)?.build()?;

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.room(RoomNumber(101)).map(Room::price_per_night),
            Some(Money::from_minor(15_000, USD))
        );
        assert_eq!(
            registry
                .room(RoomNumber(101))
                .map(|room| room.amenities().count()),
            Some(2)
        );
        assert_eq!(coupons.percent_off("DISCOUNT10"), Some(Decimal::TEN));

        Ok(())
    }

    #[test]
    fn unknown_currency_is_rejected() -> TestResult {
        let catalog = Catalog::parse("currency: ZZZ\nrooms: []\n")?;

        let result = catalog.build();

        assert!(matches!(
            result,
            Err(CatalogError::UnknownCurrency(code)) if code == "ZZZ"
        ));

        Ok(())
    }

    #[test]
    fn malformed_prices_are_rejected() -> TestResult {
        let catalog = Catalog::parse(
            "currency: USD\nrooms:\n  - number: 1\n    type: Single\n    price: \"lots\"\n",
        )?;

        let result = catalog.build();

        assert!(matches!(result, Err(CatalogError::InvalidPrice(price)) if price == "lots"));

        Ok(())
    }

    #[test]
    fn prices_finer_than_the_currency_are_rejected() -> TestResult {
        let catalog = Catalog::parse(
            "currency: USD\nrooms:\n  - number: 1\n    type: Single\n    price: \"10.005\"\n",
        )?;

        let result = catalog.build();

        assert!(matches!(result, Err(CatalogError::InvalidPrice(_))));

        Ok(())
    }

    #[test]
    fn duplicate_rooms_surface_the_registry_error() -> TestResult {
        let catalog = Catalog::parse(
            r#"
currency: USD
rooms:
  - number: 1
    type: Single
    price: "10.00"
  - number: 1
    type: Double
    price: "20.00"
"#,
        )?;

        let result = catalog.build();

        assert!(matches!(
            result,
            Err(CatalogError::Room(RoomError::AlreadyRegistered(number))) if number == RoomNumber(1)
        ));

        Ok(())
    }

    #[test]
    fn from_path_reads_a_file() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("property.yml");
        std::fs::write(&path, PROPERTY)?;

        let (registry, _) = Catalog::from_path(&path)?.build()?;

        assert_eq!(registry.len(), 2);

        Ok(())
    }

    #[test]
    fn unreadable_files_surface_io_errors() {
        let result = Catalog::from_path("/definitely/not/a/real/catalog.yml");

        assert!(matches!(result, Err(CatalogError::Io(_))));
    }
}
