//! Rooms
//!
//! Room inventory for a single property: occupancy flags, nightly pricing
//! and advisory maintenance scheduling.

use std::collections::BTreeSet;
use std::fmt;

use jiff::civil::Date;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use rusty_money::{Money, MoneyError, iso::Currency};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::percent_of_minor;

/// Errors related to room registration, occupancy and pricing.
#[derive(Debug, Error)]
pub enum RoomError {
    /// Referenced a room number the registry does not know.
    #[error("room {0} is not registered")]
    UnknownRoom(RoomNumber),

    /// Registered the same room number twice.
    #[error("room {0} is already registered")]
    AlreadyRegistered(RoomNumber),

    /// Reserved a room whose availability flag is already cleared.
    #[error("room {0} is already occupied")]
    AlreadyOccupied(RoomNumber),

    /// Set a nightly price that is not strictly positive.
    #[error("nightly price {0} must be positive")]
    InvalidPrice(Decimal),

    /// A room price uses a different currency than the registry (room, room currency, registry currency).
    #[error("room {0} is priced in {1}, but the registry uses {2}")]
    CurrencyMismatch(RoomNumber, &'static str, &'static str),

    /// A percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Room number, unique within a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomNumber(pub u32);

impl fmt::Display for RoomNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Category of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomType {
    /// One single bed.
    Single,

    /// One double bed.
    Double,

    /// Separate sleeping and living areas.
    Suite,

    /// Top-floor suite.
    Penthouse,
}

/// A room with its amenities, nightly price and availability flag.
///
/// The availability flag is the only source of truth for occupancy; there
/// is no per-date calendar in this model.
#[derive(Debug, Clone)]
pub struct Room {
    number: RoomNumber,
    room_type: RoomType,
    amenities: BTreeSet<String>,
    price_per_night: Money<'static, Currency>,
    available: bool,
    maintenance_on: Option<Date>,
}

impl Room {
    /// Create an available room with the given nightly price and no amenities.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::InvalidPrice`] if the price is not strictly positive.
    pub fn new(
        number: RoomNumber,
        room_type: RoomType,
        price_per_night: Money<'static, Currency>,
    ) -> Result<Self, RoomError> {
        ensure_positive(price_per_night)?;

        Ok(Room {
            number,
            room_type,
            amenities: BTreeSet::new(),
            price_per_night,
            available: true,
            maintenance_on: None,
        })
    }

    /// Add an amenity, consuming and returning the room.
    #[must_use]
    pub fn with_amenity(mut self, amenity: impl Into<String>) -> Self {
        self.amenities.insert(amenity.into());
        self
    }

    /// The room number.
    pub fn number(&self) -> RoomNumber {
        self.number
    }

    /// The room category.
    pub fn room_type(&self) -> RoomType {
        self.room_type
    }

    /// The nightly price.
    pub fn price_per_night(&self) -> Money<'static, Currency> {
        self.price_per_night
    }

    /// Whether the room is currently available.
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Amenities, in lexical order.
    pub fn amenities(&self) -> impl Iterator<Item = &str> {
        self.amenities.iter().map(String::as_str)
    }

    /// The advisory maintenance date, if one is scheduled.
    pub fn maintenance_on(&self) -> Option<Date> {
        self.maintenance_on
    }

    /// Add an amenity. Adding one the room already has is a no-op.
    pub fn add_amenity(&mut self, amenity: impl Into<String>) {
        self.amenities.insert(amenity.into());
    }

    /// Remove an amenity, returning whether it was present.
    pub fn remove_amenity(&mut self, amenity: &str) -> bool {
        self.amenities.remove(amenity)
    }

    /// The nightly price with a percentage discount applied.
    ///
    /// A `discount_pct` outside `[0, 100]` is accepted and produces a
    /// negative or inflated price; bounding the percentage is the caller's
    /// responsibility.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::PercentConversion`] if the percentage cannot be
    /// safely applied in minor units.
    pub fn discounted_price(
        &self,
        discount_pct: Decimal,
    ) -> Result<Money<'static, Currency>, RoomError> {
        let minor = self.price_per_night.to_minor_units();
        let discount = percent_of_minor(discount_pct, minor).ok_or(RoomError::PercentConversion)?;
        let discounted = minor
            .checked_sub(discount)
            .ok_or(RoomError::PercentConversion)?;

        Ok(Money::from_minor(
            discounted,
            self.price_per_night.currency(),
        ))
    }
}

/// Registry of all rooms in a property, keyed by room number.
///
/// All rooms share the registry currency.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: FxHashMap<RoomNumber, Room>,
    currency: &'static Currency,
}

impl RoomRegistry {
    /// Create an empty registry for the given currency.
    pub fn new(currency: &'static Currency) -> Self {
        RoomRegistry {
            rooms: FxHashMap::default(),
            currency,
        }
    }

    /// The registry currency.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Number of registered rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether the registry has no rooms.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Look up a room by number.
    pub fn room(&self, number: RoomNumber) -> Option<&Room> {
        self.rooms.get(&number)
    }

    /// Iterate over all rooms, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    /// Register a room.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::AlreadyRegistered`] if the room number is taken,
    /// or [`RoomError::CurrencyMismatch`] if the room is priced in a
    /// currency other than the registry's.
    pub fn add_room(&mut self, room: Room) -> Result<(), RoomError> {
        let room_currency = room.price_per_night.currency();
        if room_currency != self.currency {
            return Err(RoomError::CurrencyMismatch(
                room.number,
                room_currency.iso_alpha_code,
                self.currency.iso_alpha_code,
            ));
        }

        if self.rooms.contains_key(&room.number) {
            return Err(RoomError::AlreadyRegistered(room.number));
        }

        self.rooms.insert(room.number, room);

        Ok(())
    }

    /// Whether the room is currently available. Pure read of the flag.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::UnknownRoom`] if the room is not registered.
    pub fn check_availability(&self, number: RoomNumber) -> Result<bool, RoomError> {
        self.room(number)
            .map(Room::is_available)
            .ok_or(RoomError::UnknownRoom(number))
    }

    /// Mark a room occupied.
    ///
    /// The check and the flag mutation happen under one exclusive borrow,
    /// which is the transactional boundary a concurrent serving layer must
    /// preserve around two racing reservations.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::AlreadyOccupied`] if the room is already taken,
    /// or [`RoomError::UnknownRoom`] if it is not registered.
    pub fn reserve(&mut self, number: RoomNumber) -> Result<(), RoomError> {
        let room = self.room_mut(number)?;

        if !room.available {
            return Err(RoomError::AlreadyOccupied(number));
        }

        room.available = false;
        tracing::debug!(room = %number, "room reserved");

        Ok(())
    }

    /// Mark a room available again, clearing any advisory maintenance date.
    ///
    /// Releasing an already-available room is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::UnknownRoom`] if the room is not registered.
    pub fn release(&mut self, number: RoomNumber) -> Result<(), RoomError> {
        let room = self.room_mut(number)?;

        room.available = true;
        room.maintenance_on = None;
        tracing::debug!(room = %number, "room released");

        Ok(())
    }

    /// Take a room out of service for maintenance.
    ///
    /// The date is advisory metadata only; it is not checked against
    /// existing bookings.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::UnknownRoom`] if the room is not registered.
    pub fn schedule_maintenance(&mut self, number: RoomNumber, date: Date) -> Result<(), RoomError> {
        let room = self.room_mut(number)?;

        room.available = false;
        room.maintenance_on = Some(date);
        tracing::debug!(room = %number, %date, "room scheduled for maintenance");

        Ok(())
    }

    /// Change a room's nightly price.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::InvalidPrice`] if the new price is not strictly
    /// positive, [`RoomError::CurrencyMismatch`] if it uses a different
    /// currency, or [`RoomError::UnknownRoom`] if the room is not registered.
    pub fn reprice(
        &mut self,
        number: RoomNumber,
        new_price: Money<'static, Currency>,
    ) -> Result<(), RoomError> {
        ensure_positive(new_price)?;

        let new_currency = new_price.currency();
        if new_currency != self.currency {
            return Err(RoomError::CurrencyMismatch(
                number,
                new_currency.iso_alpha_code,
                self.currency.iso_alpha_code,
            ));
        }

        let room = self.room_mut(number)?;
        room.price_per_night = new_price;

        Ok(())
    }

    /// A room's nightly price with a percentage discount applied.
    ///
    /// See [`Room::discounted_price`] for the percentage contract.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::UnknownRoom`] if the room is not registered, or
    /// [`RoomError::PercentConversion`] if the percentage cannot be safely
    /// applied.
    pub fn discounted_price(
        &self,
        number: RoomNumber,
        discount_pct: Decimal,
    ) -> Result<Money<'static, Currency>, RoomError> {
        self.room(number)
            .ok_or(RoomError::UnknownRoom(number))?
            .discounted_price(discount_pct)
    }

    fn room_mut(&mut self, number: RoomNumber) -> Result<&mut Room, RoomError> {
        self.rooms
            .get_mut(&number)
            .ok_or(RoomError::UnknownRoom(number))
    }
}

/// Return `InvalidPrice` unless the amount is strictly positive.
fn ensure_positive(price: Money<'static, Currency>) -> Result<(), RoomError> {
    if *price.amount() <= Decimal::ZERO {
        return Err(RoomError::InvalidPrice(*price.amount()));
    }

    Ok(())
}
