//! Guests
//!
//! Guest ledger: profiles, reservation history and the loyalty programme.

use std::fmt;

use rust_decimal::{Decimal, prelude::ToPrimitive};
use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bookings::BookingId;

/// Flat bonus granted on loyalty enrollment.
const ENROLLMENT_BONUS: u64 = 50;

/// Major units of spend per loyalty point earned.
const SPEND_PER_POINT: Decimal = Decimal::TEN;

/// Errors related to guest records and the loyalty programme.
#[derive(Debug, Error)]
pub enum GuestError {
    /// Referenced a guest id the ledger does not know.
    #[error("guest {0} is not registered")]
    UnknownGuest(GuestId),

    /// Registered the same guest id twice.
    #[error("guest {0} is already registered")]
    AlreadyRegistered(GuestId),

    /// Offered a negative spend for loyalty accrual.
    #[error("amount spent {0} must not be negative")]
    InvalidAmount(Decimal),

    /// Tried to redeem more points than the balance holds.
    #[error("requested {requested} points but only {balance} are available")]
    InsufficientPoints {
        /// Points the caller asked to redeem.
        requested: u64,
        /// Points actually on the balance.
        balance: u64,
    },

    /// The booking id is absent from the guest's reservation history.
    #[error("booking {booking} is not in the history of guest {guest}")]
    ReservationNotFound {
        /// Guest whose history was searched.
        guest: GuestId,
        /// Booking that was not found.
        booking: BookingId,
    },
}

/// Guest id, unique within a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestId(pub u32);

impl fmt::Display for GuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of a loyalty enrollment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enrollment {
    /// Newly enrolled; the signup bonus was granted.
    Joined,

    /// The guest was already enrolled; nothing changed.
    AlreadyEnrolled,
}

/// A guest with contact details, loyalty state and reservation history.
#[derive(Debug, Clone)]
pub struct Guest {
    id: GuestId,
    name: String,
    contact_info: String,
    loyalty_enrolled: bool,
    loyalty_points: u64,
    reservation_history: Vec<BookingId>,
}

impl Guest {
    /// Create a guest outside the loyalty programme with an empty history.
    pub fn new(id: GuestId, name: impl Into<String>, contact_info: impl Into<String>) -> Self {
        Guest {
            id,
            name: name.into(),
            contact_info: contact_info.into(),
            loyalty_enrolled: false,
            loyalty_points: 0,
            reservation_history: Vec::new(),
        }
    }

    /// The guest id.
    pub fn id(&self) -> GuestId {
        self.id
    }

    /// The guest's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The guest's contact details.
    pub fn contact_info(&self) -> &str {
        &self.contact_info
    }

    /// Whether the guest is enrolled in the loyalty programme.
    pub fn is_loyalty_enrolled(&self) -> bool {
        self.loyalty_enrolled
    }

    /// The current loyalty point balance.
    pub fn loyalty_points(&self) -> u64 {
        self.loyalty_points
    }

    /// Booking ids in the order the reservations were made.
    pub fn reservation_history(&self) -> &[BookingId] {
        &self.reservation_history
    }
}

/// Ledger of all guests, keyed by guest id.
#[derive(Debug, Default)]
pub struct GuestLedger {
    guests: FxHashMap<GuestId, Guest>,
}

impl GuestLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        GuestLedger::default()
    }

    /// Number of registered guests.
    pub fn len(&self) -> usize {
        self.guests.len()
    }

    /// Whether the ledger has no guests.
    pub fn is_empty(&self) -> bool {
        self.guests.is_empty()
    }

    /// Look up a guest by id.
    pub fn guest(&self, id: GuestId) -> Option<&Guest> {
        self.guests.get(&id)
    }

    /// Register a guest.
    ///
    /// # Errors
    ///
    /// Returns [`GuestError::AlreadyRegistered`] if the guest id is taken.
    pub fn register(&mut self, guest: Guest) -> Result<(), GuestError> {
        if self.guests.contains_key(&guest.id) {
            return Err(GuestError::AlreadyRegistered(guest.id));
        }

        self.guests.insert(guest.id, guest);

        Ok(())
    }

    /// Replace a guest's name and contact details.
    ///
    /// # Errors
    ///
    /// Returns [`GuestError::UnknownGuest`] if the guest is not registered.
    pub fn update_profile(
        &mut self,
        id: GuestId,
        name: impl Into<String>,
        contact_info: impl Into<String>,
    ) -> Result<(), GuestError> {
        let guest = self.guest_mut(id)?;

        guest.name = name.into();
        guest.contact_info = contact_info.into();

        Ok(())
    }

    /// Enroll a guest in the loyalty programme, granting the signup bonus.
    ///
    /// Enrolling an already-enrolled guest changes nothing and reports
    /// [`Enrollment::AlreadyEnrolled`].
    ///
    /// # Errors
    ///
    /// Returns [`GuestError::UnknownGuest`] if the guest is not registered.
    pub fn enroll_loyalty(&mut self, id: GuestId) -> Result<Enrollment, GuestError> {
        let guest = self.guest_mut(id)?;

        if guest.loyalty_enrolled {
            return Ok(Enrollment::AlreadyEnrolled);
        }

        guest.loyalty_enrolled = true;
        guest.loyalty_points += ENROLLMENT_BONUS;
        tracing::debug!(guest = %id, bonus = ENROLLMENT_BONUS, "guest joined loyalty programme");

        Ok(Enrollment::Joined)
    }

    /// Accrue loyalty points for an amount spent: one point per ten major
    /// units, rounded down. Returns the points earned.
    ///
    /// # Errors
    ///
    /// Returns [`GuestError::InvalidAmount`] if the amount is negative, or
    /// [`GuestError::UnknownGuest`] if the guest is not registered.
    pub fn earn_points(
        &mut self,
        id: GuestId,
        amount_spent: Money<'static, Currency>,
    ) -> Result<u64, GuestError> {
        let spent = *amount_spent.amount();
        if spent.is_sign_negative() {
            return Err(GuestError::InvalidAmount(spent));
        }

        let earned = spent
            .checked_div(SPEND_PER_POINT)
            .map(|points| points.floor())
            .and_then(|points| points.to_u64())
            .ok_or(GuestError::InvalidAmount(spent))?;

        let guest = self.guest_mut(id)?;
        guest.loyalty_points += earned;
        tracing::debug!(guest = %id, earned, balance = guest.loyalty_points, "loyalty points earned");

        Ok(earned)
    }

    /// Redeem points against the guest's balance.
    ///
    /// # Errors
    ///
    /// Returns [`GuestError::InsufficientPoints`] if the balance is too
    /// small (the balance is left unchanged), or
    /// [`GuestError::UnknownGuest`] if the guest is not registered.
    pub fn redeem_points(&mut self, id: GuestId, points: u64) -> Result<(), GuestError> {
        let guest = self.guest_mut(id)?;

        let remaining = guest
            .loyalty_points
            .checked_sub(points)
            .ok_or(GuestError::InsufficientPoints {
                requested: points,
                balance: guest.loyalty_points,
            })?;

        guest.loyalty_points = remaining;
        tracing::debug!(guest = %id, points, balance = remaining, "loyalty points redeemed");

        Ok(())
    }

    /// Append a booking id to the guest's reservation history.
    ///
    /// The history does not enforce uniqueness; recording the same booking
    /// twice is a caller error.
    ///
    /// # Errors
    ///
    /// Returns [`GuestError::UnknownGuest`] if the guest is not registered.
    pub fn add_reservation(&mut self, id: GuestId, booking: BookingId) -> Result<(), GuestError> {
        let guest = self.guest_mut(id)?;
        guest.reservation_history.push(booking);

        Ok(())
    }

    /// Remove a booking id from the guest's reservation history.
    ///
    /// # Errors
    ///
    /// Returns [`GuestError::ReservationNotFound`] if the booking id is not
    /// in the history, or [`GuestError::UnknownGuest`] if the guest is not
    /// registered.
    pub fn cancel_reservation(
        &mut self,
        id: GuestId,
        booking: BookingId,
    ) -> Result<(), GuestError> {
        let guest = self.guest_mut(id)?;

        let position = guest
            .reservation_history
            .iter()
            .position(|held| *held == booking)
            .ok_or(GuestError::ReservationNotFound {
                guest: id,
                booking,
            })?;

        guest.reservation_history.remove(position);

        Ok(())
    }

    fn guest_mut(&mut self, id: GuestId) -> Result<&mut Guest, GuestError> {
        self.guests.get_mut(&id).ok_or(GuestError::UnknownGuest(id))
    }
}
