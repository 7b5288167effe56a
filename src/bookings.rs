//! Bookings
//!
//! The booking engine: binds a guest to a room over a stay, drives the
//! booking state machine and hands settled charges to the payment
//! processor.
//!
//! All mutation goes through `&mut self`, so exclusive access per call is
//! the engine's concurrency contract. A serving layer that shares the
//! engine across sessions wraps it in a lock; two racing confirmations can
//! then never both observe an available room.

use std::fmt;

use jiff::{Span, civil::Date};
use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    guests::{GuestError, GuestId, GuestLedger},
    notifications::{NoopSink, NotificationSink},
    payments::{PaymentError, PaymentId, PaymentProcessor},
    rooms::{RoomError, RoomNumber, RoomRegistry},
};

/// Errors related to the booking lifecycle.
#[derive(Debug, Error)]
pub enum BookingError {
    /// Check-out does not fall strictly after check-in.
    #[error("check-out {check_out} must fall after check-in {check_in}")]
    InvalidDateRange {
        /// Requested check-in date.
        check_in: Date,
        /// Requested check-out date.
        check_out: Date,
    },

    /// The requested room is not available.
    #[error("room {0} is not available")]
    RoomUnavailable(RoomNumber),

    /// A stay extension must add at least one night.
    #[error("extension of {0} days must be positive")]
    InvalidDuration(i64),

    /// Referenced a booking id the engine does not know.
    #[error("booking {0} is unknown")]
    UnknownBooking(BookingId),

    /// Confirmed a booking that is not pending.
    #[error("booking {id} is {status} and can only be confirmed while pending")]
    NotPending {
        /// The booking in question.
        id: BookingId,
        /// Its current status.
        status: BookingStatus,
    },

    /// Checked out a booking that is not confirmed.
    #[error("booking {id} is {status} and cannot check out")]
    NotConfirmed {
        /// The booking in question.
        id: BookingId,
        /// Its current status.
        status: BookingStatus,
    },

    /// Mutated a booking that reached a terminal status.
    #[error("booking {id} is {status} and can no longer change")]
    Terminal {
        /// The booking in question.
        id: BookingId,
        /// Its terminal status.
        status: BookingStatus,
    },

    /// The total cost exceeds the representable amount.
    #[error("booking cost exceeds the representable amount")]
    CostOverflow,

    /// Wrapped room registry error.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Wrapped guest ledger error.
    #[error(transparent)]
    Guest(#[from] GuestError),

    /// Wrapped payment processor error.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// Wrapped calendar arithmetic error.
    #[error(transparent)]
    Date(#[from] jiff::Error),
}

/// Booking id, allocated sequentially by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(pub u64);

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    /// Created but not yet holding its room.
    Pending,

    /// Holding its room until checkout or cancellation.
    Confirmed,

    /// Cancelled; the room has been released. Terminal.
    Cancelled,

    /// Checked out; the room has been released. Terminal.
    Completed,
}

impl BookingStatus {
    /// Whether the status permits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        };

        f.write_str(label)
    }
}

/// A check-in / check-out date pair with check-out strictly later.
///
/// Construction is the only way in; [`Stay::new`] enforces the ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stay {
    check_in: Date,
    check_out: Date,
}

impl Stay {
    /// Create a stay.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidDateRange`] unless check-out falls
    /// strictly after check-in.
    pub fn new(check_in: Date, check_out: Date) -> Result<Self, BookingError> {
        if check_out <= check_in {
            return Err(BookingError::InvalidDateRange {
                check_in,
                check_out,
            });
        }

        Ok(Stay {
            check_in,
            check_out,
        })
    }

    /// The check-in date.
    pub fn check_in(&self) -> Date {
        self.check_in
    }

    /// The check-out date.
    pub fn check_out(&self) -> Date {
        self.check_out
    }

    /// Number of nights, as a true calendar-day difference. Always at
    /// least one.
    pub fn nights(&self) -> i64 {
        i64::from((self.check_out - self.check_in).get_days())
    }
}

/// A reservation binding one guest to one room over a stay.
#[derive(Debug, Clone)]
pub struct Booking {
    id: BookingId,
    guest: GuestId,
    room: RoomNumber,
    stay: Stay,
    status: BookingStatus,
    special_requests: Vec<String>,
}

impl Booking {
    /// The booking id.
    pub fn id(&self) -> BookingId {
        self.id
    }

    /// The guest holding the booking.
    pub fn guest(&self) -> GuestId {
        self.guest
    }

    /// The room the booking points at.
    pub fn room(&self) -> RoomNumber {
        self.room
    }

    /// The stay dates.
    pub fn stay(&self) -> Stay {
        self.stay
    }

    /// The lifecycle state.
    pub fn status(&self) -> BookingStatus {
        self.status
    }

    /// Special requests, in the order they were added.
    pub fn special_requests(&self) -> &[String] {
        &self.special_requests
    }
}

/// The booking engine: owns the room registry and guest ledger, allocates
/// booking ids and drives every status transition.
pub struct BookingEngine {
    rooms: RoomRegistry,
    guests: GuestLedger,
    bookings: FxHashMap<BookingId, Booking>,
    next_booking: u64,
    sink: Box<dyn NotificationSink>,
}

impl fmt::Debug for BookingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BookingEngine")
            .field("rooms", &self.rooms)
            .field("guests", &self.guests)
            .field("bookings", &self.bookings)
            .field("next_booking", &self.next_booking)
            .finish_non_exhaustive()
    }
}

impl BookingEngine {
    /// Create an engine over a room registry and guest ledger, with no
    /// notification sink.
    pub fn new(rooms: RoomRegistry, guests: GuestLedger) -> Self {
        BookingEngine {
            rooms,
            guests,
            bookings: FxHashMap::default(),
            next_booking: 1,
            sink: Box::new(NoopSink),
        }
    }

    /// Replace the notification sink, consuming and returning the engine.
    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The room registry.
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// The room registry, mutably, for maintenance and repricing.
    pub fn rooms_mut(&mut self) -> &mut RoomRegistry {
        &mut self.rooms
    }

    /// The guest ledger.
    pub fn guests(&self) -> &GuestLedger {
        &self.guests
    }

    /// The guest ledger, mutably, for registration and loyalty operations.
    pub fn guests_mut(&mut self) -> &mut GuestLedger {
        &mut self.guests
    }

    /// Look up a booking by id.
    pub fn booking(&self, id: BookingId) -> Option<&Booking> {
        self.bookings.get(&id)
    }

    /// Iterate over all bookings, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Booking> {
        self.bookings.values()
    }

    /// Create a pending booking and record it in the guest's history.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidDateRange`] unless check-out falls
    /// after check-in, [`BookingError::RoomUnavailable`] if the room's
    /// availability flag is already cleared, or a wrapped registry/ledger
    /// error for an unknown room or guest.
    #[tracing::instrument(skip(self), fields(guest = %guest, room = %room))]
    pub fn create(
        &mut self,
        guest: GuestId,
        room: RoomNumber,
        check_in: Date,
        check_out: Date,
    ) -> Result<BookingId, BookingError> {
        let stay = Stay::new(check_in, check_out)?;

        self.guests
            .guest(guest)
            .ok_or(GuestError::UnknownGuest(guest))?;

        if !self.rooms.check_availability(room)? {
            return Err(BookingError::RoomUnavailable(room));
        }

        let id = BookingId(self.next_booking);
        self.next_booking += 1;

        self.guests.add_reservation(guest, id)?;
        self.bookings.insert(
            id,
            Booking {
                id,
                guest,
                room,
                stay,
                status: BookingStatus::Pending,
                special_requests: Vec::new(),
            },
        );
        tracing::debug!(booking = %id, nights = stay.nights(), "booking created");

        Ok(id)
    }

    /// Confirm a pending booking, reserving its room.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::NotPending`] unless the booking is pending;
    /// propagates [`RoomError::AlreadyOccupied`] if the room was taken
    /// between creation and confirmation.
    #[tracing::instrument(skip(self), fields(booking = %id))]
    pub fn confirm(&mut self, id: BookingId) -> Result<(), BookingError> {
        let booking = self
            .bookings
            .get_mut(&id)
            .ok_or(BookingError::UnknownBooking(id))?;

        if booking.status != BookingStatus::Pending {
            return Err(BookingError::NotPending {
                id,
                status: booking.status,
            });
        }

        self.rooms.reserve(booking.room)?;
        booking.status = BookingStatus::Confirmed;
        tracing::debug!(room = %booking.room, "booking confirmed");
        self.sink.booking_confirmed(booking);

        Ok(())
    }

    /// Cancel a booking, releasing its room and removing it from the
    /// guest's history.
    ///
    /// Cancelling an already-cancelled booking is a no-op; the room stays
    /// released.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Terminal`] for a completed booking, or
    /// [`BookingError::UnknownBooking`] if the id is unknown.
    #[tracing::instrument(skip(self), fields(booking = %id))]
    pub fn cancel(&mut self, id: BookingId) -> Result<(), BookingError> {
        let booking = self
            .bookings
            .get_mut(&id)
            .ok_or(BookingError::UnknownBooking(id))?;

        match booking.status {
            BookingStatus::Cancelled => return Ok(()),
            BookingStatus::Completed => {
                return Err(BookingError::Terminal {
                    id,
                    status: booking.status,
                });
            }
            BookingStatus::Pending | BookingStatus::Confirmed => {}
        }

        // Only a confirmed booking holds its room; releasing on a pending
        // cancellation could free a room some other booking holds.
        if booking.status == BookingStatus::Confirmed {
            self.rooms.release(booking.room)?;
        }

        self.guests.cancel_reservation(booking.guest, id)?;
        booking.status = BookingStatus::Cancelled;
        tracing::debug!(room = %booking.room, "booking cancelled");
        self.sink.booking_cancelled(booking);

        Ok(())
    }

    /// Replace the stay dates of a booking that has not reached a terminal
    /// status.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidDateRange`] unless the new check-out
    /// falls after the new check-in, or [`BookingError::Terminal`] once the
    /// booking is cancelled or completed.
    #[tracing::instrument(skip(self), fields(booking = %id))]
    pub fn modify_dates(
        &mut self,
        id: BookingId,
        new_check_in: Date,
        new_check_out: Date,
    ) -> Result<(), BookingError> {
        let stay = Stay::new(new_check_in, new_check_out)?;

        let booking = self
            .bookings
            .get_mut(&id)
            .ok_or(BookingError::UnknownBooking(id))?;

        if booking.status.is_terminal() {
            return Err(BookingError::Terminal {
                id,
                status: booking.status,
            });
        }

        booking.stay = stay;
        tracing::debug!(nights = stay.nights(), "booking dates modified");

        Ok(())
    }

    /// Push the check-out date back by a number of extra nights.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidDuration`] unless `extra_days` is
    /// positive, or [`BookingError::Terminal`] once the booking is
    /// cancelled or completed.
    #[tracing::instrument(skip(self), fields(booking = %id))]
    pub fn extend(&mut self, id: BookingId, extra_days: i64) -> Result<(), BookingError> {
        if extra_days <= 0 {
            return Err(BookingError::InvalidDuration(extra_days));
        }

        let booking = self
            .bookings
            .get_mut(&id)
            .ok_or(BookingError::UnknownBooking(id))?;

        if booking.status.is_terminal() {
            return Err(BookingError::Terminal {
                id,
                status: booking.status,
            });
        }

        let new_check_out = booking
            .stay
            .check_out
            .checked_add(Span::new().try_days(extra_days)?)?;
        booking.stay = Stay::new(booking.stay.check_in, new_check_out)?;
        tracing::debug!(check_out = %new_check_out, "booking extended");

        Ok(())
    }

    /// The total cost of a booking: nights multiplied by the room's
    /// nightly price. Deterministic for a given room and stay.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::CostOverflow`] if the multiplication
    /// overflows, or [`BookingError::UnknownBooking`] /
    /// [`RoomError::UnknownRoom`] for dangling references.
    pub fn total_cost(&self, id: BookingId) -> Result<Money<'static, Currency>, BookingError> {
        let booking = self
            .bookings
            .get(&id)
            .ok_or(BookingError::UnknownBooking(id))?;
        let room = self
            .rooms
            .room(booking.room)
            .ok_or(RoomError::UnknownRoom(booking.room))?;

        let price = room.price_per_night();
        let minor = price
            .to_minor_units()
            .checked_mul(booking.stay.nights())
            .ok_or(BookingError::CostOverflow)?;

        Ok(Money::from_minor(minor, price.currency()))
    }

    /// Move a booking to a different room, atomically.
    ///
    /// For a confirmed booking the new room is reserved before the old one
    /// is released, so a failed swap leaves the booking and both rooms
    /// exactly as they were.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::RoomUnavailable`] if the new room cannot be
    /// reserved, or [`BookingError::Terminal`] once the booking is
    /// cancelled or completed.
    #[tracing::instrument(skip(self), fields(booking = %id, room = %new_room))]
    pub fn assign_room(&mut self, id: BookingId, new_room: RoomNumber) -> Result<(), BookingError> {
        let booking = self
            .bookings
            .get_mut(&id)
            .ok_or(BookingError::UnknownBooking(id))?;

        if booking.room == new_room {
            return Ok(());
        }

        match booking.status {
            BookingStatus::Cancelled | BookingStatus::Completed => {
                return Err(BookingError::Terminal {
                    id,
                    status: booking.status,
                });
            }
            BookingStatus::Pending => {
                if !self.rooms.check_availability(new_room)? {
                    return Err(BookingError::RoomUnavailable(new_room));
                }
            }
            BookingStatus::Confirmed => {
                self.rooms.reserve(new_room).map_err(|err| match err {
                    RoomError::AlreadyOccupied(_) => BookingError::RoomUnavailable(new_room),
                    other => BookingError::Room(other),
                })?;
                self.rooms.release(booking.room)?;
            }
        }

        let old_room = booking.room;
        booking.room = new_room;
        tracing::debug!(%old_room, "booking reassigned");

        Ok(())
    }

    /// Append a special request to a booking.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::UnknownBooking`] if the id is unknown.
    pub fn add_special_request(
        &mut self,
        id: BookingId,
        request: impl Into<String>,
    ) -> Result<(), BookingError> {
        let booking = self
            .bookings
            .get_mut(&id)
            .ok_or(BookingError::UnknownBooking(id))?;

        booking.special_requests.push(request.into());

        Ok(())
    }

    /// Check a confirmed booking out, releasing its room.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::NotConfirmed`] unless the booking is
    /// confirmed.
    #[tracing::instrument(skip(self), fields(booking = %id))]
    pub fn complete(&mut self, id: BookingId) -> Result<(), BookingError> {
        let booking = self
            .bookings
            .get_mut(&id)
            .ok_or(BookingError::UnknownBooking(id))?;

        if booking.status != BookingStatus::Confirmed {
            return Err(BookingError::NotConfirmed {
                id,
                status: booking.status,
            });
        }

        self.rooms.release(booking.room)?;
        booking.status = BookingStatus::Completed;
        tracing::debug!(room = %booking.room, "booking completed");

        Ok(())
    }

    /// Open a pending payment for a booking's total cost.
    ///
    /// # Errors
    ///
    /// Propagates [`BookingError::CostOverflow`] from the cost calculation
    /// and any [`PaymentError`] from opening the charge.
    #[tracing::instrument(skip_all, fields(booking = %id))]
    pub fn charge(
        &mut self,
        payments: &mut PaymentProcessor,
        id: BookingId,
        method: impl Into<String>,
    ) -> Result<PaymentId, BookingError> {
        let cost = self.total_cost(id)?;
        let payment = payments.charge(id, cost, method)?;

        Ok(payment)
    }

    /// Settle a payment and accrue loyalty points to the booking's guest
    /// from the settled amount. Returns the points earned.
    ///
    /// # Errors
    ///
    /// Propagates [`PaymentError::AlreadyProcessed`] from settling and any
    /// ledger error from the accrual. A failed settlement accrues nothing.
    #[tracing::instrument(skip(self, payments), fields(payment = %payment))]
    pub fn settle(
        &mut self,
        payments: &mut PaymentProcessor,
        payment: PaymentId,
    ) -> Result<u64, BookingError> {
        payments.process(payment)?;

        let settled = payments
            .payment(payment)
            .ok_or(PaymentError::UnknownPayment(payment))?;
        let booking = self
            .bookings
            .get(&settled.booking())
            .ok_or(BookingError::UnknownBooking(settled.booking()))?;

        let earned = self.guests.earn_points(booking.guest, settled.amount())?;

        Ok(earned)
    }
}
