//! Notifications
//!
//! Outbound event seam for booking and payment lifecycle changes.
//!
//! Delivery is a collaborator concern: the engine and the payment
//! processor fire these callbacks and move on, so sinks must not fail and
//! must not block. The default [`NoopSink`] discards everything; when no
//! sink is installed the calls cost nothing beyond a virtual dispatch.

use mockall::automock;

use crate::{bookings::Booking, payments::Payment};

/// Observer for booking and payment lifecycle events.
///
/// Every method has a no-op default, so a sink only implements the events
/// it cares about.
#[automock]
pub trait NotificationSink {
    /// Called when a booking moves to confirmed.
    fn booking_confirmed(&mut self, _booking: &Booking) {}

    /// Called when a booking is cancelled.
    fn booking_cancelled(&mut self, _booking: &Booking) {}

    /// Called when a payment settles, with the settled payment as receipt.
    fn payment_receipt(&mut self, _payment: &Payment) {}
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl NotificationSink for NoopSink {}

/// Sink that emits each event as a tracing `info!` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn booking_confirmed(&mut self, booking: &Booking) {
        tracing::info!(
            booking = %booking.id(),
            guest = %booking.guest(),
            room = %booking.room(),
            "booking confirmed"
        );
    }

    fn booking_cancelled(&mut self, booking: &Booking) {
        tracing::info!(
            booking = %booking.id(),
            guest = %booking.guest(),
            room = %booking.room(),
            "booking cancelled"
        );
    }

    fn payment_receipt(&mut self, payment: &Payment) {
        tracing::info!(
            payment = %payment.id(),
            booking = %payment.booking(),
            amount = %payment.amount(),
            "payment receipt issued"
        );
    }
}
