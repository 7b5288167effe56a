//! Innkeeper prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    bookings::{Booking, BookingEngine, BookingError, BookingId, BookingStatus, Stay},
    catalog::{Catalog, CatalogError},
    coupons::CouponBook,
    feedback::{
        Feedback, FeedbackError, FeedbackId, FeedbackStore, FeedbackTrends, InMemoryFeedbackStore,
    },
    guests::{Enrollment, Guest, GuestError, GuestId, GuestLedger},
    invoices::Invoice,
    notifications::{LogSink, NoopSink, NotificationSink},
    payments::{
        Payment, PaymentError, PaymentId, PaymentProcessor, PaymentStatus, SplitAllocation,
        verify_card,
    },
    rooms::{Room, RoomError, RoomNumber, RoomRegistry, RoomType},
};
