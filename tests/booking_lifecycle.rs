//! End-to-end booking lifecycle: a property built from a catalog, a
//! booking carried from creation through confirmation, settlement, refund
//! and cancellation, with room availability tracked at every step.

use jiff::civil::date;
use mockall::Sequence;
use rusty_money::{Money, iso};
use testresult::TestResult;

use innkeeper::notifications::MockNotificationSink;
use innkeeper::prelude::*;

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

fn property_engine() -> TestResult<BookingEngine> {
    let (rooms, _) = Catalog::parse(PROPERTY)?.build()?;

    let mut guests = GuestLedger::new();
    guests.register(Guest::new(GuestId(301), "Avery Hale", "avery@example.com"))?;

    Ok(BookingEngine::new(rooms, guests))
}

#[test]
fn booking_travels_the_full_lifecycle() -> TestResult {
    let mut engine = property_engine()?;
    let mut payments = PaymentProcessor::new();

    // Guest 301 books room 101 at $150.00 per night for four nights.
    let booking = engine.create(
        GuestId(301),
        RoomNumber(101),
        date(2025, 7, 1),
        date(2025, 7, 5),
    )?;

    engine.confirm(booking)?;
    assert!(!engine.rooms().check_availability(RoomNumber(101))?);

    let cost = engine.total_cost(booking)?;
    assert_eq!(cost, Money::from_minor(60_000, iso::USD));

    let payment = engine.charge(&mut payments, booking, "Card")?;
    engine.settle(&mut payments, payment)?;
    assert_eq!(
        payments.payment(payment).map(Payment::status),
        Some(PaymentStatus::Completed)
    );

    payments.refund(payment)?;
    assert_eq!(
        payments.payment(payment).map(Payment::status),
        Some(PaymentStatus::Refunded)
    );

    engine.cancel(booking)?;
    assert!(engine.rooms().check_availability(RoomNumber(101))?);
    assert_eq!(
        engine.booking(booking).map(Booking::status),
        Some(BookingStatus::Cancelled)
    );

    Ok(())
}

#[test]
fn a_confirmed_room_cannot_be_double_booked() -> TestResult {
    let mut engine = property_engine()?;
    engine
        .guests_mut()
        .register(Guest::new(GuestId(302), "Blair Quinn", "blair@example.com"))?;

    let first = engine.create(
        GuestId(301),
        RoomNumber(101),
        date(2025, 7, 1),
        date(2025, 7, 5),
    )?;
    let second = engine.create(
        GuestId(302),
        RoomNumber(101),
        date(2025, 7, 2),
        date(2025, 7, 6),
    )?;

    engine.confirm(first)?;
    let result = engine.confirm(second);

    assert!(
        matches!(
            result,
            Err(BookingError::Room(RoomError::AlreadyOccupied(room))) if room == RoomNumber(101)
        ),
        "expected AlreadyOccupied, got {result:?}"
    );

    // The loser backs off; the winner's hold is untouched.
    engine.cancel(second)?;
    assert!(!engine.rooms().check_availability(RoomNumber(101))?);

    Ok(())
}

#[test]
fn a_failed_settlement_composes_with_cancellation_as_compensation() -> TestResult {
    let mut engine = property_engine()?;
    let mut payments = PaymentProcessor::new();

    let booking = engine.create(
        GuestId(301),
        RoomNumber(101),
        date(2025, 7, 1),
        date(2025, 7, 5),
    )?;
    engine.confirm(booking)?;

    let payment = engine.charge(&mut payments, booking, "Card")?;
    payments.record_failed(payment)?;

    // Settling a failed payment accrues nothing.
    let result = engine.settle(&mut payments, payment);
    assert!(matches!(
        result,
        Err(BookingError::Payment(PaymentError::AlreadyProcessed(_)))
    ));
    assert_eq!(
        engine.guests().guest(GuestId(301)).map(Guest::loyalty_points),
        Some(0)
    );

    // The caller compensates by cancelling, which releases the room.
    engine.cancel(booking)?;
    assert!(engine.rooms().check_availability(RoomNumber(101))?);

    Ok(())
}

#[test]
fn lifecycle_events_reach_the_notification_sink_in_order() -> TestResult {
    let (rooms, _) = Catalog::parse(PROPERTY)?.build()?;
    let mut guests = GuestLedger::new();
    guests.register(Guest::new(GuestId(301), "Avery Hale", "avery@example.com"))?;

    let mut sink = MockNotificationSink::new();
    let mut order = Sequence::new();
    sink.expect_booking_confirmed()
        .times(1)
        .in_sequence(&mut order)
        .returning(|_| ());
    sink.expect_booking_cancelled()
        .times(1)
        .in_sequence(&mut order)
        .returning(|_| ());

    let mut engine = BookingEngine::new(rooms, guests).with_sink(Box::new(sink));

    let booking = engine.create(
        GuestId(301),
        RoomNumber(101),
        date(2025, 7, 1),
        date(2025, 7, 5),
    )?;
    engine.confirm(booking)?;
    engine.cancel(booking)?;

    Ok(())
}

#[test]
fn settlement_issues_a_receipt_through_the_processor_sink() -> TestResult {
    let mut engine = property_engine()?;

    let mut sink = MockNotificationSink::new();
    sink.expect_payment_receipt()
        .times(1)
        .withf(|payment| payment.amount() == Money::from_minor(60_000, iso::USD))
        .returning(|_| ());

    let mut payments = PaymentProcessor::new().with_sink(Box::new(sink));

    let booking = engine.create(
        GuestId(301),
        RoomNumber(101),
        date(2025, 7, 1),
        date(2025, 7, 5),
    )?;
    engine.confirm(booking)?;

    let payment = engine.charge(&mut payments, booking, "Card")?;
    engine.settle(&mut payments, payment)?;

    Ok(())
}
