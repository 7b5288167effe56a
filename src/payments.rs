//! Payments
//!
//! Charge computation and settlement: VAT, coupons, split tenders and the
//! pending → completed → refunded state machine.

use std::fmt;

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use rusty_money::{Money, MoneyError, iso::Currency};
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};
use thiserror::Error;

use crate::{
    bookings::BookingId,
    coupons::CouponBook,
    money::percent_of_minor,
    notifications::{NoopSink, NotificationSink},
};

/// Errors related to charging and settling payments.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Referenced a payment id the processor does not know.
    #[error("payment {0} is unknown")]
    UnknownPayment(PaymentId),

    /// Processed or failed a payment that already left the pending state.
    #[error("payment {0} has already been processed")]
    AlreadyProcessed(PaymentId),

    /// Refunded a payment that was never completed.
    #[error("payment {0} is not refundable")]
    NotRefundable(PaymentId),

    /// Adjusted a payment that already left the pending state.
    #[error("payment {0} is settled and can no longer be adjusted")]
    NotAdjustable(PaymentId),

    /// Split allocations do not sum to the payment amount.
    #[error("split allocations total {allocated}, but the payment amount is {expected}")]
    SplitMismatch {
        /// The payment amount the allocations must add up to.
        expected: Decimal,
        /// What the allocations actually sum to.
        allocated: Decimal,
    },

    /// The coupon code is not in the coupon book.
    #[error("coupon code {0:?} is not recognised")]
    InvalidCoupon(String),

    /// A charge or adjustment would leave a non-positive amount.
    #[error("payment amount {0} must be positive")]
    InvalidAmount(Decimal),

    /// A percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Payment id, allocated sequentially by the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(pub u64);

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Settlement state of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Charged but not yet settled; the only state open to adjustment.
    Pending,

    /// Settled successfully.
    Completed,

    /// Settled, then returned in full.
    Refunded,

    /// The settlement attempt failed. Terminal.
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
        };

        f.write_str(label)
    }
}

/// One share of a split payment.
#[derive(Debug, Clone)]
pub struct SplitAllocation {
    /// Payment method covering this share.
    pub method: String,

    /// Amount charged to the method.
    pub amount: Money<'static, Currency>,
}

/// A charge raised against a booking.
#[derive(Debug, Clone)]
pub struct Payment {
    id: PaymentId,
    booking: BookingId,
    amount: Money<'static, Currency>,
    methods: SmallVec<[String; 2]>,
    status: PaymentStatus,
}

impl Payment {
    /// The payment id.
    pub fn id(&self) -> PaymentId {
        self.id
    }

    /// The booking this payment charges.
    pub fn booking(&self) -> BookingId {
        self.booking
    }

    /// The current amount, including any adjustments.
    pub fn amount(&self) -> Money<'static, Currency> {
        self.amount
    }

    /// The payment methods; more than one after a split.
    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    /// The settlement state.
    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    /// Whether the payment details are usable: a positive amount and at
    /// least one method.
    pub fn validate(&self) -> bool {
        *self.amount.amount() > Decimal::ZERO && !self.methods.is_empty()
    }
}

/// Check that a card number is exactly sixteen ASCII digits.
///
/// A format check only; no checksum or issuer validation.
pub fn verify_card(card_number: &str) -> bool {
    card_number.len() == 16 && card_number.bytes().all(|byte| byte.is_ascii_digit())
}

/// Processor holding all payments, the coupon book and the receipt sink.
pub struct PaymentProcessor {
    payments: FxHashMap<PaymentId, Payment>,
    next_payment: u64,
    coupons: CouponBook,
    sink: Box<dyn NotificationSink>,
}

impl fmt::Debug for PaymentProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentProcessor")
            .field("payments", &self.payments)
            .field("next_payment", &self.next_payment)
            .field("coupons", &self.coupons)
            .finish_non_exhaustive()
    }
}

impl Default for PaymentProcessor {
    fn default() -> Self {
        PaymentProcessor::new()
    }
}

impl PaymentProcessor {
    /// Create a processor with the standard coupon book and no receipt sink.
    pub fn new() -> Self {
        PaymentProcessor {
            payments: FxHashMap::default(),
            next_payment: 1,
            coupons: CouponBook::standard(),
            sink: Box::new(NoopSink),
        }
    }

    /// Replace the coupon book, consuming and returning the processor.
    #[must_use]
    pub fn with_coupons(mut self, coupons: CouponBook) -> Self {
        self.coupons = coupons;
        self
    }

    /// Replace the receipt sink, consuming and returning the processor.
    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Look up a payment by id.
    pub fn payment(&self, id: PaymentId) -> Option<&Payment> {
        self.payments.get(&id)
    }

    /// Iterate over all payments, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Payment> {
        self.payments.values()
    }

    /// Open a pending payment against a booking.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::InvalidAmount`] if the amount is not
    /// strictly positive.
    #[tracing::instrument(skip_all, fields(booking = %booking, amount = %amount))]
    pub fn charge(
        &mut self,
        booking: BookingId,
        amount: Money<'static, Currency>,
        method: impl Into<String>,
    ) -> Result<PaymentId, PaymentError> {
        if *amount.amount() <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount(*amount.amount()));
        }

        let id = PaymentId(self.next_payment);
        self.next_payment += 1;

        self.payments.insert(
            id,
            Payment {
                id,
                booking,
                amount,
                methods: smallvec![method.into()],
                status: PaymentStatus::Pending,
            },
        );
        tracing::debug!(payment = %id, "payment opened");

        Ok(id)
    }

    /// Settle a pending payment and issue the receipt.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::AlreadyProcessed`] unless the payment is
    /// pending, or [`PaymentError::UnknownPayment`] if the id is unknown.
    #[tracing::instrument(skip_all, fields(payment = %id))]
    pub fn process(&mut self, id: PaymentId) -> Result<(), PaymentError> {
        let payment = self
            .payments
            .get_mut(&id)
            .ok_or(PaymentError::UnknownPayment(id))?;

        if payment.status != PaymentStatus::Pending {
            return Err(PaymentError::AlreadyProcessed(id));
        }

        payment.status = PaymentStatus::Completed;
        tracing::debug!(amount = %payment.amount, "payment completed");
        self.sink.payment_receipt(payment);

        Ok(())
    }

    /// Refund a completed payment in full.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::NotRefundable`] unless the payment is
    /// completed, or [`PaymentError::UnknownPayment`] if the id is unknown.
    #[tracing::instrument(skip_all, fields(payment = %id))]
    pub fn refund(&mut self, id: PaymentId) -> Result<(), PaymentError> {
        let payment = self
            .payments
            .get_mut(&id)
            .ok_or(PaymentError::UnknownPayment(id))?;

        if payment.status != PaymentStatus::Completed {
            return Err(PaymentError::NotRefundable(id));
        }

        payment.status = PaymentStatus::Refunded;
        tracing::debug!(amount = %payment.amount, "payment refunded");

        Ok(())
    }

    /// Record that settling a pending payment failed.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::AlreadyProcessed`] unless the payment is
    /// pending, or [`PaymentError::UnknownPayment`] if the id is unknown.
    #[tracing::instrument(skip_all, fields(payment = %id))]
    pub fn record_failed(&mut self, id: PaymentId) -> Result<(), PaymentError> {
        let payment = self
            .payments
            .get_mut(&id)
            .ok_or(PaymentError::UnknownPayment(id))?;

        if payment.status != PaymentStatus::Pending {
            return Err(PaymentError::AlreadyProcessed(id));
        }

        payment.status = PaymentStatus::Failed;
        tracing::debug!(amount = %payment.amount, "payment failed");

        Ok(())
    }

    /// Add VAT to a pending payment: `amount += amount * vat_pct / 100`.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::NotAdjustable`] unless the payment is
    /// pending, [`PaymentError::InvalidAmount`] if the adjusted amount
    /// would not be positive (the amount is left unchanged), or
    /// [`PaymentError::PercentConversion`] on arithmetic overflow.
    #[tracing::instrument(skip_all, fields(payment = %id, vat = %vat_pct))]
    pub fn apply_vat(&mut self, id: PaymentId, vat_pct: Decimal) -> Result<(), PaymentError> {
        let payment = pending_mut(&mut self.payments, id)?;

        let minor = payment.amount.to_minor_units();
        let vat = percent_of_minor(vat_pct, minor).ok_or(PaymentError::PercentConversion)?;
        let adjusted = minor
            .checked_add(vat)
            .ok_or(PaymentError::PercentConversion)?;

        set_amount(payment, adjusted)
    }

    /// Apply a coupon from the coupon book to a pending payment, reducing
    /// the amount by the coupon's percentage.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::NotAdjustable`] unless the payment is
    /// pending, [`PaymentError::InvalidCoupon`] if the code is unknown,
    /// [`PaymentError::InvalidAmount`] if the adjusted amount would not be
    /// positive, or [`PaymentError::PercentConversion`] on overflow.
    #[tracing::instrument(skip_all, fields(payment = %id, code))]
    pub fn apply_coupon(&mut self, id: PaymentId, code: &str) -> Result<(), PaymentError> {
        let percent_off = self.coupons.percent_off(code);
        let payment = pending_mut(&mut self.payments, id)?;

        let percent_off = percent_off.ok_or_else(|| PaymentError::InvalidCoupon(code.to_owned()))?;

        let minor = payment.amount.to_minor_units();
        let discount = percent_of_minor(percent_off, minor).ok_or(PaymentError::PercentConversion)?;
        let adjusted = minor
            .checked_sub(discount)
            .ok_or(PaymentError::PercentConversion)?;

        set_amount(payment, adjusted)
    }

    /// Split a pending payment across several methods.
    ///
    /// The allocations must sum exactly to the payment amount; on success
    /// they replace the payment's method list.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::NotAdjustable`] unless the payment is
    /// pending, [`PaymentError::SplitMismatch`] if the allocations do not
    /// add up, or [`PaymentError::Money`] if they mix currencies.
    #[tracing::instrument(skip_all, fields(payment = %id, shares = allocations.len()))]
    pub fn split(
        &mut self,
        id: PaymentId,
        allocations: Vec<SplitAllocation>,
    ) -> Result<(), PaymentError> {
        let payment = pending_mut(&mut self.payments, id)?;

        let mut total = Money::from_minor(0, payment.amount.currency());
        for allocation in &allocations {
            total = total.add(allocation.amount)?;
        }

        if total != payment.amount {
            return Err(PaymentError::SplitMismatch {
                expected: *payment.amount.amount(),
                allocated: *total.amount(),
            });
        }

        payment.methods = allocations
            .into_iter()
            .map(|allocation| allocation.method)
            .collect();

        Ok(())
    }
}

/// Fetch a payment that is still open to adjustment.
fn pending_mut(
    payments: &mut FxHashMap<PaymentId, Payment>,
    id: PaymentId,
) -> Result<&mut Payment, PaymentError> {
    let payment = payments.get_mut(&id).ok_or(PaymentError::UnknownPayment(id))?;

    if payment.status != PaymentStatus::Pending {
        return Err(PaymentError::NotAdjustable(id));
    }

    Ok(payment)
}

/// Store an adjusted minor unit amount, rejecting non-positive results.
fn set_amount(payment: &mut Payment, minor: i64) -> Result<(), PaymentError> {
    let adjusted = Money::from_minor(minor, payment.amount.currency());

    if *adjusted.amount() <= Decimal::ZERO {
        return Err(PaymentError::InvalidAmount(*adjusted.amount()));
    }

    payment.amount = adjusted;

    Ok(())
}

#[cfg(test)]
mod tests {
    use rusty_money::iso;
    use testresult::TestResult;

    use super::*;

    fn usd(minor: i64) -> Money<'static, Currency> {
        Money::from_minor(minor, iso::USD)
    }

    fn open_payment(processor: &mut PaymentProcessor, minor: i64) -> Result<PaymentId, PaymentError> {
        processor.charge(BookingId(1), usd(minor), "Card")
    }

    #[test]
    fn charge_rejects_non_positive_amounts() {
        let mut processor = PaymentProcessor::new();

        let zero = processor.charge(BookingId(1), usd(0), "Card");
        let negative = processor.charge(BookingId(1), usd(-500), "Card");

        assert!(matches!(zero, Err(PaymentError::InvalidAmount(_))));
        assert!(matches!(negative, Err(PaymentError::InvalidAmount(_))));
    }

    #[test]
    fn process_completes_a_pending_payment() -> TestResult {
        let mut processor = PaymentProcessor::new();
        let id = open_payment(&mut processor, 60_000)?;

        processor.process(id)?;

        assert_eq!(
            processor.payment(id).map(Payment::status),
            Some(PaymentStatus::Completed)
        );

        Ok(())
    }

    #[test]
    fn process_twice_fails_with_already_processed() -> TestResult {
        let mut processor = PaymentProcessor::new();
        let id = open_payment(&mut processor, 60_000)?;

        processor.process(id)?;
        let result = processor.process(id);

        assert!(
            matches!(result, Err(PaymentError::AlreadyProcessed(found)) if found == id),
            "expected AlreadyProcessed, got {result:?}"
        );

        Ok(())
    }

    #[test]
    fn process_after_refund_fails_with_already_processed() -> TestResult {
        let mut processor = PaymentProcessor::new();
        let id = open_payment(&mut processor, 60_000)?;

        processor.process(id)?;
        processor.refund(id)?;
        let result = processor.process(id);

        assert!(matches!(result, Err(PaymentError::AlreadyProcessed(_))));

        Ok(())
    }

    #[test]
    fn refund_requires_a_completed_payment() -> TestResult {
        let mut processor = PaymentProcessor::new();
        let id = open_payment(&mut processor, 60_000)?;

        let result = processor.refund(id);

        assert!(matches!(result, Err(PaymentError::NotRefundable(found)) if found == id));

        Ok(())
    }

    #[test]
    fn record_failed_closes_a_pending_payment() -> TestResult {
        let mut processor = PaymentProcessor::new();
        let id = open_payment(&mut processor, 60_000)?;

        processor.record_failed(id)?;

        assert_eq!(
            processor.payment(id).map(Payment::status),
            Some(PaymentStatus::Failed)
        );
        assert!(matches!(
            processor.process(id),
            Err(PaymentError::AlreadyProcessed(_))
        ));

        Ok(())
    }

    #[test]
    fn vat_increases_the_amount_exactly() -> TestResult {
        let mut processor = PaymentProcessor::new();
        let id = open_payment(&mut processor, 65_000)?;

        // 10% VAT on $650.00 is $715.00 exactly.
        processor.apply_vat(id, Decimal::TEN)?;

        assert_eq!(processor.payment(id).map(Payment::amount), Some(usd(71_500)));

        Ok(())
    }

    #[test]
    fn vat_after_processing_fails_with_not_adjustable() -> TestResult {
        let mut processor = PaymentProcessor::new();
        let id = open_payment(&mut processor, 65_000)?;

        processor.process(id)?;
        let result = processor.apply_vat(id, Decimal::TEN);

        assert!(
            matches!(result, Err(PaymentError::NotAdjustable(found)) if found == id),
            "expected NotAdjustable, got {result:?}"
        );
        assert_eq!(processor.payment(id).map(Payment::amount), Some(usd(65_000)));

        Ok(())
    }

    #[test]
    fn coupon_takes_its_percentage_off() -> TestResult {
        let mut processor = PaymentProcessor::new();
        let id = open_payment(&mut processor, 65_000)?;

        processor.apply_coupon(id, "DISCOUNT10")?;

        assert_eq!(processor.payment(id).map(Payment::amount), Some(usd(58_500)));

        Ok(())
    }

    #[test]
    fn unknown_coupon_fails_and_leaves_the_amount() -> TestResult {
        let mut processor = PaymentProcessor::new();
        let id = open_payment(&mut processor, 65_000)?;

        let result = processor.apply_coupon(id, "DISCOUNT99");

        assert!(matches!(
            result,
            Err(PaymentError::InvalidCoupon(code)) if code == "DISCOUNT99"
        ));
        assert_eq!(processor.payment(id).map(Payment::amount), Some(usd(65_000)));

        Ok(())
    }

    #[test]
    fn split_requires_the_allocations_to_add_up() -> TestResult {
        let mut processor = PaymentProcessor::new();
        let id = open_payment(&mut processor, 65_000)?;

        let result = processor.split(
            id,
            vec![
                SplitAllocation {
                    method: "Cash".to_owned(),
                    amount: usd(30_000),
                },
                SplitAllocation {
                    method: "Card".to_owned(),
                    amount: usd(30_000),
                },
            ],
        );

        assert!(
            matches!(result, Err(PaymentError::SplitMismatch { .. })),
            "expected SplitMismatch, got {result:?}"
        );

        Ok(())
    }

    #[test]
    fn split_replaces_the_method_list() -> TestResult {
        let mut processor = PaymentProcessor::new();
        let id = open_payment(&mut processor, 65_000)?;

        processor.split(
            id,
            vec![
                SplitAllocation {
                    method: "Cash".to_owned(),
                    amount: usd(30_000),
                },
                SplitAllocation {
                    method: "Card".to_owned(),
                    amount: usd(35_000),
                },
            ],
        )?;

        let methods: Vec<&str> = processor
            .payment(id)
            .map(Payment::methods)
            .unwrap_or_default()
            .iter()
            .map(String::as_str)
            .collect();

        assert_eq!(methods, ["Cash", "Card"]);

        Ok(())
    }

    #[test]
    fn split_with_no_allocations_is_a_mismatch() -> TestResult {
        let mut processor = PaymentProcessor::new();
        let id = open_payment(&mut processor, 65_000)?;

        let result = processor.split(id, Vec::new());

        assert!(matches!(result, Err(PaymentError::SplitMismatch { .. })));

        Ok(())
    }

    #[test]
    fn split_after_processing_fails_with_not_adjustable() -> TestResult {
        let mut processor = PaymentProcessor::new();
        let id = open_payment(&mut processor, 65_000)?;

        processor.process(id)?;
        let result = processor.split(
            id,
            vec![SplitAllocation {
                method: "Cash".to_owned(),
                amount: usd(65_000),
            }],
        );

        assert!(matches!(result, Err(PaymentError::NotAdjustable(_))));

        Ok(())
    }

    #[test]
    fn validate_requires_amount_and_method() -> TestResult {
        let mut processor = PaymentProcessor::new();
        let id = open_payment(&mut processor, 65_000)?;

        let valid = processor.payment(id).map(Payment::validate);

        assert_eq!(valid, Some(true));

        Ok(())
    }

    #[test]
    fn verify_card_checks_length_and_digits() {
        assert!(verify_card("4242424242424242"));
        assert!(!verify_card("424242424242424"));
        assert!(!verify_card("42424242424242424"));
        assert!(!verify_card("4242-4242-4242-42"));
        assert!(!verify_card("424242424242424a"));
    }

    #[test]
    fn vat_that_wipes_out_the_amount_is_rejected() -> TestResult {
        let mut processor = PaymentProcessor::new();
        let id = open_payment(&mut processor, 65_000)?;

        let result = processor.apply_vat(id, Decimal::from(-100));

        assert!(
            matches!(result, Err(PaymentError::InvalidAmount(_))),
            "expected InvalidAmount, got {result:?}"
        );
        assert_eq!(processor.payment(id).map(Payment::amount), Some(usd(65_000)));

        Ok(())
    }
}
