//! Coupons
//!
//! Coupon code lookup consulted by the payment processor.

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;

/// Coupon codes mapped to the percentage they take off a pending payment.
///
/// Percentages are whole percentage points (`10` for 10% off). Values
/// outside `[0, 100]` are accepted; bounding them is the caller's
/// responsibility, as with room discounts.
#[derive(Debug, Clone, Default)]
pub struct CouponBook {
    codes: FxHashMap<String, Decimal>,
}

impl CouponBook {
    /// Create an empty coupon book.
    pub fn new() -> Self {
        CouponBook::default()
    }

    /// The standard promotional book: `DISCOUNT10` for 10% off.
    pub fn standard() -> Self {
        let mut book = CouponBook::new();
        book.insert("DISCOUNT10", Decimal::TEN);

        book
    }

    /// Add or replace a coupon code.
    pub fn insert(&mut self, code: impl Into<String>, percent_off: Decimal) {
        self.codes.insert(code.into(), percent_off);
    }

    /// The percentage taken off by a code, if the code is known.
    pub fn percent_off(&self, code: &str) -> Option<Decimal> {
        self.codes.get(code).copied()
    }

    /// Whether the book knows a code.
    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains_key(code)
    }

    /// Number of codes in the book.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether the book has no codes.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_book_knows_discount10() {
        let book = CouponBook::standard();

        assert_eq!(book.percent_off("DISCOUNT10"), Some(Decimal::TEN));
        assert!(!book.contains("DISCOUNT99"));
    }

    #[test]
    fn insert_replaces_existing_codes() {
        let mut book = CouponBook::new();

        book.insert("SUMMER", Decimal::from(15));
        book.insert("SUMMER", Decimal::from(20));

        assert_eq!(book.len(), 1);
        assert_eq!(book.percent_off("SUMMER"), Some(Decimal::from(20)));
    }
}
