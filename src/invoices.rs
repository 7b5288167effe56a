//! Invoices
//!
//! Printable invoices for payments.

use std::fmt;

use tabled::{Table, Tabled};

use crate::payments::Payment;

/// A single labelled line of a rendered invoice.
#[derive(Debug, Tabled)]
struct InvoiceLine {
    #[tabled(rename = "Item")]
    item: &'static str,

    #[tabled(rename = "Value")]
    value: String,
}

/// A printable snapshot of a payment.
///
/// Captured at creation; later changes to the payment are not reflected.
#[derive(Debug, Clone)]
pub struct Invoice {
    payment: String,
    booking: String,
    amount: String,
    methods: String,
    status: String,
}

impl Invoice {
    /// Snapshot a payment into an invoice.
    pub fn for_payment(payment: &Payment) -> Self {
        Invoice {
            payment: payment.id().to_string(),
            booking: payment.booking().to_string(),
            amount: payment.amount().to_string(),
            methods: payment.methods().join(", "),
            status: payment.status().to_string(),
        }
    }
}

impl fmt::Display for Invoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines = [
            InvoiceLine {
                item: "Payment",
                value: self.payment.clone(),
            },
            InvoiceLine {
                item: "Booking",
                value: self.booking.clone(),
            },
            InvoiceLine {
                item: "Amount",
                value: self.amount.clone(),
            },
            InvoiceLine {
                item: "Methods",
                value: self.methods.clone(),
            },
            InvoiceLine {
                item: "Status",
                value: self.status.clone(),
            },
        ];

        write!(f, "{}", Table::new(lines))
    }
}
