//! Billing cart: the editable bill built from a pending order or a walk-in
//! sale, plus totals and the printable invoice.
//!
//! DESIGN
//! ======
//! The cart is plain data owned by the pharmacy screen and posted back with
//! every edit. Edits check against the stock figures passed in by the caller;
//! the authoritative stock check happens again inside the completing
//! transaction, so a stale cart can never oversell.

use std::fmt::Write;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ClinicInfo;
use crate::frame::ErrorCode;
use crate::money::format_cents;
use crate::services::dosage::{self, Dosage, DosageChange};
use crate::services::inventory::Medicine;
use crate::services::orders::{OrderItem, PaymentMethod, PharmacyOrder};

/// Quantity of a freshly added line: morning + night for two days.
pub const DEFAULT_LINE_QTY: i32 = 4;
const DEFAULT_LINE_DAYS: f64 = 2.0;

pub const WALK_IN_CUSTOMER: &str = "Walk-in Customer";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CartError {
    #[error("out of stock: {name}")]
    OutOfStock { name: String },
    #[error("{name} is already in the cart; adjust quantity or dosage instead")]
    AlreadyInCart { name: String },
    #[error("not enough stock for default dosage (available {available})")]
    BelowDefaultDose { available: i32 },
    #[error("maximum stock reached (available {available})")]
    ExceedsStock { available: i32 },
    #[error("medicine not in cart: {0}")]
    NotInCart(Uuid),
    #[error("unknown medicine: {0}")]
    UnknownMedicine(Uuid),
    #[error("doctor charge cannot be negative")]
    NegativeCharge,
    #[error("invalid price for {name}")]
    InvalidPrice { name: String },
    #[error("bill total is out of range")]
    TotalOverflow,
    #[error("bill is empty")]
    EmptyBill,
}

impl ErrorCode for CartError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::OutOfStock { .. } | Self::BelowDefaultDose { .. } | Self::ExceedsStock { .. } => {
                "E_INSUFFICIENT_STOCK"
            }
            Self::AlreadyInCart { .. } => "E_DUPLICATE",
            Self::NotInCart(_) | Self::UnknownMedicine(_) => "E_NOT_FOUND",
            Self::NegativeCharge | Self::InvalidPrice { .. } | Self::TotalOverflow => "E_INVALID_INPUT",
            Self::EmptyBill => "E_EMPTY_BILL",
        }
    }
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub medicine_id: Uuid,
    pub name: String,
    pub price_cents: i64,
    pub qty: i32,
    #[serde(default)]
    pub dosage: Dosage,
    pub days: f64,
    pub dose_amount: f64,
}

impl CartLine {
    /// `None` when the amount does not fit in an `i64`.
    #[must_use]
    pub fn amount_cents(&self) -> Option<i64> {
        self.price_cents.checked_mul(i64::from(self.qty))
    }

    #[must_use]
    pub fn instructions(&self) -> String {
        self.dosage.instructions(self.dose_amount, self.days)
    }

    #[must_use]
    pub fn to_order_item(&self) -> OrderItem {
        OrderItem {
            medicine_id: self.medicine_id,
            name: self.name.clone(),
            price_cents: self.price_cents,
            qty: self.qty,
            dosage: Some(self.dosage),
            days: Some(self.days),
            dose_amount: Some(self.dose_amount),
        }
    }
}

/// The bill being edited. `order_id` is `None` for walk-in sales.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    #[serde(default)]
    pub order_id: Option<Uuid>,
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub lines: Vec<CartLine>,
    #[serde(default)]
    pub doctor_charge_cents: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub medicine_total_cents: i64,
    pub doctor_charge_cents: i64,
    pub total_cents: i64,
    /// Change to hand back. Only for cash payments with an amount tendered.
    pub balance_cents: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(default)]
    pub method: PaymentMethod,
    #[serde(default)]
    pub cash_given_cents: Option<i64>,
    #[serde(default)]
    pub reference_number: Option<String>,
}

impl Payment {
    /// Reference numbers are kept for card and transfer payments only.
    #[must_use]
    pub fn stored_reference(&self) -> Option<&str> {
        match self.method {
            PaymentMethod::Cash => None,
            PaymentMethod::Card | PaymentMethod::Transfer => self
                .reference_number
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty()),
        }
    }
}

// =============================================================================
// EDITING
// =============================================================================

impl Cart {
    /// Load a pending order, filling dosage defaults for bare items.
    #[must_use]
    pub fn from_order(order: &PharmacyOrder) -> Self {
        let lines = order
            .items
            .iter()
            .map(|item| CartLine {
                medicine_id: item.medicine_id,
                name: item.name.clone(),
                price_cents: item.price_cents,
                qty: item.qty,
                dosage: item.dosage.unwrap_or_default(),
                days: item.days.filter(|d| *d > 0.0).unwrap_or(1.0),
                dose_amount: item.dose_amount.filter(|d| *d > 0.0).unwrap_or(1.0),
            })
            .collect();
        Self {
            order_id: Some(order.id),
            patient_name: Some(order.patient_name.clone()),
            lines,
            doctor_charge_cents: order.doctor_charge_cents,
        }
    }

    #[must_use]
    pub fn is_empty_bill(&self) -> bool {
        self.lines.is_empty() && self.doctor_charge_cents == 0
    }

    #[must_use]
    pub fn patient_label(&self) -> &str {
        self.patient_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(WALK_IN_CUSTOMER)
    }

    fn line_mut(&mut self, medicine_id: Uuid) -> Result<&mut CartLine, CartError> {
        self.lines
            .iter_mut()
            .find(|l| l.medicine_id == medicine_id)
            .ok_or(CartError::NotInCart(medicine_id))
    }

    /// Add a medicine with the default twice-daily, two-day dosage.
    ///
    /// # Errors
    ///
    /// Rejects out-of-stock medicines, duplicates, and stock below the
    /// default quantity.
    pub fn add_item(&mut self, medicine: &Medicine) -> Result<(), CartError> {
        if medicine.quantity <= 0 {
            return Err(CartError::OutOfStock { name: medicine.name.clone() });
        }
        if self.lines.iter().any(|l| l.medicine_id == medicine.id) {
            return Err(CartError::AlreadyInCart { name: medicine.name.clone() });
        }
        if medicine.quantity < DEFAULT_LINE_QTY {
            return Err(CartError::BelowDefaultDose { available: medicine.quantity });
        }
        self.lines.push(CartLine {
            medicine_id: medicine.id,
            name: medicine.name.clone(),
            price_cents: medicine.price_cents,
            qty: DEFAULT_LINE_QTY,
            dosage: Dosage::twice_daily(),
            days: DEFAULT_LINE_DAYS,
            dose_amount: 1.0,
        });
        Ok(())
    }

    /// Step a line's quantity. Dropping below one is ignored.
    ///
    /// # Errors
    ///
    /// `ExceedsStock` when the new quantity is above `stock`.
    pub fn adjust_qty(&mut self, medicine_id: Uuid, delta: i32, stock: Option<i32>) -> Result<(), CartError> {
        let line = self.line_mut(medicine_id)?;
        let new_qty = line.qty.saturating_add(delta);
        if new_qty < 1 {
            return Ok(());
        }
        if let Some(available) = stock {
            if new_qty > available {
                return Err(CartError::ExceedsStock { available });
            }
        }
        line.qty = new_qty;
        Ok(())
    }

    /// Apply a dosage edit and recompute the quantity when every factor is
    /// positive. The quantity is clamped to `stock`; a clamp is reported as
    /// a warning rather than an error.
    ///
    /// # Errors
    ///
    /// `NotInCart` when the line does not exist.
    pub fn update_dosage(
        &mut self,
        medicine_id: Uuid,
        change: &DosageChange,
        stock: Option<i32>,
    ) -> Result<Option<String>, CartError> {
        let line = self.line_mut(medicine_id)?;
        change.apply(&mut line.dosage, &mut line.dose_amount, &mut line.days);

        let mut qty = dosage::compute_quantity(&line.dosage, line.dose_amount, line.days).unwrap_or(line.qty);
        let mut warning = None;
        if let Some(available) = stock {
            if qty > available {
                warning = Some(format!("Not enough stock! Max: {available}"));
                qty = available;
            }
        }
        line.qty = qty;
        Ok(warning)
    }

    /// # Errors
    ///
    /// `NotInCart` when the line does not exist.
    pub fn remove(&mut self, medicine_id: Uuid) -> Result<(), CartError> {
        let before = self.lines.len();
        self.lines.retain(|l| l.medicine_id != medicine_id);
        if self.lines.len() == before {
            return Err(CartError::NotInCart(medicine_id));
        }
        Ok(())
    }

    /// Reset to an empty walk-in bill.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Apply one edit from the billing screen. `medicine` is the current
    /// inventory row for the op's medicine, if it still exists; its quantity
    /// is the stock the edit is checked against.
    ///
    /// # Errors
    ///
    /// Whatever the individual edit rejects, plus `UnknownMedicine` when an
    /// add names a medicine that is gone.
    pub fn apply(&mut self, op: &CartOp, medicine: Option<&Medicine>) -> Result<Option<String>, CartError> {
        let stock = medicine.map(|m| m.quantity);
        match op {
            CartOp::Add { medicine_id } => {
                let medicine = medicine.ok_or(CartError::UnknownMedicine(*medicine_id))?;
                self.add_item(medicine)?;
            }
            CartOp::AdjustQty { medicine_id, delta } => self.adjust_qty(*medicine_id, *delta, stock)?,
            CartOp::UpdateDosage { medicine_id, change } => return self.update_dosage(*medicine_id, change, stock),
            CartOp::Remove { medicine_id } => self.remove(*medicine_id)?,
            CartOp::SetDoctorCharge { cents } => {
                if *cents < 0 {
                    return Err(CartError::NegativeCharge);
                }
                self.doctor_charge_cents = *cents;
            }
            CartOp::Clear => self.clear(),
        }
        Ok(None)
    }

    // =========================================================================
    // TOTALS
    // =========================================================================

    /// # Errors
    ///
    /// `InvalidPrice` for a negative unit price, `TotalOverflow` when the sum
    /// leaves the `i64` range.
    pub fn medicine_total_cents(&self) -> Result<i64, CartError> {
        self.lines.iter().try_fold(0_i64, |sum, line| {
            if line.price_cents < 0 {
                return Err(CartError::InvalidPrice { name: line.name.clone() });
            }
            line.amount_cents()
                .and_then(|amount| sum.checked_add(amount))
                .ok_or(CartError::TotalOverflow)
        })
    }

    /// # Errors
    ///
    /// As [`Cart::medicine_total_cents`], plus `NegativeCharge`.
    pub fn total_cents(&self) -> Result<i64, CartError> {
        if self.doctor_charge_cents < 0 {
            return Err(CartError::NegativeCharge);
        }
        self.medicine_total_cents()?
            .checked_add(self.doctor_charge_cents)
            .ok_or(CartError::TotalOverflow)
    }

    /// # Errors
    ///
    /// As [`Cart::total_cents`].
    pub fn totals(&self, payment: &Payment) -> Result<Totals, CartError> {
        let medicine_total_cents = self.medicine_total_cents()?;
        let total_cents = self.total_cents()?;
        let balance_cents = match (payment.method, payment.cash_given_cents) {
            (PaymentMethod::Cash, Some(given)) => Some(given.checked_sub(total_cents).ok_or(CartError::TotalOverflow)?),
            _ => None,
        };
        Ok(Totals { medicine_total_cents, doctor_charge_cents: self.doctor_charge_cents, total_cents, balance_cents })
    }

    #[must_use]
    pub fn order_items(&self) -> Vec<OrderItem> {
        self.lines.iter().map(CartLine::to_order_item).collect()
    }
}

/// One edit posted by the billing screen.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CartOp {
    Add { medicine_id: Uuid },
    AdjustQty { medicine_id: Uuid, delta: i32 },
    UpdateDosage { medicine_id: Uuid, change: DosageChange },
    Remove { medicine_id: Uuid },
    SetDoctorCharge { cents: i64 },
    Clear,
}

impl CartOp {
    /// The medicine whose current stock the edit needs, if any.
    #[must_use]
    pub fn medicine_id(&self) -> Option<Uuid> {
        match self {
            Self::Add { medicine_id }
            | Self::AdjustQty { medicine_id, .. }
            | Self::UpdateDosage { medicine_id, .. }
            | Self::Remove { medicine_id } => Some(*medicine_id),
            Self::SetDoctorCharge { .. } | Self::Clear => None,
        }
    }
}

// =============================================================================
// INVOICE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceRow {
    pub item: String,
    pub instructions: String,
    pub price: String,
    pub qty: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invoice {
    pub clinic_name: String,
    pub clinic_address: String,
    pub issued_at: String,
    pub patient: String,
    pub rows: Vec<InvoiceRow>,
    pub total_cents: i64,
}

const INVOICE_HEADERS: [&str; 5] = ["Item", "Instructions", "Price", "Qty", "Amount"];

impl Invoice {
    /// Build the invoice for a cart.
    ///
    /// # Errors
    ///
    /// `EmptyBill` when there are no items and no doctor charge, and any
    /// pricing error from [`Cart::total_cents`].
    pub fn build(cart: &Cart, clinic: &ClinicInfo, issued_at: String) -> Result<Self, CartError> {
        if cart.is_empty_bill() {
            return Err(CartError::EmptyBill);
        }
        let total_cents = cart.total_cents()?;
        let mut rows = cart
            .lines
            .iter()
            .map(|line| {
                Ok(InvoiceRow {
                    item: line.name.clone(),
                    instructions: line.instructions(),
                    price: format_cents(line.price_cents),
                    qty: line.qty.to_string(),
                    amount: format_cents(line.amount_cents().ok_or(CartError::TotalOverflow)?),
                })
            })
            .collect::<Result<Vec<_>, CartError>>()?;
        if cart.doctor_charge_cents > 0 {
            rows.push(InvoiceRow {
                item: "Professional Charges".into(),
                instructions: "-".into(),
                price: "-".into(),
                qty: "-".into(),
                amount: format_cents(cart.doctor_charge_cents),
            });
        }
        Ok(Self {
            clinic_name: clinic.name.clone(),
            clinic_address: clinic.address.clone(),
            issued_at,
            patient: cart.patient_label().to_owned(),
            rows,
            total_cents,
        })
    }

    /// Fixed-width plain-text rendering for the receipt printer.
    #[must_use]
    pub fn render_text(&self) -> String {
        let cells = |r: &InvoiceRow| [r.item.clone(), r.instructions.clone(), r.price.clone(), r.qty.clone(), r.amount.clone()];
        let mut widths = INVOICE_HEADERS.map(str::len);
        for row in &self.rows {
            for (w, cell) in widths.iter_mut().zip(cells(row)) {
                *w = (*w).max(cell.chars().count());
            }
        }
        let line_width = widths.iter().sum::<usize>() + 3 * (widths.len() - 1);
        let rule = "-".repeat(line_width.max(self.clinic_address.len()));

        let mut out = String::new();
        let _ = writeln!(out, "{:^width$}", self.clinic_name, width = rule.len());
        let _ = writeln!(out, "{:^width$}", self.clinic_address, width = rule.len());
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Date: {}", self.issued_at);
        let _ = writeln!(out, "Patient: {}", self.patient);
        let _ = writeln!(out);
        push_row(&mut out, &INVOICE_HEADERS.map(str::to_owned), &widths);
        let _ = writeln!(out, "{rule}");
        for row in &self.rows {
            push_row(&mut out, &cells(row), &widths);
        }
        let _ = writeln!(out, "{rule}");
        let total = format!("TOTAL: Rs. {}", format_cents(self.total_cents));
        let _ = writeln!(out, "{total:>width$}", width = rule.len());
        out
    }
}

fn push_row(out: &mut String, cells: &[String; 5], widths: &[usize; 5]) {
    let mut parts = Vec::with_capacity(cells.len());
    for (i, (cell, w)) in cells.iter().zip(widths).enumerate() {
        // Text columns left-aligned, numeric columns right-aligned.
        if i < 2 {
            parts.push(format!("{cell:<w$}"));
        } else {
            parts.push(format!("{cell:>w$}"));
        }
    }
    let _ = writeln!(out, "{}", parts.join(" | ").trim_end());
}

#[cfg(test)]
#[path = "cart_test.rs"]
mod tests;
