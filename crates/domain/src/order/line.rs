use common::Money;
use serde::{Deserialize, Serialize};

use super::OrderError;

/// One catalog item in an order, captured at order time.
///
/// Later catalog price or name changes do not affect existing lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Catalog item identifier used for inventory adjustments.
    pub item_id: String,
    pub upc: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl OrderLine {
    pub fn new(
        item_id: impl Into<String>,
        upc: impl Into<String>,
        name: impl Into<String>,
        unit_price: Money,
        quantity: u32,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            upc: upc.into(),
            name: name.into(),
            unit_price,
            quantity,
        }
    }

    /// Unit price times quantity.
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }

    pub(crate) fn validate_all(lines: &[OrderLine]) -> Result<(), OrderError> {
        if lines.is_empty() {
            return Err(OrderError::NoLines);
        }
        if let Some(bad) = lines.iter().find(|line| line.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                upc: bad.upc.clone(),
                quantity: bad.quantity,
            });
        }
        Self::checked_total(lines).ok_or(OrderError::AmountOverflow)?;
        Ok(())
    }

    /// Sum of every line total, or `None` if any step overflows.
    pub(crate) fn checked_total(lines: &[OrderLine]) -> Option<Money> {
        lines.iter().try_fold(Money::zero(), |total, line| {
            total.checked_add(line.unit_price.checked_times(line.quantity)?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_total_multiplies_exactly() {
        let line = OrderLine::new("7", "012345", "Widget", "3.50".parse().unwrap(), 2);
        assert_eq!(line.line_total(), "7.00".parse::<Money>().unwrap());
    }

    #[test]
    fn validation_rejects_empty_and_zero_quantity() {
        assert!(matches!(OrderLine::validate_all(&[]), Err(OrderError::NoLines)));

        let zero = OrderLine::new("7", "012345", "Widget", Money::from_cents(100), 0);
        assert!(matches!(
            OrderLine::validate_all(&[zero]),
            Err(OrderError::InvalidQuantity { quantity: 0, .. })
        ));
    }

    #[test]
    fn validation_rejects_totals_that_overflow() {
        let price: Money = "79228162514264337593543950335".parse().unwrap();
        let single = OrderLine::new("7", "012345", "Widget", price, 1);
        assert!(OrderLine::validate_all(std::slice::from_ref(&single)).is_ok());

        let doubled = OrderLine::new("7", "012345", "Widget", price, 2);
        assert!(matches!(
            OrderLine::validate_all(&[doubled]),
            Err(OrderError::AmountOverflow)
        ));
        assert!(matches!(
            OrderLine::validate_all(&[single.clone(), single]),
            Err(OrderError::AmountOverflow)
        ));
    }
}
