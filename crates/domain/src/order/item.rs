use serde::{Deserialize, Serialize};

use crate::value_objects::{Money, ProductId};

/// A line item in an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,

    #[serde(default)]
    pub product_name: String,

    pub quantity: u32,

    /// Price per unit in cents.
    pub unit_price: Money,
}

impl OrderItem {
    pub fn new(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            quantity,
            unit_price,
        }
    }

    /// quantity * unit_price
    pub fn total_price(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }

    pub(crate) fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.product_id.as_str().trim().is_empty() {
            errors.push("item product id is required".to_string());
        }
        if self.quantity == 0 {
            errors.push(format!(
                "item {} quantity must be greater than 0",
                self.product_id
            ));
        }
        if !self.unit_price.is_positive() {
            errors.push(format!(
                "item {} price must be greater than 0",
                self.product_id
            ));
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_price_multiplies_quantity() {
        let item = OrderItem::new("SKU-1", "Widget", 3, Money::from_cents(250));
        assert_eq!(item.total_price(), Money::from_cents(750));
    }

    #[test]
    fn validate_reports_quantity_and_price() {
        let item = OrderItem::new("SKU-1", "Widget", 0, Money::zero());
        assert_eq!(item.validate().len(), 2);
        assert!(OrderItem::new("SKU-1", "Widget", 1, Money::from_cents(1))
            .validate()
            .is_empty());
    }
}
