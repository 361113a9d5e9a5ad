//! Value objects shared by the customer and order aggregates.

use serde::{Deserialize, Serialize};

/// Postal address. Customers keep one as their shipping address and every
/// order carries a copy of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub postal_code: String,
}

impl Address {
    pub fn new(
        street: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
        country: impl Into<String>,
        postal_code: impl Into<String>,
    ) -> Self {
        Self {
            street: street.into(),
            city: city.into(),
            state: state.into(),
            country: country.into(),
            postal_code: postal_code.into(),
        }
    }

    /// Messages for every required field left blank. Empty when valid.
    pub fn validate(&self) -> Vec<String> {
        [
            ("street", &self.street),
            ("city", &self.city),
            ("country", &self.country),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| format!("shipping address {field} is required"))
        .collect()
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.street, self.city)?;
        if !self.state.is_empty() {
            write!(f, ", {}", self.state)?;
        }
        if !self.postal_code.is_empty() {
            write!(f, " {}", self.postal_code)?;
        }
        write!(f, ", {}", self.country)
    }
}

/// Product identifier (SKU).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Money amount in cents.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn multiply(&self, quantity: u32) -> Money {
        Self(self.0 * i64::from(quantity))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lisbon() -> Address {
        Address::new("Rua Augusta 1", "Lisbon", "", "Portugal", "1100-048")
    }

    #[test]
    fn complete_address_is_valid() {
        assert!(lisbon().validate().is_empty());
    }

    #[test]
    fn blank_fields_are_reported() {
        let address = Address {
            city: "  ".into(),
            ..lisbon()
        };
        assert_eq!(
            address.validate(),
            vec!["shipping address city is required".to_string()]
        );
    }

    #[test]
    fn address_display_skips_empty_parts() {
        assert_eq!(
            lisbon().to_string(),
            "Rua Augusta 1, Lisbon 1100-048, Portugal"
        );
    }

    #[test]
    fn address_missing_fields_default_to_empty() {
        let address: Address =
            serde_json::from_value(serde_json::json!({"street": "1 Main St", "city": "Austin"}))
                .unwrap();
        assert_eq!(address.country, "");
        assert_eq!(address.validate().len(), 1);
    }

    #[test]
    fn money_display_and_sum() {
        assert_eq!(Money::from_cents(1234).to_string(), "$12.34");
        assert_eq!(Money::from_cents(-5).to_string(), "-$0.05");

        let total: Money = [Money::from_cents(100), Money::from_cents(250)]
            .into_iter()
            .sum();
        assert_eq!(total.cents(), 350);
        assert_eq!(Money::from_cents(250).multiply(3).cents(), 750);
    }
}
