//! # Validation Module
//!
//! Input validation for the compound writes and report requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP handlers                                                │
//! │  └── Deserialization into New* request types                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (before the transaction opens)                   │
//! │  ├── Required fields, positive quantities, margin range                │
//! │  └── Report date ranges and pagination                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Inside the transaction                                       │
//! │  ├── Live stock checks (CoreError::InsufficientStock)                  │
//! │  └── SQLite NOT NULL / UNIQUE / FOREIGN KEY constraints                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::types::{NewOrder, NewOrderItem, NewProduct, NewUser, Rate};
use crate::{MAX_ITEM_QUANTITY, MAX_PAGE_SIZE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates that a field is present after trimming.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_required("name", name)?;

    if name.trim().len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates an email address.
///
/// Only a shape check: one `@` with text on both sides and a dot in the
/// domain. Deliverability is not our problem.
///
/// ```rust
/// use tienda_core::validation::validate_email;
///
/// assert!(validate_email("ana@example.com").is_ok());
/// assert!(validate_email("ana@example").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();
    validate_required("email", email)?;

    let invalid = || ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: "must look like name@domain.tld".to_string(),
    };

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(invalid());
    }
    if domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid());
    }

    Ok(())
}

/// Validates a SKU.
///
/// ## Rules
/// - Must not be empty, at most 64 characters
/// - Letters, numbers, hyphens and underscores only
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();
    validate_required("sku", sku)?;

    if sku.len() > 64 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 64,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an order or cart line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed (free items).
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a margin or commission rate (0% to 100%).
pub fn validate_rate(field: &str, rate: Rate) -> ValidationResult<()> {
    if rate.bps() > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 10_000,
        });
    }
    Ok(())
}

// =============================================================================
// Request Validators
// =============================================================================

/// Validates a checkout before the order transaction opens.
///
/// Stock is NOT checked here; that happens against live rows inside the
/// transaction.
pub fn validate_new_order(order: &NewOrder, items: &[NewOrderItem]) -> ValidationResult<()> {
    validate_required("customer_name", &order.customer_name)?;
    validate_email(&order.customer_email)?;
    validate_price_cents("total", order.total.cents())?;

    if items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    for item in items {
        validate_required("product_id", &item.product_id)?;
        validate_quantity(item.quantity)?;
        validate_price_cents("price", item.price.cents())?;
        if item.price.checked_multiply_quantity(item.quantity).is_none() {
            return Err(ValidationError::OutOfRange {
                field: "price".to_string(),
                min: 0,
                max: i64::MAX / item.quantity,
            });
        }
    }

    Ok(())
}

pub fn validate_new_product(product: &NewProduct) -> ValidationResult<()> {
    validate_product_name(&product.name)?;
    validate_price_cents("price", product.price.cents())?;

    if product.stock < 0 {
        return Err(ValidationError::OutOfRange {
            field: "stock".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    if let Some(supplier_price) = product.supplier_price {
        validate_price_cents("supplier_price", supplier_price.cents())?;
    }
    if let Some(margin) = product.margin {
        validate_rate("margin", margin)?;
    }

    Ok(())
}

pub fn validate_new_user(user: &NewUser) -> ValidationResult<()> {
    validate_required("name", &user.name)?;
    validate_email(&user.email)?;
    if let Some(commission) = user.commission {
        validate_rate("commission", commission)?;
    }
    Ok(())
}

/// Validates a report period: `start` must not be after `end`.
pub fn validate_date_range(start: DateTime<Utc>, end: DateTime<Utc>) -> ValidationResult<()> {
    if start > end {
        return Err(ValidationError::InvalidFormat {
            field: "date range".to_string(),
            reason: format!("start {} is after end {}", start.to_rfc3339(), end.to_rfc3339()),
        });
    }
    Ok(())
}

/// Normalizes pagination input.
///
/// Page is 1-based; a zero page becomes 1 and the limit is clamped to
/// `1..=MAX_PAGE_SIZE`.
pub fn normalize_pagination(page: u32, limit: u32) -> (u32, u32) {
    (page.max(1), limit.clamp(1, MAX_PAGE_SIZE))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use chrono::TimeZone;

    fn order() -> NewOrder {
        NewOrder {
            customer_name: "Ana".to_string(),
            customer_email: "ana@example.com".to_string(),
            total: Money::from_cents(1_000),
            ..Default::default()
        }
    }

    fn line(qty: i64) -> NewOrderItem {
        NewOrderItem {
            product_id: "p-1".to_string(),
            quantity: qty,
            price: Money::from_cents(500),
        }
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ana@example.com").is_ok());
        assert!(validate_email("  ana@shop.co.uk ").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("ana").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ana@example.").is_err());
        assert!(validate_email("a@b@c.com").is_err());
    }

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("INV-p1-1700000000000").is_ok());
        assert!(validate_sku("").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_rate() {
        assert!(validate_rate("margin", Rate::from_bps(10_000)).is_ok());
        assert!(validate_rate("margin", Rate::from_bps(10_001)).is_err());
    }

    #[test]
    fn test_validate_new_order() {
        assert!(validate_new_order(&order(), &[line(2)]).is_ok());
        assert!(validate_new_order(&order(), &[]).is_err());
        assert!(validate_new_order(&order(), &[line(0)]).is_err());

        let mut pricey = line(MAX_ITEM_QUANTITY);
        pricey.price = Money::from_cents(i64::MAX / 1_000);
        assert!(matches!(
            validate_new_order(&order(), &[pricey]),
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "price"
        ));

        let mut anonymous = order();
        anonymous.customer_name = "  ".to_string();
        assert!(matches!(
            validate_new_order(&anonymous, &[line(1)]),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_validate_new_product() {
        let product = NewProduct {
            name: "Sneakers".to_string(),
            price: Money::from_cents(5_000),
            stock: 3,
            ..Default::default()
        };
        assert!(validate_new_product(&product).is_ok());

        let negative = NewProduct {
            stock: -1,
            ..product.clone()
        };
        assert!(validate_new_product(&negative).is_err());

        let bad_margin = NewProduct {
            margin: Some(Rate::from_bps(12_000)),
            ..product
        };
        assert!(validate_new_product(&bad_margin).is_err());
    }

    #[test]
    fn test_validate_date_range() {
        let jan = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let feb = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        assert!(validate_date_range(jan, feb).is_ok());
        assert!(validate_date_range(jan, jan).is_ok());
        assert!(validate_date_range(feb, jan).is_err());
    }

    #[test]
    fn test_normalize_pagination() {
        assert_eq!(normalize_pagination(0, 0), (1, 1));
        assert_eq!(normalize_pagination(3, 20), (3, 20));
        assert_eq!(normalize_pagination(1, 10_000), (1, MAX_PAGE_SIZE));
    }
}
