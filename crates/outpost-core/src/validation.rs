//! # Validation Module
//!
//! Input validation for sales and lookups.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Validation Flow                                      │
//! │                                                                         │
//! │  Presentation ──► validate_transaction_request() ──► send or queue     │
//! │                           │                                             │
//! │                           ▼                                             │
//! │               Err(ValidationError) ──► cashier corrects the sale        │
//! │                                                                         │
//! │  A sale that fails here is never queued: once offline, nobody is at    │
//! │  the counter to fix it when replay is rejected.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::{LineItem, TransactionRequest};
use crate::{MAX_ITEM_QUANTITY, MAX_LINE_ITEMS};

/// Maximum length of identifiers (outlet, cashier, offline id, product id).
pub const MAX_ID_LENGTH: usize = 128;

/// Maximum length of a search query.
pub const MAX_SEARCH_LENGTH: usize = 100;

/// Validates an identifier field: non-blank and bounded.
pub fn validate_id(field: &str, value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if trimmed.len() > MAX_ID_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_ID_LENGTH,
        });
    }
    Ok(())
}

/// Validates a line quantity is within 1..=MAX_ITEM_QUANTITY.
pub fn validate_quantity(qty: i64) -> Result<(), ValidationError> {
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

fn validate_line(item: &LineItem) -> Result<(), ValidationError> {
    validate_id("product_id", &item.product_id)?;
    validate_quantity(item.quantity)?;
    if item.unit_price_cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "unit_price_cents".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a sale before it is sent or queued.
///
/// ## Rules
/// - outlet and cashier present
/// - offline id, when given, is non-blank and bounded
/// - 1..=MAX_LINE_ITEMS lines, each with a valid quantity and price
/// - payment amount is positive and covers the total
pub fn validate_transaction_request(req: &TransactionRequest) -> Result<(), ValidationError> {
    validate_id("outlet_id", &req.outlet_id)?;
    validate_id("cashier_id", &req.cashier_id)?;
    if let Some(offline_id) = &req.offline_id {
        validate_id("offline_id", offline_id)?;
    }

    if req.items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }
    if req.items.len() > MAX_LINE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_LINE_ITEMS as i64,
        });
    }
    for item in &req.items {
        validate_line(item)?;
    }

    let total = req.total().cents();
    if req.payment.amount_cents <= 0 && total > 0 {
        return Err(ValidationError::MustBePositive {
            field: "payment.amount_cents".to_string(),
        });
    }
    if req.payment.amount_cents < total {
        return Err(ValidationError::Underpaid {
            paid: req.payment.amount_cents,
            total,
        });
    }
    Ok(())
}

/// Validates and normalises a search query.
///
/// ## Returns
/// The trimmed query. An empty string is valid and means "no filter".
pub fn validate_search_query(query: &str) -> Result<String, ValidationError> {
    let trimmed = query.trim();
    if trimmed.chars().count() > MAX_SEARCH_LENGTH {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: MAX_SEARCH_LENGTH,
        });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PaymentInfo, PaymentMethod};

    fn valid_request() -> TransactionRequest {
        TransactionRequest {
            offline_id: Some("T1-000001".to_string()),
            outlet_id: "outlet-1".to_string(),
            cashier_id: "cashier-1".to_string(),
            items: vec![LineItem {
                product_id: "p1".to_string(),
                sku: "SKU-1".to_string(),
                name: "Bread".to_string(),
                quantity: 2,
                unit_price_cents: 250,
                tax_rate_bps: 0,
            }],
            payment: PaymentInfo {
                method: PaymentMethod::Cash,
                amount_cents: 500,
                reference: None,
            },
            created_at: None,
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(validate_transaction_request(&valid_request()).is_ok());
    }

    #[test]
    fn test_missing_cashier() {
        let mut req = valid_request();
        req.cashier_id = "  ".to_string();
        assert!(matches!(
            validate_transaction_request(&req),
            Err(ValidationError::Required { field }) if field == "cashier_id"
        ));
    }

    #[test]
    fn test_empty_cart_rejected() {
        let mut req = valid_request();
        req.items.clear();
        assert!(matches!(
            validate_transaction_request(&req),
            Err(ValidationError::Required { field }) if field == "items"
        ));
    }

    #[test]
    fn test_quantity_bounds() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_underpaid_rejected() {
        let mut req = valid_request();
        req.payment.amount_cents = 499;
        assert_eq!(
            validate_transaction_request(&req),
            Err(ValidationError::Underpaid {
                paid: 499,
                total: 500
            })
        );
    }

    #[test]
    fn test_search_query() {
        assert_eq!(validate_search_query("  cola ").unwrap(), "cola");
        assert_eq!(validate_search_query("").unwrap(), "");
        assert!(validate_search_query(&"x".repeat(101)).is_err());
    }
}
