//! Order line items, totals, and variant selection
//!
//! Line items are priced from the catalog, never from client input: the
//! unit price is the variant price when the variant overrides it, the
//! product price otherwise.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lifecycle::OrderError;
use crate::models::product::{Product, ProductVariant};

/// A purchased line, stored inside the order document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,

    /// Variant the stock is taken from (None for products without variants)
    pub variant_id: Option<Uuid>,

    /// Product name at the time of purchase
    pub name: String,

    pub sku: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl OrderItem {
    /// Prices a line against the catalog
    ///
    /// # Errors
    ///
    /// Returns `OrderError::InvalidQuantity` when `quantity < 1`.
    pub fn priced(
        product: &Product,
        variant: Option<&ProductVariant>,
        quantity: i32,
    ) -> Result<Self, OrderError> {
        if quantity < 1 {
            return Err(OrderError::InvalidQuantity);
        }

        let unit_price = variant
            .and_then(|v| v.price)
            .unwrap_or(product.price);

        Ok(Self {
            product_id: product.id,
            variant_id: variant.map(|v| v.id),
            name: product.name.clone(),
            sku: variant.and_then(|v| v.sku.clone()),
            color: variant.and_then(|v| v.color.clone()),
            size: variant.and_then(|v| v.size.clone()),
            quantity,
            unit_price,
            line_total: unit_price * Decimal::from(quantity),
        })
    }
}

/// Variant requested by the buyer
///
/// Either an explicit id, or attribute values matched case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSelection {
    pub variant_id: Option<Uuid>,
    pub color: Option<String>,
    pub size: Option<String>,
}

impl VariantSelection {
    pub fn by_id(variant_id: Uuid) -> Self {
        Self {
            variant_id: Some(variant_id),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.variant_id.is_none() && self.color.is_none() && self.size.is_none()
    }
}

fn attr_matches(wanted: Option<&str>, actual: Option<&str>) -> bool {
    match wanted {
        None => true,
        Some(w) => actual.is_some_and(|a| a.trim().eq_ignore_ascii_case(w.trim())),
    }
}

/// Picks the variant a selection refers to
///
/// An explicit id wins. Otherwise every attribute given must match. With no
/// selection at all, a product with a single variant resolves to it.
pub fn select_variant<'a>(
    variants: &'a [ProductVariant],
    selection: &VariantSelection,
) -> Option<&'a ProductVariant> {
    if let Some(id) = selection.variant_id {
        return variants.iter().find(|v| v.id == id);
    }

    if selection.color.is_none() && selection.size.is_none() {
        return match variants {
            [only] => Some(only),
            _ => None,
        };
    }

    variants.iter().find(|v| {
        attr_matches(selection.color.as_deref(), v.color.as_deref())
            && attr_matches(selection.size.as_deref(), v.size.as_deref())
    })
}

/// Largest amount an order column holds (`NUMERIC(12, 2)`): 9,999,999,999.99
pub const MAX_ORDER_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// Order money summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

/// Sums line totals and applies shipping and discount
///
/// The total never drops below zero, however large the discount.
pub fn compute_totals(items: &[OrderItem], shipping_fee: Decimal, discount: Decimal) -> Totals {
    let subtotal: Decimal = items.iter().map(|i| i.line_total).sum();
    let total = (subtotal + shipping_fee - discount).max(Decimal::ZERO);

    Totals {
        subtotal,
        shipping_fee,
        discount,
        total,
    }
}

/// Rejects totals that do not fit the order columns
pub fn check_amounts(totals: &Totals) -> Result<(), OrderError> {
    let amounts = [totals.subtotal, totals.shipping_fee, totals.discount, totals.total];
    if amounts.iter().any(|amount| *amount > MAX_ORDER_AMOUNT) {
        return Err(OrderError::AmountTooLarge {
            max: MAX_ORDER_AMOUNT,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::product::ProductStatus;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn product(price: Decimal) -> Product {
        Product {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Linen Shirt".to_string(),
            slug: "linen-shirt".to_string(),
            description: String::new(),
            price,
            compare_at_price: None,
            stock: 10,
            status: ProductStatus::Active,
            images: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn variant(product: &Product, color: &str, size: &str, price: Option<Decimal>) -> ProductVariant {
        ProductVariant {
            id: Uuid::new_v4(),
            product_id: product.id,
            tenant_id: product.tenant_id,
            sku: Some(format!("LS-{}-{}", color, size).to_uppercase()),
            color: Some(color.to_string()),
            size: Some(size.to_string()),
            price,
            stock: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_item_uses_variant_price_override() {
        let p = product(Decimal::new(2500, 2));
        let v = variant(&p, "blue", "M", Some(Decimal::new(2900, 2)));

        let item = OrderItem::priced(&p, Some(&v), 2).unwrap();
        assert_eq!(item.unit_price, Decimal::new(2900, 2));
        assert_eq!(item.line_total, Decimal::new(5800, 2));
        assert_eq!(item.variant_id, Some(v.id));
        assert_eq!(item.sku.as_deref(), Some("LS-BLUE-M"));
    }

    #[test]
    fn test_item_falls_back_to_product_price() {
        let p = product(Decimal::new(2500, 2));
        let v = variant(&p, "blue", "M", None);

        let item = OrderItem::priced(&p, Some(&v), 1).unwrap();
        assert_eq!(item.unit_price, Decimal::new(2500, 2));
    }

    #[test]
    fn test_item_rejects_zero_quantity() {
        let p = product(Decimal::ONE);
        assert_eq!(
            OrderItem::priced(&p, None, 0).unwrap_err(),
            OrderError::InvalidQuantity
        );
    }

    #[test]
    fn test_select_variant_by_attributes() {
        let p = product(Decimal::ONE);
        let variants = vec![
            variant(&p, "blue", "M", None),
            variant(&p, "blue", "L", None),
            variant(&p, "red", "M", None),
        ];

        let selection = VariantSelection {
            variant_id: None,
            color: Some("Blue".to_string()),
            size: Some("l".to_string()),
        };

        let chosen = select_variant(&variants, &selection).unwrap();
        assert_eq!(chosen.id, variants[1].id);
    }

    #[test]
    fn test_select_variant_by_id() {
        let p = product(Decimal::ONE);
        let variants = vec![variant(&p, "blue", "M", None), variant(&p, "red", "M", None)];

        let chosen = select_variant(&variants, &VariantSelection::by_id(variants[1].id)).unwrap();
        assert_eq!(chosen.color.as_deref(), Some("red"));

        assert!(select_variant(&variants, &VariantSelection::by_id(Uuid::new_v4())).is_none());
    }

    #[test]
    fn test_select_variant_without_selection() {
        let p = product(Decimal::ONE);
        let single = vec![variant(&p, "blue", "M", None)];
        assert!(select_variant(&single, &VariantSelection::default()).is_some());

        let many = vec![variant(&p, "blue", "M", None), variant(&p, "red", "M", None)];
        assert!(select_variant(&many, &VariantSelection::default()).is_none());
    }

    #[test]
    fn test_compute_totals() {
        let p = product(Decimal::new(1000, 2));
        let items = vec![
            OrderItem::priced(&p, None, 2).unwrap(),
            OrderItem::priced(&p, None, 1).unwrap(),
        ];

        let totals = compute_totals(&items, Decimal::new(500, 2), Decimal::new(250, 2));
        assert_eq!(totals.subtotal, Decimal::new(3000, 2));
        assert_eq!(totals.total, Decimal::new(3250, 2));
    }

    #[test]
    fn test_total_never_negative() {
        let p = product(Decimal::new(1000, 2));
        let items = vec![OrderItem::priced(&p, None, 1).unwrap()];

        let totals = compute_totals(&items, Decimal::ZERO, Decimal::new(5000, 2));
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn test_max_order_amount_matches_column() {
        assert_eq!(MAX_ORDER_AMOUNT, Decimal::new(999_999_999_999, 2));
    }

    #[test]
    fn test_check_amounts() {
        let p = product(Decimal::new(1000, 2));
        let items = vec![OrderItem::priced(&p, None, 3).unwrap()];
        assert!(check_amounts(&compute_totals(&items, Decimal::ZERO, Decimal::ZERO)).is_ok());

        let pricey = product(Decimal::new(999_999_999_999, 2));
        let items = vec![
            OrderItem::priced(&pricey, None, 10_000).unwrap(),
            OrderItem::priced(&p, None, 1).unwrap(),
        ];
        assert_eq!(
            check_amounts(&compute_totals(&items, Decimal::ZERO, Decimal::ZERO)),
            Err(OrderError::AmountTooLarge {
                max: MAX_ORDER_AMOUNT
            })
        );

        let items = vec![OrderItem::priced(&p, None, 1).unwrap()];
        let huge_fee = Decimal::new(1_000_000_000_000, 2);
        assert!(check_amounts(&compute_totals(&items, huge_fee, Decimal::ZERO)).is_err());
    }
}
