//! # Cost Resolution
//!
//! Attributes a cost of goods to one order line.
//!
//! ## Resolution Tiers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  First applicable source wins                                           │
//! │                                                                         │
//! │  1. InventoryCost   inventory.cost × qty          (linked ledger row)   │
//! │        │ none                                                           │
//! │        ▼                                                                │
//! │  2. SupplierPrice   product.supplier_price × qty                        │
//! │        │ none                                                           │
//! │        ▼                                                                │
//! │  3. ProductMargin   line_revenue × (1 − product.margin)                 │
//! │        │ none                                                           │
//! │        ▼                                                                │
//! │  4. DefaultMargin   line_revenue × (1 − settings.default_margin)        │
//! │        │ none                                                           │
//! │        ▼                                                                │
//! │  5. NoCost          $0, tagged so reports can count it                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A `NoCost` line still contributes its full revenue, which inflates the
//! computed margin. Reports surface how many lines fell through to it
//! (see `CostCoverage`).
//!
//! Resolution never fails and is re-run for every line; nothing is cached
//! across lines.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::Rate;

// =============================================================================
// Inputs
// =============================================================================

/// Cost metadata loaded for the product behind an order line.
///
/// A `Some(Money::zero())` inventory cost counts as defined: it wins tier 1
/// with a zero cost rather than falling through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSources {
    /// Unit cost from the product's inventory row.
    pub inventory_unit_cost: Option<Money>,
    /// Unit wholesale price.
    pub supplier_price: Option<Money>,
    /// Product-specific margin.
    pub margin: Option<Rate>,
}

// =============================================================================
// Result
// =============================================================================

/// Which tier produced a line's cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum CostSource {
    InventoryCost,
    SupplierPrice,
    ProductMargin,
    DefaultMargin,
    NoCost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCost {
    /// Total cost for the whole line (not per unit).
    pub cost: Money,
    pub source: CostSource,
}

impl ResolvedCost {
    pub fn is_no_cost(&self) -> bool {
        self.source == CostSource::NoCost
    }
}

// =============================================================================
// Policy
// =============================================================================

/// Resolves the total cost of one order line.
///
/// ## Example
/// ```rust
/// use tienda_core::cost::{resolve_line_cost, CostSource, CostSources};
/// use tienda_core::money::Money;
///
/// // 2 units sold at $500.00, inventory cost $300.00 per unit
/// let sources = CostSources {
///     inventory_unit_cost: Some(Money::from_cents(30_000)),
///     ..Default::default()
/// };
/// let resolved = resolve_line_cost(&sources, 2, Money::from_cents(50_000), None);
///
/// assert_eq!(resolved.cost.cents(), 60_000);
/// assert_eq!(resolved.source, CostSource::InventoryCost);
/// ```
pub fn resolve_line_cost(
    sources: &CostSources,
    quantity: i64,
    unit_price: Money,
    default_margin: Option<Rate>,
) -> ResolvedCost {
    if let Some(unit_cost) = sources.inventory_unit_cost {
        return ResolvedCost {
            cost: unit_cost.multiply_quantity(quantity),
            source: CostSource::InventoryCost,
        };
    }

    if let Some(supplier_price) = sources.supplier_price {
        return ResolvedCost {
            cost: supplier_price.multiply_quantity(quantity),
            source: CostSource::SupplierPrice,
        };
    }

    let line_revenue = unit_price.multiply_quantity(quantity);

    if let Some(margin) = sources.margin {
        return ResolvedCost {
            cost: line_revenue.after_margin(margin),
            source: CostSource::ProductMargin,
        };
    }

    if let Some(margin) = default_margin {
        return ResolvedCost {
            cost: line_revenue.after_margin(margin),
            source: CostSource::DefaultMargin,
        };
    }

    ResolvedCost {
        cost: Money::zero(),
        source: CostSource::NoCost,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT_PRICE: Money = Money::from_cents(50_000);

    fn all_sources() -> CostSources {
        CostSources {
            inventory_unit_cost: Some(Money::from_cents(30_000)),
            supplier_price: Some(Money::from_cents(35_000)),
            margin: Some(Rate::from_bps(2_500)),
        }
    }

    #[test]
    fn test_tier_priority_falls_through_in_order() {
        let default_margin = Some(Rate::from_bps(5_000));
        let mut sources = all_sources();

        let resolved = resolve_line_cost(&sources, 2, UNIT_PRICE, default_margin);
        assert_eq!(resolved.source, CostSource::InventoryCost);
        assert_eq!(resolved.cost.cents(), 60_000);

        sources.inventory_unit_cost = None;
        let resolved = resolve_line_cost(&sources, 2, UNIT_PRICE, default_margin);
        assert_eq!(resolved.source, CostSource::SupplierPrice);
        assert_eq!(resolved.cost.cents(), 70_000);

        // $1000.00 revenue, 25% margin → $750.00 cost
        sources.supplier_price = None;
        let resolved = resolve_line_cost(&sources, 2, UNIT_PRICE, default_margin);
        assert_eq!(resolved.source, CostSource::ProductMargin);
        assert_eq!(resolved.cost.cents(), 75_000);

        // 50% default margin → $500.00 cost
        sources.margin = None;
        let resolved = resolve_line_cost(&sources, 2, UNIT_PRICE, default_margin);
        assert_eq!(resolved.source, CostSource::DefaultMargin);
        assert_eq!(resolved.cost.cents(), 50_000);

        let resolved = resolve_line_cost(&sources, 2, UNIT_PRICE, None);
        assert!(resolved.is_no_cost());
        assert_eq!(resolved.cost, Money::zero());
    }

    #[test]
    fn test_zero_inventory_cost_is_defined() {
        let sources = CostSources {
            inventory_unit_cost: Some(Money::zero()),
            ..all_sources()
        };
        let resolved = resolve_line_cost(&sources, 3, UNIT_PRICE, None);
        assert_eq!(resolved.source, CostSource::InventoryCost);
        assert_eq!(resolved.cost, Money::zero());
    }

    #[test]
    fn test_margin_uses_line_revenue_not_unit_price() {
        let sources = CostSources {
            margin: Some(Rate::from_bps(4_000)),
            ..Default::default()
        };
        // 3 × $10.00 = $30.00 revenue, 40% margin → $18.00
        let resolved = resolve_line_cost(&sources, 3, Money::from_cents(1_000), None);
        assert_eq!(resolved.cost.cents(), 1_800);
    }
}
