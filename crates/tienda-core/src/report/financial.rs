//! Financial report: revenue, attributed cost of goods and gross profit over
//! paid orders.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

use super::{month_key, ReportOrder, ReportPeriod};
use crate::cost::{resolve_line_cost, CostSource};
use crate::money::Money;
use crate::types::{PaymentStatus, Rate};
use crate::UNKNOWN_PAYMENT_METHOD;

// =============================================================================
// Report Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FinancialReport {
    pub period: ReportPeriod,
    pub total_revenue: Money,
    pub total_costs: Money,
    pub gross_profit: Money,
    /// gross_profit / total_revenue × 100, or 0 without revenue.
    pub profit_margin: f64,
    pub order_count: u64,
    pub average_order_value: Money,
    /// Keyed "YYYY-MM" in the reporting offset.
    pub revenue_by_month: BTreeMap<String, MonthlyFinancials>,
    pub payment_methods: BTreeMap<String, PaymentMethodSummary>,
    pub cost_coverage: CostCoverage,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MonthlyFinancials {
    pub revenue: Money,
    pub costs: Money,
    pub profit: Money,
    pub margin: f64,
    pub orders: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PaymentMethodSummary {
    pub count: u64,
    pub amount: Money,
}

/// How many order lines each cost tier priced.
///
/// A high `no_cost` count means the margin figures are overstated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CostCoverage {
    pub inventory_cost: u64,
    pub supplier_price: u64,
    pub product_margin: u64,
    pub default_margin: u64,
    pub no_cost: u64,
}

impl CostCoverage {
    pub fn record(&mut self, source: CostSource) {
        match source {
            CostSource::InventoryCost => self.inventory_cost += 1,
            CostSource::SupplierPrice => self.supplier_price += 1,
            CostSource::ProductMargin => self.product_margin += 1,
            CostSource::DefaultMargin => self.default_margin += 1,
            CostSource::NoCost => self.no_cost += 1,
        }
    }

    pub fn total_lines(&self) -> u64 {
        self.inventory_cost
            + self.supplier_price
            + self.product_margin
            + self.default_margin
            + self.no_cost
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builds the financial report for `period`.
///
/// Only orders with payment status PAID created inside the period count.
/// Every line of every order is priced with [`resolve_line_cost`].
pub fn build_financial_report(
    period: ReportPeriod,
    orders: &[ReportOrder],
    default_margin: Option<Rate>,
    tz: FixedOffset,
) -> FinancialReport {
    let mut total_revenue = Money::zero();
    let mut total_costs = Money::zero();
    let mut order_count = 0u64;
    let mut revenue_by_month: BTreeMap<String, MonthlyFinancials> = BTreeMap::new();
    let mut payment_methods: BTreeMap<String, PaymentMethodSummary> = BTreeMap::new();
    let mut cost_coverage = CostCoverage::default();

    let paid = orders
        .iter()
        .filter(|o| o.payment_status == PaymentStatus::Paid && period.contains(o.created_at));

    for order in paid {
        let mut order_cost = Money::zero();
        for line in &order.lines {
            let resolved = resolve_line_cost(
                &line.cost_sources,
                line.quantity,
                line.unit_price,
                default_margin,
            );
            cost_coverage.record(resolved.source);
            order_cost += resolved.cost;
        }

        order_count += 1;
        total_revenue += order.total;
        total_costs += order_cost;

        let month = revenue_by_month
            .entry(month_key(order.created_at, tz))
            .or_default();
        month.revenue += order.total;
        month.costs += order_cost;
        month.orders += 1;

        let method = order
            .payment_method
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(UNKNOWN_PAYMENT_METHOD);
        let summary = payment_methods.entry(method.to_string()).or_default();
        summary.count += 1;
        summary.amount += order.total;
    }

    for month in revenue_by_month.values_mut() {
        month.profit = month.revenue - month.costs;
        month.margin = month.profit.percent_of(month.revenue);
    }

    let gross_profit = total_revenue - total_costs;

    FinancialReport {
        period,
        total_revenue,
        total_costs,
        gross_profit,
        profit_margin: gross_profit.percent_of(total_revenue),
        order_count,
        average_order_value: total_revenue.divide_rounded(order_count as i64),
        revenue_by_month,
        payment_methods,
        cost_coverage,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::CostSources;
    use crate::report::offset_from_minutes;
    use crate::report::tests::{at, line, order};

    fn period() -> ReportPeriod {
        ReportPeriod::new(at(2024, 1, 1, 0), at(2024, 12, 31, 23))
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn test_inventory_then_supplier_cost_scenario() {
        let utc = offset_from_minutes(0);

        // One $1000.00 order: 2 × $500.00, inventory cost $300.00/unit
        let mut l = line("p-1", 2, 50_000);
        l.cost_sources = CostSources {
            inventory_unit_cost: Some(Money::from_cents(30_000)),
            supplier_price: Some(Money::from_cents(35_000)),
            margin: None,
        };
        let orders = vec![order("o-1", at(2024, 3, 1, 10), vec![l.clone()])];

        let report = build_financial_report(period(), &orders, None, utc);
        assert_eq!(report.total_revenue.cents(), 100_000);
        assert_eq!(report.total_costs.cents(), 60_000);
        assert_eq!(report.gross_profit.cents(), 40_000);
        assert_close(report.profit_margin, 40.0);
        assert_eq!(report.cost_coverage.inventory_cost, 1);

        // Drop the inventory cost: supplier price $350.00/unit takes over
        l.cost_sources.inventory_unit_cost = None;
        let orders = vec![order("o-1", at(2024, 3, 1, 10), vec![l])];

        let report = build_financial_report(period(), &orders, None, utc);
        assert_eq!(report.total_costs.cents(), 70_000);
        assert_eq!(report.gross_profit.cents(), 30_000);
        assert_close(report.profit_margin, 30.0);
        assert_eq!(report.cost_coverage.supplier_price, 1);
    }

    #[test]
    fn test_totals_are_consistent_across_months() {
        let utc = offset_from_minutes(0);
        let orders = vec![
            order("o-1", at(2024, 1, 15, 9), vec![line("p-1", 1, 1_999)]),
            order("o-2", at(2024, 1, 20, 9), vec![line("p-2", 3, 1_001)]),
            order("o-3", at(2024, 2, 2, 9), vec![line("p-1", 2, 2_500)]),
        ];

        let report = build_financial_report(period(), &orders, Some(Rate::from_bps(3_000)), utc);

        let month_sum: Money = report.revenue_by_month.values().map(|m| m.revenue).sum();
        assert_eq!(month_sum, report.total_revenue);
        assert_eq!(report.gross_profit, report.total_revenue - report.total_costs);
        assert_close(
            report.profit_margin,
            report.gross_profit.cents() as f64 / report.total_revenue.cents() as f64 * 100.0,
        );
        assert_eq!(report.revenue_by_month["2024-01"].orders, 2);
        assert_eq!(report.revenue_by_month["2024-02"].orders, 1);
        assert_eq!(report.cost_coverage.default_margin, 3);
    }

    #[test]
    fn test_only_paid_orders_in_period_count() {
        let utc = offset_from_minutes(0);
        let mut unpaid = order("o-2", at(2024, 5, 1, 0), vec![line("p-1", 1, 500)]);
        unpaid.payment_status = PaymentStatus::Pending;
        let outside = order("o-3", at(2023, 12, 31, 0), vec![line("p-1", 1, 500)]);
        let paid = order("o-1", at(2024, 5, 1, 0), vec![line("p-1", 1, 700)]);

        let report = build_financial_report(period(), &[paid, unpaid, outside], None, utc);
        assert_eq!(report.order_count, 1);
        assert_eq!(report.total_revenue.cents(), 700);
        // No cost source at all: revenue is pure "profit"
        assert_eq!(report.cost_coverage.no_cost, 1);
        assert_close(report.profit_margin, 100.0);
    }

    #[test]
    fn test_empty_period_has_zero_margin_and_average() {
        let report = build_financial_report(period(), &[], None, offset_from_minutes(0));
        assert_eq!(report.total_revenue, Money::zero());
        assert_eq!(report.profit_margin, 0.0);
        assert_eq!(report.average_order_value, Money::zero());
        assert!(report.revenue_by_month.is_empty());
    }

    #[test]
    fn test_payment_method_grouping() {
        let utc = offset_from_minutes(0);
        let mut cash = order("o-1", at(2024, 4, 1, 0), vec![line("p-1", 1, 1_000)]);
        cash.payment_method = Some("cash".to_string());
        let mut blank = order("o-2", at(2024, 4, 2, 0), vec![line("p-1", 1, 2_000)]);
        blank.payment_method = Some("  ".to_string());
        let mut missing = order("o-3", at(2024, 4, 3, 0), vec![line("p-1", 1, 3_000)]);
        missing.payment_method = None;

        let report = build_financial_report(period(), &[cash, blank, missing], None, utc);
        assert_eq!(report.payment_methods["cash"].count, 1);
        assert_eq!(report.payment_methods[UNKNOWN_PAYMENT_METHOD].count, 2);
        assert_eq!(report.payment_methods[UNKNOWN_PAYMENT_METHOD].amount.cents(), 5_000);
        assert_eq!(report.average_order_value.cents(), 2_000);
    }

    #[test]
    fn test_json_shape_for_dashboard() {
        let orders = vec![order("o-1", at(2024, 3, 1, 10), vec![line("p-1", 2, 50_000)])];
        let report = build_financial_report(period(), &orders, None, offset_from_minutes(0));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["totalRevenue"], 100_000);
        assert_eq!(json["costCoverage"]["noCost"], 1);
        assert_eq!(json["revenueByMonth"]["2024-03"]["orders"], 1);
        assert!(json["period"]["start"].is_string());
    }
}
