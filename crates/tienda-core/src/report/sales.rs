//! Sales report: completed-order volume per day, ISO week or month, plus the
//! best-selling products and categories.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use ts_rs::TS;

use super::{day_key, month_key, week_key, ReportOrder, ReportPeriod};
use crate::error::ValidationError;
use crate::money::Money;
use crate::types::split_categories;
use crate::TOP_N;

// =============================================================================
// Grouping
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SalesGrouping {
    Day,
    Week,
    #[default]
    Month,
}

impl SalesGrouping {
    pub fn key(&self, at: DateTime<Utc>, tz: FixedOffset) -> String {
        match self {
            SalesGrouping::Day => day_key(at, tz),
            SalesGrouping::Week => week_key(at, tz),
            SalesGrouping::Month => month_key(at, tz),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SalesGrouping::Day => "day",
            SalesGrouping::Week => "week",
            SalesGrouping::Month => "month",
        }
    }
}

impl FromStr for SalesGrouping {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" => Ok(SalesGrouping::Day),
            "week" => Ok(SalesGrouping::Week),
            "month" => Ok(SalesGrouping::Month),
            _ => Err(ValidationError::NotAllowed {
                field: "groupBy".to_string(),
                allowed: vec!["day".to_string(), "week".to_string(), "month".to_string()],
            }),
        }
    }
}

// =============================================================================
// Report Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SalesReport {
    pub period: ReportPeriod,
    pub group_by: SalesGrouping,
    pub total_sales: Money,
    pub order_count: u64,
    pub average_order_value: Money,
    /// Ascending by bucket key.
    pub sales_by_period: Vec<SalesBucket>,
    pub top_products: Vec<ProductSales>,
    /// A line whose product has several categories counts in each of them,
    /// so these amounts can sum to more than `total_sales`.
    pub sales_by_category: Vec<CategorySales>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SalesBucket {
    pub period: String,
    pub sales: Money,
    pub orders: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductSales {
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub revenue: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CategorySales {
    pub category: String,
    pub quantity: i64,
    pub revenue: Money,
}

// =============================================================================
// Builder
// =============================================================================

/// Builds the sales report over completed orders (CONFIRMED or COMPLETED)
/// created inside `period`.
pub fn build_sales_report(
    period: ReportPeriod,
    orders: &[ReportOrder],
    grouping: SalesGrouping,
    tz: FixedOffset,
) -> SalesReport {
    let mut total_sales = Money::zero();
    let mut order_count = 0u64;
    let mut buckets: BTreeMap<String, SalesBucket> = BTreeMap::new();
    let mut products: HashMap<&str, ProductSales> = HashMap::new();
    let mut categories: HashMap<String, CategorySales> = HashMap::new();

    let completed = orders
        .iter()
        .filter(|o| o.status.is_completed() && period.contains(o.created_at));

    for order in completed {
        order_count += 1;
        total_sales += order.total;

        let key = grouping.key(order.created_at, tz);
        let bucket = buckets.entry(key.clone()).or_insert_with(|| SalesBucket {
            period: key,
            ..Default::default()
        });
        bucket.sales += order.total;
        bucket.orders += 1;

        for line in &order.lines {
            let revenue = line.revenue();

            let product = products
                .entry(line.product_id.as_str())
                .or_insert_with(|| ProductSales {
                    product_id: line.product_id.clone(),
                    name: line.product_name.clone(),
                    quantity: 0,
                    revenue: Money::zero(),
                });
            product.quantity += line.quantity;
            product.revenue += revenue;

            for category in split_categories(&line.categories) {
                let entry = categories
                    .entry(category.clone())
                    .or_insert_with(|| CategorySales {
                        category,
                        quantity: 0,
                        revenue: Money::zero(),
                    });
                entry.quantity += line.quantity;
                entry.revenue += revenue;
            }
        }
    }

    let mut top_products: Vec<ProductSales> = products.into_values().collect();
    top_products.sort_by(|a, b| {
        b.revenue
            .cmp(&a.revenue)
            .then_with(|| a.product_id.cmp(&b.product_id))
    });
    top_products.truncate(TOP_N);

    let mut sales_by_category: Vec<CategorySales> = categories.into_values().collect();
    sales_by_category.sort_by(|a, b| {
        b.revenue
            .cmp(&a.revenue)
            .then_with(|| a.category.cmp(&b.category))
    });

    SalesReport {
        period,
        group_by: grouping,
        total_sales,
        order_count,
        average_order_value: total_sales.divide_rounded(order_count as i64),
        sales_by_period: buckets.into_values().collect(),
        top_products,
        sales_by_category,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
