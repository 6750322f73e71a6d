//! User report: signups, active customers, roles and the best customers by
//! lifetime spend.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use ts_rs::TS;

use super::{day_key, ReportPeriod};
use crate::money::Money;
use crate::types::{Order, User, UserRole};
use crate::TOP_N;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserReport {
    /// `None` means all time.
    pub period: Option<ReportPeriod>,
    pub total_users: u64,
    pub new_users: u64,
    pub active_users: u64,
    /// One point per signup day, ascending.
    pub user_growth: Vec<GrowthPoint>,
    pub role_distribution: Vec<RoleCount>,
    pub top_customers: Vec<CustomerSpend>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GrowthPoint {
    pub date: String,
    pub new_users: u64,
    /// Total users signed up by the end of `date`.
    pub cumulative: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RoleCount {
    pub role: UserRole,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CustomerSpend {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub order_count: u64,
    pub total_spent: Money,
}

/// Builds the user report.
///
/// - `new_users` and `user_growth` cover signups inside `period`; the growth
///   curve starts from the users who signed up before it
/// - `active_users` counts distinct users with a completed order in `period`
/// - `top_customers` ranks by lifetime completed spend, ignoring `period`
pub fn build_user_report(
    period: Option<ReportPeriod>,
    users: &[User],
    orders: &[Order],
    tz: FixedOffset,
) -> UserReport {
    let in_period = |at: DateTime<Utc>| period.map_or(true, |p: ReportPeriod| p.contains(at));

    // Signups
    let baseline = match period {
        Some(p) => users.iter().filter(|u| u.created_at < p.start).count() as u64,
        None => 0,
    };
    let mut signups_by_day: BTreeMap<String, u64> = BTreeMap::new();
    for user in users.iter().filter(|u| in_period(u.created_at)) {
        *signups_by_day.entry(day_key(user.created_at, tz)).or_default() += 1;
    }
    let new_users = signups_by_day.values().sum();

    let mut cumulative = baseline;
    let user_growth = signups_by_day
        .into_iter()
        .map(|(date, count)| {
            cumulative += count;
            GrowthPoint {
                date,
                new_users: count,
                cumulative,
            }
        })
        .collect();

    // Roles
    let mut roles: BTreeMap<UserRole, u64> = BTreeMap::new();
    for user in users {
        *roles.entry(user.role).or_default() += 1;
    }
    let role_distribution = roles
        .into_iter()
        .map(|(role, count)| RoleCount { role, count })
        .collect();

    // Customers
    let completed: Vec<(&str, &Order)> = orders
        .iter()
        .filter(|o| o.status.is_completed())
        .filter_map(|o| o.user_id.as_deref().map(|uid| (uid, o)))
        .collect();

    let active_users = completed
        .iter()
        .filter(|(_, o)| in_period(o.created_at))
        .map(|(uid, _)| *uid)
        .collect::<HashSet<_>>()
        .len() as u64;

    let mut spend: HashMap<&str, (u64, Money)> = HashMap::new();
    for (uid, order) in &completed {
        let entry = spend.entry(*uid).or_insert((0, Money::zero()));
        entry.0 += 1;
        entry.1 += order.total;
    }

    let by_id: HashMap<&str, &User> = users.iter().map(|u| (u.id.as_str(), u)).collect();
    let mut top_customers: Vec<CustomerSpend> = spend
        .into_iter()
        .filter_map(|(uid, (order_count, total_spent))| {
            by_id.get(uid).map(|user| CustomerSpend {
                user_id: user.id.clone(),
                name: user.name.clone(),
                email: user.email.clone(),
                order_count,
                total_spent,
            })
        })
        .collect();
    top_customers.sort_by(|a, b| {
        b.total_spent
            .cmp(&a.total_spent)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    top_customers.truncate(TOP_N);

    UserReport {
        period,
        total_users: users.len() as u64,
        new_users,
        active_users,
        user_growth,
        role_distribution,
        top_customers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::offset_from_minutes;
    use crate::report::tests::at;
    use crate::types::{OrderStatus, PaymentStatus};

    fn user(id: &str, role: UserRole, created_at: DateTime<Utc>) -> User {
        User {
            id: id.to_string(),
            name: format!("User {id}"),
            email: format!("{id}@example.com"),
            role,
            commission: None,
            created_at,
        }
    }

    fn order(user_id: &str, cents: i64, status: OrderStatus, created_at: DateTime<Utc>) -> Order {
        Order {
            id: format!("o-{user_id}-{cents}"),
            user_id: Some(user_id.to_string()),
            customer_name: user_id.to_string(),
            customer_email: format!("{user_id}@example.com"),
            customer_phone: None,
            customer_address: None,
            total: Money::from_cents(cents),
            status,
            payment_status: PaymentStatus::Paid,
            payment_method: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn test_growth_is_cumulative_from_baseline() {
        let users = vec![
            user("u-0", UserRole::Admin, at(2023, 12, 1, 0)),
            user("u-1", UserRole::Customer, at(2024, 1, 2, 9)),
            user("u-2", UserRole::Customer, at(2024, 1, 2, 15)),
            user("u-3", UserRole::Seller, at(2024, 1, 5, 9)),
        ];
        let period = ReportPeriod::new(at(2024, 1, 1, 0), at(2024, 1, 31, 0));

        let report = build_user_report(Some(period), &users, &[], offset_from_minutes(0));
        assert_eq!(report.total_users, 4);
        assert_eq!(report.new_users, 3);
        assert_eq!(
            report.user_growth,
            vec![
                GrowthPoint { date: "2024-01-02".to_string(), new_users: 2, cumulative: 3 },
                GrowthPoint { date: "2024-01-05".to_string(), new_users: 1, cumulative: 4 },
            ]
        );
        assert_eq!(
            report.role_distribution,
            vec![
                RoleCount { role: UserRole::Admin, count: 1 },
                RoleCount { role: UserRole::Seller, count: 1 },
                RoleCount { role: UserRole::Customer, count: 2 },
            ]
        );
    }

    #[test]
    fn test_active_users_and_top_customers() {
        let users = vec![
            user("u-1", UserRole::Customer, at(2023, 1, 1, 0)),
            user("u-2", UserRole::Customer, at(2023, 1, 1, 0)),
            user("u-3", UserRole::Customer, at(2023, 1, 1, 0)),
        ];
        let orders = vec![
            // Lifetime spend counts even outside the period
            order("u-1", 9_000, OrderStatus::Completed, at(2023, 6, 1, 0)),
            order("u-1", 1_000, OrderStatus::Confirmed, at(2024, 1, 10, 0)),
            order("u-2", 5_000, OrderStatus::Completed, at(2024, 1, 11, 0)),
            order("u-2", 5_000, OrderStatus::Completed, at(2024, 1, 12, 0)),
            order("u-3", 50_000, OrderStatus::Cancelled, at(2024, 1, 12, 0)),
        ];
        let period = ReportPeriod::new(at(2024, 1, 1, 0), at(2024, 1, 31, 0));

        let report = build_user_report(Some(period), &users, &orders, offset_from_minutes(0));
        assert_eq!(report.new_users, 0);
        assert_eq!(report.active_users, 2);

        // u-1 and u-2 tie on $100.00; the id breaks the tie
        assert_eq!(report.top_customers.len(), 2);
        assert_eq!(report.top_customers[0].user_id, "u-1");
        assert_eq!(report.top_customers[0].total_spent.cents(), 10_000);
        assert_eq!(report.top_customers[1].order_count, 2);
    }

    #[test]
    fn test_without_period_counts_everyone() {
        let users = vec![user("u-1", UserRole::Customer, at(2020, 1, 1, 0))];
        let report = build_user_report(None, &users, &[], offset_from_minutes(0));
        assert_eq!(report.new_users, 1);
        assert_eq!(report.user_growth[0].cumulative, 1);
    }
}
