/// Dashboard summary endpoint
use crate::{
    activity::ActivityRecord,
    auth::AuthContext,
    context::AppContext,
    error::PantryResult,
    ledger::pantry::PantryItemView,
};
use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use serde::Serialize;

const RECENT_ACTIVITY_LIMIT: i64 = 5;
const LOW_STOCK_LIMIT: i64 = 5;

/// Build dashboard routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/dashboard/stats", get(stats))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardCounts {
    pantry_items: i64,
    grocery_items: i64,
    meals_this_week: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardStats {
    stats: DashboardCounts,
    recent_activity: Vec<ActivityRecord>,
    low_stock_items: Vec<PantryItemView>,
}

/// Sunday 00:00 UTC of the week containing `now`, and seven days later
fn week_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let days_since_sunday = i64::from(now.weekday().num_days_from_sunday());
    let start = (now - Duration::days(days_since_sunday))
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_utc();
    (start, start + Duration::days(7))
}

async fn stats(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> PantryResult<Json<DashboardStats>> {
    let owner = auth.account_id.as_str();
    let (week_start, week_end) = week_bounds(Utc::now());

    let (pantry_items, grocery_items, meals_this_week, recent_activity, low_stock) = futures::try_join!(
        ctx.pantry.count(owner),
        ctx.grocery.count(owner),
        ctx.meals.count_between(owner, week_start, week_end),
        ctx.activity.recent(owner, RECENT_ACTIVITY_LIMIT),
        ctx.pantry.low_stock(owner, LOW_STOCK_LIMIT),
    )?;

    Ok(Json(DashboardStats {
        stats: DashboardCounts {
            pantry_items,
            grocery_items,
            meals_this_week,
        },
        recent_activity,
        low_stock_items: low_stock.into_iter().map(|i| i.view()).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_week_bounds_midweek() {
        // Wednesday
        let now = Utc.with_ymd_and_hms(2025, 3, 12, 15, 30, 0).unwrap();
        let (start, end) = week_bounds(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 9, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 3, 16, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_week_bounds_on_sunday() {
        let now = Utc.with_ymd_and_hms(2025, 3, 9, 0, 0, 1).unwrap();
        let (start, _) = week_bounds(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 9, 0, 0, 0).unwrap());
    }
}
