// libs/prehab-cell/src/services/statistics.rs
use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Role, User};

use crate::models::{Prehab, PrehabError, PrehabReport, ScheduledItem, ScheduledItemStatus};

/// Adherence metrics for a patient's plan, relative to the surgery date.
pub struct StatisticsService {
    supabase: SupabaseClient,
}

impl StatisticsService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Report on the patient's most recent prehab, computed against today.
    pub async fn statistics_for_patient(
        &self,
        user: &User,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<PrehabReport, PrehabError> {
        let prehab = self.find_patient_prehab(patient_id, auth_token).await?;

        match user.role {
            Role::Admin => {}
            Role::Doctor => {
                if prehab.created_by != user.id {
                    return Err(PrehabError::Unauthorized);
                }
            }
            Role::Patient => {
                if prehab.patient_id != user.id {
                    return Err(PrehabError::Unauthorized);
                }
            }
        }

        let items = self.fetch_items(prehab.id, auth_token).await?;
        let today = Utc::now().date_naive();

        Ok(build_report(&prehab, &items, today))
    }

    async fn find_patient_prehab(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Prehab, PrehabError> {
        let path = format!(
            "/rest/v1/prehabs?patient_id=eq.{}&order=created_at.desc&limit=1",
            patient_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PrehabError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(PrehabError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| PrehabError::DatabaseError(format!("Failed to parse prehab: {}", e)))
    }

    async fn fetch_items(
        &self,
        prehab_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<ScheduledItem>, PrehabError> {
        let path = format!(
            "/rest/v1/scheduled_items?prehab_id=eq.{}&order=sequence.asc",
            prehab_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PrehabError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(|value| {
                serde_json::from_value(value).map_err(|e| {
                    PrehabError::DatabaseError(format!("Failed to parse scheduled item: {}", e))
                })
            })
            .collect()
    }
}

/// Build the adherence report for one prehab.
///
/// `days_to_surgery` is `today - surgery_date`, so it is negative for the
/// whole pre-surgery period and the reported countdown is None until the
/// surgery date has passed. The elapsed-item cut compares raw week/day
/// numbers against the Euclidean quotient/remainder of `days_to_surgery`,
/// which before surgery produces a negative current week and therefore an
/// empty (or skewed) elapsed set. Both oddities are inherited behavior,
/// kept bit-for-bit and pinned by the regression tests below until product
/// decides otherwise.
pub fn build_report(prehab: &Prehab, items: &[ScheduledItem], today: NaiveDate) -> PrehabReport {
    let days_to_surgery = (today - prehab.surgery_date).num_days();
    let current_week_number = days_to_surgery.div_euclid(7);
    let current_day_number = days_to_surgery - 7 * current_week_number;

    debug!(
        "Computing report: days_to_surgery={}, current_week={}, current_day={}",
        days_to_surgery, current_week_number, current_day_number
    );

    let elapsed: Vec<&ScheduledItem> = items
        .iter()
        .filter(|item| {
            (item.week_number as i64) <= current_week_number
                && (item.day_number as i64) <= current_day_number
        })
        .collect();

    PrehabReport {
        patient_id: prehab.patient_id,
        prehab_id: prehab.id,
        prehab_week_number: prehab.number_of_weeks,
        prehab_start_date: prehab.init_date,
        prehab_expected_end_date: prehab.expected_end_date(),
        surgery_day: prehab.surgery_date,
        days_until_surgery: (days_to_surgery > 0).then_some(days_to_surgery),
        total_activities: items.len(),
        total_activities_until_now: elapsed.len(),
        activities_done: elapsed
            .iter()
            .filter(|item| item.status == ScheduledItemStatus::Completed)
            .count(),
        activities_with_difficulty: elapsed.iter().filter(|item| item.was_difficult).count(),
        activities_not_done: elapsed
            .iter()
            .filter(|item| item.status == ScheduledItemStatus::NotCompleted)
            .count(),
        prehab_status: prehab.status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use template_cell::models::ItemKind;

    use crate::models::PrehabStatus;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn prehab(init: NaiveDate, surgery: NaiveDate, weeks: i32) -> Prehab {
        Prehab {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            template_id: Uuid::new_v4(),
            init_date: init,
            surgery_date: surgery,
            number_of_weeks: weeks,
            status: PrehabStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(
        prehab_id: Uuid,
        week_number: i32,
        day_number: i32,
        status: ScheduledItemStatus,
        was_difficult: bool,
    ) -> ScheduledItem {
        ScheduledItem {
            id: Uuid::new_v4(),
            prehab_id,
            week_number,
            day_number,
            item_id: Uuid::new_v4(),
            item_kind: ItemKind::Task,
            sequence: (week_number - 1) * 7 + day_number - 1,
            expected_repetitions: Some(10),
            actual_repetitions: None,
            status,
            finished_date: None,
            was_difficult,
            patient_notes: None,
            seen_by_doctor: false,
            doctor_notes: None,
            scheduled_date: date(2026, 5, 4) + Duration::days(((week_number - 1) * 7 + day_number - 1) as i64),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_surgery_ten_days_ahead_reports_null_countdown() {
        let today = date(2026, 6, 5);
        let p = prehab(date(2026, 5, 4), today + Duration::days(10), 4);

        let report = build_report(&p, &[], today);

        assert_eq!(report.days_until_surgery, None);
        assert_eq!(report.total_activities, 0);
    }

    #[test]
    fn test_surgery_passed_reports_positive_countdown_field() {
        let today = date(2026, 6, 20);
        let p = prehab(date(2026, 5, 4), date(2026, 6, 15), 4);

        let report = build_report(&p, &[], today);

        assert_eq!(report.days_until_surgery, Some(5));
    }

    #[test]
    fn test_negative_week_arithmetic_pinned() {
        // Ten days before surgery: days_to_surgery = -10, and the Euclidean
        // split gives week -2, day 4. No positive week number passes the
        // elapsed cut, so nothing counts as elapsed yet.
        let today = date(2026, 6, 5);
        let p = prehab(date(2026, 5, 4), date(2026, 6, 15), 4);
        let items = vec![
            item(p.id, 1, 1, ScheduledItemStatus::Completed, false),
            item(p.id, 1, 5, ScheduledItemStatus::Pending, false),
            item(p.id, 4, 7, ScheduledItemStatus::Pending, false),
        ];

        let report = build_report(&p, &items, today);

        assert_eq!(report.days_until_surgery, None);
        assert_eq!(report.total_activities, 3);
        assert_eq!(report.total_activities_until_now, 0);
        assert_eq!(report.activities_done, 0);
    }

    #[test]
    fn test_elapsed_cut_is_count_based_after_surgery() {
        // 17 days past surgery: week 2, day 3. Items in week <= 2 AND
        // day <= 3 count as elapsed; a week-1 day-5 item does not, even
        // though its calendar date is long past.
        let today = date(2026, 7, 2);
        let p = prehab(date(2026, 5, 4), date(2026, 6, 15), 4);
        let items = vec![
            item(p.id, 1, 1, ScheduledItemStatus::Completed, false),
            item(p.id, 1, 5, ScheduledItemStatus::Completed, false),
            item(p.id, 2, 2, ScheduledItemStatus::NotCompleted, true),
            item(p.id, 3, 1, ScheduledItemStatus::Pending, false),
        ];

        let report = build_report(&p, &items, today);

        assert_eq!(report.days_until_surgery, Some(17));
        assert_eq!(report.total_activities_until_now, 2);
        assert_eq!(report.activities_done, 1);
        assert_eq!(report.activities_not_done, 1);
        assert_eq!(report.activities_with_difficulty, 1);
    }

    #[test]
    fn test_expected_end_date_derived_from_plan_length() {
        let p = prehab(date(2026, 5, 4), date(2026, 6, 15), 4);
        let report = build_report(&p, &[], date(2026, 5, 10));

        assert_eq!(report.prehab_expected_end_date, date(2026, 6, 1));
    }
}
