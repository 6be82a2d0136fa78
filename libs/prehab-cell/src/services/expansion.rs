// libs/prehab-cell/src/services/expansion.rs
use chrono::{Duration, NaiveDate};
use tracing::debug;

use template_cell::models::ScheduleTemplate;

use crate::models::{PrehabError, ScheduledItemDraft};

/// Expands a schedule template into the concrete calendar of scheduled item
/// drafts for one enrollment. Pure date arithmetic; the service layer owns
/// persistence.
pub struct ScheduleExpander;

impl ScheduleExpander {
    /// Materialize every occurrence dictated by the template, starting at
    /// `init_date` (day 1 of week 1).
    ///
    /// Day-distribution policy: the `k` weekly occurrences of an item are
    /// spread evenly across the week, occurrence `i` landing on day
    /// `1 + (7 * i) / k`. For `k <= 7` that mapping is strictly increasing,
    /// so the chosen days are always distinct.
    pub fn expand(
        template: &ScheduleTemplate,
        init_date: NaiveDate,
    ) -> Result<Vec<ScheduledItemDraft>, PrehabError> {
        let mut drafts = Vec::new();
        let mut sequence = 0;

        for week in &template.weeks {
            if week.week_number < 1 || week.week_number > template.number_of_weeks {
                return Err(PrehabError::ValidationError(format!(
                    "Week number {} outside 1..={}",
                    week.week_number, template.number_of_weeks
                )));
            }

            for entry in &week.entries {
                if entry.times_per_week < 1 || entry.times_per_week > 7 {
                    return Err(PrehabError::ValidationError(format!(
                        "times_per_week must be within 1..=7, got {}",
                        entry.times_per_week
                    )));
                }

                for day_number in Self::distribute_days(entry.times_per_week) {
                    let day_offset = 7 * (week.week_number - 1) + (day_number - 1);
                    drafts.push(ScheduledItemDraft {
                        week_number: week.week_number,
                        day_number,
                        item_id: entry.item_id,
                        item_kind: entry.item_kind,
                        sequence,
                        expected_repetitions: entry.repetition_count,
                        scheduled_date: init_date + Duration::days(day_offset as i64),
                    });
                    sequence += 1;
                }
            }
        }

        debug!(
            "Expanded template {} into {} scheduled items",
            template.id,
            drafts.len()
        );

        Ok(drafts)
    }

    /// Days of week (1..=7) for `times_per_week` occurrences, evenly spread
    /// starting at day 1.
    fn distribute_days(times_per_week: i32) -> Vec<i32> {
        (0..times_per_week)
            .map(|occurrence| 1 + (7 * occurrence) / times_per_week)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use chrono::Utc;
    use uuid::Uuid;

    use template_cell::models::{ItemKind, TemplateEntry, TemplateWeek};

    fn template(number_of_weeks: i32, weeks: Vec<TemplateWeek>) -> ScheduleTemplate {
        ScheduleTemplate {
            id: Uuid::new_v4(),
            title: "Hip replacement prep".to_string(),
            number_of_weeks,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            weeks,
        }
    }

    fn entry(times_per_week: i32) -> TemplateEntry {
        TemplateEntry {
            item_id: Uuid::new_v4(),
            item_kind: ItemKind::Task,
            times_per_week,
            repetition_count: Some(12),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_expansion_count_matches_weekly_frequencies() {
        let t = template(
            2,
            vec![
                TemplateWeek { week_number: 1, entries: vec![entry(3), entry(2)] },
                TemplateWeek { week_number: 2, entries: vec![entry(7)] },
            ],
        );

        let drafts = ScheduleExpander::expand(&t, date(2026, 3, 2)).unwrap();
        assert_eq!(drafts.len(), 3 + 2 + 7);
    }

    #[test]
    fn test_five_times_a_week_lands_on_distinct_days_in_range() {
        let t = template(
            1,
            vec![TemplateWeek { week_number: 1, entries: vec![entry(5)] }],
        );

        let init = date(2018, 5, 22);
        let drafts = ScheduleExpander::expand(&t, init).unwrap();

        assert_eq!(drafts.len(), 5);
        let days: HashSet<i32> = drafts.iter().map(|d| d.day_number).collect();
        assert_eq!(days.len(), 5);
        for draft in &drafts {
            assert!((1..=7).contains(&draft.day_number));
            assert!(draft.scheduled_date >= init);
            assert!(draft.scheduled_date <= date(2018, 5, 28));
        }
    }

    #[test]
    fn test_scheduled_date_non_decreasing_in_week_day_order() {
        let t = template(
            3,
            vec![
                TemplateWeek { week_number: 1, entries: vec![entry(4)] },
                TemplateWeek { week_number: 2, entries: vec![entry(6)] },
                TemplateWeek { week_number: 3, entries: vec![entry(1)] },
            ],
        );

        let mut drafts = ScheduleExpander::expand(&t, date(2026, 1, 5)).unwrap();
        drafts.sort_by_key(|d| (d.week_number, d.day_number));

        for pair in drafts.windows(2) {
            assert!(pair[0].scheduled_date <= pair[1].scheduled_date);
        }
    }

    #[test]
    fn test_daily_item_covers_whole_week() {
        let t = template(
            1,
            vec![TemplateWeek { week_number: 1, entries: vec![entry(7)] }],
        );

        let drafts = ScheduleExpander::expand(&t, date(2026, 3, 2)).unwrap();
        let days: Vec<i32> = drafts.iter().map(|d| d.day_number).collect();
        assert_eq!(days, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_sequence_is_dense_and_ordered() {
        let t = template(
            2,
            vec![
                TemplateWeek { week_number: 1, entries: vec![entry(2)] },
                TemplateWeek { week_number: 2, entries: vec![entry(3)] },
            ],
        );

        let drafts = ScheduleExpander::expand(&t, date(2026, 3, 2)).unwrap();
        let sequences: Vec<i32> = drafts.iter().map(|d| d.sequence).collect();
        assert_eq!(sequences, (0..5).collect::<Vec<i32>>());
    }

    #[test]
    fn test_expected_repetitions_carried_from_template() {
        let mut meal = entry(2);
        meal.item_kind = ItemKind::Meal;
        meal.repetition_count = None;

        let t = template(
            1,
            vec![TemplateWeek { week_number: 1, entries: vec![entry(1), meal] }],
        );

        let drafts = ScheduleExpander::expand(&t, date(2026, 3, 2)).unwrap();
        assert_eq!(drafts[0].expected_repetitions, Some(12));
        assert_eq!(drafts[1].expected_repetitions, None);
        assert_eq!(drafts[1].item_kind, ItemKind::Meal);
    }

    #[test]
    fn test_times_per_week_above_seven_rejected() {
        let t = template(
            1,
            vec![TemplateWeek { week_number: 1, entries: vec![entry(8)] }],
        );

        assert!(matches!(
            ScheduleExpander::expand(&t, date(2026, 3, 2)),
            Err(PrehabError::ValidationError(_))
        ));
    }

    #[test]
    fn test_week_number_beyond_plan_length_rejected() {
        let t = template(
            1,
            vec![TemplateWeek { week_number: 2, entries: vec![entry(1)] }],
        );

        assert!(matches!(
            ScheduleExpander::expand(&t, date(2026, 3, 2)),
            Err(PrehabError::ValidationError(_))
        ));
    }

    #[test]
    fn test_second_week_dates_shift_by_seven_days() {
        let t = template(
            2,
            vec![
                TemplateWeek { week_number: 1, entries: vec![entry(1)] },
                TemplateWeek { week_number: 2, entries: vec![entry(1)] },
            ],
        );

        let drafts = ScheduleExpander::expand(&t, date(2026, 3, 2)).unwrap();
        assert_eq!(drafts[0].scheduled_date, date(2026, 3, 2));
        assert_eq!(drafts[1].scheduled_date, date(2026, 3, 9));
    }
}
