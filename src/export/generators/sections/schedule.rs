//! Execution schedule grid (activities x 12 months).

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::export::docx::wordml::{placeholder_paragraph, Cell, TableBuilder};
use crate::export::generators::finance::month_index;
use crate::export::model::{Activity, ScheduleCell, SubActivity};

pub const SCHEDULE_MONTHS: u32 = 12;

const SECTION_FILL: &str = "D9D9D9";
const ACTIVE_FILL: &str = "7F7F7F";

/// Resolves whether a schedule cell is active.
///
/// Lookup order for `(activity, sub, month)`: an override for that exact
/// cell, an activity-level override for sub-activity rows, the row's own
/// month list, its own dates, then the parent activity's months and dates.
pub struct ScheduleLookup<'a> {
    overrides: HashMap<(usize, Option<usize>, u32), bool>,
    activities: &'a [Activity],
    project_start: Option<NaiveDate>,
}

impl<'a> ScheduleLookup<'a> {
    pub fn new(
        activities: &'a [Activity],
        overrides: &[ScheduleCell],
        project_start: Option<NaiveDate>,
    ) -> Self {
        // Later cells win when the caller repeats a key.
        let overrides = overrides
            .iter()
            .map(|cell| ((cell.activity, cell.sub_activity, cell.month), cell.active))
            .collect();
        Self {
            overrides,
            activities,
            project_start,
        }
    }

    pub fn is_active(&self, activity: usize, sub: Option<usize>, month: u32) -> bool {
        if let Some(active) = self.overrides.get(&(activity, sub, month)) {
            return *active;
        }
        if sub.is_some() {
            if let Some(active) = self.overrides.get(&(activity, None, month)) {
                return *active;
            }
        }

        let Some(parent) = self.activities.get(activity) else {
            return false;
        };
        if let Some(child) = sub.and_then(|s| parent.sub_activities.get(s)) {
            if let Some(active) = self.default_for(&child.months, child.start_date, child.end_date, month) {
                return active;
            }
        }
        self.default_for(&parent.months, parent.start_date, parent.end_date, month)
            .unwrap_or(false)
    }

    fn default_for(
        &self,
        months: &[u32],
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        month: u32,
    ) -> Option<bool> {
        if !months.is_empty() {
            return Some(months.contains(&month));
        }
        let project_start = self.project_start?;
        let first = month_index(project_start, start?)?;
        let last = end
            .and_then(|end| month_index(project_start, end))
            .unwrap_or(first);
        Some(month >= first && month <= last)
    }
}

fn name_or_number(prefix: &str, name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        prefix.to_string()
    } else {
        format!("{} {}", prefix, name)
    }
}

fn month_cells(lookup: &ScheduleLookup, activity: usize, sub: Option<usize>) -> Vec<Cell> {
    (1..=SCHEDULE_MONTHS)
        .map(|month| {
            let cell = Cell::new("");
            if lookup.is_active(activity, sub, month) {
                cell.shade(ACTIVE_FILL)
            } else {
                cell
            }
        })
        .collect()
}

pub fn build_schedule(
    activities: &[Activity],
    overrides: &[ScheduleCell],
    project_start: Option<NaiveDate>,
) -> String {
    let lookup = ScheduleLookup::new(activities, overrides, project_start);

    let mut widths = vec![2600];
    widths.extend(std::iter::repeat(530).take(SCHEDULE_MONTHS as usize));

    let mut header = vec![Cell::new("Atividade").bold().shade(SECTION_FILL)];
    header.extend(
        (1..=SCHEDULE_MONTHS).map(|m| Cell::new(m.to_string()).bold().center().shade(SECTION_FILL)),
    );
    let mut table = TableBuilder::new(widths).font_size(16).header(header);

    let mut number = 0;
    for (index, activity) in activities.iter().enumerate() {
        if !activity.has_content() {
            continue;
        }
        number += 1;
        let label = name_or_number(&format!("{}.", number), &activity.name);

        let subs: Vec<(usize, &SubActivity)> = activity
            .sub_activities
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_filled())
            .collect();

        if subs.is_empty() {
            let mut row = vec![Cell::new(label)];
            row.extend(month_cells(&lookup, index, None));
            table = table.row(row);
            continue;
        }

        table = table.row(vec![Cell::new(label)
            .bold()
            .shade(SECTION_FILL)
            .span(SCHEDULE_MONTHS as u32 + 1)]);
        for (position, (sub_index, sub)) in subs.iter().enumerate() {
            let sub_label = name_or_number(&format!("{}.{}", number, position + 1), &sub.name);
            let mut row = vec![Cell::new(sub_label)];
            row.extend(month_cells(&lookup, index, Some(*sub_index)));
            table = table.row(row);
        }
    }

    if number == 0 {
        return placeholder_paragraph();
    }
    table.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(months: Vec<u32>) -> Activity {
        Activity {
            name: "Pesquisa".into(),
            months,
            ..Default::default()
        }
    }

    #[test]
    fn test_override_wins_over_default() {
        let activities = vec![activity(vec![3])];
        let overrides = vec![ScheduleCell {
            activity: 0,
            sub_activity: None,
            month: 3,
            active: false,
        }];
        let lookup = ScheduleLookup::new(&activities, &overrides, None);
        assert!(!lookup.is_active(0, None, 3));

        let lookup = ScheduleLookup::new(&activities, &[], None);
        assert!(lookup.is_active(0, None, 3));
        assert!(!lookup.is_active(0, None, 4));
    }

    #[test]
    fn test_sub_activity_falls_back_to_parent_months() {
        let mut a = activity(vec![2, 3]);
        a.sub_activities = vec![
            SubActivity {
                name: "Própria".into(),
                months: vec![5],
                ..Default::default()
            },
            SubActivity {
                name: "Herdada".into(),
                ..Default::default()
            },
        ];
        let activities = vec![a];
        let lookup = ScheduleLookup::new(&activities, &[], None);
        assert!(lookup.is_active(0, Some(0), 5));
        assert!(!lookup.is_active(0, Some(0), 2));
        assert!(lookup.is_active(0, Some(1), 2));
    }

    #[test]
    fn test_months_from_dates() {
        let mut a = activity(vec![]);
        a.start_date = NaiveDate::from_ymd_opt(2025, 3, 10);
        a.end_date = NaiveDate::from_ymd_opt(2025, 5, 2);
        let activities = vec![a];
        let lookup = ScheduleLookup::new(&activities, &[], NaiveDate::from_ymd_opt(2025, 1, 1));
        assert!(!lookup.is_active(0, None, 2));
        assert!(lookup.is_active(0, None, 3));
        assert!(lookup.is_active(0, None, 5));
        assert!(!lookup.is_active(0, None, 6));
    }

    #[test]
    fn test_grid_layout() {
        let mut a = activity(vec![1]);
        a.sub_activities = vec![SubActivity {
            name: "Coleta".into(),
            ..Default::default()
        }];
        let xml = build_schedule(&[a, activity(vec![2])], &[], None);
        // header, section row, sub row, standalone activity row
        assert_eq!(xml.matches("<w:tr>").count(), 4);
        assert!(xml.contains("<w:gridSpan w:val=\"13\"/>"));
        assert!(xml.contains(">1.1 Coleta<"));
        assert!(xml.contains(">2. Pesquisa<"));
        assert_eq!(xml.matches("w:fill=\"7F7F7F\"").count(), 2);
    }

    #[test]
    fn test_empty_schedule_is_placeholder() {
        assert!(build_schedule(&[], &[], None).contains("Não se aplica."));
    }
}
