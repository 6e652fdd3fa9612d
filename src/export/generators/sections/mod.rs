//! Section builders.
//!
//! Each builder turns typed records into a ready-made WordprocessingML
//! fragment. Records without content are filtered and an empty section
//! renders the "Não se aplica." placeholder instead of an empty table.

pub mod activities;
pub mod financial;
pub mod indicators;
pub mod professionals;
pub mod schedule;

pub use activities::build_activities;
pub use financial::{
    build_category_table, build_disbursement_schedule, build_financial_summary,
    build_monthly_distribution, build_other_expenses_summary,
};
pub use indicators::{checkbox_markers, indicator_markers, trl_markers};
pub use professionals::build_professionals;
pub use schedule::build_schedule;

use crate::export::generators::finance::CostCategory;
use crate::export::model::PlanData;

pub const FINANCIAL_SUMMARY_TABLE: &str = "financial_summary_table";
pub const OTHER_EXPENSES_SUMMARY_TABLE: &str = "other_expenses_summary_table";
pub const MONTHLY_DISTRIBUTION_TABLE: &str = "monthly_distribution_table";
pub const DISBURSEMENT_SCHEDULE_TABLE: &str = "disbursement_schedule_table";
pub const SCHEDULE_TABLE: &str = "schedule_table";

/// Every table tag the template may carry, in document order.
pub const TABLE_TAGS: [&str; 13] = [
    FINANCIAL_SUMMARY_TABLE,
    "equipment_table",
    "materials_table",
    "software_table",
    "services_table",
    "personnel_table",
    "scholarships_table",
    "travel_table",
    "other_expenses_table",
    OTHER_EXPENSES_SUMMARY_TABLE,
    MONTHLY_DISTRIBUTION_TABLE,
    DISBURSEMENT_SCHEDULE_TABLE,
    SCHEDULE_TABLE,
];

/// Build the markup for every table tag.
pub fn build_tables(plan: &PlanData, months: u32) -> Vec<(&'static str, String)> {
    let financial = plan.financial.clone().unwrap_or_default();

    let mut tables = vec![(
        FINANCIAL_SUMMARY_TABLE,
        build_financial_summary(&financial, months),
    )];
    for category in CostCategory::ALL {
        tables.push((
            category.table_tag(),
            build_category_table(category, &financial, months),
        ));
    }
    tables.push((
        OTHER_EXPENSES_SUMMARY_TABLE,
        build_other_expenses_summary(&financial),
    ));
    tables.push((
        MONTHLY_DISTRIBUTION_TABLE,
        build_monthly_distribution(&financial, months),
    ));
    tables.push((
        DISBURSEMENT_SCHEDULE_TABLE,
        build_disbursement_schedule(&financial, months),
    ));
    tables.push((
        SCHEDULE_TABLE,
        build_schedule(&plan.activities, &plan.schedule_overrides, plan.start_date),
    ));
    tables
}
