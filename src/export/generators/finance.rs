//! Financial computation layer.
//!
//! Pure functions behind the financial tables. Percentages are stored as whole
//! numbers and are fractions of the grossed-up total, so the gross value is
//! recovered backwards from the net subtotal:
//! `total = subtotal / (1 - tax% - overhead% - reserve%)`.

use chrono::{Datelike, NaiveDate};

use crate::export::model::{
    EquipmentItem, ExpenseItem, FinancialConfig, FinancialData, PersonnelItem,
};

/// Whole calendar months spanned by the inclusive range `start..=end`.
///
/// Returns zero when either date is missing or `end` precedes `start`.
pub fn project_month_count(start: Option<NaiveDate>, end: Option<NaiveDate>) -> u32 {
    let (Some(start), Some(end)) = (start, end) else {
        return 0;
    };
    if end < start {
        return 0;
    }
    let months = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32 + 1;
    months.max(0) as u32
}

/// Project month (1-based) in which `date` falls, relative to `project_start`.
pub fn month_index(project_start: NaiveDate, date: NaiveDate) -> Option<u32> {
    if date < project_start {
        return None;
    }
    let months = (date.year() - project_start.year()) * 12 + date.month() as i32
        - project_start.month() as i32;
    Some(months as u32 + 1)
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

pub fn equipment_line_total(item: &EquipmentItem) -> f64 {
    non_negative(item.quantity) * non_negative(item.unit_cost)
}

pub fn personnel_line_total(item: &PersonnelItem, months: u32) -> f64 {
    (non_negative(item.base_salary) + non_negative(item.monthly_charges)) * months as f64
}

pub fn expense_line_total(item: &ExpenseItem) -> f64 {
    non_negative(item.quantity) * non_negative(item.unit_cost)
}

/// Breakdown of a grossed-up amount.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Allocation {
    pub net: f64,
    pub total: f64,
    pub tax: f64,
    pub overhead: f64,
    pub reserve: f64,
}

impl Allocation {
    /// Amount left for execution after all deductions.
    pub fn executable(&self) -> f64 {
        self.total - self.tax - self.overhead - self.reserve
    }

    /// Invoice value net of taxes.
    pub fn net_of_tax(&self) -> f64 {
        self.total - self.tax
    }
}

/// Gross up a net subtotal. A non-positive divisor means the percentages
/// consume the whole total; the subtotal is then treated as already gross.
pub fn gross_up_total(net: f64, tax_pct: f64, overhead_pct: f64, reserve_pct: f64) -> f64 {
    let net = if net.is_finite() { net } else { 0.0 };
    let divisor = 1.0 - (tax_pct + overhead_pct + reserve_pct) / 100.0;
    if !divisor.is_finite() || divisor <= 0.0 {
        return net;
    }
    net / divisor
}

/// Gross up `net` and split the total into its percentage shares.
pub fn allocate(net: f64, config: &FinancialConfig) -> Allocation {
    let total = gross_up_total(
        net,
        config.service_tax_pct,
        config.overhead_pct,
        config.reserve_pct,
    );
    Allocation {
        net,
        total,
        tax: total * config.service_tax_pct / 100.0,
        overhead: total * config.overhead_pct / 100.0,
        reserve: total * config.reserve_pct / 100.0,
    }
}

/// Group a cost category belongs to in the summary tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostGroup {
    Direct,
    OtherExpenses,
}

/// Line-item shape of a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostKind {
    Equipment,
    Personnel,
    Expense,
}

/// Expense categories in their fixed presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CostCategory {
    Equipment,
    Materials,
    Software,
    Services,
    Personnel,
    Scholarships,
    Travel,
    OtherExpenses,
}

impl CostCategory {
    pub const ALL: [CostCategory; 8] = [
        CostCategory::Equipment,
        CostCategory::Materials,
        CostCategory::Software,
        CostCategory::Services,
        CostCategory::Personnel,
        CostCategory::Scholarships,
        CostCategory::Travel,
        CostCategory::OtherExpenses,
    ];

    /// Key used by the monthly distribution grid.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Equipment => "equipment",
            Self::Materials => "materials",
            Self::Software => "software",
            Self::Services => "services",
            Self::Personnel => "personnel",
            Self::Scholarships => "scholarships",
            Self::Travel => "travel",
            Self::OtherExpenses => "otherExpenses",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Equipment => "Equipamentos e material permanente",
            Self::Materials => "Material de consumo",
            Self::Software => "Software e licenças",
            Self::Services => "Serviços de terceiros",
            Self::Personnel => "Equipe própria",
            Self::Scholarships => "Bolsas",
            Self::Travel => "Viagens e diárias",
            Self::OtherExpenses => "Outras despesas",
        }
    }

    /// Template tag of the category's detail table.
    pub fn table_tag(&self) -> &'static str {
        match self {
            Self::Equipment => "equipment_table",
            Self::Materials => "materials_table",
            Self::Software => "software_table",
            Self::Services => "services_table",
            Self::Personnel => "personnel_table",
            Self::Scholarships => "scholarships_table",
            Self::Travel => "travel_table",
            Self::OtherExpenses => "other_expenses_table",
        }
    }

    pub fn group(&self) -> CostGroup {
        match self {
            Self::Travel | Self::OtherExpenses => CostGroup::OtherExpenses,
            _ => CostGroup::Direct,
        }
    }

    pub fn kind(&self) -> CostKind {
        match self {
            Self::Equipment | Self::Materials | Self::Software | Self::Services => {
                CostKind::Equipment
            }
            Self::Personnel | Self::Scholarships => CostKind::Personnel,
            Self::Travel | Self::OtherExpenses => CostKind::Expense,
        }
    }

    pub fn equipment_items<'a>(&self, data: &'a FinancialData) -> &'a [EquipmentItem] {
        match self {
            Self::Equipment => &data.equipment,
            Self::Materials => &data.materials,
            Self::Software => &data.software,
            Self::Services => &data.services,
            _ => &[],
        }
    }

    pub fn personnel_items<'a>(&self, data: &'a FinancialData) -> &'a [PersonnelItem] {
        match self {
            Self::Personnel => &data.personnel,
            Self::Scholarships => &data.scholarships,
            _ => &[],
        }
    }

    pub fn expense_items<'a>(&self, data: &'a FinancialData) -> &'a [ExpenseItem] {
        match self {
            Self::Travel => &data.travel,
            Self::OtherExpenses => &data.other_expenses,
            _ => &[],
        }
    }

    /// Sum of the category's line totals.
    pub fn subtotal(&self, data: &FinancialData, months: u32) -> f64 {
        match self.kind() {
            CostKind::Equipment => self
                .equipment_items(data)
                .iter()
                .map(equipment_line_total)
                .sum(),
            CostKind::Personnel => self
                .personnel_items(data)
                .iter()
                .map(|item| personnel_line_total(item, months))
                .sum(),
            CostKind::Expense => self.expense_items(data).iter().map(expense_line_total).sum(),
        }
    }

    /// Value allocated to `month` (1-based) in the pre-computed grid.
    pub fn monthly_value(&self, data: &FinancialData, month: u32) -> Option<f64> {
        let index = month.checked_sub(1)? as usize;
        data.monthly_distribution
            .get(self.key())
            .and_then(|values| values.get(index))
            .copied()
            .filter(|v| v.is_finite())
    }
}

/// Per-category roll-up of a financial data set.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTotals {
    pub values: Vec<(CostCategory, f64)>,
}

impl CategoryTotals {
    pub fn compute(data: &FinancialData, months: u32) -> Self {
        Self {
            values: CostCategory::ALL
                .iter()
                .map(|category| (*category, category.subtotal(data, months)))
                .collect(),
        }
    }

    pub fn get(&self, category: CostCategory) -> f64 {
        self.values
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, v)| *v)
            .unwrap_or(0.0)
    }

    pub fn group_total(&self, group: CostGroup) -> f64 {
        self.values
            .iter()
            .filter(|(c, _)| c.group() == group)
            .map(|(_, v)| v)
            .sum()
    }

    /// Direct costs only.
    pub fn direct(&self) -> f64 {
        self.group_total(CostGroup::Direct)
    }

    /// Direct costs plus other expenses: the net subtotal that gets grossed up.
    pub fn subtotal(&self) -> f64 {
        self.values.iter().map(|(_, v)| v).sum()
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|(_, v)| *v == 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_project_month_count() {
        assert_eq!(project_month_count(date(2025, 1, 1), date(2025, 12, 31)), 12);
        assert_eq!(project_month_count(date(2025, 1, 15), date(2025, 1, 20)), 1);
        assert_eq!(project_month_count(date(2025, 11, 1), date(2026, 2, 28)), 4);
        assert_eq!(project_month_count(date(2025, 5, 1), date(2025, 1, 1)), 0);
        assert_eq!(project_month_count(None, date(2025, 1, 1)), 0);
    }

    #[test]
    fn test_gross_up_matches_backward_formula() {
        let total = gross_up_total(1000.0, 5.0, 10.0, 5.0);
        assert!((total - 1250.0).abs() < 1e-9);
    }

    #[test]
    fn test_gross_up_degenerate_divisor_falls_back() {
        assert_eq!(gross_up_total(1000.0, 50.0, 40.0, 10.0), 1000.0);
        assert_eq!(gross_up_total(1000.0, 80.0, 40.0, 10.0), 1000.0);
    }

    #[test]
    fn test_allocation_shares() {
        let config = FinancialConfig {
            service_tax_pct: 5.0,
            overhead_pct: 10.0,
            reserve_pct: 5.0,
        };
        let allocation = allocate(1000.0, &config);
        assert!((allocation.tax - 62.5).abs() < 1e-9);
        assert!((allocation.overhead - 125.0).abs() < 1e-9);
        assert!((allocation.reserve - 62.5).abs() < 1e-9);
        assert!((allocation.executable() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_line_totals_ignore_negative_inputs() {
        let item = EquipmentItem {
            quantity: -2.0,
            unit_cost: 500.0,
            ..Default::default()
        };
        assert_eq!(equipment_line_total(&item), 0.0);

        let person = PersonnelItem {
            base_salary: 4000.0,
            monthly_charges: 1000.0,
            ..Default::default()
        };
        assert_eq!(personnel_line_total(&person, 0), 0.0);
        assert_eq!(personnel_line_total(&person, 3), 15000.0);
    }

    #[test]
    fn test_month_index() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let d = NaiveDate::from_ymd_opt(2025, 5, 20).unwrap();
        assert_eq!(month_index(start, d), Some(3));
        assert_eq!(month_index(d, start), None);
    }
}
