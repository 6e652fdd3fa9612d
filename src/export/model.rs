//! Plan data consumed by the export engine.
//!
//! The wizard front-end posts these records as camelCase JSON. Decoding is
//! lenient: unset dates arrive as empty strings and numeric inputs sometimes
//! arrive as strings, so both are normalized here rather than rejected.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

use super::generators::rich_text::RichField;

/// Complete input for one export request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanData {
    /// Display name, used for the download file name.
    pub plan_name: String,
    pub company_name: String,
    pub company_cnpj: String,
    pub company_address: String,
    pub company_city: String,
    pub company_state: String,
    pub legal_representative: String,
    pub coordinator_name: String,
    pub coordinator_email: String,
    pub coordinator_phone: String,
    pub project_title: String,
    pub project_acronym: String,
    #[serde(deserialize_with = "lenient_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient_date")]
    pub end_date: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient_f64")]
    pub total_value: f64,
    /// Technology readiness level, 1..=9.
    #[serde(deserialize_with = "lenient_level")]
    pub trl_level: Option<u8>,
    /// Checkbox groups: group key -> selected option keys.
    pub checkboxes: BTreeMap<String, Vec<String>>,
    /// Additional scalar markers passed through verbatim.
    pub extra_fields: BTreeMap<String, String>,
    /// Rich-text fields keyed by their template marker.
    pub rich_fields: BTreeMap<String, RichField>,
    pub activities: Vec<Activity>,
    pub professionals: Vec<Professional>,
    pub indicators: BTreeMap<String, Indicator>,
    pub schedule_overrides: Vec<ScheduleCell>,
    pub financial: Option<FinancialData>,
    /// `data:` URL for the first header logo slot.
    pub company_logo: Option<String>,
    /// `data:` URL for the second header logo slot.
    pub partner_logo: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Activity {
    pub name: String,
    pub description: String,
    pub justification: String,
    #[serde(deserialize_with = "lenient_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient_date")]
    pub end_date: Option<NaiveDate>,
    /// Default active project months (1..=12).
    #[serde(deserialize_with = "lenient_months")]
    pub months: Vec<u32>,
    pub sub_activities: Vec<SubActivity>,
}

impl Activity {
    /// An activity carries content when any of its text or children is filled.
    pub fn has_content(&self) -> bool {
        !self.name.trim().is_empty()
            || !self.description.trim().is_empty()
            || !self.justification.trim().is_empty()
            || self.sub_activities.iter().any(SubActivity::is_filled)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubActivity {
    pub name: String,
    pub description: String,
    #[serde(deserialize_with = "lenient_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient_date")]
    pub end_date: Option<NaiveDate>,
    /// Own active months; falls back to the parent's when empty.
    #[serde(deserialize_with = "lenient_months")]
    pub months: Vec<u32>,
}

impl SubActivity {
    /// A sub-activity is unfilled only when both name and description are blank.
    pub fn is_filled(&self) -> bool {
        !self.name.trim().is_empty() || !self.description.trim().is_empty()
    }
}

/// Role class of a professional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProfessionalCategory {
    Coordinator,
    Researcher,
    Technician,
    Support,
    Scholarship,
    #[default]
    #[serde(other)]
    Other,
}

impl ProfessionalCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Coordinator => "Coordenador(a)",
            Self::Researcher => "Pesquisador(a)",
            Self::Technician => "Técnico(a)",
            Self::Support => "Apoio administrativo",
            Self::Scholarship => "Bolsista",
            Self::Other => "Colaborador(a)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Engagement {
    Direct,
    Indirect,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Professional {
    pub name: String,
    pub category: ProfessionalCategory,
    pub education: String,
    pub degree: String,
    pub mini_bio: String,
    pub role: String,
    pub activities: String,
    pub hiring_type: String,
    /// Blank or unrecognised values decode as `None`.
    #[serde(deserialize_with = "lenient_enum")]
    pub engagement: Option<Engagement>,
}

impl Professional {
    pub fn has_content(&self) -> bool {
        !self.name.trim().is_empty() || !self.role.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Indicator {
    pub enabled: bool,
    #[serde(deserialize_with = "lenient_f64")]
    pub quantity: f64,
}

/// One sparse schedule cell. Indices are zero-based positions in the
/// activity and sub-activity sequences.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleCell {
    pub activity: usize,
    #[serde(default)]
    pub sub_activity: Option<usize>,
    #[serde(deserialize_with = "lenient_month")]
    pub month: u32,
    pub active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EquipmentItem {
    pub name: String,
    pub activity: String,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub quantity: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub unit_cost: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonnelItem {
    pub name: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub base_salary: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub monthly_charges: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub hourly_cost: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub total_hours: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExpenseItem {
    pub description: String,
    #[serde(rename = "type")]
    pub expense_type: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub quantity: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub unit_cost: f64,
}

/// Whole-number percentages applied to the grossed-up total.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FinancialConfig {
    #[serde(alias = "tax", deserialize_with = "lenient_f64")]
    pub service_tax_pct: f64,
    #[serde(alias = "overhead", deserialize_with = "lenient_f64")]
    pub overhead_pct: f64,
    #[serde(alias = "reserve", deserialize_with = "lenient_f64")]
    pub reserve_pct: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FinancialData {
    pub equipment: Vec<EquipmentItem>,
    pub materials: Vec<EquipmentItem>,
    pub software: Vec<EquipmentItem>,
    pub services: Vec<EquipmentItem>,
    pub personnel: Vec<PersonnelItem>,
    pub scholarships: Vec<PersonnelItem>,
    pub travel: Vec<ExpenseItem>,
    pub other_expenses: Vec<ExpenseItem>,
    pub config: FinancialConfig,
    /// Category key -> value per project month (index 0 is month 1).
    pub monthly_distribution: BTreeMap<String, Vec<f64>>,
}

// ============================================================================
// Lenient decoders
// ============================================================================

/// Parse a date from `YYYY-MM-DD`, an ISO date-time, or a `dd/mm/yyyy` string.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let head = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(head, "%d/%m/%Y"))
        .ok()
}

/// Parse a number that may use a comma decimal separator.
pub fn parse_number(raw: &str) -> f64 {
    let trimmed = raw.trim();
    let normalized = if trimmed.contains(',') {
        trimmed.replace('.', "").replace(',', ".")
    } else {
        trimmed.to_string()
    };
    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => parse_date(&s),
        _ => None,
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Some(Value::String(s)) => parse_number(&s),
        _ => 0.0,
    })
}

fn lenient_u32(value: &Value) -> Option<u32> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) if !s.trim().is_empty() => parse_number(s),
        _ => return None,
    };
    (number >= 1.0).then(|| number.round().min(u32::MAX as f64) as u32)
}

fn lenient_level<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(lenient_u32)
        .and_then(|level| u8::try_from(level).ok()))
}

fn lenient_month<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(lenient_u32).unwrap_or(0))
}

fn lenient_months<'de, D>(deserializer: D) -> Result<Vec<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items.iter().filter_map(lenient_u32).collect(),
        _ => Vec::new(),
    })
}

fn lenient_enum<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}
