//! Generator for the work-plan document.
//!
//! Turns a [`PlanData`] into the flat merge map the template expects and
//! renders it through the [`DocxRenderEngine`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};

use super::common::{format_date, format_long_date, format_money, get_static_dir};
use super::engine::{DocxRenderEngine, RenderJob};
use super::finance::project_month_count;
use super::rich_text::RichTextRenderer;
use super::sections::{
    build_activities, build_professionals, build_tables, checkbox_markers, indicator_markers,
    trl_markers, MONTHLY_DISTRIBUTION_TABLE, TABLE_TAGS,
};
use super::sections::financial::MONTHLY_DISTRIBUTION_TITLE;
use super::traits::Generator;
use super::{ExportError, GeneratedDocument};
use crate::export::docx::surgeon::TemplateFix;
use crate::export::docx::{ImageRegistry, Logos, MergeData, TemplateSurgeon};
use crate::export::model::PlanData;

pub const TEMPLATE_FILE: &str = "plano_de_trabalho.docx";

pub const ACTIVITIES_BLOCK: &str = "activities_block";
pub const PROFESSIONALS_BLOCK: &str = "professionals_block";

/// Authoring mistakes present in published revisions of the template.
const TEMPLATE_FIXES: [(&str, &str, &str); 2] = [
    ("Telefone", "{coordinator_email}", "{coordinator_phone}"),
    ("CNPJ", "{company_cpnj}", "{company_cnpj}"),
];

/// Generator for the work-plan document.
pub struct WorkPlanGenerator {
    template: Arc<Vec<u8>>,
    engine: DocxRenderEngine,
    surgeon: TemplateSurgeon,
}

impl WorkPlanGenerator {
    /// Create a generator from the bundled template.
    pub fn new(uploads_dir: impl Into<PathBuf>) -> Result<Self, ExportError> {
        Self::from_path(get_static_dir().join(TEMPLATE_FILE), uploads_dir)
    }

    /// Create a generator from a template on disk.
    pub fn from_path(
        template_path: impl AsRef<Path>,
        uploads_dir: impl Into<PathBuf>,
    ) -> Result<Self, ExportError> {
        let template_path = template_path.as_ref();
        let template = fs::read(template_path).map_err(ExportError::TemplateIo)?;
        info!(
            "Loaded template {} ({} bytes)",
            template_path.display(),
            template.len()
        );
        Ok(Self::from_bytes(template, uploads_dir))
    }

    /// Create a generator from template bytes already in memory.
    pub fn from_bytes(template: Vec<u8>, uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            template: Arc::new(template),
            engine: DocxRenderEngine::new(uploads_dir),
            surgeon: work_plan_surgeon(),
        }
    }

    /// Build the merge map and register every rich-text image.
    pub fn build_merge_data(&self, plan: &PlanData, registry: &mut ImageRegistry) -> MergeData {
        let months = project_month_count(plan.start_date, plan.end_date);
        let mut data = MergeData::new();

        for (key, value) in &plan.extra_fields {
            data.insert_text(key.trim(), value.clone());
        }
        for (key, value) in scalar_markers(plan) {
            data.insert_text(key, value);
        }
        data.insert_text("project_months", months.to_string());
        data.insert_text("export_date", format_long_date());

        data.text.extend(checkbox_markers(&plan.checkboxes));
        data.text.extend(indicator_markers(&plan.indicators));
        data.text.extend(trl_markers(plan.trl_level));

        let renderer = RichTextRenderer::new();
        for (key, field) in &plan.rich_fields {
            data.insert_raw(key.trim(), renderer.render(Some(field), registry));
        }

        data.insert_raw(ACTIVITIES_BLOCK, build_activities(&plan.activities));
        data.insert_raw(PROFESSIONALS_BLOCK, build_professionals(&plan.professionals));
        for (tag, markup) in build_tables(plan, months) {
            data.insert_raw(tag, markup);
        }

        debug!(
            "Merge data: {} text, {} markup, {} image(s), {} month(s)",
            data.text.len(),
            data.raw.len(),
            registry.len(),
            months
        );
        data
    }
}

impl<'a> Generator<&'a PlanData> for WorkPlanGenerator {
    fn generate(&self, plan: &'a PlanData) -> Result<GeneratedDocument, ExportError> {
        let mut registry = ImageRegistry::new();
        let data = self.build_merge_data(plan, &mut registry);
        let logos = Logos {
            company: plan.company_logo.clone(),
            partner: plan.partner_logo.clone(),
        };

        info!("Generating work plan '{}'", plan.plan_name);
        self.engine.render(
            &self.template,
            RenderJob {
                surgeon: &self.surgeon,
                data: &data,
                registry,
                logos: &logos,
            },
            &plan.plan_name,
        )
    }
}

/// Surgery steps for the work-plan template.
pub fn work_plan_surgeon() -> TemplateSurgeon {
    TEMPLATE_FIXES.iter().fold(
        TemplateSurgeon::new()
            .region("activities", ACTIVITIES_BLOCK)
            .region("professionals", PROFESSIONALS_BLOCK)
            .table_tags(TABLE_TAGS)
            .landscape(MONTHLY_DISTRIBUTION_TABLE, MONTHLY_DISTRIBUTION_TITLE),
        |surgeon, (context, find, replace)| surgeon.fix(TemplateFix::new(context, find, replace)),
    )
}

/// Identification fields keyed by the snake_case name of the field.
fn scalar_markers(plan: &PlanData) -> Vec<(&'static str, String)> {
    vec![
        ("plan_name", plan.plan_name.clone()),
        ("company_name", plan.company_name.clone()),
        ("company_cnpj", plan.company_cnpj.clone()),
        ("company_address", plan.company_address.clone()),
        ("company_city", plan.company_city.clone()),
        ("company_state", plan.company_state.clone()),
        ("legal_representative", plan.legal_representative.clone()),
        ("coordinator_name", plan.coordinator_name.clone()),
        ("coordinator_email", plan.coordinator_email.clone()),
        ("coordinator_phone", plan.coordinator_phone.clone()),
        ("project_title", plan.project_title.clone()),
        ("project_acronym", plan.project_acronym.clone()),
        ("start_date", format_date(plan.start_date)),
        ("end_date", format_date(plan.end_date)),
        ("total_value", format_money(plan.total_value)),
        (
            "trl_level",
            plan.trl_level.map(|l| l.to_string()).unwrap_or_default(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::generators::rich_text::RichField;
    use crate::export::model::{Activity, Indicator};

    fn generator() -> WorkPlanGenerator {
        WorkPlanGenerator::from_bytes(Vec::new(), "uploads")
    }

    #[test]
    fn test_scalars_are_formatted() {
        let plan: PlanData = serde_json::from_str(
            r#"{"companyName":"Acme","startDate":"2025-01-01","endDate":"2025-12-31","totalValue":"1250"}"#,
        )
        .unwrap();
        let data = generator().build_merge_data(&plan, &mut ImageRegistry::new());
        assert_eq!(data.text_value("company_name"), Some("Acme"));
        assert_eq!(data.text_value("start_date"), Some("01/01/2025"));
        assert_eq!(data.text_value("total_value"), Some("1.250,00"));
        assert_eq!(data.text_value("project_months"), Some("12"));
        assert_eq!(data.text_value("trl_level"), Some(""));
    }

    #[test]
    fn test_every_block_marker_is_present() {
        let data = generator().build_merge_data(&PlanData::default(), &mut ImageRegistry::new());
        for tag in TABLE_TAGS {
            assert!(data.raw_value(tag).is_some(), "missing {}", tag);
        }
        assert!(data.raw_value(ACTIVITIES_BLOCK).is_some());
        assert!(data.raw_value(PROFESSIONALS_BLOCK).is_some());
    }

    #[test]
    fn test_flat_markers() {
        let mut plan = PlanData::default();
        plan.trl_level = Some(4);
        plan.indicators.insert(
            "patents".to_string(),
            Indicator {
                enabled: true,
                quantity: 2.0,
            },
        );
        plan.checkboxes
            .insert("area".to_string(), vec!["saude".to_string()]);
        plan.extra_fields
            .insert("program_name".to_string(), "Inova".to_string());

        let data = generator().build_merge_data(&plan, &mut ImageRegistry::new());
        assert_eq!(data.text_value("trl4_check"), Some("X"));
        assert_eq!(data.text_value("trl5_check"), Some("  "));
        assert_eq!(data.text_value("patents_check"), Some("X"));
        assert_eq!(data.text_value("patents_qty"), Some("2"));
        assert_eq!(data.text_value("area_saude_check"), Some("X"));
        assert_eq!(data.text_value("program_name"), Some("Inova"));
    }

    #[test]
    fn test_rich_fields_become_markup() {
        let mut plan = PlanData::default();
        plan.rich_fields.insert(
            "objectives".to_string(),
            RichField::Text("Primeiro\n\nSegundo".to_string()),
        );
        plan.activities.push(Activity {
            name: "Pesquisa".to_string(),
            ..Activity::default()
        });

        let data = generator().build_merge_data(&plan, &mut ImageRegistry::new());
        let objectives = data.raw_value("objectives").unwrap();
        assert!(objectives.contains("Primeiro"));
        assert!(objectives.contains("Segundo"));
        assert!(data.raw_value(ACTIVITIES_BLOCK).unwrap().contains("1. Pesquisa"));
    }

    #[test]
    fn test_template_fixes_are_configured() {
        let surgeon = work_plan_surgeon();
        let xml = "<w:p><w:r><w:t>Telefone: {coordinator_email}</w:t></w:r></w:p>";
        assert!(surgeon.prepare_part(xml).contains("{coordinator_phone}"));
    }
}
