mod common;

use common::*;
use serde_json::json;

use workplan_export::export::docx::{
    DocumentBody, ImageRegistry, Logos, MergeData, TemplateSurgeon,
};
use workplan_export::export::generators::work_plan::{
    work_plan_surgeon, ACTIVITIES_BLOCK, PROFESSIONALS_BLOCK,
};
use workplan_export::export::generators::{DocxRenderEngine, ExportError, RenderJob};
use workplan_export::export::{Generator, PlanData, WorkPlanGenerator};

fn header_template() -> String {
    header_xml(&para(&["{%company_logo} {project_acronym}"]))
}

fn sample_template() -> Vec<u8> {
    build_docx(&document_xml(&sample_template_body()), Some(&header_template()))
}

#[test]
fn test_end_to_end_work_plan() {
    let uploads = tempfile::tempdir().unwrap();
    std::fs::write(uploads.path().join("foto.png"), png(200, 100)).unwrap();

    let mut plan_json = sample_plan_json();
    plan_json["richFields"] = json!({
        "objectives": {
            "type": "doc",
            "content": [
                { "type": "paragraph", "content": [{ "type": "text", "text": "Reduzir custos {sem marcador}" }] },
                { "type": "image", "attrs": { "src": "/uploads/foto.png" } }
            ]
        }
    });
    plan_json["companyLogo"] = json!(png_data_url(400, 100));
    let plan: PlanData = serde_json::from_value(plan_json).unwrap();

    let generator = WorkPlanGenerator::from_bytes(sample_template(), uploads.path());
    let document = generator.generate(&plan).unwrap();
    assert_eq!(document.filename, "plano-de-trabalho-plano-sensores-2025.docx");

    let xml = read_part(&document.docx, "word/document.xml");
    assert_well_formed(&xml);

    // scalar and flat markers
    assert!(xml.contains("Plano de Trabalho: Sensores de baixo custo"));
    assert!(xml.contains("Empresa: Acme Inovação Ltda (CNPJ 12.345.678/0001-90)"));
    assert!(xml.contains("Duração: 12 meses"));
    assert!(xml.contains("[X] Patentes: 2"));
    assert!(xml.contains("TRL 4 [X] TRL 5 [  ]"));

    // literal braces survive, in the template and in user text
    assert!(xml.contains("Conjunto {a,b} de exemplo"));
    assert!(xml.contains("Reduzir custos {sem marcador}"));
    assert!(!xml.contains('\u{E000}') && !xml.contains('\u{E001}'));
    for token in ["{#", "{/", "{@", "{name}"] {
        assert!(!xml.contains(token), "leftover {}", token);
    }

    // pre-rendered blocks
    assert!(xml.contains("1. Levantamento de requisitos"));
    assert!(xml.contains("1.1 Entrevistas"));
    assert!(xml.contains("1.2 Especificação"));
    assert!(xml.contains(" (17/02/2025 a 28/03/2025)"));
    assert!(xml.contains("2. Prototipagem"));
    assert!(xml.contains("Maria Souza"));
    assert!(xml.contains("Osciloscópio"));
    assert!(xml.contains("1.000,00"));
    assert!(xml.contains("1.250,00"));
    assert!(xml.contains("Distribuição mensal dos recursos"));
    assert_eq!(xml.matches("Distribuição mensal dos recursos").count(), 1);

    // landscape section around the monthly distribution
    let landscape = xml.find("w:orient=\"landscape\"").unwrap();
    assert!(xml.find("Distribuição mensal dos recursos").unwrap() < landscape);
    assert!(landscape < xml.find("Cronograma").unwrap());

    // content image, resized to its real dimensions
    assert!(xml.contains("cx=\"1905000\" cy=\"952500\""));
    let names = part_names(&document.docx);
    assert!(names.contains(&"word/media/image-1.png".to_string()));
    assert!(read_part(&document.docx, "word/_rels/document.xml.rels")
        .contains("Target=\"media/image-1.png\""));
    assert!(read_part(&document.docx, "[Content_Types].xml").contains("Extension=\"png\""));

    // header logo
    let header = read_part(&document.docx, "word/header1.xml");
    assert_well_formed(&header);
    assert!(header.contains("<w:drawing>"));
    assert!(header.contains("cx=\"1800000\" cy=\"450000\""));
    assert!(header.contains("SBC"));
    assert!(!header.contains("{%company_logo}"));
    assert!(read_part(&document.docx, "word/_rels/header1.xml.rels")
        .contains("media/company_logo-1.png"));
}

#[test]
fn test_sample_plan_merge_map() {
    let generator = WorkPlanGenerator::from_bytes(sample_template(), "uploads");
    let data = generator.build_merge_data(&sample_plan(), &mut ImageRegistry::new());

    assert_eq!(data.text_value("patents_check"), Some("X"));
    assert_eq!(data.text_value("patents_qty"), Some("2"));
    assert_eq!(data.text_value("trl4_check"), Some("X"));

    let activities = data.raw_value(ACTIVITIES_BLOCK).unwrap();
    let first = activities.find(">1. Levantamento de requisitos<").unwrap();
    let sub_one = activities.find(">1.1 Entrevistas<").unwrap();
    let sub_two = activities.find(">1.2 Especificação<").unwrap();
    let second = activities.find(">2. Prototipagem<").unwrap();
    assert!(first < sub_one && sub_one < sub_two && sub_two < second);

    let professionals = data.raw_value(PROFESSIONALS_BLOCK).unwrap();
    assert_eq!(professionals.matches(">Atuação: <").count(), 1);
    assert!(professionals.contains("Maria Souza"));

    let summary = data.raw_value("financial_summary_table").unwrap();
    let equipment_row = &summary[summary.find("Equipamentos").unwrap()..];
    let row_end = equipment_row.find("</w:tr>").unwrap();
    assert!(equipment_row[..row_end].contains("1.000,00"));
    assert!(summary.contains("1.250,00"));
}

#[test]
fn test_template_surgery_is_idempotent() {
    let surgeon = work_plan_surgeon();
    let mut body = DocumentBody::parse(&document_xml(&sample_template_body())).unwrap();
    surgeon.prepare_document(&mut body);
    let once = body.serialize();

    let mut again = DocumentBody::parse(&once).unwrap();
    surgeon.prepare_document(&mut again);
    assert_eq!(again.serialize(), once);

    assert_eq!(once.matches("w:orient=\"landscape\"").count(), 1);
    assert_eq!(once.matches("Distribuição mensal dos recursos").count(), 0);
    for marker in [
        "{@activities_block}",
        "{@professionals_block}",
        "{@financial_summary_table}",
        "{@equipment_table}",
        "{@monthly_distribution_table}",
        "{@schedule_table}",
    ] {
        assert_eq!(once.matches(marker).count(), 1, "{}", marker);
    }
}

#[test]
fn test_rerender_is_stable() {
    let generator = WorkPlanGenerator::from_bytes(sample_template(), "uploads");
    let plan = sample_plan();
    let first = generator.generate(&plan).unwrap();
    let second = generator.generate(&plan).unwrap();

    let xml = read_part(&first.docx, "word/document.xml");
    assert_eq!(xml, read_part(&second.docx, "word/document.xml"));
    assert_eq!(xml.matches("w:orient=\"landscape\"").count(), 1);
    assert_eq!(part_names(&first.docx), part_names(&second.docx));
}

#[test]
fn test_empty_plan_renders_placeholders() {
    let generator = WorkPlanGenerator::from_bytes(sample_template(), "uploads");
    let document = generator.generate(&PlanData::default()).unwrap();

    let xml = read_part(&document.docx, "word/document.xml");
    assert_well_formed(&xml);
    assert!(xml.contains("Não se aplica."));
    assert!(xml.contains("[  ] Patentes: "));
    assert!(!xml.contains("{@"));

    let header = read_part(&document.docx, "word/header1.xml");
    assert!(!header.contains("{%company_logo}"));
    assert!(!header.contains("<w:drawing>"));
    assert_eq!(document.filename, "plano-de-trabalho-plano.docx");
}

#[test]
fn test_missing_upload_becomes_placeholder_text() {
    let uploads = tempfile::tempdir().unwrap();
    let mut plan = sample_plan();
    plan.rich_fields.insert(
        "objectives".to_string(),
        serde_json::from_value(json!({
            "type": "doc",
            "content": [{ "type": "image", "attrs": { "src": "/uploads/sumiu.png" } }]
        }))
        .unwrap(),
    );

    let generator = WorkPlanGenerator::from_bytes(sample_template(), uploads.path());
    let document = generator.generate(&plan).unwrap();
    let xml = read_part(&document.docx, "word/document.xml");
    assert!(xml.contains("[Imagem indisponível]"));
    assert!(!xml.contains("rIdImg"));
}

#[test]
fn test_lost_section_break_is_restored() {
    let break_paragraph = "<w:p><w:pPr><w:sectPr><w:type w:val=\"nextPage\"/><w:pgSz w:w=\"11906\" w:h=\"16838\"/></w:sectPr></w:pPr><w:r><w:t>{equipment_table}</w:t></w:r></w:p>";
    let body = format!("{}{}{}", para(&["Início"]), break_paragraph, para(&["Fim"]));
    let template = build_docx(&document_xml(&body), None);

    let generator = WorkPlanGenerator::from_bytes(template, "uploads");
    let document = generator.generate(&sample_plan()).unwrap();
    let xml = read_part(&document.docx, "word/document.xml");
    assert_well_formed(&xml);
    assert!(xml.contains("<w:type w:val=\"nextPage\"/>"));
    assert!(xml.contains("Osciloscópio"));
}

#[test]
fn test_malformed_markup_is_fatal() {
    let template = build_docx(&document_xml(&para(&["{@broken}"])), None);
    let mut data = MergeData::new();
    data.insert_raw("broken", "<w:p><w:r><w:t>aberto");

    let engine = DocxRenderEngine::new("uploads");
    let result = engine.render(
        &template,
        RenderJob {
            surgeon: &TemplateSurgeon::new(),
            data: &data,
            registry: ImageRegistry::new(),
            logos: &Logos::default(),
        },
        "teste",
    );
    assert!(matches!(result, Err(ExportError::Merge(_))));
}

#[test]
fn test_invalid_template_is_fatal() {
    let generator = WorkPlanGenerator::from_bytes(b"not a zip".to_vec(), "uploads");
    let result = generator.generate(&sample_plan());
    assert!(matches!(result, Err(ExportError::Package(_))));
}

#[test]
fn test_missing_template_file() {
    let result = WorkPlanGenerator::from_path("/nonexistent/plano.docx", "uploads");
    assert!(matches!(result, Err(ExportError::TemplateIo(_))));
}
