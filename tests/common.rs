//! Shared fixtures: in-memory template packages and a sample plan.
#![allow(dead_code)]

use std::io::{Cursor, Read, Write};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use zip::write::SimpleFileOptions;

use workplan_export::export::PlanData;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/header1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/header" Target="header1.xml"/></Relationships>"#;

pub const FINAL_SECTION: &str = r#"<w:sectPr><w:headerReference w:type="default" r:id="rId1"/><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1701" w:right="1134" w:bottom="1134" w:left="1701" w:header="709" w:footer="709" w:gutter="0"/></w:sectPr>"#;

pub fn document_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body>{}{}</w:body></w:document>"#,
        body, FINAL_SECTION
    )
}

pub fn header_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:hdr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">{}</w:hdr>"#,
        body
    )
}

/// A paragraph with one run per piece, the way editors fragment markers.
pub fn para(pieces: &[&str]) -> String {
    let runs: String = pieces
        .iter()
        .map(|piece| format!("<w:r><w:rPr><w:lang w:val=\"pt-BR\"/></w:rPr><w:t>{}</w:t></w:r>", piece))
        .collect();
    format!("<w:p>{}</w:p>", runs)
}

pub fn build_docx(document: &str, header: Option<&str>) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    let mut parts = vec![
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", PACKAGE_RELS.to_string()),
        ("word/document.xml", document.to_string()),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS.to_string()),
    ];
    if let Some(header) = header {
        parts.push(("word/header1.xml", header.to_string()));
    }
    for (name, content) in parts {
        writer.start_file(name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn part_names(docx: &[u8]) -> Vec<String> {
    let archive = zip::ZipArchive::new(Cursor::new(docx)).unwrap();
    archive.file_names().map(str::to_string).collect()
}

pub fn read_part(docx: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(docx)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    content
}

/// PNG signature and IHDR chunk; enough for format and size detection.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    data.extend_from_slice(&[0, 0, 0, 13]);
    data.extend_from_slice(b"IHDR");
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&[8, 6, 0, 0, 0]);
    data
}

pub fn png_data_url(width: u32, height: u32) -> String {
    format!("data:image/png;base64,{}", BASE64.encode(png(width, height)))
}

/// Two activities (the first with two dated sub-activities), one
/// professional, two patents, a 5/10/5 financial config and one equipment
/// item of 2 x 500.
pub fn sample_plan_json() -> serde_json::Value {
    serde_json::json!({
        "planName": "Plano Sensores 2025",
        "companyName": "Acme Inovação Ltda",
        "companyCnpj": "12.345.678/0001-90",
        "projectTitle": "Sensores de baixo custo",
        "projectAcronym": "SBC",
        "startDate": "2025-01-01",
        "endDate": "2025-12-31",
        "totalValue": 1250,
        "trlLevel": 4,
        "activities": [
            {
                "name": "Levantamento de requisitos",
                "description": "Entrevistas com usuários",
                "startDate": "2025-01-01",
                "endDate": "2025-03-31",
                "months": [1, 2, 3],
                "subActivities": [
                    {
                        "name": "Entrevistas",
                        "description": "Dez entrevistas",
                        "startDate": "2025-01-06",
                        "endDate": "2025-02-14"
                    },
                    {
                        "name": "Especificação",
                        "description": "Documento de requisitos",
                        "startDate": "2025-02-17",
                        "endDate": "2025-03-28"
                    }
                ]
            },
            {
                "name": "Prototipagem",
                "justification": "Validar o conceito",
                "startDate": "2025-04-01",
                "endDate": "2025-09-30"
            }
        ],
        "professionals": [
            {
                "name": "Maria Souza",
                "category": "coordinator",
                "education": "Engenharia Elétrica",
                "degree": "Doutorado",
                "role": "Coordenação técnica",
                "hiringType": "clt",
                "engagement": "direct"
            }
        ],
        "indicators": {
            "patents": { "enabled": true, "quantity": 2 }
        },
        "financial": {
            "equipment": [
                { "name": "Osciloscópio", "activity": "1", "type": "permanente", "quantity": 2, "unitCost": 500 }
            ],
            "config": { "tax": 5, "overhead": 10, "reserve": 5 }
        }
    })
}

pub fn sample_plan() -> PlanData {
    serde_json::from_value(sample_plan_json()).unwrap()
}

/// Template body exercising every kind of marker.
pub fn sample_template_body() -> String {
    [
        para(&["Plano de Trabalho: {project_", "title}"]),
        para(&["Empresa: {company_name} (CNPJ {company_cnpj})"]),
        para(&["Duração: {project_months} meses"]),
        para(&["[{patents_check}] Patentes: {patents_qty}"]),
        para(&["TRL 4 [{trl4_check}] TRL 5 [{trl5_check}]"]),
        para(&["Conjunto {a,b} de exemplo"]),
        para(&["{#activ", "ities}"]),
        para(&["{name}"]),
        para(&["{/activities}"]),
        para(&["{#professionals}"]),
        para(&["{name}"]),
        para(&["{/professionals}"]),
        para(&["{@objectives}"]),
        para(&["{financial_summary_table}"]),
        para(&["{equipment_", "table}"]),
        para(&["Distribuição mensal dos recursos"]),
        para(&["{monthly_distribution_table}"]),
        para(&["Cronograma"]),
        para(&["{schedule_table}"]),
    ]
    .concat()
}

/// Panic unless `xml` parses with every element closed.
pub fn assert_well_formed(xml: &str) {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut depth: i64 = 0;
    loop {
        match reader.read_event() {
            Ok(quick_xml::events::Event::Start(_)) => depth += 1,
            Ok(quick_xml::events::Event::End(_)) => depth -= 1,
            Ok(quick_xml::events::Event::Eof) => break,
            Ok(_) => {}
            Err(e) => panic!("malformed XML at {}: {}", reader.buffer_position(), e),
        }
    }
    assert_eq!(depth, 0, "unbalanced XML");
}
