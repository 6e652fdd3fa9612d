//! Project team block: summary table plus one detail block per person.

use crate::export::docx::wordml::{
    labeled_paragraph, placeholder_paragraph, text_paragraph, Cell, ParagraphStyle, RunStyle,
    TableBuilder, BLANK_PARAGRAPH,
};
use crate::export::generators::common::MISSING_VALUE;
use crate::export::model::{Engagement, Professional};

const NOT_INFORMED: &str = "Não informado";

/// Human label for a hiring-type code. Unknown codes are shown as given.
pub fn hiring_type_label(code: &str) -> String {
    let code = code.trim();
    if code.is_empty() {
        return NOT_INFORMED.to_string();
    }
    match code.to_lowercase().as_str() {
        "clt" => "CLT".into(),
        "bolsa" | "bolsista" => "Bolsista".into(),
        "rpa" => "RPA (Autônomo)".into(),
        "pj" => "Pessoa Jurídica".into(),
        "servidor" => "Servidor público".into(),
        "estagio" | "estágio" => "Estágio".into(),
        _ => code.to_string(),
    }
}

pub fn engagement_label(engagement: Option<Engagement>) -> &'static str {
    match engagement {
        Some(Engagement::Direct) => "Direta",
        Some(Engagement::Indirect) => "Indireta",
        None => NOT_INFORMED,
    }
}

/// Role shown for a professional: the explicit role, else the category label.
fn role_label(professional: &Professional) -> String {
    let role = professional.role.trim();
    if role.is_empty() {
        professional.category.label().to_string()
    } else {
        role.to_string()
    }
}

fn formation(professional: &Professional) -> String {
    let education = professional.education.trim();
    let degree = professional.degree.trim();
    match (education.is_empty(), degree.is_empty()) {
        (true, true) => NOT_INFORMED.to_string(),
        (false, true) => education.to_string(),
        (true, false) => degree.to_string(),
        (false, false) => format!("{} ({})", education, degree),
    }
}

pub fn build_professionals(professionals: &[Professional]) -> String {
    let team: Vec<&Professional> = professionals.iter().filter(|p| p.has_content()).collect();
    if team.is_empty() {
        return placeholder_paragraph();
    }

    let mut table = TableBuilder::new(vec![600, 2800, 2000, 2600, 1000]).header(vec![
        Cell::new("Nº").bold().center().shade("D9D9D9"),
        Cell::new("Nome").bold().shade("D9D9D9"),
        Cell::new("Titulação").bold().shade("D9D9D9"),
        Cell::new("Função no projeto").bold().shade("D9D9D9"),
        Cell::new("Horas").bold().center().shade("D9D9D9"),
    ]);
    for (i, professional) in team.iter().enumerate() {
        let degree = if professional.degree.trim().is_empty() {
            NOT_INFORMED.to_string()
        } else {
            professional.degree.trim().to_string()
        };
        table = table.row(vec![
            Cell::new((i + 1).to_string()).center(),
            Cell::new(professional.name.trim()),
            Cell::new(degree),
            Cell::new(role_label(professional)),
            Cell::new(MISSING_VALUE).center(),
        ]);
    }

    let mut out = table.build();
    for (i, professional) in team.iter().enumerate() {
        if i > 0 {
            out.push_str(BLANK_PARAGRAPH);
        }
        out.push_str(&detail_block(i + 1, professional));
    }
    out
}

fn detail_block(number: usize, professional: &Professional) -> String {
    let mut out = String::new();
    let category = professional.category.label();
    let role = professional.role.trim();
    let heading = if role.is_empty() {
        format!("{}. {}", number, category)
    } else {
        format!("{}. {} ({})", number, role, category)
    };
    let heading_style = ParagraphStyle {
        keep_next: true,
        ..ParagraphStyle::body()
    };
    out.push_str(&text_paragraph(&heading, &RunStyle::bold(), &heading_style));

    let name = professional.name.trim();
    out.push_str(&labeled_paragraph(
        "Nome",
        if name.is_empty() { NOT_INFORMED } else { name },
    ));
    out.push_str(&labeled_paragraph("Formação", &formation(professional)));
    if !professional.mini_bio.trim().is_empty() {
        out.push_str(&labeled_paragraph("Minibiografia", professional.mini_bio.trim()));
    }
    if !professional.activities.trim().is_empty() {
        out.push_str(&labeled_paragraph(
            "Atividades no projeto",
            professional.activities.trim(),
        ));
    }
    out.push_str(&labeled_paragraph(
        "Vínculo",
        &hiring_type_label(&professional.hiring_type),
    ));
    out.push_str(&labeled_paragraph(
        "Atuação",
        engagement_label(professional.engagement),
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::model::ProfessionalCategory;

    #[test]
    fn test_hiring_codes() {
        assert_eq!(hiring_type_label("CLT"), "CLT");
        assert_eq!(hiring_type_label("rpa"), "RPA (Autônomo)");
        assert_eq!(hiring_type_label("cooperado"), "cooperado");
        assert_eq!(hiring_type_label(" "), "Não informado");
    }

    #[test]
    fn test_empty_team_is_not_applicable() {
        let xml = build_professionals(&[Professional::default()]);
        assert!(xml.contains("Não se aplica."));
        assert!(!xml.contains("<w:tbl>"));
    }

    #[test]
    fn test_summary_and_detail() {
        let xml = build_professionals(&[Professional {
            name: "Ana Souza".into(),
            category: ProfessionalCategory::Researcher,
            education: "Engenharia".into(),
            degree: "Doutorado".into(),
            hiring_type: "pj".into(),
            engagement: Some(Engagement::Direct),
            ..Default::default()
        }]);
        assert_eq!(xml.matches("<w:tbl>").count(), 1);
        // header + one row
        assert_eq!(xml.matches("<w:tr>").count(), 2);
        assert!(xml.contains(">1. Pesquisador(a)<"));
        assert!(xml.contains("Engenharia (Doutorado)"));
        assert!(xml.contains(&format!(">{}<", MISSING_VALUE)));
        assert!(xml.contains("Pessoa Jurídica"));
        assert!(xml.contains(">Direta<"));
        assert!(!xml.contains("Minibiografia"));
    }
}
