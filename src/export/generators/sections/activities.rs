//! Action-plan activities block.

use crate::export::docx::wordml::{
    labeled_paragraph, paragraph, placeholder_paragraph, run, ParagraphStyle, RunStyle,
    BLANK_PARAGRAPH,
};
use crate::export::generators::common::format_date;
use crate::export::model::{Activity, SubActivity};

/// Render activities numbered 1..N with their sub-activities numbered `N.M`.
///
/// Activities without content are skipped and do not consume a number;
/// unfilled sub-activities are skipped the same way.
pub fn build_activities(activities: &[Activity]) -> String {
    let filled: Vec<&Activity> = activities.iter().filter(|a| a.has_content()).collect();
    if filled.is_empty() {
        return placeholder_paragraph();
    }

    let mut out = String::new();
    for (i, activity) in filled.iter().enumerate() {
        let number = i + 1;
        if i > 0 {
            out.push_str(BLANK_PARAGRAPH);
        }
        out.push_str(&activity_block(number, activity));
    }
    out
}

fn activity_block(number: usize, activity: &Activity) -> String {
    let mut out = String::new();

    let title_style = ParagraphStyle {
        keep_next: true,
        ..ParagraphStyle::body()
    };
    let title = format!("{}. {}", number, activity.name.trim());
    out.push_str(&paragraph(
        &run(title.trim_end(), &RunStyle::bold()),
        &title_style,
    ));

    if !activity.description.trim().is_empty() {
        out.push_str(&labeled_paragraph("Descrição", activity.description.trim()));
    }
    if !activity.justification.trim().is_empty() {
        out.push_str(&labeled_paragraph(
            "Justificativa",
            activity.justification.trim(),
        ));
    }

    let subs: Vec<&SubActivity> = activity
        .sub_activities
        .iter()
        .filter(|s| s.is_filled())
        .collect();
    if !subs.is_empty() {
        let sub_style = ParagraphStyle::body().indented(360, None);
        for (j, sub) in subs.iter().enumerate() {
            out.push_str(&paragraph(
                &sub_activity_runs(number, j + 1, sub),
                &sub_style,
            ));
        }
    }

    out.push_str(&labeled_paragraph(
        "Período",
        &format!(
            "Início: {} | Término: {}",
            format_date(activity.start_date),
            format_date(activity.end_date)
        ),
    ));
    out
}

fn sub_activity_runs(parent: usize, index: usize, sub: &SubActivity) -> String {
    let name = sub.name.trim();
    let description = sub.description.trim();

    let mut runs = String::new();
    let head = if name.is_empty() {
        format!("{}.{}", parent, index)
    } else {
        format!("{}.{} {}", parent, index, name)
    };
    runs.push_str(&run(&head, &RunStyle::bold()));

    if !description.is_empty() {
        runs.push_str(&run(&format!(": {}", description), &RunStyle::default()));
    }

    if sub.start_date.is_some() || sub.end_date.is_some() {
        runs.push_str(&run(
            &format!(
                " ({} a {})",
                format_date(sub.start_date),
                format_date(sub.end_date)
            ),
            &RunStyle::default(),
        ));
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn activity(name: &str, subs: Vec<SubActivity>) -> Activity {
        Activity {
            name: name.into(),
            sub_activities: subs,
            ..Default::default()
        }
    }

    fn sub(name: &str, description: &str) -> SubActivity {
        SubActivity {
            name: name.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_list_is_not_applicable() {
        assert!(build_activities(&[]).contains("Não se aplica."));
        assert!(build_activities(&[Activity::default()]).contains("Não se aplica."));
    }

    #[test]
    fn test_numbering_and_nesting() {
        let xml = build_activities(&[
            activity("Levantamento", vec![sub("Entrevistas", "com usuários"), sub("Relatório", "")]),
            activity("Protótipo", vec![]),
        ]);
        assert!(xml.contains(">1. Levantamento<"));
        assert!(xml.contains(">2. Protótipo<"));
        assert!(xml.contains(">1.1 Entrevistas<"));
        assert!(xml.contains(">: com usuários<"));
        assert!(xml.contains(">1.2 Relatório<"));
    }

    #[test]
    fn test_unfilled_sub_activity_is_dropped_but_nameless_keeps_slot() {
        let xml = build_activities(&[activity(
            "A",
            vec![sub("", ""), sub("", "só descrição"), sub("Final", "")],
        )]);
        assert!(xml.contains(">1.1<"));
        assert!(xml.contains("só descrição"));
        assert!(xml.contains(">1.2 Final<"));
        assert!(!xml.contains("1.3"));
    }

    #[test]
    fn test_missing_dates_use_dash() {
        let mut a = activity("Datas", vec![]);
        a.start_date = NaiveDate::from_ymd_opt(2025, 2, 1);
        let xml = build_activities(&[a]);
        assert!(xml.contains("Início: 01/02/2025 | Término: —"));
    }

    #[test]
    fn test_sub_activity_dates_inline() {
        let mut s = sub("Coleta", "");
        s.start_date = NaiveDate::from_ymd_opt(2025, 3, 1);
        s.end_date = NaiveDate::from_ymd_opt(2025, 4, 30);
        let xml = build_activities(&[activity("A", vec![s])]);
        assert!(xml.contains(" (01/03/2025 a 30/04/2025)"));
    }
}
