//! Financial tables: summary, per-category details, other-expenses summary,
//! monthly distribution and disbursement schedule.

use crate::export::docx::wordml::{
    placeholder_paragraph, text_paragraph, Align, Cell, ParagraphStyle, RunStyle, TableBuilder,
};
use crate::export::generators::common::{format_money, format_percent, format_quantity};
use crate::export::generators::finance::{
    allocate, equipment_line_total, expense_line_total, personnel_line_total, Allocation,
    CategoryTotals, CostCategory, CostGroup, CostKind,
};
use crate::export::model::{ExpenseItem, FinancialData};

const HEADER_FILL: &str = "D9D9D9";
const SUBTOTAL_FILL: &str = "F2F2F2";

pub const MONTHLY_DISTRIBUTION_TITLE: &str = "Distribuição mensal dos recursos";

/// Portrait body width available to tables.
const PORTRAIT_WIDTH: u32 = 9000;
/// Landscape body width available to the monthly grid.
const LANDSCAPE_WIDTH: u32 = 14400;

fn header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let cell = Cell::new(*label).bold().shade(HEADER_FILL);
            if i == 0 {
                cell
            } else {
                cell.center()
            }
        })
        .collect()
}

fn money_cell(value: f64) -> Cell {
    Cell::new(format_money(value)).right()
}

fn share(value: f64, total: f64) -> String {
    if total > 0.0 {
        format_percent(value / total)
    } else {
        format_percent(0.0)
    }
}

fn summary_row(label: &str, value: f64, total: f64) -> Vec<Cell> {
    vec![
        Cell::new(label),
        money_cell(value),
        Cell::new(share(value, total)).right(),
    ]
}

fn subtotal_row(label: &str, value: f64, total: f64) -> Vec<Cell> {
    summary_row(label, value, total)
        .into_iter()
        .map(|cell| cell.bold().shade(SUBTOTAL_FILL))
        .collect()
}

/// Summary of every category with its share of the grossed-up total.
pub fn build_financial_summary(data: &FinancialData, months: u32) -> String {
    let totals = CategoryTotals::compute(data, months);
    if totals.is_zero() {
        return placeholder_paragraph();
    }
    let allocation = allocate(totals.subtotal(), &data.config);
    let grand = allocation.total;

    let mut table = TableBuilder::new(vec![5400, 2200, 1400])
        .header(header(&["Categoria", "Valor (R$)", "% do total"]));

    for category in CostCategory::ALL.iter().filter(|c| c.group() == CostGroup::Direct) {
        table = table.row(summary_row(category.label(), totals.get(*category), grand));
    }
    table = table.row(subtotal_row("Subtotal: custos diretos", totals.direct(), grand));

    for category in CostCategory::ALL
        .iter()
        .filter(|c| c.group() == CostGroup::OtherExpenses)
    {
        table = table.row(summary_row(category.label(), totals.get(*category), grand));
    }
    table = table.row(subtotal_row(
        "Subtotal: custos diretos + outras despesas",
        totals.subtotal(),
        grand,
    ));

    table = table
        .row(summary_row(
            &format!("Custos indiretos ({}%)", format_quantity(data.config.overhead_pct)),
            allocation.overhead,
            grand,
        ))
        .row(summary_row(
            &format!("Impostos sobre serviços ({}%)", format_quantity(data.config.service_tax_pct)),
            allocation.tax,
            grand,
        ))
        .row(summary_row(
            &format!("Reserva técnica ({}%)", format_quantity(data.config.reserve_pct)),
            allocation.reserve,
            grand,
        ))
        .row(
            summary_row("Total geral", grand, grand)
                .into_iter()
                .map(|cell| cell.bold().shade(HEADER_FILL))
                .collect(),
        );
    table.build()
}

fn or_dash(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        "—".to_string()
    } else {
        value.to_string()
    }
}

/// Line-item table of one category, with a totals row.
pub fn build_category_table(category: CostCategory, data: &FinancialData, months: u32) -> String {
    match category.kind() {
        CostKind::Equipment => {
            let items: Vec<_> = category
                .equipment_items(data)
                .iter()
                .filter(|i| !i.name.trim().is_empty() || equipment_line_total(i) > 0.0)
                .collect();
            if items.is_empty() {
                return placeholder_paragraph();
            }
            let mut table = TableBuilder::new(vec![2600, 1500, 1200, 800, 1400, 1500]).header(
                header(&["Item", "Atividade", "Tipo", "Qtd.", "Valor unit. (R$)", "Total (R$)"]),
            );
            let mut total = 0.0;
            for item in items {
                let line = equipment_line_total(item);
                total += line;
                table = table.row(vec![
                    Cell::new(or_dash(&item.name)),
                    Cell::new(or_dash(&item.activity)),
                    Cell::new(or_dash(&item.item_type)),
                    Cell::new(format_quantity(item.quantity)).center(),
                    money_cell(item.unit_cost),
                    money_cell(line),
                ]);
            }
            table
                .row(totals_row(6, total))
                .build()
        }
        CostKind::Personnel => {
            let items: Vec<_> = category
                .personnel_items(data)
                .iter()
                .filter(|i| !i.name.trim().is_empty() || personnel_line_total(i, months) > 0.0)
                .collect();
            if items.is_empty() {
                return placeholder_paragraph();
            }
            let mut table = TableBuilder::new(vec![2800, 1600, 1400, 1000, 2200])
                .header(header(&["Nome", "Salário base (R$)", "Encargos (R$)", "Meses", "Total (R$)"]));
            let mut total = 0.0;
            for item in items {
                let line = personnel_line_total(item, months);
                total += line;
                table = table.row(vec![
                    Cell::new(or_dash(&item.name)),
                    money_cell(item.base_salary),
                    money_cell(item.monthly_charges),
                    Cell::new(months.to_string()).center(),
                    money_cell(line),
                ]);
            }
            table.row(totals_row(5, total)).build()
        }
        CostKind::Expense => {
            let items: Vec<_> = category
                .expense_items(data)
                .iter()
                .filter(|i| !i.description.trim().is_empty() || expense_line_total(i) > 0.0)
                .collect();
            if items.is_empty() {
                return placeholder_paragraph();
            }
            let mut table = TableBuilder::new(vec![3200, 1600, 800, 1500, 1900])
                .header(header(&["Descrição", "Tipo", "Qtd.", "Valor unit. (R$)", "Total (R$)"]));
            let mut total = 0.0;
            for item in items {
                let line = expense_line_total(item);
                total += line;
                table = table.row(vec![
                    Cell::new(or_dash(&item.description)),
                    Cell::new(or_dash(&item.expense_type)),
                    Cell::new(format_quantity(item.quantity)).center(),
                    money_cell(item.unit_cost),
                    money_cell(line),
                ]);
            }
            table.row(totals_row(5, total)).build()
        }
    }
}

fn totals_row(columns: u32, total: f64) -> Vec<Cell> {
    vec![
        Cell::new("Total").bold().shade(SUBTOTAL_FILL).span(columns - 1),
        money_cell(total).bold().shade(SUBTOTAL_FILL),
    ]
}

fn expense_type_label(item: &ExpenseItem) -> String {
    let kind = item.expense_type.trim();
    if kind.is_empty() {
        "Outros".to_string()
    } else {
        kind.to_string()
    }
}

/// Travel and other expenses grouped by their sub-category, in order of
/// first appearance.
pub fn build_other_expenses_summary(data: &FinancialData) -> String {
    let mut groups: Vec<(String, usize, f64)> = Vec::new();
    for item in data.travel.iter().chain(data.other_expenses.iter()) {
        let line = expense_line_total(item);
        if item.description.trim().is_empty() && line == 0.0 {
            continue;
        }
        let label = expense_type_label(item);
        match groups.iter_mut().find(|(name, _, _)| *name == label) {
            Some(group) => {
                group.1 += 1;
                group.2 += line;
            }
            None => groups.push((label, 1, line)),
        }
    }
    if groups.is_empty() {
        return placeholder_paragraph();
    }

    let grand: f64 = groups.iter().map(|(_, _, total)| total).sum();
    let mut table = TableBuilder::new(vec![4600, 1200, 2000, 1200])
        .header(header(&["Tipo de despesa", "Itens", "Total (R$)", "%"]));
    for (label, count, total) in &groups {
        table = table.row(vec![
            Cell::new(label.as_str()),
            Cell::new(count.to_string()).center(),
            money_cell(*total),
            Cell::new(share(*total, grand)).right(),
        ]);
    }
    table
        .row(vec![
            Cell::new("Total").bold().shade(SUBTOTAL_FILL).span(2),
            money_cell(grand).bold().shade(SUBTOTAL_FILL),
            Cell::new(share(grand, grand)).bold().right().shade(SUBTOTAL_FILL),
        ])
        .build()
}

fn has_distribution(data: &FinancialData) -> bool {
    data.monthly_distribution
        .values()
        .flatten()
        .any(|v| v.is_finite() && *v != 0.0)
}

/// Net amount of one project month: the distribution grid when present,
/// otherwise an even split of the subtotal.
pub fn month_net(data: &FinancialData, totals: &CategoryTotals, month: u32, months: u32) -> f64 {
    if has_distribution(data) {
        CostCategory::ALL
            .iter()
            .filter_map(|c| c.monthly_value(data, month))
            .sum()
    } else if months > 0 {
        totals.subtotal() / months as f64
    } else {
        0.0
    }
}

/// Title paragraph plus the wide category x month grid, in condensed type.
pub fn build_monthly_distribution(data: &FinancialData, months: u32) -> String {
    let title = text_paragraph(
        MONTHLY_DISTRIBUTION_TITLE,
        &RunStyle::bold(),
        &ParagraphStyle {
            keep_next: true,
            ..ParagraphStyle::body().aligned(Align::Center)
        },
    );
    if months == 0 || !has_distribution(data) {
        return format!("{}{}", title, placeholder_paragraph());
    }

    let label_width = 2200;
    let month_width = ((LANDSCAPE_WIDTH - label_width) / months).max(300);
    let mut widths = vec![label_width];
    widths.extend(std::iter::repeat(month_width).take(months as usize));
    widths.push(900);

    let mut head = vec![Cell::new("Categoria").bold().shade(HEADER_FILL)];
    head.extend((1..=months).map(|m| Cell::new(format!("M{}", m)).bold().center().shade(HEADER_FILL)));
    head.push(Cell::new("Total").bold().center().shade(HEADER_FILL));
    let mut table = TableBuilder::new(widths).font_size(14).header(head);

    let mut subtotals = vec![0.0; months as usize];
    for category in CostCategory::ALL {
        let mut row = vec![Cell::new(category.label())];
        let mut row_total = 0.0;
        for month in 1..=months {
            match category.monthly_value(data, month) {
                Some(value) => {
                    subtotals[month as usize - 1] += value;
                    row_total += value;
                    row.push(money_cell(value));
                }
                None => row.push(Cell::new("")),
            }
        }
        row.push(money_cell(row_total));
        table = table.row(row);
    }

    let allocations: Vec<Allocation> = subtotals.iter().map(|net| allocate(*net, &data.config)).collect();
    let derived: [(&str, fn(&Allocation) -> f64, bool); 5] = [
        ("Subtotal", |a| a.net, true),
        ("Custos indiretos", |a| a.overhead, false),
        ("Impostos", |a| a.tax, false),
        ("Reserva técnica", |a| a.reserve, false),
        ("Total", |a| a.total, true),
    ];
    for (label, pick, emphasized) in derived {
        let mut row = vec![Cell::new(label)];
        let mut row_total = 0.0;
        for allocation in &allocations {
            let value = pick(allocation);
            row_total += value;
            row.push(money_cell(value));
        }
        row.push(money_cell(row_total));
        if emphasized {
            row = row.into_iter().map(|c| c.bold().shade(SUBTOTAL_FILL)).collect();
        }
        table = table.row(row);
    }

    format!("{}{}", title, table.build())
}

/// One row per project month with the invoice breakdown and a totals row.
pub fn build_disbursement_schedule(data: &FinancialData, months: u32) -> String {
    let totals = CategoryTotals::compute(data, months);
    if months == 0 || (totals.is_zero() && !has_distribution(data)) {
        return placeholder_paragraph();
    }

    let widths = vec![700, 1500, 1200, 1500, 1300, 1200, 1600];
    debug_assert_eq!(widths.iter().sum::<u32>(), PORTRAIT_WIDTH);
    let mut table = TableBuilder::new(widths).font_size(16).header(header(&[
        "Mês",
        "Valor bruto NF (R$)",
        "Impostos (R$)",
        "Valor líquido (R$)",
        "Overhead (R$)",
        "Reserva (R$)",
        "Executável (R$)",
    ]));

    let mut sum = Allocation::default();
    for month in 1..=months {
        let allocation = allocate(month_net(data, &totals, month, months), &data.config);
        sum.total += allocation.total;
        sum.tax += allocation.tax;
        sum.overhead += allocation.overhead;
        sum.reserve += allocation.reserve;
        table = table.row(disbursement_row(Cell::new(month.to_string()).center(), &allocation));
    }

    let totals_row = disbursement_row(Cell::new("Total"), &sum)
        .into_iter()
        .map(|c| c.bold().shade(SUBTOTAL_FILL))
        .collect();
    table.row(totals_row).build()
}

fn disbursement_row(first: Cell, allocation: &Allocation) -> Vec<Cell> {
    vec![
        first,
        money_cell(allocation.total),
        money_cell(allocation.tax),
        money_cell(allocation.net_of_tax()),
        money_cell(allocation.overhead),
        money_cell(allocation.reserve),
        money_cell(allocation.executable()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::model::{EquipmentItem, FinancialConfig};

    fn sample() -> FinancialData {
        FinancialData {
            equipment: vec![EquipmentItem {
                name: "Servidor".into(),
                quantity: 2.0,
                unit_cost: 500.0,
                ..Default::default()
            }],
            config: FinancialConfig {
                service_tax_pct: 5.0,
                overhead_pct: 10.0,
                reserve_pct: 5.0,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_all_zero_data_is_placeholder() {
        let data = FinancialData::default();
        assert!(build_financial_summary(&data, 12).contains("Não se aplica."));
        assert!(build_disbursement_schedule(&data, 12).contains("Não se aplica."));
        assert!(build_other_expenses_summary(&data).contains("Não se aplica."));
        for category in CostCategory::ALL {
            assert!(build_category_table(category, &data, 12).contains("Não se aplica."));
        }
        let monthly = build_monthly_distribution(&data, 12);
        assert!(monthly.contains(MONTHLY_DISTRIBUTION_TITLE));
        assert!(!monthly.contains("<w:tbl>"));
    }

    #[test]
    fn test_summary_grosses_up() {
        let xml = build_financial_summary(&sample(), 12);
        assert!(xml.contains(">1.000,00<"));
        assert!(xml.contains(">1.250,00<"));
        assert!(xml.contains(">62,50<"));
        assert!(xml.contains(">125,00<"));
        assert!(xml.contains(">80,00%<"));
        assert!(xml.contains("Custos indiretos (10%)"));
    }

    #[test]
    fn test_equipment_table_totals() {
        let xml = build_category_table(CostCategory::Equipment, &sample(), 12);
        assert!(xml.contains(">Servidor<"));
        assert!(xml.contains(">500,00<"));
        assert_eq!(xml.matches(">1.000,00<").count(), 2);
    }

    #[test]
    fn test_other_expenses_grouped_by_type() {
        let mut data = FinancialData::default();
        data.travel = vec![
            ExpenseItem {
                description: "Passagem".into(),
                expense_type: "Transporte".into(),
                quantity: 2.0,
                unit_cost: 300.0,
            },
            ExpenseItem {
                description: "Diária".into(),
                expense_type: "Hospedagem".into(),
                quantity: 1.0,
                unit_cost: 200.0,
            },
        ];
        data.other_expenses = vec![ExpenseItem {
            description: "Táxi".into(),
            expense_type: "Transporte".into(),
            quantity: 1.0,
            unit_cost: 100.0,
        }];
        let xml = build_other_expenses_summary(&data);
        // header, two groups, totals
        assert_eq!(xml.matches("<w:tr>").count(), 4);
        assert!(xml.contains(">700,00<"));
        assert!(xml.contains(">900,00<"));
    }

    #[test]
    fn test_disbursement_even_split_without_grid() {
        let xml = build_disbursement_schedule(&sample(), 4);
        // header, four months, totals
        assert_eq!(xml.matches("<w:tr>").count(), 6);
        assert!(xml.contains(">312,50<"));
        assert!(xml.contains(">1.250,00<"));
    }

    #[test]
    fn test_monthly_distribution_grid() {
        let mut data = sample();
        data.monthly_distribution
            .insert("equipment".into(), vec![1000.0, 0.0]);
        let xml = build_monthly_distribution(&data, 2);
        assert!(xml.contains("<w:sz w:val=\"14\"/>"));
        assert!(xml.contains(">M2<"));
        assert_eq!(xml.matches(">1.250,00<").count(), 2);
    }
}
