use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ColumnConstraint, ContentArrangement, Table, Width,
};

use shelf_cli::pipeline::{AnalysisRun, AssayColumn};
use shelf_model::BoundKind;
use shelf_report::{NOT_REACHED, SummaryRow};

pub fn print_summary(run: &AnalysisRun) {
    println!("Data: {}", run.source.display());
    println!(
        "Records: {} (time column {})",
        run.record_count, run.time_column
    );
    println!(
        "Bound: one-sided {} at {:.0}%, poolability alpha {}",
        bound_label(run.options.bound),
        run.options.confidence * 100.0,
        run.options.significance
    );
    if let Some(path) = &run.json {
        println!("JSON report: {}", path.display());
    }
    if let Some(path) = &run.bands {
        println!("Band CSV: {} ({} rows)", path.display(), run.band_rows);
    }

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Product"),
        header_cell("Assay"),
        header_cell("Lots"),
        header_cell("p-value"),
        header_cell("Poolability"),
        header_cell("Grouping"),
        header_cell("Slope"),
        header_cell("Shelf life"),
        header_cell("Note"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);
    align_column(&mut table, 6, CellAlignment::Right);
    align_column(&mut table, 7, CellAlignment::Right);

    let mut failures = 0usize;
    for (product_id, outcome) in run.analysis.outcomes() {
        let row = SummaryRow::from_outcome(product_id, outcome);
        let failed = outcome.is_failure();
        if failed {
            failures += 1;
        }
        table.add_row(vec![
            Cell::new(&row.product_id)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(&row.assay),
            Cell::new(row.lots),
            Cell::new(&row.p_value),
            poolability_cell(row.poolability),
            Cell::new(row.grouping),
            Cell::new(&row.slope),
            shelf_life_cell(&row.shelf_life, failed),
            note_cell(&row.note, failed),
        ]);
    }
    println!("{table}");
    if failures > 0 {
        eprintln!("{failures} assay(s) could not be analysed; see the Note column.");
    }
}

pub fn print_assays(columns: &[AssayColumn]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Assay"),
        header_cell("Observations"),
        header_cell("Lots"),
        header_cell("Limit"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    align_column(&mut table, 2, CellAlignment::Right);
    for column in columns {
        let limit = match &column.spec_limit {
            Some(limit) => Cell::new(limit.to_string()),
            None => dim_cell("-"),
        };
        table.add_row(vec![
            Cell::new(&column.name),
            Cell::new(column.observations),
            Cell::new(column.lots),
            limit,
        ]);
    }
    println!("{table}");
}

fn bound_label(bound: BoundKind) -> &'static str {
    match bound {
        BoundKind::Confidence => "confidence",
        BoundKind::Prediction => "prediction",
    }
}

fn poolability_cell(label: &str) -> Cell {
    match label {
        "poolable" => Cell::new(label).fg(Color::Green),
        "not poolable" => Cell::new(label).fg(Color::Yellow),
        "test failed" => Cell::new(label).fg(Color::Red),
        _ => dim_cell(label),
    }
}

fn shelf_life_cell(value: &str, failed: bool) -> Cell {
    if failed {
        dim_cell("-")
    } else if value == NOT_REACHED {
        Cell::new(value).fg(Color::Green)
    } else {
        Cell::new(value).add_attribute(Attribute::Bold)
    }
}

fn note_cell(note: &str, failed: bool) -> Cell {
    if note.is_empty() {
        dim_cell("-")
    } else if failed {
        Cell::new(note).fg(Color::Red)
    } else {
        Cell::new(note)
    }
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(100);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(160);
    if table.column_count() >= 9 {
        table.set_constraints(vec![
            ColumnConstraint::UpperBoundary(Width::Fixed(12)),
            ColumnConstraint::UpperBoundary(Width::Fixed(16)),
            ColumnConstraint::LowerBoundary(Width::Fixed(6)),
            ColumnConstraint::LowerBoundary(Width::Fixed(9)),
            ColumnConstraint::LowerBoundary(Width::Fixed(14)),
            ColumnConstraint::LowerBoundary(Width::Fixed(10)),
            ColumnConstraint::LowerBoundary(Width::Fixed(9)),
            ColumnConstraint::LowerBoundary(Width::Fixed(12)),
            ColumnConstraint::UpperBoundary(Width::Percentage(40)),
        ]);
    }
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
