use equipment_reports::model::EquipmentRecord;
use equipment_reports::report::{ItemLine, StoreReport, safe_file_stem};

#[test]
fn realized_total_falls_back_to_suggested_price() {
    let record = EquipmentRecord::new("3569", "Notebook", 2).with_suggested_price(3200.0);
    let line = ItemLine::from_record(&record);

    assert_eq!(line.suggested_total, 6400.0);
    assert_eq!(line.realized_total, 6400.0);
    assert_eq!(line.difference, 0.0);
    assert_eq!(line.difference_ratio, Some(0.0));
}

#[test]
fn missing_suggested_price_counts_as_zero() {
    let record = EquipmentRecord::new("3569", "Projector", 3).with_realized_price(100.0);
    let line = ItemLine::from_record(&record);

    assert_eq!(line.suggested_total, 0.0);
    assert_eq!(line.realized_total, 300.0);
    assert_eq!(line.difference, 300.0);
    assert_eq!(line.difference_ratio, None);
}

#[test]
fn store_totals_aggregate_lines() {
    let records = vec![
        EquipmentRecord::new("3569", "Notebook", 2)
            .with_suggested_price(1000.0)
            .with_realized_price(900.0),
        EquipmentRecord::new("3569", "Monitor", 1).with_suggested_price(500.0),
    ];

    let report = StoreReport::build("3569", &records);
    let totals = &report.totals;

    assert_eq!(report.lines.len(), 2);
    assert_eq!(totals.items, 2);
    assert_eq!(totals.total_quantity, 3);
    assert_eq!(totals.suggested_total, 2500.0);
    assert_eq!(totals.realized_total, 2300.0);
    assert_eq!(totals.difference, -200.0);
    assert_eq!(totals.difference_ratio, Some(2300.0 / 2500.0 - 1.0));
}

#[test]
fn file_stems_are_sanitised() {
    assert_eq!(safe_file_stem("6402"), "6402");
    assert_eq!(safe_file_stem(" Loja 6402 "), "Loja_6402");
    assert_eq!(safe_file_stem("a/b:c  d"), "a_b_c_d");
    assert_eq!(safe_file_stem("///"), "_");
    assert_eq!(safe_file_stem("   "), "unnamed");
    assert_eq!(safe_file_stem(&"x".repeat(200)).len(), 120);
}
