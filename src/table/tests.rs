use super::*;
use tempfile::tempdir;

const RT_CSV: &str = "Sample,Methionine d8,Creatinine d3,Betaine d9
QC01_HILIC_Pos_5,7.55,4.21,
QC01_HILIC_Pos_6,7.54: 0.061,nan,8.12
";

const SEQUENCE_CSV: &str = "Bracket Type=4,,,,
File Name,L1 Study,Position,Inj Vol,Instrument Method
QC01_HILIC_Pos_5,STUDY-1,P1-A1,5,C:\\Methods\\HILIC_Pos
Blank_HILIC_Pos_1,STUDY-1,P1-A2,,C:\\Methods\\HILIC_Pos
";

fn rt_table() -> Table {
    Table::from_csv_reader(RT_CSV.as_bytes(), "istd_pos_retention_time", &TableSchema::measurement())
        .unwrap()
}

#[test]
fn test_measurement_csv_parsing() {
    let table = rt_table();

    assert_eq!(table.len(), 2);
    assert_eq!(table.key_column(), "Sample");
    assert_eq!(
        table.value_columns().collect::<Vec<_>>(),
        vec!["Methionine d8", "Creatinine d3", "Betaine d9"]
    );
    assert_eq!(table.get("QC01_HILIC_Pos_5", "Methionine d8"), Some(&Cell::Float(7.55)));
    assert_eq!(table.get("QC01_HILIC_Pos_5", "Betaine d9"), None);
    assert_eq!(table.get("QC01_HILIC_Pos_6", "Creatinine d3"), None);
}

#[test]
fn test_dual_reading_splits_on_first_colon() {
    let table = rt_table();
    let cell = table.get("QC01_HILIC_Pos_6", "Methionine d8").unwrap();

    assert_eq!(cell.as_f64(), Some(7.54));
    assert_eq!(cell.delta(), Some(0.061));
}

#[test]
fn test_invalid_reading_is_parse_error() {
    let csv = "Sample,Methionine d8\nQC01_HILIC_Pos_5,abc\n";
    let err = Table::from_csv_reader(csv.as_bytes(), "rt", &TableSchema::measurement()).unwrap_err();

    match err {
        TableError::InvalidValue { column, row, .. } => {
            assert_eq!(column, "Methionine d8");
            assert_eq!(row, 0);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_legacy_title_key() {
    let csv = "Title,Methionine d8\nQC01_HILIC_Pos_5,7.55\n";
    let table = Table::from_csv_reader(csv.as_bytes(), "rt", &TableSchema::measurement()).unwrap();
    assert_eq!(table.key_column(), "Title");
    assert_eq!(table.keys().collect::<Vec<_>>(), vec!["QC01_HILIC_Pos_5"]);
}

#[test]
fn test_missing_key_column() {
    let csv = "Filename,Methionine d8\nQC01,7.55\n";
    let err = Table::from_csv_reader(csv.as_bytes(), "rt", &TableSchema::measurement()).unwrap_err();
    assert!(matches!(err, TableError::MissingColumn(_)));
}

#[test]
fn test_sequence_preamble_is_skipped() {
    let table = Table::from_csv_reader(SEQUENCE_CSV.as_bytes(), "sequence", &TableSchema::sequence())
        .unwrap();

    assert_eq!(table.len(), 2);
    assert_eq!(table.key_column(), sequence_columns::FILE_NAME);
    assert_eq!(
        table.get("QC01_HILIC_Pos_5", sequence_columns::POSITION),
        Some(&Cell::Text("P1-A1".to_string()))
    );
    assert_eq!(
        table.get("QC01_HILIC_Pos_5", sequence_columns::INJECTION_VOLUME),
        Some(&Cell::Float(5.0))
    );
    assert_eq!(table.get("Blank_HILIC_Pos_1", sequence_columns::INJECTION_VOLUME), None);
}

#[test]
fn test_sequence_requires_columns() {
    let csv = "File Name,Position\nQC01,P1-A1\n";
    let err = Table::from_csv_reader(csv.as_bytes(), "sequence", &TableSchema::sequence()).unwrap_err();
    assert!(matches!(err, TableError::MissingColumn(c) if c == sequence_columns::STUDY));
}

#[test]
fn test_duplicate_column_rejected() {
    let csv = "Sample,Methionine d8,Methionine d8\nQC01,1,2\n";
    let err = Table::from_csv_reader(csv.as_bytes(), "rt", &TableSchema::measurement()).unwrap_err();
    assert!(matches!(err, TableError::DuplicateColumn(_)));
}

#[test]
fn test_filter_keeps_index_labels() {
    let table = Table::from_csv_reader(SEQUENCE_CSV.as_bytes(), "sequence", &TableSchema::sequence())
        .unwrap();

    let hit = table.filter_eq(sequence_columns::FILE_NAME, "Blank_HILIC_Pos_1");
    assert_eq!(hit.len(), 1);
    assert_eq!(hit.index(), &[1]);

    let miss = table.filter_eq(sequence_columns::FILE_NAME, "qc01_hilic_pos_5");
    assert!(miss.is_empty());
    assert_eq!(miss.columns().len(), table.columns().len());
}

#[test]
fn test_transport_roundtrip() {
    let table = rt_table();
    let transport = table.to_transport();

    assert_eq!(transport.columns[0], "Sample");
    assert_eq!(transport.index, vec![0, 1]);
    assert_eq!(transport.data[0][3], serde_json::Value::Null);
    assert_eq!(transport.data[1][1], serde_json::json!("7.54: 0.061"));

    let json = serde_json::to_string(&transport).unwrap();
    let restored: TransportTable = serde_json::from_str(&json).unwrap();
    let rebuilt = Table::from_transport(table.name(), &restored, &TableSchema::measurement()).unwrap();
    assert_eq!(rebuilt, table);
}

#[test]
fn test_transport_keeps_null_like_text() {
    let columns = vec![
        Column::new("Sample", ColumnType::Text),
        Column::new("Methionine d8", ColumnType::Text),
        Column::new("Betaine d9", ColumnType::Text),
    ];
    let mut table = Table::new("fails", columns, 0).unwrap();
    table
        .push_row(vec![
            Some(Cell::Text("QC01_HILIC_Pos_5".to_string())),
            Some(Cell::Text("NA".to_string())),
            None,
        ])
        .unwrap();

    let rebuilt = Table::from_transport("fails", &table.to_transport(), &TableSchema::annotations()).unwrap();
    assert_eq!(rebuilt.get("QC01_HILIC_Pos_5", "Methionine d8"), Some(&Cell::Text("NA".to_string())));
    assert_eq!(rebuilt.get("QC01_HILIC_Pos_5", "Betaine d9"), None);
    assert_eq!(rebuilt, table);

    // CSV ingestion still reads the token as absent
    let csv = "Sample,Methionine d8\nQC01_HILIC_Pos_5,NA\n";
    let csv = Table::from_csv_reader(csv.as_bytes(), "fails", &TableSchema::annotations()).unwrap();
    assert_eq!(csv.get("QC01_HILIC_Pos_5", "Methionine d8"), None);
}

#[test]
fn test_schema_validates_typed_table() {
    let table = rt_table();
    assert!(TableSchema::measurement().validate(&table).is_ok());
    assert!(matches!(
        TableSchema::annotations().validate(&table),
        Err(TableError::TypeMismatch { expected: ColumnType::Text, .. })
    ));
    assert!(matches!(
        TableSchema::sequence().validate(&table),
        Err(TableError::MissingColumn(_))
    ));
}

#[test]
fn test_parquet_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rt.parquet");

    let table = rt_table();
    table.write_parquet(&path).unwrap();
    let restored = Table::read_parquet(&path).unwrap();

    assert_eq!(restored, table);
}

#[test]
fn test_parquet_empty_table() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.parquet");

    let table = Table::new(
        "empty",
        vec![
            Column::new("Sample", ColumnType::Text),
            Column::new("Methionine d8", ColumnType::Reading),
        ],
        0,
    )
    .unwrap();
    table.write_parquet(&path).unwrap();

    let restored = Table::read_parquet(&path).unwrap();
    assert!(restored.is_empty());
    assert_eq!(restored.columns(), table.columns());
}

#[test]
fn test_csv_write_roundtrip() {
    let table = rt_table();
    let mut buffer = Vec::new();
    table.to_csv_writer(&mut buffer).unwrap();

    let restored =
        Table::from_csv_reader(buffer.as_slice(), table.name(), &TableSchema::measurement()).unwrap();
    assert_eq!(restored, table);
}
