// ==========================================
// CaseImporter 統合テスト
// ==========================================
// 対象: シート順序・患者 upsert・行スキップ・トランザクション
// ==========================================

mod test_helpers;

use casefile_import::config::ImportSettings;
use casefile_import::domain::{DiagnosticKind, RecordKind};
use casefile_import::importer::workbook::{column_letter_to_index, Workbook};
use casefile_import::importer::{CaseImporter, CaseImporterImpl, ImportError};
use casefile_import::logging;
use casefile_import::repository::{MemoryRecordStore, RecordStore, SqliteRecordStore};
use chrono::NaiveDate;
use test_helpers::*;

fn importer(store: MemoryRecordStore) -> CaseImporterImpl<MemoryRecordStore> {
    CaseImporterImpl::new(store, ImportSettings::default())
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn full_workbook_in_reverse_order() -> Workbook {
    let patients = sheet(
        "患者",
        PATIENT_HEADERS,
        &[vec![("A", text("P001")), ("B", number(34.0)), ("E", text("2024/01/10"))]],
    );
    let surgeries = sheet(
        "手術",
        SURGERY_HEADERS,
        &[vec![
            ("A", text("P001")),
            ("B", text("豊胸")),
            ("C", text("脂肪注入")),
            ("H", number(200.0)),
            ("J", text("2024/03/15")),
            ("X", number(250.0)),
        ]],
    );
    let labs = sheet(
        "血液検査",
        LAB_HEADERS,
        &[vec![("A", text("P001")), ("B", text("2024/03/01")), ("C", number(6.1))]],
    );
    let follow_ups = sheet(
        "経過",
        FOLLOW_UP_HEADERS,
        &[vec![
            ("A", text("P001")),
            ("B", text("2024/03/15")),
            ("C", text("2024/06/14")),
            ("F", number(340.0)),
        ]],
    );
    // 文書内の並びは依存関係と逆
    Workbook::new(vec![follow_ups, labs, surgeries, patients])
}

#[tokio::test]
async fn test_sheets_are_imported_in_dependency_order() {
    logging::init_test();
    let importer = importer(MemoryRecordStore::new());

    let report = importer
        .import_workbook(&full_workbook_in_reverse_order(), Some("cases.xlsx"))
        .await
        .unwrap();

    let kinds: Vec<RecordKind> = report.sheets.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![RecordKind::Patient, RecordKind::Surgery, RecordKind::LabData, RecordKind::FollowUp]
    );
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    assert_eq!(report.summary.total(), 4);

    let store = importer.store();
    let surgery = &store.surgeries()[0];
    let follow_up = &store.follow_ups()[0];
    assert_eq!(follow_up.surgery_id, surgery.id);
    assert_eq!(follow_up.timing.as_deref(), Some("3M"));
    assert_eq!(store.lab_data()[0].wbc, Some(6.1));
}

#[tokio::test]
async fn test_patient_rows_upsert_by_key() {
    let importer = importer(MemoryRecordStore::new());

    let first = Workbook::new(vec![sheet(
        "患者",
        PATIENT_HEADERS,
        &[vec![("A", text("P001")), ("B", number(30.0)), ("C", text("女性"))]],
    )]);
    importer.import_workbook(&first, None).await.unwrap();

    let second = Workbook::new(vec![sheet(
        "患者",
        PATIENT_HEADERS,
        &[
            vec![("A", text("P001")), ("B", number(31.0)), ("C", text("女性"))],
            vec![("A", text("P002")), ("B", number(45.0))],
        ],
    )]);
    let report = importer.import_workbook(&second, None).await.unwrap();

    assert_eq!(report.summary.patients_created, 1);
    assert_eq!(report.summary.patients_updated, 1);

    let patients = importer.store().patients();
    assert_eq!(patients.len(), 2);
    let p001 = patients.iter().find(|p| p.patient_id == "P001").unwrap();
    assert_eq!(p001.age, Some(31));
    assert_eq!(p001.name.as_deref(), Some("患者P001"));
}

#[tokio::test]
async fn test_keyless_row_is_skipped_and_others_imported() {
    let store = MemoryRecordStore::new();
    store
        .upsert_patient(&casefile_import::Patient::new("P001"))
        .await
        .unwrap();
    let importer = importer(store);

    let rows: Vec<_> = (1..=10)
        .map(|n| {
            let key = if n == 5 { "" } else { "P001" };
            vec![
                ("A", text(key)),
                ("C", text("脂肪注入")),
                ("J", text(&format!("2024/04/{:02}", n))),
            ]
        })
        .collect();
    let workbook = Workbook::new(vec![sheet("手術", SURGERY_HEADERS, &rows)]);

    let report = importer.import_workbook(&workbook, None).await.unwrap();

    assert_eq!(report.summary.surgeries, 9);
    let skipped: Vec<_> = report.diagnostics_of(DiagnosticKind::RowSkipped).collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].row, Some(5));
    assert_eq!(report.diagnostics.len(), 1);
}

#[tokio::test]
async fn test_rows_with_unknown_parent_are_skipped() {
    let importer = importer(MemoryRecordStore::new());
    let workbook = Workbook::new(vec![
        sheet("患者", PATIENT_HEADERS, &[vec![("A", text("P001"))]]),
        sheet(
            "手術",
            SURGERY_HEADERS,
            &[
                vec![("A", text("P999")), ("J", text("2024/03/15"))],
                vec![("A", text("P001")), ("J", text("日付なし"))],
            ],
        ),
        sheet(
            "経過",
            FOLLOW_UP_HEADERS,
            &[vec![("A", text("P001")), ("B", text("2024/03/15")), ("F", number(300.0))]],
        ),
    ]);

    let report = importer.import_workbook(&workbook, None).await.unwrap();

    assert_eq!(report.summary.patients_created, 1);
    assert_eq!(report.summary.surgeries, 0);
    assert_eq!(report.summary.follow_ups, 0);

    let messages: Vec<String> = report
        .diagnostics_of(DiagnosticKind::RowSkipped)
        .map(|d| d.to_string())
        .collect();
    assert_eq!(messages.len(), 3);
    assert!(messages[0].contains("P999"));
    assert!(messages[0].contains("患者が見つかりません"));
    assert!(messages[1].contains("手術日"));
    assert!(messages[2].contains("2024-03-15"));
}

#[tokio::test]
async fn test_same_day_surgeries_are_reported_as_ambiguous() {
    let importer = importer(MemoryRecordStore::new());
    let workbook = Workbook::new(vec![
        sheet("患者", PATIENT_HEADERS, &[vec![("A", text("P001"))]]),
        sheet(
            "手術",
            SURGERY_HEADERS,
            &[
                vec![("A", text("P001")), ("C", text("脂肪注入")), ("J", text("2024/03/15"))],
                vec![("A", text("P001")), ("C", text("脂肪吸引")), ("J", text("2024/03/15"))],
            ],
        ),
        sheet(
            "経過",
            FOLLOW_UP_HEADERS,
            &[vec![("A", text("P001")), ("B", text("2024/03/15")), ("E", text("1M"))]],
        ),
    ]);

    let report = importer.import_workbook(&workbook, None).await.unwrap();

    assert_eq!(report.summary.follow_ups, 1);
    assert_eq!(report.diagnostics_of(DiagnosticKind::AmbiguousSurgery).count(), 1);

    let store = importer.store();
    let first = store
        .surgeries()
        .into_iter()
        .find(|s| s.surgery_type.as_deref() == Some("脂肪注入"))
        .unwrap();
    assert_eq!(store.follow_ups()[0].surgery_id, first.id);
}

#[tokio::test]
async fn test_unparsable_values_are_reported_and_row_kept() {
    let importer = importer(MemoryRecordStore::new());
    // 既定配置（C..AU）の外にある未照合列だけが未対応になる
    let mut lab_headers = vec!["患者ID", "検査日", "白血球数(WBC)"];
    lab_headers.resize(column_letter_to_index("AV").unwrap(), "");
    lab_headers.push("特殊検査X");
    let workbook = Workbook::new(vec![
        sheet("患者", PATIENT_HEADERS, &[vec![("A", text("P001")), ("B", text("三十"))]]),
        sheet(
            "血液検査",
            &lab_headers,
            &[vec![("A", text("P001")), ("B", text("不明")), ("C", text("溶血"))]],
        ),
    ]);

    let report = importer.import_workbook(&workbook, None).await.unwrap();

    assert_eq!(report.summary.patients_created, 1);
    assert_eq!(report.summary.lab_data, 1);
    assert_eq!(report.diagnostics_of(DiagnosticKind::ValueUnparsable).count(), 3);
    assert_eq!(report.diagnostics_of(DiagnosticKind::FieldUnmapped).count(), 1);

    let store = importer.store();
    assert_eq!(store.patients()[0].age, None);
    let lab = &store.lab_data()[0];
    assert_eq!(lab.test_date, None);
    assert_eq!(lab.wbc, None);
}

#[tokio::test]
async fn test_commit_failure_is_surfaced_and_nothing_persists() {
    let importer = importer(MemoryRecordStore::with_commit_failure("disk full"));

    let err = importer
        .import_workbook(&full_workbook_in_reverse_order(), None)
        .await
        .unwrap_err();

    match err {
        ImportError::Commit(message) => {
            assert_eq!(message, "トランザクション処理に失敗しました: disk full")
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(importer.store().patients().is_empty());
    assert!(!importer.store().in_transaction());
}

#[tokio::test]
async fn test_store_error_rolls_back_whole_import() {
    let store = MemoryRecordStore::with_write_failure(RecordKind::LabData, "locked");
    let importer = importer(store);

    let err = importer
        .import_workbook(&full_workbook_in_reverse_order(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, ImportError::Store(_)));
    let store = importer.store();
    assert!(store.patients().is_empty());
    assert!(store.surgeries().is_empty());
    assert!(!store.in_transaction());
}

#[tokio::test]
async fn test_csv_files_into_sqlite() {
    let (_db_file, db_path) = create_test_db().unwrap();
    let dir = tempfile::tempdir().unwrap();

    let patients = write_file(
        dir.path(),
        "patients.csv",
        &csv_text(
            PATIENT_HEADERS,
            &[
                vec![("A", "P001"), ("B", "34"), ("E", "2024-01-10")],
                vec![("A", "P002"), ("B", "")],
            ],
        ),
    );
    let surgeries = write_file(
        dir.path(),
        "surgeries.csv",
        &csv_text(
            SURGERY_HEADERS,
            &[vec![
                ("A", "P001"),
                ("B", "豊胸"),
                ("C", "脂肪注入"),
                ("D", "Condense"),
                ("J", "2024/03/15"),
                ("O", "160"),
                ("P", "51.2"),
                ("X", "250"),
            ]],
        ),
    );

    let importer = CaseImporterImpl::new(
        SqliteRecordStore::new(&db_path).unwrap(),
        ImportSettings::default(),
    );
    let first = importer.import_file(&patients).await.unwrap();
    let second = importer.import_file(&surgeries).await.unwrap();

    assert!(first.committed && second.committed);
    assert_eq!(first.file_name.as_deref(), Some("patients.csv"));
    assert_eq!(first.sheets[0].name, "patients");
    assert_eq!(second.summary.surgeries, 1);

    let store = importer.store();
    assert_eq!(store.count_patients().unwrap(), 2);
    let p002 = store.find_patient_by_key("P002").await.unwrap().unwrap();
    assert_eq!(p002.age, Some(0));

    let surgery = store
        .find_surgery_by_patient_and_date("P001", date(2024, 3, 15))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(surgery.procedure.as_deref(), Some("脂肪注入 (Condense)"));
    assert_eq!(surgery.measurements.body_weight_kg, Some(51.2));
}

#[tokio::test]
async fn test_document_errors_abort_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let importer = importer(MemoryRecordStore::new());

    let missing = importer
        .import_file(&dir.path().join("missing.xlsx"))
        .await
        .unwrap_err();
    assert!(matches!(missing, ImportError::FileNotFound(_)));

    let pdf = write_file(dir.path(), "cases.pdf", "%PDF-1.4");
    let unsupported = importer.import_file(&pdf).await.unwrap_err();
    assert!(matches!(unsupported, ImportError::UnsupportedFormat(_)));

    let broken = write_file(dir.path(), "broken.xlsx", "not a zip archive");
    let document = importer.import_file(&broken).await.unwrap_err();
    assert!(matches!(document, ImportError::Document(_)));

    assert!(!importer.store().in_transaction());
    assert!(importer.store().patients().is_empty());
}

#[tokio::test]
async fn test_lab_csv_with_free_form_headers_reads_by_position() {
    let (_db_file, db_path) = create_test_db().unwrap();
    let dir = tempfile::tempdir().unwrap();

    let patients = write_file(
        dir.path(),
        "patients.csv",
        &csv_text(PATIENT_HEADERS, &[vec![("A", "P001")]]),
    );
    let mut lab_headers = vec!["患者ID", "検査日", "白血球数(WBC)"];
    lab_headers.resize(column_letter_to_index("AU").unwrap() + 1, "");
    lab_headers[column_letter_to_index("M").unwrap()] = "PT活性";
    lab_headers[column_letter_to_index("AA").unwrap()] = "T-Bil";
    lab_headers[column_letter_to_index("AI").unwrap()] = "HBs抗体";
    lab_headers[column_letter_to_index("AP").unwrap()] = "HCV抗体";
    let labs = write_file(
        dir.path(),
        "labs.csv",
        &csv_text(
            &lab_headers,
            &[vec![
                ("A", "P001"),
                ("B", "2024-03-01"),
                ("C", "5.9"),
                ("M", "98"),
                ("AA", "0.7"),
                ("AI", "陽性"),
                ("AP", "陰性"),
                ("AU", "190"),
            ]],
        ),
    );

    let importer = CaseImporterImpl::new(
        SqliteRecordStore::new(&db_path).unwrap(),
        ImportSettings::default(),
    );
    importer.import_file(&patients).await.unwrap();
    let report = importer.import_file(&labs).await.unwrap();

    assert!(report.committed);
    assert_eq!(report.summary.lab_data, 1);
    assert_eq!(report.diagnostics_of(DiagnosticKind::FieldUnmapped).count(), 0);

    let store = importer.store();
    assert_eq!(store.count_lab_data().unwrap(), 1);
    let lab = &store.list_lab_data_by_patient("P001").unwrap()[0];
    assert_eq!(lab.test_date, Some(date(2024, 3, 1)));
    assert_eq!(lab.wbc, Some(5.9));
    assert_eq!(lab.pt_activity, Some(98.0));
    assert_eq!(lab.total_bilirubin, Some(0.7));
    assert_eq!(lab.hbs_antibody_result.as_deref(), Some("陽性"));
    assert_eq!(lab.hcv_antibody_result.as_deref(), Some("陰性"));
    assert_eq!(lab.ldh, Some(190.0));
}
