// ==========================================
// 症例記録インポート - 取込実装
// ==========================================
// 職責: 文書 → 記録ストア（1 回の取込 = 1 トランザクション）
// 流程: 解析 → シート判定 → 種別順の行取込 → コミット
// 失敗時:
//   - 文書解析失敗: 書き込み前に中断
//   - 記録ストア失敗: ロールバックして中断
//   - 行・値の問題: Diagnostic として報告し継続
// ==========================================

use crate::config::ImportSettings;
use crate::domain::{
    Diagnostic, DiagnosticKind, ImportReport, LabData, RecordKind, SheetOutcome, Surgery,
};
use crate::importer::case_importer_trait::{CaseImporter, LabPasteRequest};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::FieldMapper;
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::lab_paste::{LabPaste, LabPasteParser};
use crate::importer::row_mapper::{
    map_follow_up_row, map_lab_row, map_patient_row, map_surgery_row, resolve_lab_columns,
    FieldIssue, SkipReason, SurgeryLocator, KEY_COLUMN,
};
use crate::importer::sheet_classifier::{plan_sheets, SheetPlan};
use crate::importer::workbook::{SheetRow, Workbook, Worksheet};
use crate::repository::{RecordStore, RepositoryResult, UpsertOutcome};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 貼り付け取込の報告上のシート名
pub const LAB_PASTE_SOURCE: &str = "検査結果貼り付け";

// ==========================================
// CaseImporterImpl
// ==========================================
pub struct CaseImporterImpl<S>
where
    S: RecordStore,
{
    store: S,
    settings: ImportSettings,
    mapper: FieldMapper,
    file_parser: UniversalFileParser,
    dry_run: bool, // true: 最後にロールバック
}

impl<S> CaseImporterImpl<S>
where
    S: RecordStore,
{
    pub fn new(store: S, settings: ImportSettings) -> Self {
        Self {
            store,
            settings,
            mapper: FieldMapper::new(),
            file_parser: UniversalFileParser,
            dry_run: false,
        }
    }

    /// 検証のみ（書き込みは確定しない）
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_mapper(mut self, mapper: FieldMapper) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    // ==========================================
    // トランザクション
    // ==========================================

    /// 中断時のロールバック。失敗は記録のみ
    async fn abort(&self) {
        if let Err(err) = self.store.rollback().await {
            warn!(error = %err, "ロールバックに失敗");
        }
    }

    /// コミット（dry-run はロールバック）
    async fn finish(&self, report: &mut ImportReport) -> ImportResult<()> {
        if self.dry_run {
            self.store.rollback().await?;
            info!(batch_id = %report.batch_id, "検証のみのため変更を破棄");
            return Ok(());
        }

        if let Err(err) = self.store.commit().await {
            error!(batch_id = %report.batch_id, error = %err, "コミットに失敗");
            self.abort().await;
            return Err(ImportError::Commit(err.to_string()));
        }
        report.committed = true;
        Ok(())
    }

    // ==========================================
    // シート取込
    // ==========================================

    async fn import_sheets(
        &self,
        plan: &SheetPlan<'_>,
        report: &mut ImportReport,
    ) -> RepositoryResult<()> {
        for (kind, sheet) in &plan.ordered {
            debug!(sheet = %sheet.name, kind = %kind, "シート取込開始");
            let imported = match kind {
                RecordKind::Patient => self.import_patients(sheet, report).await?,
                RecordKind::Surgery => self.import_surgeries(sheet, report).await?,
                RecordKind::LabData => self.import_lab_sheet(sheet, report).await?,
                RecordKind::FollowUp => self.import_follow_ups(sheet, report).await?,
            };
            info!(sheet = %sheet.name, kind = %kind, imported, "シート取込完了");
            report.sheets.push(SheetOutcome {
                name: sheet.name.clone(),
                kind: *kind,
                imported,
            });
        }
        Ok(())
    }

    async fn import_patients(
        &self,
        sheet: &Worksheet,
        report: &mut ImportReport,
    ) -> RepositoryResult<usize> {
        let mut imported = 0;
        for row in sheet.data_rows().filter(|row| !row.is_blank()) {
            let mapped = match map_patient_row(&row, self.settings.patient_max_age) {
                Ok(mapped) => mapped,
                Err(reason) => {
                    report.push(skipped(sheet, &row, &reason));
                    continue;
                }
            };
            let fields = mapped.record;
            push_issues(report, sheet, &row, &fields.patient_id, mapped.issues);

            // 既存患者は行の値で上書き（後勝ち）
            let mut patient = match self.store.find_patient_by_key(&fields.patient_id).await? {
                Some(mut existing) => {
                    fields.apply_to(&mut existing);
                    existing
                }
                None => fields.to_new_patient(),
            };
            patient.ensure_name();

            match self.store.upsert_patient(&patient).await? {
                UpsertOutcome::Created => report.summary.patients_created += 1,
                UpsertOutcome::Updated => report.summary.patients_updated += 1,
            }
            imported += 1;
        }
        Ok(imported)
    }

    async fn import_surgeries(
        &self,
        sheet: &Worksheet,
        report: &mut ImportReport,
    ) -> RepositoryResult<usize> {
        let mut imported = 0;
        for row in sheet.data_rows().filter(|row| !row.is_blank()) {
            let mapped = match map_surgery_row(&row) {
                Ok(mapped) => mapped,
                Err(reason) => {
                    report.push(skipped(sheet, &row, &reason));
                    continue;
                }
            };
            let surgery = mapped.record;
            if self.store.find_patient_by_key(&surgery.patient_id).await?.is_none() {
                report.push(skipped(sheet, &row, &SkipReason::PatientNotFound));
                continue;
            }
            push_issues(report, sheet, &row, &surgery.patient_id, mapped.issues);

            self.store.create_surgery(&surgery).await?;
            report.summary.surgeries += 1;
            imported += 1;
        }
        Ok(imported)
    }

    async fn import_lab_sheet(
        &self,
        sheet: &Worksheet,
        report: &mut ImportReport,
    ) -> RepositoryResult<usize> {
        let columns = resolve_lab_columns(&sheet.headers(), &self.mapper);
        if !columns.unmapped.is_empty() {
            warn!(sheet = %sheet.name, unmapped = ?columns.unmapped, "未対応の検査項目列");
            report.push(Diagnostic::new(
                DiagnosticKind::FieldUnmapped,
                &sheet.name,
                format!("未対応の列見出し: {}", columns.unmapped.join(", ")),
            ));
        }

        let mut imported = 0;
        for row in sheet.data_rows().filter(|row| !row.is_blank()) {
            let mapped = match map_lab_row(&row, &columns) {
                Ok(mapped) => mapped,
                Err(reason) => {
                    report.push(skipped(sheet, &row, &reason));
                    continue;
                }
            };
            let lab = mapped.record;
            if self.store.find_patient_by_key(&lab.patient_id).await?.is_none() {
                report.push(skipped(sheet, &row, &SkipReason::PatientNotFound));
                continue;
            }
            push_issues(report, sheet, &row, &lab.patient_id, mapped.issues);

            self.store.create_lab_data(&lab).await?;
            report.summary.lab_data += 1;
            imported += 1;
        }
        Ok(imported)
    }

    async fn import_follow_ups(
        &self,
        sheet: &Worksheet,
        report: &mut ImportReport,
    ) -> RepositoryResult<usize> {
        let mut imported = 0;
        for row in sheet.data_rows().filter(|row| !row.is_blank()) {
            let mapped = match map_follow_up_row(&row) {
                Ok(mapped) => mapped,
                Err(reason) => {
                    report.push(skipped(sheet, &row, &reason));
                    continue;
                }
            };
            let draft = mapped.record;
            if self.store.find_patient_by_key(&draft.patient_id).await?.is_none() {
                report.push(skipped(sheet, &row, &SkipReason::PatientNotFound));
                continue;
            }

            let surgery = match draft.locator {
                SurgeryLocator::ById(id) => match self.store.get_surgery(id).await? {
                    Some(surgery) if surgery.patient_id == draft.patient_id => surgery,
                    _ => {
                        report.push(skipped(sheet, &row, &SkipReason::SurgeryIdNotFound(id)));
                        continue;
                    }
                },
                SurgeryLocator::ByDate(date) => {
                    match self.surgery_on(&draft.patient_id, date, &sheet.name, Some(&row), report).await? {
                        Some(surgery) => surgery,
                        None => {
                            report.push(skipped(sheet, &row, &SkipReason::SurgeryNotFound(date)));
                            continue;
                        }
                    }
                }
            };
            push_issues(report, sheet, &row, &draft.patient_id, mapped.issues);

            let follow_up = draft.into_follow_up(&surgery);
            self.store.create_follow_up(&follow_up).await?;
            report.summary.follow_ups += 1;
            imported += 1;
        }
        Ok(imported)
    }

    /// 患者・手術日で手術を特定。同日複数なら最初に登録された手術
    async fn surgery_on(
        &self,
        patient_id: &str,
        date: NaiveDate,
        source: &str,
        row: Option<&SheetRow<'_>>,
        report: &mut ImportReport,
    ) -> RepositoryResult<Option<Surgery>> {
        let candidates = self
            .store
            .find_surgeries_by_patient_and_date(patient_id, date)
            .await?;
        if candidates.len() > 1 {
            let mut diagnostic = Diagnostic::new(
                DiagnosticKind::AmbiguousSurgery,
                source,
                format!(
                    "手術日 {} の手術が {} 件あるため、最初に登録された手術に紐付けました",
                    date.format("%Y-%m-%d"),
                    candidates.len()
                ),
            )
            .with_key(patient_id);
            if let Some(row) = row {
                diagnostic = diagnostic.at_row(row.number);
            }
            report.push(diagnostic);
        }
        Ok(candidates.into_iter().next())
    }

    // ==========================================
    // 検査結果貼り付け
    // ==========================================

    async fn write_lab_paste(
        &self,
        request: &LabPasteRequest,
        parsed: &LabPaste,
        report: &mut ImportReport,
    ) -> ImportResult<()> {
        if self.store.find_patient_by_key(&request.patient_id).await?.is_none() {
            return Err(ImportError::InvalidInput(format!(
                "患者が見つかりません: {}",
                request.patient_id
            )));
        }

        let mut lab = LabData::new(request.patient_id.clone());
        lab.test_date = Some(request.test_date);

        if let Some(date) = request.surgery_date {
            let surgery = self
                .surgery_on(&request.patient_id, date, LAB_PASTE_SOURCE, None, report)
                .await?
                .ok_or_else(|| {
                    ImportError::InvalidInput(format!(
                        "手術日 {} の手術が見つかりません",
                        date.format("%Y-%m-%d")
                    ))
                })?;
            lab.surgery_id = Some(surgery.id);
        }

        let applied = parsed.apply_to(&mut lab);
        for line in &parsed.unmatched {
            report.push(
                Diagnostic::new(
                    DiagnosticKind::FieldUnmapped,
                    LAB_PASTE_SOURCE,
                    format!("照合できない行: {}", line.trim()),
                )
                .with_key(request.patient_id.as_str()),
            );
        }

        self.store.create_lab_data(&lab).await?;
        report.summary.lab_data = 1;
        report.sheets.push(SheetOutcome {
            name: LAB_PASTE_SOURCE.to_string(),
            kind: RecordKind::LabData,
            imported: 1,
        });
        debug!(lab_data_id = %lab.id, applied, "検査記録を作成");
        Ok(())
    }
}

#[async_trait]
impl<S> CaseImporter for CaseImporterImpl<S>
where
    S: RecordStore,
{
    #[instrument(skip(self, file_path), fields(path = %file_path.display()))]
    async fn import_file(&self, file_path: &Path) -> ImportResult<ImportReport> {
        let workbook = self.file_parser.parse(file_path).map_err(|e| {
            error!(error = %e, "ファイル解析に失敗");
            e
        })?;
        let file_name = file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        self.import_workbook(&workbook, file_name.as_deref()).await
    }

    #[instrument(skip(self, workbook), fields(batch_id))]
    async fn import_workbook(
        &self,
        workbook: &Workbook,
        file_name: Option<&str>,
    ) -> ImportResult<ImportReport> {
        let start_time = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("batch_id", batch_id.as_str());
        info!(
            batch_id = %batch_id,
            file_name = file_name.unwrap_or("-"),
            sheets = workbook.sheets.len(),
            dry_run = self.dry_run,
            "取込開始"
        );

        let mut report = ImportReport::new(batch_id.as_str());
        report.file_name = file_name.map(str::to_string);

        let plan = plan_sheets(workbook);
        for name in &plan.unrecognized {
            warn!(sheet = %name, "種別を判定できないシート");
            report.push(Diagnostic::new(
                DiagnosticKind::SheetUnrecognized,
                name.as_str(),
                "見出し行から種別を判定できないため読み飛ばしました",
            ));
        }

        self.store.begin().await?;
        if let Err(err) = self.import_sheets(&plan, &mut report).await {
            error!(batch_id = %batch_id, error = %err, "記録ストアの操作に失敗したためロールバック");
            self.abort().await;
            return Err(err.into());
        }
        self.finish(&mut report).await?;

        report.elapsed_ms = start_time.elapsed().as_millis() as u64;
        info!(
            batch_id = %batch_id,
            patients_created = report.summary.patients_created,
            patients_updated = report.summary.patients_updated,
            surgeries = report.summary.surgeries,
            lab_data = report.summary.lab_data,
            follow_ups = report.summary.follow_ups,
            diagnostics = report.diagnostics.len(),
            elapsed_ms = report.elapsed_ms,
            "取込完了"
        );
        Ok(report)
    }

    #[instrument(skip(self, request), fields(patient_id = %request.patient_id))]
    async fn import_lab_paste(&self, request: &LabPasteRequest) -> ImportResult<ImportReport> {
        let start_time = Instant::now();
        let mut report = ImportReport::new(Uuid::new_v4().to_string());

        let parser = LabPasteParser::new(self.mapper.clone(), self.settings.lab_zero_as_absent);
        let parsed = parser.parse(&request.text);
        if parsed.items.is_empty() {
            return Err(ImportError::InvalidInput(
                "取り込める検査項目がありません".to_string(),
            ));
        }

        self.store.begin().await?;
        if let Err(err) = self.write_lab_paste(request, &parsed, &mut report).await {
            warn!(error = %err, "検査結果貼り付けの取込を中断");
            self.abort().await;
            return Err(err);
        }
        self.finish(&mut report).await?;

        report.elapsed_ms = start_time.elapsed().as_millis() as u64;
        info!(
            batch_id = %report.batch_id,
            matched = parsed.items.len(),
            unmatched = parsed.unmatched.len(),
            "検査結果貼り付けの取込完了"
        );
        Ok(report)
    }
}

// ===== 診断 =====

fn skipped(sheet: &Worksheet, row: &SheetRow<'_>, reason: &SkipReason) -> Diagnostic {
    debug!(sheet = %sheet.name, row = row.number, reason = %reason, "行スキップ");
    let diagnostic = Diagnostic::new(DiagnosticKind::RowSkipped, sheet.name.as_str(), reason.to_string())
        .at_row(row.number);
    match row.text(KEY_COLUMN) {
        Some(key) if !key.trim().is_empty() => diagnostic.with_key(key.trim()),
        _ => diagnostic,
    }
}

fn push_issues(
    report: &mut ImportReport,
    sheet: &Worksheet,
    row: &SheetRow<'_>,
    key: &str,
    issues: Vec<FieldIssue>,
) {
    for issue in issues {
        report.push(
            Diagnostic::new(issue.kind, sheet.name.as_str(), issue.message)
                .at_row(row.number)
                .with_key(key),
        );
    }
}
