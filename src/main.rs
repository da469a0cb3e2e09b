// ==========================================
// 症例記録インポート - CLI エントリ
// ==========================================
// 使い方:
//   casefile-import <file> [--db PATH] [--dry-run] [--json]
//   casefile-import lab-paste <patient-id> <yyyy-mm-dd> <text-file> [--surgery-date yyyy-mm-dd]
//   casefile-import retention <follow-up-id>
//   casefile-import config [<key> <value>]
// ==========================================

use anyhow::{anyhow, bail, Context, Result};
use casefile_import::app::{get_default_db_path, AppState};
use casefile_import::importer::LabPasteRequest;
use casefile_import::{logging, APP_NAME, VERSION};
use chrono::NaiveDate;

const USAGE: &str = "\
使い方:
  casefile-import <file> [--db PATH] [--dry-run] [--json]
  casefile-import lab-paste <patient-id> <yyyy-mm-dd> <text-file> [--surgery-date yyyy-mm-dd] [--db PATH] [--json]
  casefile-import retention <follow-up-id> [--db PATH] [--json]
  casefile-import config [<key> <value>] [--db PATH]";

/// コマンドライン引数
#[derive(Debug, Default)]
struct CliArgs {
    positional: Vec<String>,
    db_path: Option<String>,
    surgery_date: Option<String>,
    dry_run: bool,
    json: bool,
}

impl CliArgs {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut parsed = CliArgs::default();
        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--db" => {
                    parsed.db_path = Some(iter.next().context("--db にはパスが必要です")?);
                }
                "--surgery-date" => {
                    parsed.surgery_date =
                        Some(iter.next().context("--surgery-date には日付が必要です")?);
                }
                "--dry-run" => parsed.dry_run = true,
                "--json" => parsed.json = true,
                "-h" | "--help" => bail!("{}", USAGE),
                flag if flag.starts_with("--") => bail!("未知のオプション: {}\n{}", flag, USAGE),
                _ => parsed.positional.push(arg),
            }
        }
        Ok(parsed)
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("日付は yyyy-mm-dd 形式で指定してください: {}", raw))
}

fn print_output<T: serde::Serialize>(value: &T, json: bool, lines: &[String]) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        for line in lines {
            println!("{}", line);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse(std::env::args().skip(1))?;
    if args.json {
        logging::init_json();
    } else {
        logging::init();
    }

    let db_path = args.db_path.clone().unwrap_or_else(get_default_db_path);
    tracing::info!(app = APP_NAME, version = VERSION, db_path = %db_path, "起動");
    let state = AppState::new(db_path)?;

    let command = args.positional.first().map(String::as_str);
    match command {
        None => bail!("{}", USAGE),

        Some("lab-paste") => {
            let [_, patient_id, test_date, text_file] = args.positional.as_slice() else {
                bail!("{}", USAGE);
            };
            let text = std::fs::read_to_string(text_file)
                .with_context(|| format!("貼り付けテキストを読めません: {}", text_file))?;
            let request = LabPasteRequest {
                patient_id: patient_id.clone(),
                test_date: parse_date(test_date)?,
                surgery_date: args.surgery_date.as_deref().map(parse_date).transpose()?,
                text,
            };
            let response = state.import_api.import_lab_paste(&request).await?;
            print_output(&response, args.json, &response.messages)?;
        }

        Some("retention") => {
            let follow_up_id = args
                .positional
                .get(1)
                .ok_or_else(|| anyhow!("{}", USAGE))?;
            let evaluation = state.import_api.evaluate_follow_up(follow_up_id).await?;
            let describe = |side: Option<casefile_import::engine::SideRetention>| match side {
                Some(side) => format!("{:.1}%（{}）", side.rate, side.grade.label()),
                None => "-".to_string(),
            };
            let lines = vec![
                format!("時期: {}", evaluation.timing.as_deref().unwrap_or("-")),
                format!("右: {}", describe(evaluation.retention.right)),
                format!("左: {}", describe(evaluation.retention.left)),
            ];
            print_output(&evaluation, args.json, &lines)?;
        }

        Some("config") => match args.positional.as_slice() {
            [_] => {
                let settings = state.config_api.effective_settings().await?;
                let items = state.config_api.list_configs()?;
                let mut lines: Vec<String> =
                    items.iter().map(|item| format!("{} = {}", item.key, item.value)).collect();
                lines.push(format!("適用値: {:?}", settings));
                print_output(&settings, args.json, &lines)?;
            }
            [_, key, value] => state.config_api.update_config(key, value)?,
            _ => bail!("{}", USAGE),
        },

        Some(file_path) => {
            if args.positional.len() != 1 {
                bail!("{}", USAGE);
            }
            let response = state.import_api.import_file(file_path, args.dry_run).await?;
            print_output(&response, args.json, &response.messages)?;
        }
    }

    Ok(())
}
