//! 수산물 경락가 예측 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 데이터셋의 어종 목록과 최근 12개월 월평균
//! auction -d data/records.json entities --months 12
//!
//! # 광어 24개월 예측 + 분기 말 요약
//! auction -d data/records.json forecast -e 광어 -n 24 --key-months
//!
//! # 속성 기반 가격 추정
//! auction -d data/records.json predict -a species=광어 -a origin=제주 -a grade=대 \
//!     -a package=kg -a quantity=10 -a weight=1.5 --top 5
//!
//! # 캐시 삭제
//! auction invalidate -e 광어 --pipeline
//! ```

use anyhow::{Context, Result};
use auction_analytics::ml::{MlError, PriceService, DEFAULT_KEY_MONTHS};
use auction_cli::commands::dataset::load_records;
use auction_cli::commands::entities::list_entities;
use auction_cli::commands::forecast::{run_forecast, ForecastCommand};
use auction_cli::commands::invalidate::{invalidate, InvalidateTarget};
use auction_cli::commands::output::OutputFormat;
use auction_cli::commands::predict::{parse_attribute, run_predict, PredictCommand};
use auction_core::{init_logging, AppConfig, LogConfig};
use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "auction")]
#[command(about = "수산물 경락가 예측 CLI - 어종별 월간 예측 및 속성 기반 가격 추정", long_about = None)]
#[command(version)]
struct Cli {
    /// 설정 파일 (없으면 기본값 + AUCTION__* 환경 변수)
    #[arg(short, long, default_value = "config/default.toml", global = true)]
    config: PathBuf,

    /// 거래 데이터셋 (JSON 배열)
    #[arg(short, long, global = true)]
    data: Option<PathBuf>,

    /// 출력 형식 (table, csv, json)
    #[arg(short, long, default_value = "table", global = true)]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 엔티티(어종) 목록과 최근 월평균 가격
    Entities {
        /// 표시할 최근 개월 수
        #[arg(short, long, default_value = "12")]
        months: usize,
    },

    /// 엔티티의 월간 가격 예측
    Forecast {
        /// 엔티티 (어종)
        #[arg(short, long)]
        entity: String,

        /// 예측 개월 수
        #[arg(short = 'n', long, default_value = "12")]
        horizon: usize,

        /// 3/6/9/12월 요약 출력
        #[arg(long, default_value = "false")]
        key_months: bool,
    },

    /// 속성 기반 가격 추정
    Predict {
        /// 속성 (name=value, 반복 가능)
        #[arg(short, long = "attr", value_parser = parse_attr)]
        attributes: Vec<(String, String)>,

        /// 함께 출력할 중요 피처 수
        #[arg(long, default_value = "0")]
        top: usize,
    },

    /// 모델 캐시 삭제
    Invalidate {
        /// 삭제할 엔티티 모델 (반복 가능)
        #[arg(short, long)]
        entity: Vec<String>,

        /// 가격 추정 파이프라인 삭제
        #[arg(long, default_value = "false")]
        pipeline: bool,
    },
}

fn parse_attr(s: &str) -> Result<(String, String), String> {
    parse_attribute(s).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config: {}", cli.config.display()))?;
    init_logging(LogConfig::from(&config.logging)).context("Failed to initialize logging")?;

    let format = OutputFormat::parse(&cli.format)?;

    let records = match (&cli.data, &cli.command) {
        (Some(path), _) => load_records(path)?,
        (None, Commands::Invalidate { .. }) => Vec::new(),
        (None, _) => anyhow::bail!("--data <FILE> is required for this command"),
    };

    let mut service = PriceService::new(&config, records);
    info!(cache_dir = %config.cache.dir.display(), "서비스 준비 완료");

    let stdout = io::stdout();
    let mut out = stdout.lock();

    let result = match cli.command {
        Commands::Entities { months } => list_entities(&service, months, format, &mut out).map(|_| ()),

        Commands::Forecast {
            entity,
            horizon,
            key_months,
        } => {
            let command = ForecastCommand {
                entity,
                horizon,
                format,
                key_months: key_months.then(|| DEFAULT_KEY_MONTHS.to_vec()),
            };
            run_forecast(&service, &command, &mut out).map(|_| ())
        }

        Commands::Predict { attributes, top } => {
            let command = PredictCommand {
                attributes,
                format,
                top_features: top,
            };
            run_predict(&service, &command, &config.estimator.numeric, &mut out).map(|_| ())
        }

        Commands::Invalidate { entity, pipeline } => {
            let mut targets: Vec<InvalidateTarget> =
                entity.into_iter().map(InvalidateTarget::Entity).collect();
            if pipeline {
                targets.push(InvalidateTarget::Pipeline);
            }
            if targets.is_empty() {
                anyhow::bail!("Nothing to invalidate. Use --entity <NAME> or --pipeline");
            }
            invalidate(&mut service, &targets, &mut out).map(|_| ())
        }
    };

    if let Err(e) = &result {
        // 사용자에게 보여줄 예측 불가 사유
        if let Some(reason) = e.downcast_ref::<MlError>().filter(|m| m.is_user_facing()) {
            error!(error = %reason, "예측 불가");
            eprintln!("\n⚠️  예측할 수 없습니다: {}", reason);
        }
    }

    result
}
