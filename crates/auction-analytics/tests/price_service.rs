//! PriceService 통합 테스트.
//!
//! 임시 캐시 디렉토리를 사용해 다음 흐름을 검증합니다:
//! 1. 어종별 시계열 예측 (학습 → 캐시 재사용)
//! 2. 속성 기반 가격 추정과 구간
//! 3. 캐시 손상/무효화 후 재학습

use auction_analytics::ml::{
    key_month_summary, LoadStatus, MlError, ModelCache, PriceService, DEFAULT_KEY_MONTHS,
};
use auction_core::{AppConfig, AttributeTuple, EstimatorConfig, TransactionRecord};
use chrono::{Datelike, Months, NaiveDate};
use proptest::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn config(cache_dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.cache.dir = cache_dir.to_path_buf();
    config.estimator = EstimatorConfig {
        n_estimators: 30,
        max_depth: 6,
        ..EstimatorConfig::default()
    };
    config
}

fn month(i: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1)
        .and_then(|d| d.checked_add_months(Months::new(i)))
        .unwrap()
}

fn record(entity: &str, date: NaiveDate, origin: &str, price: f64) -> TransactionRecord {
    TransactionRecord::new(entity, date, price)
        .with_attribute("species", entity)
        .with_attribute("origin", origin)
        .with_attribute("grade", "대")
        .with_attribute("package", "kg")
        .with_numeric("quantity", 10.0)
        .with_numeric("weight", 1.5)
}

/// "A": 24개월 동안 10,000 근처에서 추세 없이 안정적인 가격.
fn stable_entity() -> Vec<TransactionRecord> {
    (0..24)
        .flat_map(|i| {
            let wobble = if i % 3 == 0 { 150.0 } else { -75.0 };
            vec![
                record("A", month(i).with_day(5).unwrap(), "X", 10_000.0 + wobble),
                record("A", month(i).with_day(18).unwrap(), "X", 10_000.0 + wobble * 0.5),
            ]
        })
        .collect()
}

/// 산지 X ≈ 50,000, 산지 Y ≈ 20,000 (나머지 속성 동일).
fn origin_dataset() -> Vec<TransactionRecord> {
    (0..80)
        .map(|i| {
            let date = month(i % 12);
            let jitter = ((i * 13) % 7) as f64 * 200.0 - 600.0;
            if i % 2 == 0 {
                record("광어", date, "X", 50_000.0 + jitter)
            } else {
                record("광어", date, "Y", 20_000.0 + jitter)
            }
        })
        .collect()
}

fn query(origin: &str) -> AttributeTuple {
    AttributeTuple::new()
        .with_category("species", "광어")
        .with_category("origin", origin)
        .with_category("grade", "대")
        .with_category("package", "kg")
        .with_numeric("quantity", 10.0)
        .with_numeric("weight", 1.5)
}

#[test]
fn stable_history_forecasts_near_level_with_widening_interval() {
    let dir = TempDir::new().unwrap();
    let service = PriceService::new(&config(dir.path()), stable_entity());

    let table = service.forecast_entity("A", 12).unwrap();
    assert_eq!(table.status, LoadStatus::Trained);
    assert_eq!(table.rows.len(), 12);
    assert_eq!(table.rows[0].month, month(24));

    for row in &table.rows {
        assert!(
            (row.yhat - 10_000.0).abs() <= 1_000.0,
            "{} forecast {} is outside ±10%",
            row.month,
            row.yhat
        );
        assert!(row.yhat_lower <= row.yhat && row.yhat <= row.yhat_upper);
    }
    assert!(table.rows[11].interval_width() > table.rows[0].interval_width());
    for pair in table.rows.windows(2) {
        assert!(pair[1].interval_width() > pair[0].interval_width());
    }
}

#[test]
fn second_forecast_reuses_cached_model() {
    let dir = TempDir::new().unwrap();
    let service = PriceService::new(&config(dir.path()), stable_entity());

    let first = service.forecast_entity("A", 6).unwrap();
    assert_eq!(first.status, LoadStatus::Trained);
    assert!(service.cache().contains(&ModelCache::entity_key("A")));

    let second = service.forecast_entity("A", 6).unwrap();
    assert_eq!(second.status, LoadStatus::Loaded);
    assert_eq!(first.rows, second.rows);

    assert!(service.invalidate_entity("A").unwrap());
    let third = service.forecast_entity("A", 6).unwrap();
    assert_eq!(third.status, LoadStatus::Trained);
}

#[test]
fn sparse_history_is_insufficient_data() {
    let dir = TempDir::new().unwrap();
    let records: Vec<TransactionRecord> = (0..3)
        .map(|i| record("B", month(i), "X", 5_000.0))
        .collect();
    let service = PriceService::new(&config(dir.path()), records);

    let err = service.forecast_entity("B", 12).unwrap_err();
    assert!(matches!(
        err,
        MlError::InsufficientData {
            required: 10,
            actual: 3
        }
    ));
    assert!(err.is_user_facing());
    assert!(!service.cache().contains(&ModelCache::entity_key("B")));
}

#[test]
fn unknown_entity_is_insufficient_data() {
    let dir = TempDir::new().unwrap();
    let service = PriceService::new(&config(dir.path()), stable_entity());
    assert!(matches!(
        service.forecast_entity("없는어종", 3),
        Err(MlError::InsufficientData { actual: 0, .. })
    ));
}

#[test]
fn origin_drives_point_estimate() {
    let dir = TempDir::new().unwrap();
    let service = PriceService::new(&config(dir.path()), origin_dataset());

    let x = service.predict_price(&query("X")).unwrap();
    let y = service.predict_price(&query("Y")).unwrap();
    assert_eq!(x.status, LoadStatus::Trained);

    assert!((x.result.point - 50_000.0).abs() < (x.result.point - 20_000.0).abs());
    assert!((y.result.point - 20_000.0).abs() < (y.result.point - 50_000.0).abs());
    for prediction in [x, y] {
        let r = prediction.result;
        assert!(r.lower <= r.median && r.median <= r.upper);
    }

    let top = service.feature_importances(2).unwrap();
    assert!(top[0].name.starts_with("origin="));
}

#[test]
fn pipeline_is_persisted_and_reloaded() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());

    let trained = PriceService::new(&cfg, origin_dataset())
        .predict_price(&query("X"))
        .unwrap();
    assert!(dir.path().join("pipe.json").is_file());

    // 새 서비스는 학습 없이 같은 파이프라인을 로드
    let loaded = PriceService::new(&cfg, Vec::new())
        .predict_price(&query("X"))
        .unwrap();
    assert_eq!(loaded.status, LoadStatus::Loaded);
    assert_eq!(loaded.result, trained.result);
}

#[test]
fn corrupt_pipeline_is_retrained() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("pipe.json"), b"\x00\x01 not a model").unwrap();

    let service = PriceService::new(&config(dir.path()), origin_dataset());
    let prediction = service.predict_price(&query("Y")).unwrap();
    assert_eq!(prediction.status, LoadStatus::Trained);
    assert!(prediction.result.point.is_finite());
}

#[test]
fn single_tree_pipeline_has_degenerate_interval() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(dir.path());
    cfg.estimator.n_estimators = 1;

    let service = PriceService::new(&cfg, origin_dataset());
    let r = service.predict_price(&query("X")).unwrap().result;
    assert_eq!((r.lower, r.median, r.upper), (r.point, r.point, r.point));
}

#[test]
fn invalidating_pipeline_forces_retrain() {
    let dir = TempDir::new().unwrap();
    let mut service = PriceService::new(&config(dir.path()), origin_dataset());

    service.predict_price(&query("X")).unwrap();
    assert!(service.invalidate_point_model().unwrap());
    assert!(!dir.path().join("pipe.json").exists());

    let again = service.predict_price(&query("X")).unwrap();
    assert_eq!(again.status, LoadStatus::Trained);
}

#[test]
fn recent_history_and_key_months() {
    let dir = TempDir::new().unwrap();
    let service = PriceService::new(&config(dir.path()), stable_entity());

    let recent = service.recent_history("A", 12);
    assert_eq!(recent.len(), 12);
    assert_eq!(recent[11].0, month(23));
    assert_eq!(service.entities(), vec!["A"]);

    let table = service.forecast_entity("A", 12).unwrap();
    let summary = key_month_summary(&table.rows, &DEFAULT_KEY_MONTHS);
    let rows: Vec<_> = summary.values().flatten().collect();
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| r.month.month() % 3 == 0));
    assert!(rows.iter().all(|r| r.change_pct.is_some()));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn longer_horizon_extends_shorter_one(h in 1usize..24) {
        let dir = TempDir::new().unwrap();
        let service = PriceService::new(&config(dir.path()), stable_entity());

        let short = service.forecast_entity("A", h).unwrap();
        let long = service.forecast_entity("A", h + 1).unwrap();
        prop_assert_eq!(long.rows.len(), h + 1);
        prop_assert_eq!(&long.rows[..h], &short.rows[..]);
    }
}
