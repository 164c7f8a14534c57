//! 가격 예측 서비스 - 호출자가 만드는 명시적 컨텍스트.
//!
//! 거래 데이터셋, 모델 캐시, 시계열 예측기, 가격 추정기를 하나로 묶습니다.
//! 전역 상태 없이 호출자가 [`PriceService`]를 생성해 각 요청에 사용합니다.
//!
//! ```ignore
//! use auction_analytics::ml::PriceService;
//! use auction_core::{AppConfig, AttributeTuple};
//!
//! let service = PriceService::new(&AppConfig::default(), records);
//!
//! // 어종별 12개월 예측
//! let table = service.forecast_entity("광어", 12)?;
//! for row in &table.rows {
//!     println!("{} {:.0} [{:.0}, {:.0}]", row.month, row.yhat, row.yhat_lower, row.yhat_upper);
//! }
//!
//! // 속성 기반 가격 추정
//! let tuple = AttributeTuple::new().with_category("species", "광어");
//! let price = service.predict_price(&tuple)?;
//! ```

use crate::ml::cache::{LoadStatus, ModelCache};
use crate::ml::forecaster::{ForecastTable, MonthlySeries, TimeSeriesForecaster};
use crate::ml::predictor::{PointEstimator, TrainedPointModel};
use crate::ml::uncertainty::UncertaintyEstimator;
use crate::ml::{FeatureImportance, ForecastPoint, MlResult, PredictionResult};
use auction_core::{AppConfig, AttributeTuple, Observation, TransactionRecord};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// 요약 기본 월 (분기 말).
pub const DEFAULT_KEY_MONTHS: [u32; 4] = [3, 6, 9, 12];

/// 가격 추정 결과와 모델 출처.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePrediction {
    /// 점 추정과 구간
    pub result: PredictionResult,
    /// 파이프라인 로드 상태 (이 서비스에서 처음 로드할 때의 상태)
    pub status: LoadStatus,
}

/// 가격 예측 서비스.
pub struct PriceService {
    records: Vec<TransactionRecord>,
    cache: ModelCache,
    pipeline_key: String,
    forecaster: TimeSeriesForecaster,
    estimator: PointEstimator,
    uncertainty: UncertaintyEstimator,
    point_model: OnceCell<(TrainedPointModel, LoadStatus)>,
}

impl PriceService {
    /// 설정과 거래 데이터셋으로 서비스 생성.
    pub fn new(config: &AppConfig, records: Vec<TransactionRecord>) -> Self {
        let cache = ModelCache::new(config.cache.dir.clone());
        Self {
            records,
            forecaster: TimeSeriesForecaster::new(config.forecast.clone(), cache.clone()),
            estimator: PointEstimator::new(config.estimator.clone()),
            cache,
            pipeline_key: config.cache.pipeline_key.clone(),
            uncertainty: UncertaintyEstimator::default(),
            point_model: OnceCell::new(),
        }
    }

    /// 구간 백분위수 변경.
    pub fn with_uncertainty(mut self, uncertainty: UncertaintyEstimator) -> Self {
        self.uncertainty = uncertainty;
        self
    }

    /// 데이터셋 반환.
    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    /// 모델 캐시 반환.
    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    /// 데이터셋에 있는 엔티티 목록 (정렬, 중복 제거).
    pub fn entities(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.entity_id.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// 엔티티의 관측치 (시간 순).
    pub fn history(&self, entity_id: &str) -> Vec<Observation> {
        TransactionRecord::observations_for(&self.records, entity_id)
    }

    /// 엔티티의 최근 n개월 월평균 가격.
    pub fn recent_history(&self, entity_id: &str, months: usize) -> Vec<(NaiveDate, f64)> {
        MonthlySeries::from_observations(&self.history(entity_id))
            .tail(months)
            .to_vec()
    }

    /// 엔티티의 `horizon_months`개월 예측.
    pub fn forecast_entity(&self, entity_id: &str, horizon_months: usize) -> MlResult<ForecastTable> {
        let span = auction_core::forecast_span!("forecast_entity", entity_id, horizon_months);
        let _guard = span.enter();

        let history = self.history(entity_id);
        self.forecaster.forecast(entity_id, &history, horizon_months)
    }

    /// 공유 가격 추정 파이프라인 (캐시에서 로드하거나 학습).
    pub fn point_model(&self) -> MlResult<&(TrainedPointModel, LoadStatus)> {
        if let Some(loaded) = self.point_model.get() {
            return Ok(loaded);
        }
        let loaded = self
            .cache
            .load_or_train(&self.pipeline_key, || self.estimator.fit(&self.records))?;
        info!(
            key = %self.pipeline_key,
            status = %loaded.1,
            rows = loaded.0.training_rows(),
            "가격 추정 파이프라인 준비"
        );
        Ok(self.point_model.get_or_init(|| loaded))
    }

    /// 속성 튜플의 가격 추정 (점 추정 + 5/50/95 백분위 구간).
    pub fn predict_price(&self, tuple: &AttributeTuple) -> MlResult<PricePrediction> {
        let (model, status) = self.point_model()?;
        let features = model.encode(tuple)?;
        let point = model.predict_features(&features)?;
        let interval = self.uncertainty.interval(model, &features)?;

        Ok(PricePrediction {
            result: PredictionResult::new(point, interval),
            status: *status,
        })
    }

    /// 중요도 상위 n개 피처.
    pub fn feature_importances(&self, n: usize) -> MlResult<Vec<FeatureImportance>> {
        Ok(self.point_model()?.0.top_features(n))
    }

    /// 엔티티 시계열 모델 캐시 삭제.
    pub fn invalidate_entity(&self, entity_id: &str) -> MlResult<bool> {
        self.cache.invalidate(&ModelCache::entity_key(entity_id))
    }

    /// 가격 추정 파이프라인 캐시 삭제 (메모리 포함).
    pub fn invalidate_point_model(&mut self) -> MlResult<bool> {
        self.point_model.take();
        self.cache.invalidate(&self.pipeline_key)
    }
}

/// 주요 월 요약의 한 행.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyMonthRow {
    /// 예측 월
    pub month: NaiveDate,
    /// 점 예측
    pub yhat: f64,
    /// 하한
    pub yhat_lower: f64,
    /// 상한
    pub yhat_upper: f64,
    /// 직전 달 대비 변화율 (%). 직전 달이 예측 범위 밖이면 `None`.
    pub change_pct: Option<f64>,
}

/// 예측 테이블에서 선택한 달만 연도별로 묶어 요약합니다.
pub fn key_month_summary(rows: &[ForecastPoint], months: &[u32]) -> BTreeMap<i32, Vec<KeyMonthRow>> {
    let by_month: BTreeMap<NaiveDate, &ForecastPoint> = rows.iter().map(|r| (r.month, r)).collect();

    let mut summary: BTreeMap<i32, Vec<KeyMonthRow>> = BTreeMap::new();
    for row in rows.iter().filter(|r| months.contains(&r.month.month())) {
        let change_pct = row
            .month
            .checked_sub_months(chrono::Months::new(1))
            .and_then(|prev| by_month.get(&prev))
            .filter(|prev| prev.yhat != 0.0)
            .map(|prev| (row.yhat - prev.yhat) / prev.yhat * 100.0);

        summary.entry(row.month.year()).or_default().push(KeyMonthRow {
            month: row.month,
            yhat: row.yhat,
            yhat_lower: row.yhat_lower,
            yhat_upper: row.yhat_upper,
            change_pct,
        });
    }
    summary
}
