//! 엔티티(어종)별 월간 가격 시계열 예측.
//!
//! 거래 이력을 달력 월 단위 평균으로 집계한 뒤, 선형 추세와
//! 연간(12개월 주기) 푸리에 계절성을 더한 가법 모델을 적합합니다.
//!
//! ```text
//! y(t) = a + b·t + Σₖ [ cₖ·sin(2πk·m/12) + dₖ·cos(2πk·m/12) ] + ε
//!          └ 추세 ┘    └──────────── 계절성 ──────────────┘
//!
//! t: 첫 관측 월로부터 경과 개월 수, m: 달력 월 (0 = 1월)
//! ```
//!
//! 예측 구간은 `yhat ± z·σ(h)`이며 `σ(h)`는 관측 잡음, 추세 기울기의
//! 추정 오차, 예측 거리 h에 비례하는 누적 오차를 합쳐 h가 커질수록
//! 넓어집니다. 같은 모델에서 h번째 행은 요청한 horizon과 무관하게
//! 항상 같으므로 더 긴 예측은 짧은 예측을 접두사로 포함합니다.

use crate::ml::cache::{CachedModel, LoadStatus, ModelCache};
use crate::ml::linalg::least_squares;
use crate::ml::{ForecastPoint, MlError, MlResult};
use auction_core::{ForecastConfig, Observation};
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use tracing::{debug, info};

/// 계절 주기 (개월).
const SEASON_PERIOD: f64 = 12.0;

/// 설계 행렬에서 열이 겹치지 않는 최대 푸리에 차수 (12개월 주기 기준).
const MAX_FOURIER_ORDER: usize = 5;

/// 정규방정식 안정화를 위한 릿지 계수.
const RIDGE: f64 = 1e-6;

/// 한 엔티티의 월별 평균 가격 시계열.
///
/// 관측치가 없는 달은 보간하지 않고 건너뜁니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySeries {
    points: Vec<(NaiveDate, f64)>,
}

impl MonthlySeries {
    /// 관측치를 달력 월별 산술 평균으로 집계합니다.
    ///
    /// 유한하지 않은 가격은 무시합니다. 결과는 월 오름차순입니다.
    pub fn from_observations(history: &[Observation]) -> Self {
        let mut buckets: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
        for obs in history.iter().filter(|o| o.price.is_finite()) {
            let entry = buckets.entry(month_start(obs.date)).or_insert((0.0, 0));
            entry.0 += obs.price;
            entry.1 += 1;
        }

        let points = buckets
            .into_iter()
            .map(|(month, (sum, count))| (month, sum / count as f64))
            .collect();
        Self { points }
    }

    /// (월, 평균 가격) 목록 반환.
    pub fn points(&self) -> &[(NaiveDate, f64)] {
        &self.points
    }

    /// 관측된 월 수.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// 관측된 월이 없는지 확인.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 마지막 관측 월.
    pub fn last_month(&self) -> Option<NaiveDate> {
        self.points.last().map(|(month, _)| *month)
    }

    /// 최근 n개월 (시간 순).
    pub fn tail(&self, n: usize) -> &[(NaiveDate, f64)] {
        let start = self.points.len().saturating_sub(n);
        &self.points[start..]
    }
}

/// 한 엔티티에 대해 적합된 추세 + 연간 계절성 모델.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSeasonalModel {
    entity_id: String,
    start_month: NaiveDate,
    last_month: NaiveDate,
    n_obs: usize,
    fourier_order: usize,
    /// [절편, 기울기, sin₁, cos₁, ..., sinₖ, cosₖ]
    coefficients: Vec<f64>,
    sigma_obs: f64,
    slope_std_err: f64,
    t_mean: f64,
    z_score: f64,
}

impl CachedModel for TrendSeasonalModel {
    const KIND: &'static str = "trend_seasonal";
}

impl TrendSeasonalModel {
    /// 월별 시계열에 모델을 적합합니다.
    pub fn fit(entity_id: &str, series: &MonthlySeries, config: &ForecastConfig) -> MlResult<Self> {
        let n = series.len();
        let required = config.min_monthly_points.max(3);
        if n < required {
            return Err(MlError::InsufficientData {
                required,
                actual: n,
            });
        }
        let z_score = z_score(config.interval_width)?;

        let (start_month, last_month) = match (series.points().first(), series.last_month()) {
            (Some((first, _)), Some(last)) => (*first, last),
            _ => {
                return Err(MlError::InsufficientData {
                    required,
                    actual: 0,
                })
            }
        };

        // 파라미터 수(2 + 2K)가 관측치 수보다 작도록 차수 제한
        let fourier_order = config
            .fourier_order
            .min(MAX_FOURIER_ORDER)
            .min(n.saturating_sub(3) / 2);

        let ts: Vec<f64> = series
            .points()
            .iter()
            .map(|(month, _)| months_between(start_month, *month) as f64)
            .collect();
        let ys: Vec<f64> = series.points().iter().map(|(_, y)| *y).collect();
        let design: Vec<Vec<f64>> = series
            .points()
            .iter()
            .zip(&ts)
            .map(|((month, _), &t)| design_row(t, *month, fourier_order))
            .collect();

        let coefficients = least_squares(&design, &ys, RIDGE)?;

        let ssr: f64 = design
            .iter()
            .zip(&ys)
            .map(|(row, y)| {
                let fitted: f64 = row.iter().zip(&coefficients).map(|(x, b)| x * b).sum();
                (y - fitted).powi(2)
            })
            .sum();
        let dof = n.saturating_sub(coefficients.len()).max(1);
        let level = ys.iter().map(|y| y.abs()).sum::<f64>() / n as f64;
        let sigma_obs = (ssr / dof as f64).sqrt().max(level * 1e-6).max(1e-9);

        let t_mean = ts.iter().sum::<f64>() / n as f64;
        let t_ss: f64 = ts.iter().map(|t| (t - t_mean).powi(2)).sum();
        let slope_std_err = if t_ss > 0.0 {
            sigma_obs / t_ss.sqrt()
        } else {
            0.0
        };

        if !sigma_obs.is_finite() || !slope_std_err.is_finite() {
            return Err(MlError::Training(format!(
                "non-finite residual scale for '{}'",
                entity_id
            )));
        }

        info!(
            entity = %entity_id,
            months = n,
            fourier_order,
            slope = coefficients[1],
            sigma = sigma_obs,
            "추세/계절성 모델 적합 완료"
        );

        Ok(Self {
            entity_id: entity_id.to_string(),
            start_month,
            last_month,
            n_obs: n,
            fourier_order,
            coefficients,
            sigma_obs,
            slope_std_err,
            t_mean,
            z_score,
        })
    }

    /// 모델이 학습된 엔티티 식별자.
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// 학습 데이터의 마지막 관측 월.
    pub fn last_month(&self) -> NaiveDate {
        self.last_month
    }

    /// 학습에 사용된 월 수.
    pub fn n_obs(&self) -> usize {
        self.n_obs
    }

    /// 임의의 월에 대한 점 예측.
    pub fn predict_month(&self, month: NaiveDate) -> f64 {
        let t = months_between(self.start_month, month_start(month)) as f64;
        design_row(t, month, self.fourier_order)
            .iter()
            .zip(&self.coefficients)
            .map(|(x, b)| x * b)
            .sum()
    }

    /// 마지막 관측 월 이후 `horizon`개월의 예측 테이블.
    pub fn forecast(&self, horizon: usize) -> MlResult<Vec<ForecastPoint>> {
        (1..=horizon)
            .map(|h| {
                let month = add_months(self.last_month, h)?;
                let yhat = self.predict_month(month);
                let margin = self.z_score * self.forecast_std(month, h);
                Ok(ForecastPoint {
                    month,
                    yhat,
                    yhat_lower: yhat - margin,
                    yhat_upper: yhat + margin,
                })
            })
            .collect()
    }

    /// h개월 앞 예측의 표준편차.
    fn forecast_std(&self, month: NaiveDate, h: usize) -> f64 {
        let t = months_between(self.start_month, month) as f64;
        let noise = self.sigma_obs.powi(2) * (1.0 + h as f64 / SEASON_PERIOD);
        let level = self.sigma_obs.powi(2) / self.n_obs as f64;
        let slope = (self.slope_std_err * (t - self.t_mean)).powi(2);
        (noise + level + slope).sqrt()
    }
}

/// 예측 결과 테이블.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastTable {
    /// 엔티티 식별자
    pub entity_id: String,
    /// 모델 로드 상태
    pub status: LoadStatus,
    /// 모델이 학습된 마지막 관측 월
    pub last_observed: NaiveDate,
    /// 월 오름차순 예측 행
    pub rows: Vec<ForecastPoint>,
}

/// 캐시를 통해 엔티티별 모델을 학습/재사용하는 시계열 예측기.
#[derive(Debug, Clone)]
pub struct TimeSeriesForecaster {
    config: ForecastConfig,
    cache: ModelCache,
}

impl TimeSeriesForecaster {
    /// 새 예측기 생성.
    pub fn new(config: ForecastConfig, cache: ModelCache) -> Self {
        Self { config, cache }
    }

    /// 설정 반환.
    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// 엔티티의 이력으로 `horizon_months`개월 예측을 만듭니다.
    ///
    /// 캐시된 모델이 있으면 재사용하고, 없으면 월별 시계열로 학습해 저장합니다.
    /// 월별 관측치가 최소 개수 미만이면 캐시를 확인하기 전에
    /// `InsufficientData`로 실패합니다.
    pub fn forecast(
        &self,
        entity_id: &str,
        history: &[Observation],
        horizon_months: usize,
    ) -> MlResult<ForecastTable> {
        if entity_id.trim().is_empty() {
            return Err(MlError::InvalidInput("empty entity id".to_string()));
        }

        let series = MonthlySeries::from_observations(history);
        if series.len() < self.config.min_monthly_points {
            return Err(MlError::InsufficientData {
                required: self.config.min_monthly_points,
                actual: series.len(),
            });
        }

        let key = ModelCache::entity_key(entity_id);
        // 정규화된 키는 겹칠 수 있으므로 저장된 모델의 엔티티를 확인
        let (model, status) = self.cache.load_or_train_matching(
            &key,
            |model: &TrendSeasonalModel| model.entity_id() == entity_id,
            || TrendSeasonalModel::fit(entity_id, &series, &self.config),
        )?;

        let rows = model.forecast(horizon_months)?;
        debug!(
            entity = %entity_id,
            status = %status,
            horizon = horizon_months,
            "예측 생성"
        );

        Ok(ForecastTable {
            entity_id: entity_id.to_string(),
            status,
            last_observed: model.last_month(),
            rows,
        })
    }
}

fn design_row(t: f64, month: NaiveDate, fourier_order: usize) -> Vec<f64> {
    let m = month.month0() as f64;
    let mut row = Vec::with_capacity(2 + 2 * fourier_order);
    row.push(1.0);
    row.push(t);
    for k in 1..=fourier_order {
        let angle = 2.0 * PI * k as f64 * m / SEASON_PERIOD;
        row.push(angle.sin());
        row.push(angle.cos());
    }
    row
}

fn z_score(interval_width: f64) -> MlResult<f64> {
    if !(interval_width > 0.0 && interval_width < 1.0) {
        return Err(MlError::InvalidInput(format!(
            "interval width must be in (0, 1), got {}",
            interval_width
        )));
    }
    let normal = Normal::new(0.0, 1.0).map_err(|e| MlError::Training(e.to_string()))?;
    Ok(normal.inverse_cdf(0.5 + interval_width / 2.0))
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to.year() as i64 - from.year() as i64) * 12 + (to.month() as i64 - from.month() as i64)
}

fn add_months(month: NaiveDate, n: usize) -> MlResult<NaiveDate> {
    u32::try_from(n)
        .ok()
        .and_then(|n| month.checked_add_months(Months::new(n)))
        .ok_or_else(|| MlError::InvalidInput(format!("horizon {} is out of range", n)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// 2022-01부터 `months`개월, 월 2건씩 관측치를 생성.
    fn history(months: u32, price: impl Fn(u32) -> f64) -> Vec<Observation> {
        (0..months)
            .flat_map(|i| {
                let month = date(2022, 1, 1).checked_add_months(Months::new(i)).unwrap();
                let p = price(i);
                vec![
                    Observation::new(month.with_day(3).unwrap(), p - 50.0),
                    Observation::new(month.with_day(20).unwrap(), p + 50.0),
                ]
            })
            .collect()
    }

    #[test]
    fn test_monthly_aggregation_mean_and_gaps() {
        let obs = vec![
            Observation::new(date(2024, 1, 5), 100.0),
            Observation::new(date(2024, 1, 25), 200.0),
            Observation::new(date(2024, 3, 2), 400.0),
            Observation::new(date(2024, 3, 9), f64::NAN),
        ];
        let series = MonthlySeries::from_observations(&obs);

        assert_eq!(series.len(), 2);
        assert_eq!(series.points()[0], (date(2024, 1, 1), 150.0));
        assert_eq!(series.points()[1], (date(2024, 3, 1), 400.0));
        assert_eq!(series.last_month(), Some(date(2024, 3, 1)));
        assert_eq!(series.tail(1), &[(date(2024, 3, 1), 400.0)]);
        assert_eq!(series.tail(10).len(), 2);
    }

    #[test]
    fn test_fit_recovers_trend() {
        let obs = history(36, |i| 1_000.0 + 20.0 * i as f64);
        let series = MonthlySeries::from_observations(&obs);
        let model = TrendSeasonalModel::fit("광어", &series, &ForecastConfig::default()).unwrap();

        // 첫 예측 월(2025-01)은 t = 36
        let forecast = model.forecast(1).unwrap();
        assert_eq!(forecast[0].month, date(2025, 1, 1));
        assert!((forecast[0].yhat - 1_720.0).abs() < 1.0);
    }

    #[test]
    fn test_fit_captures_seasonality() {
        // 12월에 가격이 높아지는 패턴
        let obs = history(36, |i| {
            let month = i % 12;
            5_000.0 + 1_500.0 * (2.0 * PI * month as f64 / 12.0).cos()
        });
        let series = MonthlySeries::from_observations(&obs);
        let model = TrendSeasonalModel::fit("우럭", &series, &ForecastConfig::default()).unwrap();

        let january = model.predict_month(date(2025, 1, 1));
        let july = model.predict_month(date(2025, 7, 1));
        assert!((january - 6_500.0).abs() < 50.0, "january = {}", january);
        assert!((july - 3_500.0).abs() < 50.0, "july = {}", july);
    }

    #[test]
    fn test_interval_widens_with_horizon() {
        let obs = history(24, |i| 10_000.0 + if i % 2 == 0 { 120.0 } else { -120.0 });
        let series = MonthlySeries::from_observations(&obs);
        let model = TrendSeasonalModel::fit("광어", &series, &ForecastConfig::default()).unwrap();

        let rows = model.forecast(12).unwrap();
        for pair in rows.windows(2) {
            assert!(pair[1].interval_width() > pair[0].interval_width());
        }
        for row in &rows {
            assert!(row.yhat_lower <= row.yhat && row.yhat <= row.yhat_upper);
        }
    }

    #[test]
    fn test_fit_rejects_short_series() {
        let obs = history(3, |_| 1_000.0);
        let series = MonthlySeries::from_observations(&obs);
        let result = TrendSeasonalModel::fit("광어", &series, &ForecastConfig::default());
        assert!(matches!(
            result,
            Err(MlError::InsufficientData {
                required: 10,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_invalid_interval_width() {
        let obs = history(12, |_| 1_000.0);
        let series = MonthlySeries::from_observations(&obs);
        let config = ForecastConfig {
            interval_width: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            TrendSeasonalModel::fit("광어", &series, &config),
            Err(MlError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_forecaster_uses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let forecaster =
            TimeSeriesForecaster::new(ForecastConfig::default(), ModelCache::new(dir.path()));
        let obs = history(18, |i| 8_000.0 + 10.0 * i as f64);

        let first = forecaster.forecast("(활)광어", &obs, 6).unwrap();
        assert_eq!(first.status, LoadStatus::Trained);
        assert_eq!(first.rows.len(), 6);
        assert_eq!(first.last_observed, date(2023, 6, 1));
        assert!(dir.path().join("model__활_광어.json").is_file());

        let second = forecaster.forecast("(활)광어", &obs, 6).unwrap();
        assert_eq!(second.status, LoadStatus::Loaded);
        assert_eq!(first.rows, second.rows);
    }

    #[test]
    fn test_colliding_keys_do_not_share_models() {
        let dir = tempfile::tempdir().unwrap();
        let forecaster =
            TimeSeriesForecaster::new(ForecastConfig::default(), ModelCache::new(dir.path()));
        assert_eq!(
            ModelCache::entity_key("광어 (양식)"),
            ModelCache::entity_key("광어_(양식)")
        );

        let cheap = forecaster
            .forecast("광어 (양식)", &history(18, |_| 10_000.0), 3)
            .unwrap();
        let dear = forecaster
            .forecast("광어_(양식)", &history(18, |_| 50_000.0), 3)
            .unwrap();

        assert_eq!(cheap.status, LoadStatus::Trained);
        assert_eq!(dear.status, LoadStatus::Trained);
        assert!((cheap.rows[0].yhat - 10_000.0).abs() < 500.0);
        assert!((dear.rows[0].yhat - 50_000.0).abs() < 2_500.0);

        // 슬롯은 마지막으로 학습한 엔티티의 모델로 덮어써짐
        let again = forecaster
            .forecast("광어_(양식)", &history(18, |_| 50_000.0), 3)
            .unwrap();
        assert_eq!(again.status, LoadStatus::Loaded);
    }

    #[test]
    fn test_zero_horizon_is_empty() {
        let obs = history(12, |_| 1_000.0);
        let series = MonthlySeries::from_observations(&obs);
        let model = TrendSeasonalModel::fit("광어", &series, &ForecastConfig::default()).unwrap();
        assert!(model.forecast(0).unwrap().is_empty());
    }
}
