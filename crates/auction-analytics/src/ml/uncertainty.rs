//! 앙상블 개별 예측 분포로 만드는 가격 구간.
//!
//! 각 트리의 예측값을 가능한 가격의 경험적 분포로 보고 백분위수를 취합니다.
//! 개별 예측을 제공하지 않는 모델은 `(point, point, point)`를 반환합니다.

use crate::ml::predictor::{PriceRegressor, TrainedPointModel};
use crate::ml::{FeatureVector, MlError, MlResult};
use serde::{Deserialize, Serialize};

/// 백분위수 기반 구간 추정기.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyEstimator {
    lower_pct: f64,
    median_pct: f64,
    upper_pct: f64,
}

impl Default for UncertaintyEstimator {
    fn default() -> Self {
        Self {
            lower_pct: 5.0,
            median_pct: 50.0,
            upper_pct: 95.0,
        }
    }
}

impl UncertaintyEstimator {
    /// 사용자 지정 백분위수 (0~100, 하한 ≤ 중앙 ≤ 상한).
    pub fn new(lower_pct: f64, median_pct: f64, upper_pct: f64) -> MlResult<Self> {
        let ordered = 0.0 <= lower_pct && lower_pct <= median_pct && median_pct <= upper_pct;
        if !ordered || upper_pct > 100.0 {
            return Err(MlError::InvalidInput(format!(
                "percentiles must satisfy 0 <= {} <= {} <= {} <= 100",
                lower_pct, median_pct, upper_pct
            )));
        }
        Ok(Self {
            lower_pct,
            median_pct,
            upper_pct,
        })
    }

    /// 학습된 파이프라인의 (하한, 중앙값, 상한).
    pub fn interval(
        &self,
        model: &TrainedPointModel,
        features: &FeatureVector,
    ) -> MlResult<(f64, f64, f64)> {
        // 길이 검증은 predict_features가 담당
        let point = model.predict_features(features)?;
        Ok(match model.member_predictions(features)? {
            Some(members) => self.from_members(members, point),
            None => (point, point, point),
        })
    }

    /// 임의의 회귀 모델에 대한 (하한, 중앙값, 상한).
    pub fn interval_for<R: PriceRegressor + ?Sized>(
        &self,
        regressor: &R,
        features: &[f64],
    ) -> (f64, f64, f64) {
        let point = regressor.predict(features);
        match regressor.member_predictions(features) {
            Some(members) => self.from_members(members, point),
            None => (point, point, point),
        }
    }

    fn from_members(&self, mut members: Vec<f64>, point: f64) -> (f64, f64, f64) {
        members.retain(|v| v.is_finite());
        if members.is_empty() {
            return (point, point, point);
        }
        members.sort_by(f64::total_cmp);
        (
            percentile(&members, self.lower_pct),
            percentile(&members, self.median_pct),
            percentile(&members, self.upper_pct),
        )
    }
}

/// 정렬된 값의 p 백분위수 (선형 보간).
///
/// 보간값은 인접한 두 값 사이로 제한되므로 p에 대해 단조 증가합니다.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let (a, b) = (sorted[lo], sorted[hi]);
            (a + (b - a) * (rank - lo as f64)).max(a).min(b)
        }
    }
}
