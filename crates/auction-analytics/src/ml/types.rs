//! ML 모듈의 공통 타입.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 가격 추정 모델 입력을 위한 feature vector.
///
/// 범주형 속성별 원-핫 블록 뒤에 스케일링된 수치형 속성이 이어지는
/// 고정 길이 f64 벡터를 감쌈.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// feature 값들
    values: Vec<f64>,
    /// 디버깅/로깅을 위한 선택적 feature 이름
    names: Option<Vec<String>>,
}

impl FeatureVector {
    /// 값으로부터 새 feature vector 생성.
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            names: None,
        }
    }

    /// 이름이 있는 feature vector 생성.
    pub fn with_names(values: Vec<f64>, names: Vec<String>) -> Self {
        debug_assert_eq!(values.len(), names.len(), "Feature count mismatch");
        Self {
            values,
            names: Some(names),
        }
    }

    /// feature 값을 슬라이스로 반환.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// feature 개수 반환.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// feature vector가 비어있는지 확인.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 사용 가능한 경우 feature 이름 반환.
    pub fn names(&self) -> Option<&[String]> {
        self.names.as_deref()
    }

    /// 소유된 Vec<f64>로 변환.
    pub fn into_vec(self) -> Vec<f64> {
        self.values
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

impl AsRef<[f64]> for FeatureVector {
    fn as_ref(&self) -> &[f64] {
        &self.values
    }
}

/// 속성 기반 가격 추정 결과.
///
/// `lower ≤ median ≤ upper`가 항상 성립합니다. 앙상블이 아닌 모델에서는
/// 세 값이 모두 `point`와 같은 폭 0 구간이 됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// 점 추정 가격 (앙상블 평균)
    pub point: f64,
    /// 하한 (5 백분위)
    pub lower: f64,
    /// 중앙값 (50 백분위)
    pub median: f64,
    /// 상한 (95 백분위)
    pub upper: f64,
}

impl PredictionResult {
    /// 점 추정과 (하한, 중앙값, 상한) 구간으로 결과 생성.
    pub fn new(point: f64, (lower, median, upper): (f64, f64, f64)) -> Self {
        Self {
            point,
            lower,
            median,
            upper,
        }
    }

    /// 구간 폭(상한 - 하한) 반환.
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// 월별 예측 테이블의 한 행.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// 예측 월 (해당 월 1일)
    pub month: NaiveDate,
    /// 점 예측
    pub yhat: f64,
    /// 예측 하한
    pub yhat_lower: f64,
    /// 예측 상한
    pub yhat_upper: f64,
}

impl ForecastPoint {
    /// 구간 폭(상한 - 하한) 반환.
    pub fn interval_width(&self) -> f64 {
        self.yhat_upper - self.yhat_lower
    }
}

/// 인코딩된 피처 하나의 중요도.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    /// 피처 이름 (예: "species=광어", "weight")
    pub name: String,
    /// 정규화된 중요도 (전체 합 1)
    pub importance: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_vector() {
        let features = FeatureVector::with_names(
            vec![1.0, 0.0, 0.5],
            vec!["species=광어".into(), "species=우럭".into(), "weight".into()],
        );
        assert_eq!(features.len(), 3);
        assert!(!features.is_empty());
        assert_eq!(features.names().unwrap()[2], "weight");
        assert_eq!(features.into_vec(), vec![1.0, 0.0, 0.5]);
    }

    #[test]
    fn test_prediction_result_width() {
        let result = PredictionResult::new(10_000.0, (8_000.0, 9_800.0, 12_500.0));
        assert_eq!(result.median, 9_800.0);
        assert!((result.width() - 4_500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_forecast_point_width() {
        let point = ForecastPoint {
            month: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            yhat: 100.0,
            yhat_lower: 90.0,
            yhat_upper: 110.0,
        };
        assert_eq!(point.interval_width(), 20.0);
    }
}
