//! 속성 기반 경락가 추정.
//!
//! 거래 기록의 속성(어종, 산지, 규격, 포장, 수량, 중량)으로 가격을 추정하는
//! 회귀 트리 앙상블(배깅)을 학습합니다. 학습된 파이프라인은 인코더 상태와
//! 회귀 모델을 함께 담아 [`ModelCache`](crate::ml::ModelCache)에 한 파일로
//! 저장됩니다.
//!
//! # 학습 절차
//!
//! 1. 가격이 유한하고 필수 속성이 모두 있는 행만 선택 (결측 대체 없음)
//! 2. 최대 `max_training_rows`개를 고정 시드로 비복원 추출
//! 3. 인코더 학습 후 feature 행렬 생성
//! 4. 트리마다 부트스트랩 재표본으로 회귀 트리 학습

use crate::ml::cache::CachedModel;
use crate::ml::features::{EncoderState, FeatureEncoder, FeatureSchema};
use crate::ml::tree::{normalize, RegressionTree, TreeParams};
use crate::ml::{FeatureImportance, FeatureVector, MlError, MlResult};
use auction_core::{AttributeTuple, EstimatorConfig, TransactionRecord};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// feature 슬라이스에서 가격을 추정하는 회귀 모델.
pub trait PriceRegressor {
    /// 집계된 점 추정.
    fn predict(&self, features: &[f64]) -> f64;

    /// 개별 학습기 예측값. 앙상블이 아니면 `None`.
    fn member_predictions(&self, features: &[f64]) -> Option<Vec<f64>>;

    /// 모델 이름 반환.
    fn model_name(&self) -> &str;
}

/// 부트스트랩 회귀 트리 앙상블.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    /// 학습된 트리들로 앙상블 생성.
    pub fn new(trees: Vec<RegressionTree>) -> MlResult<Self> {
        if trees.is_empty() {
            return Err(MlError::Training("forest has no trees".to_string()));
        }
        Ok(Self { trees })
    }

    /// 트리 수.
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// 트리별 제곱오차 감소량 평균을 정규화한 피처 중요도.
    pub fn feature_importances(&self) -> Vec<f64> {
        let n_features = self.trees.first().map_or(0, RegressionTree::n_features);
        let mut total = vec![0.0; n_features];
        for tree in &self.trees {
            for (acc, value) in total.iter_mut().zip(tree.feature_importances()) {
                *acc += value;
            }
        }
        normalize(&total)
    }
}

impl PriceRegressor for RandomForest {
    fn predict(&self, features: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        sum / self.trees.len() as f64
    }

    fn member_predictions(&self, features: &[f64]) -> Option<Vec<f64>> {
        Some(self.trees.iter().map(|t| t.predict(features)).collect())
    }

    fn model_name(&self) -> &str {
        "random_forest"
    }
}

impl PriceRegressor for RegressionTree {
    fn predict(&self, features: &[f64]) -> f64 {
        RegressionTree::predict(self, features)
    }

    fn member_predictions(&self, _features: &[f64]) -> Option<Vec<f64>> {
        None
    }

    fn model_name(&self) -> &str {
        "regression_tree"
    }
}

/// 저장 가능한 회귀 모델.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "model", rename_all = "snake_case")]
pub enum Regressor {
    /// 배깅 앙상블
    Forest(RandomForest),
    /// 단일 트리 (앙상블 크기 1)
    SingleTree(RegressionTree),
}

impl Regressor {
    /// 정규화된 피처 중요도.
    pub fn feature_importances(&self) -> Vec<f64> {
        match self {
            Regressor::Forest(forest) => forest.feature_importances(),
            Regressor::SingleTree(tree) => tree.feature_importances(),
        }
    }
}

impl PriceRegressor for Regressor {
    fn predict(&self, features: &[f64]) -> f64 {
        match self {
            Regressor::Forest(forest) => forest.predict(features),
            Regressor::SingleTree(tree) => PriceRegressor::predict(tree, features),
        }
    }

    fn member_predictions(&self, features: &[f64]) -> Option<Vec<f64>> {
        match self {
            Regressor::Forest(forest) => forest.member_predictions(features),
            Regressor::SingleTree(tree) => tree.member_predictions(features),
        }
    }

    fn model_name(&self) -> &str {
        match self {
            Regressor::Forest(forest) => forest.model_name(),
            Regressor::SingleTree(tree) => tree.model_name(),
        }
    }
}

/// 학습된 가격 추정 파이프라인 (인코더 + 회귀 모델).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedPointModel {
    encoder: EncoderState,
    regressor: Regressor,
    /// 추출 후 실제 학습에 사용된 행 수
    training_rows: usize,
    /// 추출 전 적격 행 수
    eligible_rows: usize,
}

impl CachedModel for TrainedPointModel {
    const KIND: &'static str = "point_pipeline";
}

impl TrainedPointModel {
    /// 인코더 상태 반환.
    pub fn encoder(&self) -> &EncoderState {
        &self.encoder
    }

    /// 회귀 모델 반환.
    pub fn regressor(&self) -> &Regressor {
        &self.regressor
    }

    /// 학습에 사용된 행 수.
    pub fn training_rows(&self) -> usize {
        self.training_rows
    }

    /// 추출 전 적격 행 수.
    pub fn eligible_rows(&self) -> usize {
        self.eligible_rows
    }

    /// 학습 때와 같은 인코더로 속성 튜플을 변환.
    pub fn encode(&self, tuple: &AttributeTuple) -> MlResult<FeatureVector> {
        self.encoder.transform(tuple)
    }

    /// 속성 튜플의 가격을 추정.
    pub fn predict(&self, tuple: &AttributeTuple) -> MlResult<f64> {
        let features = self.encode(tuple)?;
        self.predict_features(&features)
    }

    /// 인코딩된 feature vector의 가격을 추정.
    pub fn predict_features(&self, features: &FeatureVector) -> MlResult<f64> {
        self.check_len(features)?;
        Ok(self.regressor.predict(features.as_slice()))
    }

    /// 개별 트리 예측값. 앙상블이 아니면 `None`.
    pub fn member_predictions(&self, features: &FeatureVector) -> MlResult<Option<Vec<f64>>> {
        self.check_len(features)?;
        Ok(self.regressor.member_predictions(features.as_slice()))
    }

    /// 피처 중요도 (내림차순, 동률은 피처 순서).
    pub fn feature_importances(&self) -> Vec<FeatureImportance> {
        let mut ranked: Vec<FeatureImportance> = self
            .encoder
            .feature_names()
            .into_iter()
            .zip(self.regressor.feature_importances())
            .map(|(name, importance)| FeatureImportance { name, importance })
            .collect();
        ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        ranked
    }

    /// 중요도 상위 n개 피처.
    pub fn top_features(&self, n: usize) -> Vec<FeatureImportance> {
        let mut ranked = self.feature_importances();
        ranked.truncate(n);
        ranked
    }

    fn check_len(&self, features: &FeatureVector) -> MlResult<()> {
        let expected = self.encoder.feature_count();
        if features.len() != expected {
            return Err(MlError::InvalidInput(format!(
                "Expected {} features, got {}",
                expected,
                features.len()
            )));
        }
        Ok(())
    }
}

/// 가격 추정 모델 학습기.
#[derive(Debug, Clone)]
pub struct PointEstimator {
    config: EstimatorConfig,
    encoder: FeatureEncoder,
}

impl PointEstimator {
    /// 설정으로 새 추정기 생성.
    pub fn new(config: EstimatorConfig) -> Self {
        let encoder = FeatureEncoder::new(FeatureSchema::from(&config));
        Self { config, encoder }
    }

    /// 설정 반환.
    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// 인코딩 스키마 반환.
    pub fn schema(&self) -> &FeatureSchema {
        self.encoder.schema()
    }

    /// 학습에 쓸 수 있는 행: 가격이 유한하고 필수 속성이 모두 있는 행.
    pub fn eligible_rows<'a>(&self, rows: &'a [TransactionRecord]) -> Vec<&'a TransactionRecord> {
        let schema = self.encoder.schema();
        rows.iter()
            .filter(|r| r.has_valid_price())
            .filter(|r| schema.is_satisfied_by(&r.attribute_tuple()))
            .collect()
    }

    /// 거래 기록으로 가격 추정 파이프라인을 학습합니다.
    pub fn fit(&self, rows: &[TransactionRecord]) -> MlResult<TrainedPointModel> {
        if self.config.n_estimators == 0 {
            return Err(MlError::InvalidInput(
                "n_estimators must be at least 1".to_string(),
            ));
        }

        let eligible = self.eligible_rows(rows);
        if eligible.is_empty() {
            return Err(self.no_eligible_rows_error(rows));
        }

        let sample = self.sample_rows(&eligible);
        let tuples: Vec<AttributeTuple> = sample.iter().map(|r| r.attribute_tuple()).collect();
        let encoder = self.encoder.fit(&tuples)?;

        let x: Vec<Vec<f64>> = tuples
            .iter()
            .map(|t| encoder.transform(t).map(FeatureVector::into_vec))
            .collect::<MlResult<_>>()?;
        let y: Vec<f64> = sample.iter().map(|r| r.price).collect();

        let params = TreeParams {
            max_depth: self.config.max_depth,
            min_samples_leaf: self.config.min_samples_leaf,
            max_features: self.config.max_features,
        };

        let regressor = if self.config.n_estimators == 1 {
            let mut rng = StdRng::seed_from_u64(self.config.seed);
            let all: Vec<usize> = (0..x.len()).collect();
            Regressor::SingleTree(RegressionTree::fit(&x, &y, &all, &params, &mut rng)?)
        } else {
            Regressor::Forest(self.fit_forest(&x, &y, &params)?)
        };

        info!(
            eligible = eligible.len(),
            rows = sample.len(),
            features = encoder.feature_count(),
            model = regressor.model_name(),
            "가격 추정 모델 학습 완료"
        );

        Ok(TrainedPointModel {
            encoder,
            regressor,
            training_rows: sample.len(),
            eligible_rows: eligible.len(),
        })
    }

    /// 학습된 파이프라인으로 속성 튜플의 가격을 추정.
    pub fn predict(&self, model: &TrainedPointModel, tuple: &AttributeTuple) -> MlResult<f64> {
        model.predict(tuple)
    }

    fn fit_forest(&self, x: &[Vec<f64>], y: &[f64], params: &TreeParams) -> MlResult<RandomForest> {
        let n = x.len();
        let trees = (0..self.config.n_estimators)
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(i as u64 + 1));
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let tree = RegressionTree::fit(x, y, &bootstrap, params, &mut rng)?;
                debug!(tree = i, nodes = tree.node_count(), depth = tree.depth(), "트리 학습");
                Ok(tree)
            })
            .collect::<MlResult<Vec<_>>>()?;
        RandomForest::new(trees)
    }

    /// 적격 행이 상한을 넘으면 고정 시드로 비복원 추출 (원래 순서 유지).
    fn sample_rows<'a>(&self, eligible: &[&'a TransactionRecord]) -> Vec<&'a TransactionRecord> {
        let cap = self.config.max_training_rows;
        if cap == 0 || eligible.len() <= cap {
            return eligible.to_vec();
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut picked = rand::seq::index::sample(&mut rng, eligible.len(), cap).into_vec();
        picked.sort_unstable();
        debug!(eligible = eligible.len(), sampled = cap, "학습 행 추출");
        picked.into_iter().map(|i| eligible[i]).collect()
    }

    fn no_eligible_rows_error(&self, rows: &[TransactionRecord]) -> MlError {
        let schema = self.encoder.schema();
        let absent = schema
            .categorical
            .iter()
            .find(|name| rows.iter().all(|r| !r.attributes.contains_key(*name)))
            .or_else(|| {
                schema
                    .numeric
                    .iter()
                    .find(|name| rows.iter().all(|r| !r.numeric_attributes.contains_key(*name)))
            });

        match absent {
            Some(name) if !rows.is_empty() => {
                MlError::Schema(format!("attribute '{}' is not present in any record", name))
            }
            _ => MlError::InsufficientData {
                required: 1,
                actual: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn config() -> EstimatorConfig {
        EstimatorConfig {
            n_estimators: 25,
            max_depth: 6,
            min_samples_leaf: 1,
            categorical: vec!["species".to_string(), "origin".to_string()],
            numeric: vec!["weight".to_string()],
            ..Default::default()
        }
    }

    fn record(origin: &str, weight: f64, price: f64) -> TransactionRecord {
        TransactionRecord::new("광어", NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), price)
            .with_attribute("species", "광어")
            .with_attribute("origin", origin)
            .with_numeric("weight", weight)
    }

    fn origin_dataset() -> Vec<TransactionRecord> {
        (0..60)
            .map(|i| {
                let weight = 1.0 + (i % 5) as f64 * 0.1;
                let jitter = ((i * 37) % 11) as f64 * 100.0 - 500.0;
                if i % 2 == 0 {
                    record("X", weight, 50_000.0 + jitter)
                } else {
                    record("Y", weight, 20_000.0 + jitter)
                }
            })
            .collect()
    }

    fn query(origin: &str) -> AttributeTuple {
        AttributeTuple::new()
            .with_category("species", "광어")
            .with_category("origin", origin)
            .with_numeric("weight", 1.2)
    }

    #[test]
    fn test_origin_separates_prices() {
        let estimator = PointEstimator::new(config());
        let model = estimator.fit(&origin_dataset()).unwrap();

        let x = estimator.predict(&model, &query("X")).unwrap();
        let y = estimator.predict(&model, &query("Y")).unwrap();
        assert!((x - 50_000.0).abs() < (x - 20_000.0).abs(), "x = {}", x);
        assert!((y - 20_000.0).abs() < (y - 50_000.0).abs(), "y = {}", y);

        let top = model.top_features(1);
        assert!(top[0].name.starts_with("origin="), "top = {:?}", top);
    }

    #[test]
    fn test_ineligible_rows_are_excluded() {
        let mut rows = origin_dataset();
        rows.push(record("X", 1.0, f64::NAN));
        rows.push(
            TransactionRecord::new("광어", NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), 1.0)
                .with_attribute("species", "광어")
                .with_numeric("weight", 1.0),
        );

        let estimator = PointEstimator::new(config());
        assert_eq!(estimator.eligible_rows(&rows).len(), 60);

        let model = estimator.fit(&rows).unwrap();
        assert_eq!(model.eligible_rows(), 60);
        assert_eq!(model.training_rows(), 60);
    }

    #[test]
    fn test_sampling_is_capped_and_reproducible() {
        let estimator = PointEstimator::new(EstimatorConfig {
            max_training_rows: 20,
            ..config()
        });
        let rows = origin_dataset();

        let first = estimator.fit(&rows).unwrap();
        let second = estimator.fit(&rows).unwrap();
        assert_eq!(first.training_rows(), 20);
        assert_eq!(first.eligible_rows(), 60);
        assert_eq!(first, second);
    }

    #[test]
    fn test_single_tree_has_no_members() {
        let estimator = PointEstimator::new(EstimatorConfig {
            n_estimators: 1,
            ..config()
        });
        let model = estimator.fit(&origin_dataset()).unwrap();
        assert!(matches!(model.regressor(), Regressor::SingleTree(_)));

        let features = model.encode(&query("X")).unwrap();
        assert!(model.member_predictions(&features).unwrap().is_none());
    }

    #[test]
    fn test_forest_member_predictions() {
        let estimator = PointEstimator::new(config());
        let model = estimator.fit(&origin_dataset()).unwrap();
        let features = model.encode(&query("Y")).unwrap();

        let members = model.member_predictions(&features).unwrap().unwrap();
        assert_eq!(members.len(), 25);
        let mean = members.iter().sum::<f64>() / members.len() as f64;
        assert!((mean - model.predict_features(&features).unwrap()).abs() < 1e-9);
    }

    #[test]
    fn test_unseen_origin_still_predicts() {
        let estimator = PointEstimator::new(config());
        let model = estimator.fit(&origin_dataset()).unwrap();
        let price = estimator.predict(&model, &query("Z")).unwrap();
        assert!(price.is_finite());
    }

    #[test]
    fn test_missing_attribute_column_is_schema_error() {
        let rows: Vec<TransactionRecord> = (0..5)
            .map(|i| {
                TransactionRecord::new("광어", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 100.0 * i as f64)
                    .with_attribute("species", "광어")
                    .with_numeric("weight", 1.0)
            })
            .collect();

        match PointEstimator::new(config()).fit(&rows) {
            Err(MlError::Schema(msg)) => assert!(msg.contains("origin")),
            other => panic!("Expected Schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_rows_is_insufficient() {
        let result = PointEstimator::new(config()).fit(&[]);
        assert!(matches!(result, Err(MlError::InsufficientData { .. })));
    }

    #[test]
    fn test_feature_length_mismatch() {
        let estimator = PointEstimator::new(config());
        let model = estimator.fit(&origin_dataset()).unwrap();
        let result = model.predict_features(&FeatureVector::new(vec![1.0, 0.0]));
        assert!(matches!(result, Err(MlError::InvalidInput(_))));
    }

    #[test]
    fn test_importances_sum_to_one() {
        let model = PointEstimator::new(config()).fit(&origin_dataset()).unwrap();
        let importances = model.feature_importances();
        assert_eq!(importances.len(), model.encoder().feature_count());
        let total: f64 = importances.iter().map(|f| f.importance).sum();
        assert!((total - 1.0).abs() < 1e-9);
        for pair in importances.windows(2) {
            assert!(pair[0].importance >= pair[1].importance);
        }
    }
}
