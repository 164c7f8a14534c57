//! 설정 관리.
//!
//! 모든 섹션은 `#[serde(default)]`이므로 설정 파일에는 바꾸려는 필드만
//! 적으면 됩니다.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 모델 캐시 설정
    #[serde(default)]
    pub cache: CacheConfig,
    /// 시계열 예측 설정
    #[serde(default)]
    pub forecast: ForecastConfig,
    /// 속성 기반 가격 추정 설정
    #[serde(default)]
    pub estimator: EstimatorConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 모델 캐시 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// 학습된 모델을 저장할 디렉토리
    pub dir: PathBuf,
    /// 공유 가격 추정 파이프라인의 캐시 키 (파일 이름은 `<키>.json`)
    pub pipeline_key: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            pipeline_key: "pipe".to_string(),
        }
    }
}

/// 시계열 예측 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// 계절성 학습에 필요한 최소 월별 관측치 수
    pub min_monthly_points: usize,
    /// 연간 계절성 푸리에 차수
    pub fourier_order: usize,
    /// 예측 구간 폭 (0~1, 예: 0.8 = 80% 구간)
    pub interval_width: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            min_monthly_points: 10,
            fourier_order: 3,
            interval_width: 0.8,
        }
    }
}

/// 속성 기반 가격 추정 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// 앙상블 트리 개수
    pub n_estimators: usize,
    /// 트리 최대 깊이
    pub max_depth: usize,
    /// 리프 노드 최소 샘플 수
    pub min_samples_leaf: usize,
    /// 분할당 고려할 최대 피처 수 (None이면 전체)
    pub max_features: Option<usize>,
    /// 학습 샘플 상한
    pub max_training_rows: usize,
    /// 샘플링/부트스트랩 난수 시드
    pub seed: u64,
    /// 원-핫 인코딩할 범주형 속성
    pub categorical: Vec<String>,
    /// 스케일링할 수치형 속성
    pub numeric: Vec<String>,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_leaf: 2,
            max_features: None,
            max_training_rows: 20_000,
            seed: 42,
            categorical: vec![
                "species".to_string(),
                "origin".to_string(),
                "grade".to_string(),
                "package".to_string(),
            ],
            numeric: vec!["quantity".to_string(), "weight".to_string()],
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// `AUCTION__<섹션>__<필드>` 형식의 환경 변수 소스.
///
/// 속성 목록은 쉼표로 구분합니다 (`AUCTION__ESTIMATOR__NUMERIC=quantity,weight`).
fn env_overrides() -> config::Environment {
    config::Environment::with_prefix("AUCTION")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("estimator.categorical")
        .with_list_parse_key("estimator.numeric")
}

impl AppConfig {
    /// TOML 파일을 읽고 `AUCTION__*` 환경 변수로 덮어씁니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        Self::build(Some(path.as_ref()))
    }

    /// 파일이 없으면 기본값 위에 환경 변수만 적용합니다.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let path = path.as_ref();
        Self::build(path.exists().then_some(path))
    }

    /// `config/default.toml` 기준으로 [`AppConfig::load_or_default`]를 호출합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load_or_default("config/default.toml")
    }

    fn build(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(config::File::from(file));
        }
        builder
            .add_source(env_overrides())
            .build()?
            .try_deserialize()
    }
}
