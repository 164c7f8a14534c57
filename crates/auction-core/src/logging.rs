//! 로깅 초기화.
//!
//! 모든 로그는 stderr로 출력합니다. stdout은 CLI의 예측 테이블(CSV/JSON)
//! 출력 전용입니다.
//!
//! 필터 우선순위: `RUST_LOG` 환경 변수 → 설정 파일 `[logging].level`.
//!
//! 형식:
//! - **pretty**: 여러 줄, 색상 (개발용)
//! - **json**: 한 줄 JSON (로그 수집용)
//! - **compact**: 한 줄 텍스트

use crate::config::LoggingConfig;
use std::str::FromStr;
use thiserror::Error;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// 로깅 초기화 에러.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// 필터 문자열 파싱 실패
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    /// 전역 subscriber가 이미 설정됨
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(format!("Unknown log format: {}", other)),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` 문법의 필터 (예: "info", "auction_analytics::ml=debug")
    pub filter: String,
    /// 출력 형식
    pub format: LogFormat,
    /// span 진입/종료 이벤트 출력 (학습 소요 시간 확인용)
    pub span_events: bool,
    /// 소스 파일/줄 번호 출력
    pub source_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new("info")
    }
}

impl LogConfig {
    /// 주어진 필터로 새 설정 생성.
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            format: LogFormat::default(),
            span_events: false,
            source_location: false,
        }
    }

    /// 출력 형식 지정.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// span 종료 이벤트 출력 여부.
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// 소스 위치 출력 여부.
    pub fn with_source_location(mut self, enabled: bool) -> Self {
        self.source_location = enabled;
        self
    }

    /// `RUST_LOG`, `LOG_FORMAT` 환경 변수로 설정 생성.
    pub fn from_env() -> Self {
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let format = std::env::var("LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        Self::new(filter).with_format(format)
    }

    fn format_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let span_events = if self.span_events {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let base = fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(span_events)
            .with_file(self.source_location)
            .with_line_number(self.source_location);

        match self.format {
            LogFormat::Pretty => base.pretty().boxed(),
            LogFormat::Json => base.json().with_current_span(true).boxed(),
            LogFormat::Compact => base.compact().boxed(),
        }
    }

    fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.filter).map_err(|e| LoggingError::InvalidFilter {
            filter: self.filter.clone(),
            reason: e.to_string(),
        })
    }
}

impl From<&LoggingConfig> for LogConfig {
    /// 알 수 없는 형식 문자열은 pretty로 처리합니다.
    fn from(section: &LoggingConfig) -> Self {
        Self::new(section.level.clone()).with_format(section.format.parse().unwrap_or_default())
    }
}

/// 전역 subscriber를 설치합니다. 프로세스당 한 번만 성공합니다.
///
/// ```no_run
/// use auction_core::logging::{init_logging, LogConfig, LogFormat};
///
/// init_logging(LogConfig::new("auction_analytics=debug").with_format(LogFormat::Json))?;
/// # Ok::<(), auction_core::logging::LoggingError>(())
/// ```
pub fn init_logging(config: LogConfig) -> Result<(), LoggingError> {
    let filter = config.env_filter()?;

    tracing_subscriber::registry()
        .with(config.format_layer().with_filter(filter))
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    tracing::debug!(filter = %config.filter, format = ?config.format, "로깅 초기화");
    Ok(())
}

/// [`LogConfig::from_env`]로 로깅을 초기화합니다.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    init_logging(LogConfig::from_env())
}

/// 엔티티(및 예측 기간) 필드를 담은 info 레벨 span.
///
/// ```ignore
/// let span = forecast_span!("forecast_entity", "광어", 12);
/// let _guard = span.enter();
/// ```
#[macro_export]
macro_rules! forecast_span {
    ($name:expr, $entity:expr) => {
        ::tracing::info_span!($name, entity = %$entity)
    };
    ($name:expr, $entity:expr, $horizon:expr) => {
        ::tracing::info_span!($name, entity = %$entity, horizon = $horizon)
    };
}
