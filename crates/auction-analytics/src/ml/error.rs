//! ML 모듈 에러 타입.

use thiserror::Error;

/// 예측 코어에서 발생할 수 있는 에러.
#[derive(Debug, Error)]
pub enum MlError {
    /// 필수 속성/컬럼 누락
    #[error("Schema error: {0}")]
    Schema(String),

    /// 신뢰할 수 있는 학습을 위한 데이터 부족
    #[error("Insufficient data: need {required} samples, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// 모델 학습 실패 (수치 문제 등)
    #[error("Training error: {0}")]
    Training(String),

    /// 저장된 모델 역직렬화 실패 (캐시 내부에서 재학습으로 복구됨)
    #[error("Cache corruption: {0}")]
    CacheCorruption(String),

    /// 유효하지 않은 입력 데이터
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 캐시 저장소 I/O 에러
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// ML 작업을 위한 Result 타입.
pub type MlResult<T> = Result<T, MlError>;

impl MlError {
    /// 이 에러가 복구 가능한지 확인 (다른 데이터로 재시도 가능).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MlError::InsufficientData { .. } | MlError::InvalidInput(_)
        )
    }

    /// 표시 계층에 "예측 불가 사유"로 전달되는 에러인지 확인.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            MlError::Schema(_) | MlError::InsufficientData { .. } | MlError::Training(_)
        )
    }
}

impl From<serde_json::Error> for MlError {
    fn from(err: serde_json::Error) -> Self {
        MlError::CacheCorruption(err.to_string())
    }
}
