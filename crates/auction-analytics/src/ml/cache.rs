//! 학습된 모델의 디스크 캐시.
//!
//! 모델 하나당 JSON 파일 하나를 캐시 디렉토리에 저장합니다.
//!
//! # 동작 흐름
//!
//! ```text
//! load_or_train(key, train_fn)
//!         │
//!   ┌─────┴──────┐
//!   │ 파일 존재? │
//!   └─────┬──────┘
//!     YES │ NO ─────────────────────┐
//!         ▼                         │
//! ┌────────────────┐                │
//! │ 역직렬화 시도  │── 실패 ──┐     │
//! └───────┬────────┘  (경고, │     │
//!    성공 │          파일 삭제)     │
//!         ▼                  ▼     ▼
//!   Loaded 반환        ┌─────────────────┐
//!                      │ train_fn() 실행 │── 실패 → Training 에러 (파일 없음)
//!                      └────────┬────────┘
//!                               ▼
//!                      임시 파일 기록 → rename
//!                               ▼
//!                         Trained 반환
//! ```
//!
//! 자동 만료는 없습니다. 캐시된 모델은 [`ModelCache::invalidate`]로
//! 슬롯을 지우기 전까지 계속 재사용됩니다.
//!
//! 같은 키에 대한 동시 첫 요청은 각자 학습한 뒤 마지막 기록이 남습니다.
//! 기록은 임시 파일 + rename으로 이루어지므로 파일이 깨지지는 않습니다.

use crate::ml::{MlError, MlResult};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 캐시 파일 형식 버전. 저장 형식이 바뀌면 올립니다.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// 캐시에 저장할 수 있는 모델.
pub trait CachedModel: Serialize + DeserializeOwned {
    /// 저장 파일에 기록되는 모델 종류 이름.
    const KIND: &'static str;
}

/// `load_or_train`이 모델을 어떻게 얻었는지.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadStatus {
    /// 캐시에서 로드함 (학습 없음)
    Loaded,
    /// 새로 학습하고 저장함
    Trained,
}

impl std::fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadStatus::Loaded => write!(f, "loaded"),
            LoadStatus::Trained => write!(f, "trained"),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct CacheEnvelope<M> {
    format_version: u32,
    model_kind: String,
    trained_at: DateTime<Utc>,
    model: M,
}

/// 키 단위로 학습된 모델을 저장/조회하는 디스크 캐시.
#[derive(Debug, Clone)]
pub struct ModelCache {
    dir: PathBuf,
}

impl ModelCache {
    /// 주어진 디렉토리를 사용하는 캐시 생성. 디렉토리는 첫 저장 시 만들어집니다.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 캐시 디렉토리 반환.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 이름을 파일 시스템에 안전한 키로 변환 (영숫자가 아닌 문자 → `_`).
    ///
    /// 한글 등 유니코드 문자도 영숫자로 취급해 그대로 유지합니다.
    pub fn sanitize_key(name: &str) -> String {
        name.chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect()
    }

    /// 엔티티별 시계열 모델 키 (`model_<정규화된 이름>`).
    pub fn entity_key(entity_id: &str) -> String {
        format!("model_{}", Self::sanitize_key(entity_id))
    }

    /// 키에 해당하는 파일 경로.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// 키에 저장된 모델 파일이 있는지 확인.
    pub fn contains(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }

    /// 저장된 모델을 로드합니다.
    ///
    /// 파일이 없으면 `Ok(None)`, 파일이 깨졌거나 버전/종류가 맞지 않으면
    /// `CacheCorruption` 에러를 반환합니다.
    pub fn load<M: CachedModel>(&self, key: &str) -> MlResult<Option<M>> {
        let path = self.path_for(key);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(MlError::CacheCorruption(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let envelope: CacheEnvelope<serde_json::Value> = serde_json::from_str(&contents)?;
        if envelope.format_version != CACHE_FORMAT_VERSION {
            return Err(MlError::CacheCorruption(format!(
                "format version {} (expected {})",
                envelope.format_version, CACHE_FORMAT_VERSION
            )));
        }
        if envelope.model_kind != M::KIND {
            return Err(MlError::CacheCorruption(format!(
                "model kind '{}' (expected '{}')",
                envelope.model_kind,
                M::KIND
            )));
        }

        let model = serde_json::from_value(envelope.model)?;
        Ok(Some(model))
    }

    /// 모델을 저장합니다. 임시 파일에 쓴 뒤 rename하므로 부분 기록이 남지 않습니다.
    pub fn store<M: CachedModel>(&self, key: &str, model: &M) -> MlResult<()> {
        fs::create_dir_all(&self.dir)?;

        let envelope = CacheEnvelope {
            format_version: CACHE_FORMAT_VERSION,
            model_kind: M::KIND.to_string(),
            trained_at: Utc::now(),
            model,
        };
        let json = serde_json::to_string(&envelope)
            .map_err(|e| MlError::Training(format!("failed to serialize model: {}", e)))?;

        let path = self.path_for(key);
        let tmp = self
            .dir
            .join(format!("{}.json.tmp.{}", key, std::process::id()));

        if let Err(e) = fs::write(&tmp, json).and_then(|_| fs::rename(&tmp, &path)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        info!(key = %key, path = %path.display(), kind = M::KIND, "모델 저장 완료");
        Ok(())
    }

    /// 캐시된 모델을 반환하거나, 없으면 `train_fn`으로 학습해 저장 후 반환합니다.
    ///
    /// 역직렬화에 실패한 파일은 경고를 남기고 지운 뒤 재학습합니다.
    /// 학습이나 저장이 실패하면 에러를 그대로 반환하며, 디스크에는 아무것도 남지 않습니다.
    pub fn load_or_train<M, F>(&self, key: &str, train_fn: F) -> MlResult<(M, LoadStatus)>
    where
        M: CachedModel,
        F: FnOnce() -> MlResult<M>,
    {
        self.load_or_train_matching(key, |_| true, train_fn)
    }

    /// [`load_or_train`](Self::load_or_train)과 같지만, 로드한 모델이 `accept`를
    /// 통과하지 못하면 손상된 파일과 같이 취급합니다 (경고, 삭제, 재학습).
    ///
    /// 서로 다른 이름이 같은 키로 정규화되는 경우 다른 엔티티의 모델을
    /// 돌려주지 않기 위해 사용합니다.
    pub fn load_or_train_matching<M, A, F>(
        &self,
        key: &str,
        accept: A,
        train_fn: F,
    ) -> MlResult<(M, LoadStatus)>
    where
        M: CachedModel,
        A: FnOnce(&M) -> bool,
        F: FnOnce() -> MlResult<M>,
    {
        match self.load::<M>(key) {
            Ok(Some(model)) if accept(&model) => {
                debug!(key = %key, kind = M::KIND, "캐시 적중");
                return Ok((model, LoadStatus::Loaded));
            }
            Ok(Some(_)) => {
                warn!(key = %key, kind = M::KIND, "캐시된 모델이 요청과 맞지 않음, 재학습");
                self.remove_slot(key)?;
            }
            Ok(None) => {
                debug!(key = %key, kind = M::KIND, "캐시 미스");
            }
            Err(e) => {
                warn!(key = %key, error = %e, "캐시된 모델을 읽을 수 없음, 재학습");
                self.remove_slot(key)?;
            }
        }

        info!(key = %key, kind = M::KIND, "모델 학습 시작");
        let model = train_fn()?;
        self.store(key, &model)?;

        Ok((model, LoadStatus::Trained))
    }

    /// 키의 저장 슬롯을 삭제합니다. 삭제한 파일이 있었으면 `true`.
    pub fn invalidate(&self, key: &str) -> MlResult<bool> {
        let removed = self.remove_slot(key)?;
        if removed {
            info!(key = %key, "캐시 무효화");
        }
        Ok(removed)
    }

    fn remove_slot(&self, key: &str) -> MlResult<bool> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
