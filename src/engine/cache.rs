//! 引擎配置缓存
//!
//! 每个 (模式, 采样率) 组合只调用一次 `configure`，句柄在缓存生命周期内复用，不做淘汰。
//! 实际运行中采样率种类很少，键空间有界。
//!
//! 缓存未命中时在持有锁的情况下创建句柄：并发请求同一个键不会创建重复句柄。

use super::options::{EngineOptions, Mode};
use super::ScoringEngine;
use crate::error::{MeasureError, MeasureResult};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// 缓存键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineKey {
    pub mode: Mode,
    pub sample_rate: u32,
}

/// 已配置的引擎句柄
///
/// 由 [`EngineConfigCache`] 独占创建；测量调用通过内部互斥锁串行化。
pub struct EngineHandle<H> {
    key: EngineKey,
    options: EngineOptions,
    inner: Mutex<H>,
}

impl<H> EngineHandle<H> {
    /// 句柄对应的缓存键
    pub fn key(&self) -> EngineKey {
        self.key
    }

    /// 创建句柄时使用的配置
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// 以独占方式访问底层句柄
    pub fn with_exclusive<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        let mut guard = lock(&self.inner);
        f(&mut guard)
    }
}

impl<H> fmt::Debug for EngineHandle<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("key", &self.key)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// 中毒的锁仍可继续使用：缓存中的数据只在插入完成后才可见
#[inline]
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// (模式, 采样率) → 引擎句柄 的惰性缓存
pub struct EngineConfigCache<E: ScoringEngine> {
    engine: E,
    model_dir: PathBuf,
    /// 模型文件按模式绑定，首次配置该模式时确定，之后所有采样率变体复用
    artifacts: Mutex<HashMap<Mode, PathBuf>>,
    handles: Mutex<HashMap<EngineKey, Arc<EngineHandle<E::Handle>>>>,
}

impl<E: ScoringEngine> EngineConfigCache<E> {
    /// 创建空缓存
    ///
    /// # 参数
    ///
    /// * `engine` - 外部评分引擎
    /// * `model_dir` - 模型文件所在目录
    pub fn new(engine: E, model_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            model_dir: model_dir.into(),
            artifacts: Mutex::new(HashMap::new()),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// 底层引擎
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// 模型目录
    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// 获取或创建句柄
    ///
    /// 命中时返回同一个 `Arc`（`Arc::ptr_eq` 成立）；未命中时调用一次 `configure`。
    ///
    /// # 错误
    ///
    /// * `MeasureError::InvalidInput` - 采样率为0
    /// * `MeasureError::EngineUnavailable` - 引擎无法初始化（不缓存失败结果）
    pub fn get_or_create(
        &self,
        mode: Mode,
        sample_rate: u32,
    ) -> MeasureResult<Arc<EngineHandle<E::Handle>>> {
        if sample_rate == 0 {
            return Err(MeasureError::InvalidInput("引擎采样率不能为0".to_string()));
        }

        let key = EngineKey { mode, sample_rate };
        let mut handles = lock(&self.handles);

        if let Some(handle) = handles.get(&key) {
            debug!(%mode, sample_rate, "Engine cache hit");
            return Ok(Arc::clone(handle));
        }

        let options = EngineOptions::for_mode(mode, sample_rate, self.model_artifact(mode));
        info!(
            %mode,
            sample_rate,
            model = %options.model_artifact_path.display(),
            "Configuring scoring engine"
        );

        let raw = self.engine.configure(&options)?;
        let handle = Arc::new(EngineHandle {
            key,
            options,
            inner: Mutex::new(raw),
        });
        handles.insert(key, Arc::clone(&handle));

        Ok(handle)
    }

    /// 模式对应的模型文件路径（首次调用时确定并固定）
    pub fn model_artifact(&self, mode: Mode) -> PathBuf {
        lock(&self.artifacts)
            .entry(mode)
            .or_insert_with(|| self.model_dir.join(mode.model_file()))
            .clone()
    }

    /// 是否已缓存该键
    pub fn contains(&self, mode: Mode, sample_rate: u32) -> bool {
        lock(&self.handles).contains_key(&EngineKey { mode, sample_rate })
    }

    /// 已缓存句柄数
    pub fn len(&self) -> usize {
        lock(&self.handles).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 显式释放所有句柄
    ///
    /// 仍被 `Measurer` 持有的 `Arc` 在其释放后才真正销毁。
    pub fn clear(&self) {
        let dropped = {
            let mut handles = lock(&self.handles);
            std::mem::take(&mut *handles)
        };
        debug!(count = dropped.len(), "Engine cache cleared");
    }
}
