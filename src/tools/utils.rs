//! 工具函数模块
//!
//! 提供文件路径处理和运行环境解析等通用工具函数。

/// 文件路径处理工具函数
pub mod path {
    use std::path::Path;

    /// 提取文件名（返回String，用于日志显示）
    #[inline]
    pub fn extract_filename_lossy(path: &Path) -> String {
        path.file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }

    /// 获取父目录，如果不存在则返回当前目录
    #[inline]
    pub fn get_parent_dir(path: &Path) -> &Path {
        path.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// 运行环境解析
pub mod environment {
    use super::super::constants::{defaults, env};
    use std::path::PathBuf;

    /// 确定模型目录
    ///
    /// 优先级：命令行参数 → `VISQOL_MODEL_DIR` → 可执行文件旁的 `model/` → 当前目录下的 `model/`
    pub fn resolve_model_dir(explicit: Option<PathBuf>) -> PathBuf {
        if let Some(dir) = explicit {
            return dir;
        }
        if let Some(dir) = std::env::var_os(env::VISQOL_MODEL_DIR) {
            return PathBuf::from(dir);
        }

        std::env::current_exe()
            .ok()
            .map(|exe| super::path::get_parent_dir(&exe).join(defaults::MODEL_DIR))
            .filter(|dir| dir.is_dir())
            .unwrap_or_else(|| PathBuf::from(defaults::MODEL_DIR))
    }
}

/// 输入文件校验
pub mod validation {
    use crate::audio::load_wav;
    use std::path::PathBuf;
    use tracing::warn;

    /// 筛选出存在、可解码且至少有一帧的WAV文件
    ///
    /// 无效路径逐个记录警告后跳过，保持输入顺序。
    pub fn validate_audio_files(paths: &[PathBuf]) -> Vec<PathBuf> {
        paths
            .iter()
            .filter(|path| {
                if !path.is_file() {
                    warn!(path = %path.display(), "文件不存在 / File not found");
                    return false;
                }
                match load_wav(path) {
                    Ok(_) => true,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "无法读取WAV / Could not load WAV");
                        false
                    }
                }
            })
            .cloned()
            .collect()
    }
}

// 重新导出为平级函数
pub use environment::resolve_model_dir;
pub use path::{extract_filename_lossy, get_parent_dir};
pub use validation::validate_audio_files;
