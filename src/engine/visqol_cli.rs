//! ViSQOL可执行文件桥接
//!
//! 通过子进程调用已安装的 `visqol` 二进制完成打分：
//! 样本先以单声道16位WAV写入句柄私有的临时目录，再把文件路径交给 `visqol`，
//! 从标准输出解析 MOS-LQO / VNSIM，从 `--output_debug` JSON 解析逐频带相似度。

use super::options::EngineOptions;
use super::{ScoringEngine, SimilarityResult};
use crate::audio::encode;
use crate::error::{MeasureError, MeasureResult, engine_failure, engine_unavailable};
use crate::tools::constants::env::VISQOL_BIN;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tracing::{debug, info};

/// ViSQOL安装指南
const VISQOL_INSTALL_GUIDE: &str = r#"
The native ViSQOL binary is required / 需要安装原生ViSQOL可执行文件

Build / 构建方法:
  git clone https://github.com/google/visqol
  cd visqol && bazel build :visqol -c opt
  export VISQOL_BIN=$PWD/bazel-bin/visqol
  export VISQOL_MODEL_DIR=$PWD/model

There is no approximate fallback: an estimated score is worse than no score.
没有近似回退方案：估算分数比没有分数更糟。
"#;

#[cfg(target_os = "windows")]
const BINARY_NAME: &str = "visqol.exe";
#[cfg(not(target_os = "windows"))]
const BINARY_NAME: &str = "visqol";

/// 调用外部 `visqol` 二进制的评分引擎
#[derive(Debug, Clone)]
pub struct VisqolCliEngine {
    binary: PathBuf,
}

/// 已配置的CLI会话：配置 + 私有临时目录
#[derive(Debug)]
pub struct CliSession {
    options: EngineOptions,
    workdir: TempDir,
}

impl CliSession {
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }
}

impl VisqolCliEngine {
    /// 查找visqol可执行文件
    ///
    /// 查找顺序：`VISQOL_BIN` 环境变量 → `PATH` → 当前可执行文件所在目录。
    ///
    /// # 错误
    ///
    /// * `MeasureError::EngineUnavailable` - 所有位置均未找到
    pub fn locate() -> MeasureResult<Self> {
        if let Some(explicit) = std::env::var_os(VISQOL_BIN) {
            return Self::with_binary(PathBuf::from(explicit));
        }

        let from_path = std::env::var_os("PATH").and_then(|paths| {
            std::env::split_paths(&paths)
                .map(|dir| dir.join(BINARY_NAME))
                .find(|candidate| candidate.is_file())
        });

        // 便携部署：与可执行文件同目录
        let beside_exe = || {
            std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(|dir| dir.join(BINARY_NAME)))
                .filter(|candidate| candidate.is_file())
        };

        match from_path.or_else(beside_exe) {
            Some(binary) => Self::with_binary(binary),
            None => Err(MeasureError::EngineUnavailable(format!(
                "未找到 {BINARY_NAME} / {BINARY_NAME} not found{VISQOL_INSTALL_GUIDE}"
            ))),
        }
    }

    /// 使用指定路径的可执行文件
    pub fn with_binary(binary: impl Into<PathBuf>) -> MeasureResult<Self> {
        let binary = binary.into();
        if !binary.is_file() {
            return Err(MeasureError::EngineUnavailable(format!(
                "{} 不存在 / does not exist{VISQOL_INSTALL_GUIDE}",
                binary.display()
            )));
        }
        info!(binary = %binary.display(), "ViSQOL binary located");
        Ok(Self { binary })
    }

    /// 可执行文件路径
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// 构建命令行参数
    fn build_args(
        options: &EngineOptions,
        reference: &Path,
        degraded: &Path,
        debug_output: &Path,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--reference_file".into(),
            reference.into(),
            "--degraded_file".into(),
            degraded.into(),
            "--similarity_to_quality_model".into(),
            options.model_artifact_path.clone().into(),
            "--search_window_radius".into(),
            options.search_window_radius.to_string().into(),
            "--output_debug".into(),
            debug_output.into(),
        ];

        // 语音模式内含VAD，visqol没有单独的VAD开关
        if options.use_speech_scoring {
            args.push("--use_speech_mode".into());
        }
        args.push(format!("--use_lattice_model={}", options.use_lattice_model).into());
        if options.use_unscaled_mos_mapping {
            args.push("--use_unscaled_speech_mos_mapping".into());
        }

        args
    }
}

impl ScoringEngine for VisqolCliEngine {
    type Handle = CliSession;

    fn configure(&self, options: &EngineOptions) -> MeasureResult<CliSession> {
        if !options.model_artifact_path.is_file() {
            return Err(MeasureError::EngineUnavailable(format!(
                "模型文件不存在 / model artifact missing: {}{VISQOL_INSTALL_GUIDE}",
                options.model_artifact_path.display()
            )));
        }

        let workdir = tempfile::Builder::new()
            .prefix("visqol-session-")
            .tempdir()
            .map_err(|e| engine_unavailable("无法创建临时目录", e))?;

        debug!(
            sample_rate = options.sample_rate,
            workdir = %workdir.path().display(),
            "ViSQOL session created"
        );

        Ok(CliSession {
            options: options.clone(),
            workdir,
        })
    }

    fn measure(
        &self,
        session: &mut CliSession,
        reference: &[f64],
        degraded: &[f64],
    ) -> MeasureResult<SimilarityResult> {
        let dir = session.workdir.path();
        let ref_path = dir.join("reference.wav");
        let deg_path = dir.join("degraded.wav");
        let debug_path = dir.join("debug.json");

        let rate = session.options.sample_rate;
        std::fs::write(&ref_path, encode(reference, rate)?)?;
        std::fs::write(&deg_path, encode(degraded, rate)?)?;
        // 上一次调用遗留的调试输出不能混入本次结果
        let _ = std::fs::remove_file(&debug_path);

        let args = Self::build_args(&session.options, &ref_path, &deg_path, &debug_path);
        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .map_err(|e| engine_failure("无法启动visqol / failed to spawn visqol", e))?;

        if !output.status.success() {
            return Err(MeasureError::MeasurementFailure(format!(
                "visqol退出状态 / exit status {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let debug_json = std::fs::read_to_string(&debug_path).ok();
        parse_report(&stdout, debug_json.as_deref())
    }
}

/// 解析 `key: value` 形式行中的数值
fn parse_labeled_value(line: &str, label: &str) -> Option<f64> {
    let (key, value) = line.split_once(':')?;
    if key.trim() != label {
        return None;
    }
    value.split_whitespace().next()?.parse().ok()
}

/// 从JSON中读取数值数组（字段缺失或类型不符时返回None）
fn json_f64_array(value: &serde_json::Value, field: &str) -> Option<Vec<f64>> {
    value
        .get(field)?
        .as_array()?
        .iter()
        .map(serde_json::Value::as_f64)
        .collect()
}

/// 解析visqol的输出
///
/// MOS-LQO 必须存在；VNSIM 优先取标准输出，其次取调试JSON，都没有时为0。
pub fn parse_report(stdout: &str, debug_json: Option<&str>) -> MeasureResult<SimilarityResult> {
    let moslqo = stdout
        .lines()
        .find_map(|line| parse_labeled_value(line, "MOS-LQO"))
        .ok_or_else(|| {
            MeasureError::MeasurementFailure(format!(
                "visqol输出中没有MOS-LQO / no MOS-LQO in output: {}",
                stdout.trim()
            ))
        })?;

    let debug: Option<serde_json::Value> = debug_json.and_then(|s| serde_json::from_str(s).ok());

    let vnsim = stdout
        .lines()
        .find_map(|line| parse_labeled_value(line, "VNSIM"))
        .or_else(|| debug.as_ref()?.get("vnsim")?.as_f64())
        .unwrap_or(0.0);

    let (fvnsim, center_freq_bands) = match &debug {
        Some(value) => (
            json_f64_array(value, "fvnsim").unwrap_or_default(),
            json_f64_array(value, "center_freq_bands").unwrap_or_default(),
        ),
        None => (Vec::new(), Vec::new()),
    };

    Ok(SimilarityResult {
        moslqo,
        vnsim,
        fvnsim,
        center_freq_bands,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::options::Mode;

    fn speech_options(model: PathBuf) -> EngineOptions {
        EngineOptions::for_mode(Mode::Speech, 16000, model)
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let err = VisqolCliEngine::with_binary("/no/such/visqol").unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("bazel build"));
    }

    #[test]
    fn test_missing_model_is_unavailable() {
        let fake_binary = tempfile::NamedTempFile::new().unwrap();
        let engine = VisqolCliEngine::with_binary(fake_binary.path()).unwrap();
        let err = engine
            .configure(&speech_options(PathBuf::from("/no/such/model.tflite")))
            .unwrap_err();
        assert!(matches!(err, MeasureError::EngineUnavailable(_)));
    }

    #[test]
    fn test_build_args_speech() {
        let options = speech_options(PathBuf::from("/m/lattice.tflite"));
        let args = VisqolCliEngine::build_args(
            &options,
            Path::new("/t/r.wav"),
            Path::new("/t/d.wav"),
            Path::new("/t/debug.json"),
        );
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert!(args.windows(2).any(|w| w == ["--reference_file", "/t/r.wav"]));
        assert!(args.windows(2).any(|w| w == ["--search_window_radius", "60"]));
        assert!(
            args.windows(2)
                .any(|w| w == ["--similarity_to_quality_model", "/m/lattice.tflite"])
        );
        assert!(args.contains(&"--use_speech_mode".to_string()));
        assert!(args.contains(&"--use_lattice_model=true".to_string()));
        assert!(!args.contains(&"--use_unscaled_speech_mos_mapping".to_string()));
    }

    #[test]
    fn test_build_args_audio() {
        let options = EngineOptions::for_mode(Mode::Audio, 48000, PathBuf::from("/m/svr.txt"));
        let args = VisqolCliEngine::build_args(
            &options,
            Path::new("r.wav"),
            Path::new("d.wav"),
            Path::new("debug.json"),
        );
        assert!(!args.iter().any(|a| a == "--use_speech_mode"));
        assert!(args.iter().any(|a| a == "--use_lattice_model=false"));
    }

    #[test]
    fn test_parse_report_stdout_only() {
        let stdout = "Reference Filepath:\tref.wav\nDegraded Filepath:\tdeg.wav\nMOS-LQO:\t\t4.512300\n";
        let result = parse_report(stdout, None).unwrap();
        assert_eq!(result.moslqo, 4.5123);
        assert_eq!(result.vnsim, 0.0);
        assert!(result.fvnsim.is_empty());
    }

    #[test]
    fn test_parse_report_with_debug_json() {
        let stdout = "MOS-LQO: 3.25\nVNSIM: 0.81\n";
        let json = r#"{"fvnsim": [0.9, 0.7], "center_freq_bands": [50.0, 150.0], "vnsim": 0.5}"#;
        let result = parse_report(stdout, Some(json)).unwrap();
        assert_eq!(result.moslqo, 3.25);
        // 标准输出优先
        assert_eq!(result.vnsim, 0.81);
        assert_eq!(result.fvnsim, vec![0.9, 0.7]);
        assert_eq!(result.center_freq_bands, vec![50.0, 150.0]);
    }

    #[test]
    fn test_parse_report_without_score_fails() {
        let err = parse_report("Segmentation fault\n", None).unwrap_err();
        assert!(matches!(err, MeasureError::MeasurementFailure(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_measure_with_stub_binary() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("visqol");
        std::fs::write(
            &script,
            "#!/bin/sh\n\
             while [ $# -gt 0 ]; do\n\
               if [ \"$1\" = \"--output_debug\" ]; then\n\
                 printf '{\"fvnsim\":[0.5],\"center_freq_bands\":[100.0]}' > \"$2\"\n\
               fi\n\
               shift\n\
             done\n\
             echo 'MOS-LQO:\t4.100000'\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let model = dir.path().join("model.tflite");
        std::fs::write(&model, b"model").unwrap();

        let engine = VisqolCliEngine::with_binary(&script).unwrap();
        let mut session = engine.configure(&speech_options(model)).unwrap();
        let samples = vec![0.1; 160];
        let result = engine.measure(&mut session, &samples, &samples).unwrap();

        assert_eq!(result.moslqo, 4.1);
        assert_eq!(result.fvnsim, vec![0.5]);
        assert_eq!(result.center_freq_bands, vec![100.0]);
        assert!(session.workdir.path().join("reference.wav").is_file());
    }
}
