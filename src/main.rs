//! visqol-meter - 主程序入口
//!
//! 纯流程控制器，负责协调各个工具模块完成单对或批量测量。

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use visqol_meter::{
    AudioSource, AudioStats, BatchError, BatchRunner, EngineConfigCache, EngineOptions,
    ErrorCategory, MeasureError, Measurer, VisqolCliEngine,
    audio::load_wav,
    tools::{self, AppConfig, path::extract_filename_lossy, utils::resolve_model_dir},
};

/// 错误退出码定义
mod exit_codes {
    /// 通用错误
    pub const GENERAL_ERROR: i32 = 1;
    /// 格式/输入错误
    pub const FORMAT_ERROR: i32 = 2;
    /// 评分引擎不可用
    pub const ENGINE_UNAVAILABLE: i32 = 3;
    /// 测量失败
    pub const MEASUREMENT_FAILURE: i32 = 4;
}

/// 获取错误建议文本
fn get_error_suggestion(error: &MeasureError) -> &'static str {
    match error {
        MeasureError::EngineUnavailable(_) => {
            "安装visqol并设置 VISQOL_BIN / VISQOL_MODEL_DIR，或使用 --visqol_bin / --model_dir / Install visqol and set VISQOL_BIN / VISQOL_MODEL_DIR, or pass --visqol_bin / --model_dir"
        }
        MeasureError::MeasurementFailure(_) => {
            "评分引擎运行失败，使用 --verbose 或 RUST_LOG=debug 查看详情 / The scoring engine failed, rerun with --verbose or RUST_LOG=debug"
        }
        _ => match ErrorCategory::from_error(error) {
            ErrorCategory::Format => {
                "确保输入为8/16/24/32位整数PCM WAV / Ensure inputs are 8/16/24/32-bit integer PCM WAV files"
            }
            ErrorCategory::Io => {
                "检查文件路径是否正确，文件是否存在且可读 / Check if file path is correct, file exists and is readable"
            }
            ErrorCategory::Input | ErrorCategory::Engine => {
                "检查命令行参数是否正确，使用 --help 查看完整用法 / Check if command-line arguments are correct, use --help to see full usage"
            }
        },
    }
}

/// 从anyhow错误链中找出测量错误
fn find_measure_error(error: &anyhow::Error) -> Option<&MeasureError> {
    error
        .chain()
        .find_map(|cause| match cause.downcast_ref::<BatchError>() {
            Some(batch) => Some(batch.kind()),
            None => cause.downcast_ref::<MeasureError>(),
        })
}

/// 错误处理和建议
fn handle_error(error: anyhow::Error) -> ! {
    eprintln!("[ERROR] 错误 / Error: {error:#}");

    let exit_code = match find_measure_error(&error) {
        Some(measure_error) => {
            eprintln!(
                "[INFO] 建议 / Suggestion: {}",
                get_error_suggestion(measure_error)
            );
            match measure_error {
                MeasureError::EngineUnavailable(_) => exit_codes::ENGINE_UNAVAILABLE,
                MeasureError::MeasurementFailure(_) => exit_codes::MEASUREMENT_FAILURE,
                other => match ErrorCategory::from_error(other) {
                    ErrorCategory::Format | ErrorCategory::Input => exit_codes::FORMAT_ERROR,
                    ErrorCategory::Io | ErrorCategory::Engine => exit_codes::GENERAL_ERROR,
                },
            }
        }
        None => exit_codes::GENERAL_ERROR,
    };

    process::exit(exit_code);
}

/// 初始化日志（RUST_LOG优先，默认warn，verbose时info）
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// 定位引擎并创建测量器
fn build_measurer(config: &AppConfig) -> Result<Measurer<VisqolCliEngine>> {
    let engine = match &config.visqol_bin {
        Some(binary) => VisqolCliEngine::with_binary(binary)?,
        None => VisqolCliEngine::locate()?,
    };
    let model_dir = resolve_model_dir(config.model_dir.clone());
    if config.verbose {
        println!("[INFO] ViSQOL: {}", engine.binary().display());
        println!("[INFO] 模型目录 / Model dir: {}", model_dir.display());
    }

    let cache = Arc::new(EngineConfigCache::new(engine, model_dir));
    if config.verbose {
        let options = EngineOptions::for_mode(
            config.mode,
            config.mode.default_sample_rate(),
            cache.model_artifact(config.mode),
        );
        println!(
            "[INFO] 默认引擎配置 / Default engine options: {}",
            serde_json::to_string(&options)?
        );
    }
    Ok(Measurer::new(cache, config.mode))
}

/// 打印输入音频统计（verbose）
fn show_audio_stats(label: &str, path: &Path) {
    match load_wav(path) {
        Ok((samples, descriptor)) => {
            let stats = AudioStats::compute(&samples, descriptor.sample_rate);
            println!(
                "[INFO] {label} {}: {:.2}s, {} Hz, {}-bit, {} ch, RMS {:.4}, peak {:.4}",
                extract_filename_lossy(path),
                stats.duration,
                stats.sample_rate,
                descriptor.bits_per_sample(),
                descriptor.channel_count,
                stats.rms,
                stats.max_amplitude
            );
        }
        Err(e) => println!("[INFO] {label} {}: {e}", extract_filename_lossy(path)),
    }
}

/// 单对测量模式
fn process_single_mode(config: &AppConfig, reference: &Path, degraded: &Path) -> Result<()> {
    if config.verbose {
        show_audio_stats("参考 / Reference", reference);
        show_audio_stats("受损 / Degraded", degraded);
    }

    let measurer = build_measurer(config)?;
    let result = measurer
        .measure_files(reference, degraded)
        .with_context(|| format!("测量失败 / failed to measure {}", degraded.display()))?;

    print!("{}", tools::format_single_result(&result, config.verbose));

    if let Some(path) = &config.results_json {
        tools::write_results_json(path, std::slice::from_ref(&result))?;
    }
    if let Some(path) = &config.results_csv {
        tools::write_results_csv(path, std::slice::from_ref(&result))?;
    }
    Ok(())
}

/// 批量测量模式
fn process_batch_mode(config: &AppConfig, csv_path: &Path) -> Result<()> {
    let pairs = tools::load_batch_csv(csv_path)?;
    if pairs.is_empty() {
        println!(
            "[WARNING] 批处理CSV中没有可用的文件对 / No usable pairs in {}",
            csv_path.display()
        );
        return Ok(());
    }
    if config.verbose {
        println!("[INFO] 共 {} 对 / {} pairs loaded", pairs.len(), pairs.len());
        let files: Vec<PathBuf> = pairs
            .iter()
            .flat_map(|(reference, degraded)| [reference.clone(), degraded.clone()])
            .collect();
        let readable = tools::validate_audio_files(&files).len();
        if readable < files.len() {
            println!(
                "[WARNING] {} 个文件无法读取 / {} files unreadable",
                files.len() - readable,
                files.len() - readable
            );
        }
    }

    let measurer = build_measurer(config)?;
    let mut runner = BatchRunner::new(measurer).with_policy(config.failure_policy);
    if let Some(degree) = config.parallel {
        runner = runner.with_parallelism(degree);
    }

    let sources = pairs
        .into_iter()
        .map(|(reference, degraded)| (AudioSource::from(reference), AudioSource::from(degraded)))
        .collect();
    let outcome = runner.run(sources)?;

    for failure in &outcome.failures {
        eprintln!(
            "[FAIL] [{}] {} - [{}] {}",
            failure.pair_index + 1,
            failure.degraded.as_deref().unwrap_or("-"),
            failure.category.display_name(),
            failure.message
        );
    }

    if config.verbose {
        println!(
            "{}",
            tools::format_results_table(&outcome.results, &outcome.failures)
        );
    }

    if let Some(path) = &config.results_json {
        tools::write_results_json(path, &outcome.results)?;
        println!("[INFO] 结果已写入 / Results written to {}", path.display());
    }
    if let Some(path) = &config.results_csv {
        tools::write_results_csv(path, &outcome.results)?;
        println!("[INFO] 结果已写入 / Results written to {}", path.display());
    }

    if config.prints_batch_summary()
        && let Some(summary) = outcome.summary()
    {
        print!("{}", tools::format_summary(&summary));
    }
    Ok(())
}

/// 应用程序主逻辑（便于测试和复用）
fn run(config: &AppConfig) -> Result<()> {
    tools::show_startup_info(config);

    match (
        &config.batch_input_csv,
        &config.reference_file,
        &config.degraded_file,
    ) {
        (Some(csv_path), _, _) => process_batch_mode(config, csv_path),
        (None, Some(reference), Some(degraded)) => {
            process_single_mode(config, reference, degraded)
        }
        _ => anyhow::bail!(
            "需要 --reference_file 和 --degraded_file，或 --batch_input_csv / Need --reference_file and --degraded_file, or --batch_input_csv"
        ),
    }
}

fn main() {
    // 1. 解析命令行参数
    let config = tools::parse_args();

    // 2. 初始化日志
    init_tracing(config.verbose);

    // 3. 执行主逻辑，统一处理错误
    if let Err(error) = run(&config) {
        handle_error(error);
    }
}
