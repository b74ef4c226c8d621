//! 命令行接口模块
//!
//! 负责命令行参数解析、配置管理和程序信息展示。

use super::constants::defaults;
use crate::engine::Mode;
use crate::processing::FailurePolicy;
use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command, value_parser};
use std::path::PathBuf;

/// 应用程序版本信息
const VERSION: &str = env!("CARGO_PKG_VERSION");
const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// 应用程序配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 参考音频（单对模式）
    pub reference_file: Option<PathBuf>,

    /// 受损音频（单对模式）
    pub degraded_file: Option<PathBuf>,

    /// 批处理输入CSV（批量模式）
    pub batch_input_csv: Option<PathBuf>,

    /// 批量结果CSV输出路径
    pub results_csv: Option<PathBuf>,

    /// 完整结果JSON输出路径
    pub results_json: Option<PathBuf>,

    pub mode: Mode,

    /// 是否显示详细信息
    pub verbose: bool,

    /// 模型目录（未指定时按环境变量和默认位置查找）
    pub model_dir: Option<PathBuf>,

    /// visqol可执行文件（未指定时自动查找）
    pub visqol_bin: Option<PathBuf>,

    /// 文件级并发度（None为串行）
    pub parallel: Option<usize>,

    pub failure_policy: FailurePolicy,
}

impl AppConfig {
    /// 是否为批量模式
    #[inline]
    pub fn is_batch_mode(&self) -> bool {
        self.batch_input_csv.is_some()
    }

    /// 批量模式是否在终端打印MOS摘要（写出CSV时不打印）
    #[inline]
    pub fn prints_batch_summary(&self) -> bool {
        self.results_csv.is_none()
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        let path = |id: &str| matches.get_one::<String>(id).map(PathBuf::from);

        AppConfig {
            reference_file: path("reference_file"),
            degraded_file: path("degraded_file"),
            batch_input_csv: path("batch_input_csv"),
            results_csv: path("results_csv"),
            results_json: path("results_json"),
            mode: if matches.get_flag("use_speech_mode") {
                Mode::Speech
            } else {
                Mode::Audio
            },
            verbose: matches.get_flag("verbose"),
            model_dir: path("model_dir"),
            visqol_bin: path("visqol_bin"),
            parallel: matches.get_one::<usize>("parallel").copied(),
            failure_policy: matches
                .get_one::<f64>("lenient")
                .map_or(FailurePolicy::FailFast, |score| {
                    FailurePolicy::Placeholder(*score)
                }),
        }
    }
}

/// 构建命令行定义
pub fn build_command() -> Command {
    Command::new("visqol-meter")
        .version(VERSION)
        .about(DESCRIPTION)
        .author("MacinMeter Team")
        .arg(
            Arg::new("reference_file")
                .long("reference_file")
                .help("参考音频WAV文件 / Reference WAV file")
                .value_name("FILE")
                .requires("degraded_file"),
        )
        .arg(
            Arg::new("degraded_file")
                .long("degraded_file")
                .help("受损音频WAV文件 / Degraded WAV file")
                .value_name("FILE")
                .requires("reference_file"),
        )
        .arg(
            Arg::new("batch_input_csv")
                .long("batch_input_csv")
                .help("批处理CSV（包含reference,degraded列） / Batch CSV with reference,degraded columns")
                .value_name("CSV")
                .conflicts_with_all(["reference_file", "degraded_file"]),
        )
        .group(
            ArgGroup::new("input")
                .args(["reference_file", "batch_input_csv"])
                .required(true),
        )
        .arg(
            Arg::new("results_csv")
                .long("results_csv")
                .help("批量结果CSV输出路径 / Write batch results as CSV")
                .value_name("CSV"),
        )
        .arg(
            Arg::new("results_json")
                .long("results_json")
                .help("完整结果JSON输出路径 / Write full results as JSON")
                .value_name("JSON"),
        )
        .arg(
            Arg::new("use_speech_mode")
                .long("use_speech_mode")
                .help("语音模式（≥16kHz，lattice模型） / Speech mode (>=16 kHz, lattice model)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("显示详细处理信息 / Show detailed output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("model_dir")
                .long("model_dir")
                .help("模型文件目录 / Directory containing model files")
                .value_name("DIR"),
        )
        .arg(
            Arg::new("visqol_bin")
                .long("visqol_bin")
                .help("visqol可执行文件路径 / Path to the visqol executable")
                .value_name("PATH"),
        )
        .arg(
            Arg::new("parallel")
                .long("parallel")
                .help("批量模式文件级并发度 / File-level parallelism in batch mode")
                .value_name("N")
                .num_args(0..=1)
                .default_missing_value(defaults::PARALLEL_FILES_DEGREE.to_string())
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("lenient")
                .long("lenient")
                .help("失败对以占位分数记录而不中止批次 / Record failed pairs with a placeholder score instead of aborting")
                .value_name("SCORE")
                .num_args(0..=1)
                .default_missing_value(defaults::PLACEHOLDER_SCORE.to_string())
                .value_parser(value_parser!(f64)),
        )
}

/// 解析命令行参数并创建配置
pub fn parse_args() -> AppConfig {
    AppConfig::from_matches(&build_command().get_matches())
}

/// 从给定参数解析（便于测试）
pub fn try_parse_from<I, T>(args: I) -> Result<AppConfig, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let matches = build_command().try_get_matches_from(args)?;
    Ok(AppConfig::from_matches(&matches))
}

/// 显示程序启动信息（仅verbose）
pub fn show_startup_info(config: &AppConfig) {
    if !config.verbose {
        return;
    }
    println!("[INFO] visqol-meter v{VERSION}");
    println!("[INFO] {DESCRIPTION}");
    println!("[INFO] 模式 / Mode: {}", config.mode);
    if let Some(degree) = config.parallel {
        println!("[INFO] 并发度 / Parallelism: {degree}");
    }
    if let FailurePolicy::Placeholder(score) = config.failure_policy {
        println!("[INFO] 宽松模式，失败对记为 {score} / Lenient mode, failed pairs scored {score}");
    }
    println!();
}
