//! 工具模块集合
//!
//! 包含CLI、批处理输入、格式化等工具模块，支持main.rs的流程控制。

pub mod batch_input;
pub mod cli;
pub mod constants;
pub mod formatter;
pub mod utils;

// 重新导出主要的公共接口
pub use batch_input::load_batch_csv;
pub use cli::{AppConfig, parse_args, show_startup_info};
pub use formatter::{
    format_results_table, format_single_result, format_summary, write_results_csv,
    write_results_json,
};
pub use utils::{path, validate_audio_files};
