//! 常量和默认配置集中管理
//!
//! 将CLI和批处理用到的常量集中定义，避免"默认值漂移"和重复定义

/// 默认配置值
pub mod defaults {
    /// 默认多文件并行并发度
    ///
    /// `--parallel` 不带数值时使用
    pub const PARALLEL_FILES_DEGREE: usize = 4;

    /// 宽松批处理模式的默认占位分数（MOS-LQO下限）
    pub const PLACEHOLDER_SCORE: f64 = 1.0;

    /// 默认模型目录（相对于当前工作目录）
    pub const MODEL_DIR: &str = "model";

    /// 结果输出的小数位数
    pub const SCORE_PRECISION: usize = 6;
}

/// 并发度限制常量
pub mod parallel_limits {
    /// 最小并发度
    pub const MIN_PARALLEL_DEGREE: usize = 1;

    /// 最大并发度
    ///
    /// 外部引擎每次测量都会启动子进程，过高的并发只会增加竞争
    pub const MAX_PARALLEL_DEGREE: usize = 16;
}

/// 环境变量
pub mod env {
    /// visqol可执行文件路径
    pub const VISQOL_BIN: &str = "VISQOL_BIN";

    /// 模型文件目录
    pub const VISQOL_MODEL_DIR: &str = "VISQOL_MODEL_DIR";
}

/// 批处理CSV列名
pub mod csv_columns {
    pub const REFERENCE: &str = "reference";
    pub const DEGRADED: &str = "degraded";
    pub const MOSLQO: &str = "moslqo";
    pub const VNSIM: &str = "vnsim";
}
