//! 输出格式化模块
//!
//! 负责测量结果的终端输出以及CSV/JSON持久化。

use super::constants::csv_columns;
use super::constants::defaults::SCORE_PRECISION;
use crate::core::MeasurementResult;
use crate::error::MeasureResult;
use crate::processing::{MosSummary, PairFailure};
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL};
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

/// CSV字段转义（包含逗号、引号或换行时加引号）
fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// 格式化分数（固定6位小数）
#[inline]
pub fn format_score(value: f64) -> String {
    format!("{:.*}", SCORE_PRECISION, value)
}

/// 生成CSV文本：`reference,degraded,moslqo,vnsim`
///
/// 没有来源标识的结果（原始样本输入）写为空单元格。
pub fn format_results_csv(results: &[MeasurementResult]) -> String {
    let mut output = format!(
        "{},{},{},{}\n",
        csv_columns::REFERENCE,
        csv_columns::DEGRADED,
        csv_columns::MOSLQO,
        csv_columns::VNSIM
    );

    for result in results {
        output.push_str(&format!(
            "{},{},{},{}\n",
            csv_field(result.reference_path.as_deref().unwrap_or("")),
            csv_field(result.degraded_path.as_deref().unwrap_or("")),
            format_score(result.moslqo),
            format_score(result.vnsim)
        ));
    }

    output
}

/// 写出CSV结果文件
pub fn write_results_csv(path: &Path, results: &[MeasurementResult]) -> MeasureResult<()> {
    std::fs::write(path, format_results_csv(results))?;
    Ok(())
}

/// 写出JSON结果文件（完整记录，含逐频带相似度）
pub fn write_results_json(path: &Path, results: &[MeasurementResult]) -> MeasureResult<()> {
    let json = serde_json::to_string_pretty(results).map_err(std::io::Error::from)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// 单对测量的终端输出
pub fn format_single_result(result: &MeasurementResult, verbose: bool) -> String {
    if !verbose {
        return format!("MOS-LQO: {}\n", format_score(result.moslqo));
    }

    let mut output = String::new();
    if let Some(reference) = &result.reference_path {
        output.push_str(&format!("Reference / 参考: {reference}\n"));
    }
    if let Some(degraded) = &result.degraded_path {
        output.push_str(&format!("Degraded / 受损: {degraded}\n"));
    }
    output.push_str(&format!("MOS-LQO: {}\n", format_score(result.moslqo)));
    if result.vnsim > 0.0 {
        output.push_str(&format!("VNSIM: {}\n", format_score(result.vnsim)));
    }
    output
}

/// 批量结果表格（verbose模式）
pub fn format_results_table(results: &[MeasurementResult], failures: &[PairFailure]) -> String {
    let failed: HashMap<usize, &PairFailure> =
        failures.iter().map(|f| (f.pair_index, f)).collect();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "# / 序号",
        "Reference / 参考",
        "Degraded / 受损",
        "MOS-LQO",
        "VNSIM",
        "Status / 状态",
    ]);

    for (index, result) in results.iter().enumerate() {
        let status = match failed.get(&index) {
            Some(failure) => format!("[FAIL] {}", failure.category.display_name()),
            None => "[OK]".to_string(),
        };
        table.add_row(vec![
            Cell::new(index + 1).set_alignment(CellAlignment::Right),
            Cell::new(result.reference_path.as_deref().unwrap_or("-")),
            Cell::new(result.degraded_path.as_deref().unwrap_or("-")),
            Cell::new(format_score(result.moslqo)).set_alignment(CellAlignment::Right),
            Cell::new(format_score(result.vnsim)).set_alignment(CellAlignment::Right),
            Cell::new(status),
        ]);
    }

    table.to_string()
}

/// 批量统计摘要
pub fn format_summary(summary: &MosSummary) -> String {
    format!(
        "Batch results ({} pairs) / 批量结果（{} 对）\n  Mean MOS-LQO / 平均: {}\n  Min MOS-LQO / 最小: {}\n  Max MOS-LQO / 最大: {}\n",
        summary.count,
        summary.count,
        format_score(summary.mean),
        format_score(summary.min),
        format_score(summary.max)
    )
}
