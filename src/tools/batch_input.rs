//! 批处理输入CSV读取
//!
//! 表头必须包含 `reference` 和 `degraded` 两列（顺序不限，其余列忽略）；
//! 任一单元格为空的行被跳过。

use super::constants::csv_columns;
use crate::error::{MeasureError, MeasureResult};
use std::path::{Path, PathBuf};
use tracing::debug;

/// 拆分一行CSV（支持双引号包裹和 `""` 转义）
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            ('"', _) => in_quotes = !in_quotes,
            (',', false) => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// 读取批处理CSV，返回 (参考, 受损) 路径对
///
/// # 错误
///
/// * `MeasureError::Io` - 文件无法读取
/// * `MeasureError::InvalidInput` - 缺少表头或缺少必需列
pub fn load_batch_csv<P: AsRef<Path>>(path: P) -> MeasureResult<Vec<(PathBuf, PathBuf)>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let mut lines = content.lines().filter(|line| !line.trim().is_empty());

    let header = lines.next().ok_or_else(|| {
        MeasureError::InvalidInput(format!("批处理CSV为空 / batch CSV is empty: {}", path.display()))
    })?;
    let columns: Vec<String> = split_csv_line(header)
        .into_iter()
        .map(|c| c.trim().trim_start_matches('\u{feff}').to_string())
        .collect();

    let column_index = |name: &str| {
        columns.iter().position(|c| c == name).ok_or_else(|| {
            MeasureError::InvalidInput(format!(
                "批处理CSV缺少 `{name}` 列 / batch CSV has no `{name}` column: {}",
                path.display()
            ))
        })
    };
    let reference_col = column_index(csv_columns::REFERENCE)?;
    let degraded_col = column_index(csv_columns::DEGRADED)?;

    let mut pairs = Vec::new();
    let mut skipped = 0usize;
    for line in lines {
        let fields = split_csv_line(line);
        let cell = |index: usize| fields.get(index).map(|f| f.trim()).unwrap_or("");
        let (reference, degraded) = (cell(reference_col), cell(degraded_col));

        if reference.is_empty() || degraded.is_empty() {
            skipped += 1;
            continue;
        }
        pairs.push((PathBuf::from(reference), PathBuf::from(degraded)));
    }

    debug!(pairs = pairs.len(), skipped, path = %path.display(), "Batch CSV loaded");
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn csv_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_split_quoted_fields() {
        assert_eq!(
            split_csv_line(r#"a,"b,c","say ""hi""",,"#),
            vec!["a", "b,c", "say \"hi\"", "", ""]
        );
    }

    #[test]
    fn test_columns_in_any_order_and_empty_rows_skipped() {
        let file = csv_file(
            "degraded,note,reference\n\
             d1.wav,first,r1.wav\n\
             ,missing,r2.wav\n\
             \n\
             d3.wav,,r3.wav\n",
        );
        let pairs = load_batch_csv(file.path()).unwrap();
        assert_eq!(
            pairs,
            vec![
                (PathBuf::from("r1.wav"), PathBuf::from("d1.wav")),
                (PathBuf::from("r3.wav"), PathBuf::from("d3.wav")),
            ]
        );
    }

    #[test]
    fn test_missing_column_is_invalid_input() {
        let file = csv_file("reference,other\nr.wav,d.wav\n");
        let err = load_batch_csv(file.path()).unwrap_err();
        assert!(matches!(err, MeasureError::InvalidInput(ref m) if m.contains("degraded")));
    }

    #[test]
    fn test_empty_file_is_invalid_input() {
        let file = csv_file("");
        assert!(matches!(
            load_batch_csv(file.path()),
            Err(MeasureError::InvalidInput(_))
        ));
    }
}
