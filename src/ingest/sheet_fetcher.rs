// ==========================================
// 仓储库存同步系统 - 表格数据读取
// ==========================================
// 职责: 按文件扩展名分派 CSV/Excel 读取,输出统一的单元格矩阵
// 约定: 首行为表头,空单元格为 None,不在本层做任何行过滤
// ==========================================

use crate::ingest::error::{IngestError, IngestResult};
use crate::ingest::inventory_ingest_trait::SheetFetcher;
use async_trait::async_trait;
use calamine::{open_workbook, Data, Reader, Xlsx};
use std::fs::File;
use std::path::{Path, PathBuf};

// ==========================================
// CSV 读取器
// ==========================================
pub struct CsvSheetReader;

impl CsvSheetReader {
    /// 读取 CSV 文件为单元格矩阵
    ///
    /// # 说明
    /// - 首行同样作为数据行返回,由上层识别表头
    /// - flexible 模式允许行宽不一致,缺失单元格由上层补 None
    pub fn read(&self, path: &Path) -> IngestResult<Vec<Vec<Option<String>>>> {
        let file = File::open(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut values = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row: Vec<Option<String>> =
                record.iter().map(|field| Some(field.to_string())).collect();
            values.push(row);
        }
        Ok(values)
    }
}

// ==========================================
// Excel 读取器
// ==========================================
pub struct ExcelSheetReader;

impl ExcelSheetReader {
    /// 读取 xlsx 指定工作表为单元格矩阵
    ///
    /// # 参数
    /// - `sheet_name`: 工作表名,不存在时报 Excel 解析错误
    pub fn read(&self, path: &Path, sheet_name: &str) -> IngestResult<Vec<Vec<Option<String>>>> {
        let mut workbook: Xlsx<_> = open_workbook(path)
            .map_err(|e| IngestError::ExcelParseError(format!("打开工作簿失败: {}", e)))?;
        let range = workbook
            .worksheet_range(sheet_name)
            .map_err(|e| IngestError::ExcelParseError(format!("读取工作表 {} 失败: {}", sheet_name, e)))?;

        let values = range
            .rows()
            .map(|row| {
                row.iter()
                    .map(|cell| match cell {
                        Data::Empty => None,
                        other => Some(other.to_string()),
                    })
                    .collect()
            })
            .collect();
        Ok(values)
    }
}

// ==========================================
// 文件表格抓取器
// ==========================================

/// 以本地目录为根的表格抓取器,spreadsheet_id 即文件路径
pub struct FileSheetFetcher {
    /// 相对路径的解析根目录
    root: PathBuf,
}

impl FileSheetFetcher {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// 绝对路径原样使用,相对路径挂到根目录下
    fn resolve(&self, spreadsheet_id: &str) -> PathBuf {
        let path = Path::new(spreadsheet_id);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[async_trait]
impl SheetFetcher for FileSheetFetcher {
    async fn fetch(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
    ) -> IngestResult<Vec<Vec<Option<String>>>> {
        let path = self.resolve(spreadsheet_id);
        if !path.exists() {
            return Err(IngestError::FileNotFound(path.display().to_string()));
        }

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => CsvSheetReader.read(&path),
            "xlsx" => ExcelSheetReader.read(&path, sheet_name),
            _ => Err(IngestError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        write!(file, "{}", content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_fetch_csv_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(
            dir.path(),
            "wms.csv",
            "Item Code,Cell No.,Available Qty.\nA1,Z-01,10\nA2,Z-01,5\n",
        );

        let fetcher = FileSheetFetcher::new(dir.path().to_path_buf());
        let values = fetcher.fetch("wms.csv", "Sheet1").await.unwrap();

        assert_eq!(values.len(), 3);
        assert_eq!(
            values[0],
            vec![
                Some("Item Code".to_string()),
                Some("Cell No.".to_string()),
                Some("Available Qty.".to_string())
            ]
        );
        assert_eq!(values[2][0].as_deref(), Some("A2"));
    }

    #[tokio::test]
    async fn test_fetch_csv_uneven_rows() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "short.csv", "a,b,c\n1,2\n");

        let fetcher = FileSheetFetcher::new(dir.path().to_path_buf());
        let values = fetcher.fetch("short.csv", "Sheet1").await.unwrap();

        // flexible 模式保留短行,由行规范化层补齐
        assert_eq!(values[1].len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "abs.csv", "h\nv\n");

        let fetcher = FileSheetFetcher::new(PathBuf::from("/nonexistent-root"));
        let values = fetcher
            .fetch(path.to_str().unwrap(), "Sheet1")
            .await
            .unwrap();
        assert_eq!(values.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FileSheetFetcher::new(dir.path().to_path_buf());
        let err = fetcher.fetch("ghost.csv", "Sheet1").await.unwrap_err();
        assert!(matches!(err, IngestError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_fetch_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "notes.txt", "hello");

        let fetcher = FileSheetFetcher::new(dir.path().to_path_buf());
        let err = fetcher.fetch("notes.txt", "Sheet1").await.unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFormat(_)));
    }
}
