// ==========================================
// 仓储库存同步系统 - 摄取结果报告
// ==========================================
// 用途: 摄取编排层对外返回的结构化结果
// 红线: 预期失败以报告条目呈现,不以 panic 呈现
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// IssueKind - 报告错误分类
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// 仓库绑定缺失或为空
    BindingError,
    /// 绑定/来源查询落库失败
    DatabaseError,
    /// 绑定引用了不存在的来源等配置问题
    ConfigError,
    /// 单来源摄取过程中的其余失败
    ProcessingError,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::BindingError => "binding_error",
            IssueKind::DatabaseError => "database_error",
            IssueKind::ConfigError => "config_error",
            IssueKind::ProcessingError => "processing_error",
        }
    }
}

// ==========================================
// IngestIssue - 单条错误记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestIssue {
    pub kind: IssueKind,
    pub source_id: Option<String>,    // 涉及的来源（来源级错误时填写）
    pub source_label: Option<String>, // 来源显示名
    pub message: String,
}

impl IngestIssue {
    pub fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        IngestIssue {
            kind,
            source_id: None,
            source_label: None,
            message: message.into(),
        }
    }

    pub fn for_source(
        kind: IssueKind,
        source_id: impl Into<String>,
        source_label: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        IngestIssue {
            kind,
            source_id: Some(source_id.into()),
            source_label: Some(source_label.into()),
            message: message.into(),
        }
    }
}

// ==========================================
// SourceOutcome - 单来源摄取结果
// ==========================================
// 说明: 来源级失败折叠进 errors,绝不向上抛出
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub rows_emitted: usize,    // 实际入库（或 dry_run 下应入库）行数
    pub errors: Vec<String>,    // 带来源标签的错误描述
}

// ==========================================
// IngestReport - 一次摄取运行的汇总
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub warehouse_code: Option<String>, // 全量摄取时为 None
    pub batch_id: String,
    pub sources_processed: usize,
    pub rows_inserted: usize,
    pub rows_updated: usize,
    pub errors: Vec<IngestIssue>,
    pub warnings: Vec<String>,
    pub duration_seconds: f64,
}

impl IngestReport {
    /// 空报告骨架,计数后续累加
    pub fn new(warehouse_code: Option<String>, batch_id: String) -> Self {
        IngestReport {
            warehouse_code,
            batch_id,
            sources_processed: 0,
            rows_inserted: 0,
            rows_updated: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            duration_seconds: 0.0,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

// ==========================================
// 来源配置辅助视图
// ==========================================

/// 表头预览: 配置分类映射前查看来源的原始表头
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderPreview {
    pub headers: Vec<String>, // 首行各列,已去空格
    pub row_count: usize,     // 数据行数（不含表头）
}

/// 拆分值清单: 某来源按拆分列统计的取值分布
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitValueInfo {
    pub value: String,
    pub row_count: usize,
}
