//! Patent search report wizard
//!
//! Five steps: search keywords, search formula, related documents, report
//! details, and the assembled 专利检索报告. Related documents come from a
//! host-supplied search generator that runs on entry to step 3.

use crate::document::{DocumentLayout, Source};
use crate::error::WorkflowError;
use crate::form::{record, FieldValue, FormState, Record};
use crate::generators::{ComputedGenerator, FieldGenerator};
use crate::step::{Gate, StepAction, StepSpec, WorkflowDefinition};
use chrono::NaiveDate;
use std::fmt::Write as _;

pub const PROPOSAL_NAME: &str = "proposalName";
pub const SEARCH_DATE: &str = "searchDate";
/// Records with `code` and `name` keys
pub const IPC_CODES: &str = "ipcCodes";
pub const KEYWORDS: &str = "keywords";
pub const FORMULA_TEMPLATE: &str = "formulaTemplate";
pub const FORMULA: &str = "formula";
/// Records keyed by [`REFERENCE_KEYS`]
pub const REFERENCES: &str = "references";
pub const STANDARD_ADAPTATION: &str = "standardAdaptation";
pub const VEHICLE_APPLICATION: &str = "vehicleApplication";
pub const USAGE_PROSPECT: &str = "usageProspect";
pub const AUTHORIZATION_PROSPECT: &str = "authorizationProspect";
pub const ENFORCEABILITY: &str = "enforceability";
pub const PROPOSAL_GRADE: &str = "proposalGrade";
pub const CONCLUSION: &str = "conclusion";

/// Keys of one related-document record
pub const REFERENCE_KEYS: [&str; 7] = [
    "publicationNumber",
    "title",
    "applicant",
    "publicationDate",
    "similarities",
    "differences",
    "category",
];

/// Known IPC classes offered as suggestions
pub const IPC_CATALOG: [(&str, &str); 10] = [
    ("G06F", "电数字数据处理"),
    ("G06N", "基于特定计算模型的计算机系统"),
    ("G06Q", "专门适用于行政、商业、金融、管理、监督或预测目的的数据处理系统或方法"),
    ("H04L", "数字信息的传输"),
    ("G06K", "数据识别；数据表示；记录载体"),
    ("G06T", "一般的图像数据处理或产生"),
    ("H04N", "图像通信"),
    ("G06V", "图像或视频识别或理解"),
    ("H04W", "无线通信网络"),
    ("G06F16", "信息检索；数据库结构"),
];

const SYNONYMS: [(&str, [&str; 3]); 7] = [
    ("人工智能", ["AI", "智能系统", "认知计算"]),
    ("机器学习", ["ML", "自动学习", "统计学习"]),
    ("深度学习", ["DL", "神经网络", "表示学习"]),
    ("神经网络", ["NN", "深度网络", "卷积网络"]),
    ("算法", ["方法", "模型", "技术"]),
    ("数据处理", ["数据分析", "信息处理", "数据挖掘"]),
    ("模型训练", ["训练方法", "学习过程", "优化训练"]),
];

const MAX_IPC_SUGGESTIONS: usize = 6;
const MAX_SYNONYMS: usize = 5;

const REFERENCE_COLUMNS: &[(&str, &str)] = &[
    ("公开号", "publicationNumber"),
    ("专利名称", "title"),
    ("相同点", "similarities"),
    ("不同点", "differences"),
    ("判定", "category"),
];

/// Shape of the generated search formula
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormulaTemplate {
    /// IPC classes combined with keywords
    IpcKeywords,
    /// Keywords only
    KeywordsOnly,
}

impl FormulaTemplate {
    /// Identifier stored in the form
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::IpcKeywords => "ipc-keywords",
            Self::KeywordsOnly => "keywords-only",
        }
    }

    /// Parse an identifier
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "ipc-keywords" => Some(Self::IpcKeywords),
            "keywords-only" => Some(Self::KeywordsOnly),
            _ => None,
        }
    }

    /// Build the formula
    #[must_use]
    pub fn render(self, ipc_codes: &[&str], keywords: &[String]) -> String {
        let keyword_part = keywords
            .iter()
            .map(|k| format!("TI={k} OR AB={k}"))
            .collect::<Vec<_>>()
            .join(" OR ");
        match self {
            Self::IpcKeywords => {
                let ipc_part = ipc_codes
                    .iter()
                    .map(|c| format!("IPC={c}"))
                    .collect::<Vec<_>>()
                    .join(" OR ");
                format!("({ipc_part}) AND ({keyword_part})")
            }
            Self::KeywordsOnly => format!("({keyword_part})"),
        }
    }
}

/// Default proposal name: `专利检索报告-{file stem}-{YYYY-MM-DD}`
#[must_use]
pub fn proposal_name(file_name: &str, date: NaiveDate) -> String {
    let stem = match file_name.rfind('.') {
        Some(dot) if dot + 1 < file_name.len() && !file_name[dot + 1..].contains('/') => {
            &file_name[..dot]
        }
        _ => file_name,
    };
    format!("专利检索报告-{stem}-{}", date.format("%Y-%m-%d"))
}

/// Report form for an uploaded proposal file
#[must_use]
pub fn initial_form(file_name: &str, today: NaiveDate) -> FormState {
    let ipc = IPC_CATALOG[..2]
        .iter()
        .map(|&(code, name)| record([("code", code), ("name", name)]))
        .collect();
    let keywords = ["人工智能", "机器学习", "深度学习"]
        .iter()
        .map(ToString::to_string)
        .collect();

    FormState::new()
        .with(PROPOSAL_NAME, proposal_name(file_name, today))
        .with(SEARCH_DATE, today.format("%Y-%m-%d").to_string())
        .with(IPC_CODES, FieldValue::Records(ipc))
        .with(KEYWORDS, FieldValue::List(keywords))
        .with(FORMULA_TEMPLATE, FormulaTemplate::IpcKeywords.id())
        .with(FORMULA, "")
        .with(REFERENCES, FieldValue::Records(Vec::new()))
        .with(STANDARD_ADAPTATION, false)
        .with(VEHICLE_APPLICATION, false)
        .with(USAGE_PROSPECT, "")
        .with(AUTHORIZATION_PROSPECT, "")
        .with(ENFORCEABILITY, "")
        .with(PROPOSAL_GRADE, "")
        .with(CONCLUSION, "")
}

/// IPC catalog entries matching a query, excluding selected codes
///
/// Matches code or name case-insensitively; at most six results.
#[must_use]
pub fn suggest_ipc(query: &str, selected: &[Record]) -> Vec<Record> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }
    IPC_CATALOG
        .iter()
        .filter(|(code, _)| {
            !selected
                .iter()
                .any(|r| r.get("code").map(String::as_str) == Some(*code))
        })
        .filter(|(code, name)| {
            code.to_lowercase().contains(&query) || name.to_lowercase().contains(&query)
        })
        .take(MAX_IPC_SUGGESTIONS)
        .map(|&(code, name)| record([("code", code), ("name", name)]))
        .collect()
}

/// Synonyms of a keyword not already in the list
#[must_use]
pub fn expand_keyword(word: &str, existing: &[String]) -> Vec<&'static str> {
    SYNONYMS
        .iter()
        .find(|(key, _)| *key == word.trim())
        .map(|(_, synonyms)| {
            synonyms
                .iter()
                .take(MAX_SYNONYMS)
                .filter(|s| !existing.iter().any(|e| e == *s))
                .copied()
                .collect()
        })
        .unwrap_or_default()
}

/// Formula for the form's selected template, keywords and IPC codes
///
/// Returns `None` for an unknown template.
#[must_use]
pub fn formula(form: &FormState) -> Option<String> {
    let template = FormulaTemplate::from_id(form.text(FORMULA_TEMPLATE).trim())?;
    let codes: Vec<&str> = form
        .records(IPC_CODES)
        .iter()
        .filter_map(|r| r.get("code").map(String::as_str))
        .collect();
    Some(template.render(&codes, form.list(KEYWORDS)))
}

/// Conclusion summarizing the search and the assessment fields
#[must_use]
pub fn conclusion(form: &FormState) -> String {
    let references = form.records(REFERENCES);
    let count = |category: &str| {
        references
            .iter()
            .filter(|r| r.get("category").map(String::as_str) == Some(category))
            .count()
    };

    let usage = form.text(USAGE_PROSPECT).trim();
    let usage_text = match usage {
        "高" => "该技术方案具有较高的市场应用价值和广阔的发展前景。",
        "低" => "该技术方案的市场应用范围相对有限。",
        "无" => "暂无明确的应用前景。",
        _ => "需进一步评估。",
    };
    let authorization = form.text(AUTHORIZATION_PROSPECT).trim();
    let authorization_text = match authorization {
        "高" => "技术方案具有良好的新颖性和创造性，授权前景乐观。",
        "中" => "技术方案具有一定的新颖性，授权可能性适中。",
        "低" => "现有技术较为接近，授权存在一定难度。",
        "无" => "不具备授权条件。",
        _ => "需进一步评估。",
    };
    let grade = form.text(PROPOSAL_GRADE).trim();
    let grade_text = match grade {
        "A" => " - 建议优先推进",
        "B" => " - 建议推进",
        "C" => " - 建议谨慎推进",
        "不通过" => " - 不建议推进",
        _ => "",
    };

    let mut out = String::new();
    let _ = write!(
        out,
        "根据专利检索分析，本提案{}的综合评估如下：\n\n",
        form.text(PROPOSAL_NAME)
    );
    let _ = write!(
        out,
        "经过检索共发现{}件相关专利文献，其中包含{}件X类对比文件、{}件Y类对比文件、{}件A类对比文件。\n\n",
        references.len(),
        count("X"),
        count("Y"),
        count("A")
    );
    let _ = write!(
        out,
        "【用途前景】{}：{usage_text}\n\n",
        or_default(usage, "未评估")
    );
    let _ = write!(
        out,
        "【授权前景】{}：{authorization_text}\n\n",
        or_default(authorization, "未评估")
    );
    if form.flag(STANDARD_ADAPTATION) {
        out.push_str("【标准适配】已适配相关标准\n\n");
    }
    if form.flag(VEHICLE_APPLICATION) {
        out.push_str("【车型应用】适用于相关车型\n\n");
    }
    let _ = write!(out, "【提案等级】{}{grade_text}", or_default(grade, "未评级"));
    out
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() {
        default
    } else {
        value
    }
}

/// Report wizard
///
/// `search` fills [`REFERENCES`] on entry to step 3 and must produce
/// records keyed by [`REFERENCE_KEYS`].
///
/// # Errors
/// - `WorkflowError::InvalidDefinition` if the step list is malformed
pub fn definition(search: impl FieldGenerator + 'static) -> Result<WorkflowDefinition, WorkflowError> {
    let steps = vec![
        StepSpec::new(1, "生成检索关键词").with_gate(Gate::filled(&[IPC_CODES, KEYWORDS])),
        StepSpec::new(2, "生成检索式")
            .with_gate(Gate::filled(&[FORMULA]))
            .with_action(StepAction::on_entry(
                FORMULA,
                ComputedGenerator::new(|form| formula(form).map(FieldValue::Text)),
            )),
        StepSpec::new(3, "检索相关文件")
            .with_gate(Gate::filled(&[REFERENCES]))
            .with_action(StepAction::on_entry(REFERENCES, search)),
        StepSpec::new(4, "完善报告信息").with_action(StepAction::manual(
            CONCLUSION,
            ComputedGenerator::new(|form| Some(FieldValue::Text(conclusion(form)))),
        )),
        StepSpec::new(5, "生成检索报告"),
    ];
    WorkflowDefinition::new("report", steps, layout())
}

/// Layout of the 专利检索报告
#[must_use]
pub fn layout() -> DocumentLayout {
    DocumentLayout::new("专利检索报告")
        .with_section("提案名称", vec![Source::Paragraph(PROPOSAL_NAME)])
        .with_section("检索日期", vec![Source::Paragraph(SEARCH_DATE)])
        .with_section(
            "检索领域",
            vec![
                Source::Joined {
                    label: "IPC/CPC 分类号",
                    field: IPC_CODES,
                    key: Some("code"),
                    separator: ", ",
                },
                Source::Joined {
                    label: "关键词",
                    field: KEYWORDS,
                    key: None,
                    separator: "、",
                },
            ],
        )
        .with_section("检索式", vec![Source::Paragraph(FORMULA)])
        .with_section(
            "相关文件",
            vec![Source::Table {
                title: "相关文件（共 {count} 件）",
                field: REFERENCES,
                columns: REFERENCE_COLUMNS,
            }],
        )
        .with_section("结论", vec![Source::Paragraph(CONCLUSION)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    fn reference(number: &str, category: &str) -> Record {
        record([("publicationNumber", number), ("category", category)])
    }

    #[test]
    fn proposal_name_strips_last_extension() {
        assert_eq!(
            proposal_name("智能座舱方案.v2.pdf", date()),
            "专利检索报告-智能座舱方案.v2-2024-03-05"
        );
        assert_eq!(proposal_name("提案", date()), "专利检索报告-提案-2024-03-05");
    }

    #[test]
    fn formula_templates() {
        let form = initial_form("a.pdf", date());
        assert_eq!(
            formula(&form).unwrap(),
            "(IPC=G06F OR IPC=G06N) AND (TI=人工智能 OR AB=人工智能 OR TI=机器学习 OR AB=机器学习 OR TI=深度学习 OR AB=深度学习)"
        );

        let form = form
            .with(FORMULA_TEMPLATE, FormulaTemplate::KeywordsOnly.id())
            .with(KEYWORDS, FieldValue::List(vec!["算法".to_string()]));
        assert_eq!(formula(&form).unwrap(), "(TI=算法 OR AB=算法)");

        let form = form.with(FORMULA_TEMPLATE, "custom");
        assert!(formula(&form).is_none());
    }

    #[test]
    fn ipc_suggestions_skip_selected() {
        let selected = vec![record([("code", "G06F"), ("name", "电数字数据处理")])];
        let codes: Vec<String> = suggest_ipc("g06", &selected)
            .into_iter()
            .map(|r| r["code"].clone())
            .collect();
        assert_eq!(codes, vec!["G06N", "G06Q", "G06K", "G06T", "G06V", "G06F16"]);

        let by_name = suggest_ipc("图像", &[]);
        assert_eq!(by_name.len(), 3);
        assert!(suggest_ipc("  ", &[]).is_empty());
    }

    #[test]
    fn keyword_expansion_skips_existing() {
        let existing = vec!["AI".to_string()];
        assert_eq!(expand_keyword("人工智能", &existing), vec!["智能系统", "认知计算"]);
        assert!(expand_keyword("区块链", &existing).is_empty());
    }

    #[test]
    fn conclusion_counts_categories() {
        let form = initial_form("提案.docx", date())
            .with(
                REFERENCES,
                FieldValue::Records(vec![
                    reference("CN1", "X"),
                    reference("CN2", "Y"),
                    reference("CN3", "A"),
                    reference("CN4", "A"),
                ]),
            )
            .with(USAGE_PROSPECT, "高")
            .with(PROPOSAL_GRADE, "B")
            .with(VEHICLE_APPLICATION, true);

        let text = conclusion(&form);
        assert!(text.starts_with("根据专利检索分析，本提案专利检索报告-提案-2024-03-05的综合评估如下："));
        assert!(text.contains("共发现4件相关专利文献，其中包含1件X类对比文件、1件Y类对比文件、2件A类对比文件。"));
        assert!(text.contains("【用途前景】高：该技术方案具有较高的市场应用价值和广阔的发展前景。"));
        assert!(text.contains("【授权前景】未评估：需进一步评估。"));
        assert!(!text.contains("【标准适配】"));
        assert!(text.contains("【车型应用】适用于相关车型\n\n"));
        assert!(text.ends_with("【提案等级】B - 建议推进"));
    }

    #[test]
    fn conclusion_defaults() {
        let text = conclusion(&initial_form("a.pdf", date()));
        assert!(text.contains("共发现0件相关专利文献"));
        assert!(text.ends_with("【提案等级】未评级"));
    }

    #[test]
    fn layout_renders_search_fields() {
        let form = initial_form("a.pdf", date())
            .with(REFERENCES, FieldValue::Records(vec![reference("CN1", "X")]));
        let text = layout().assemble(&form).to_text();

        assert!(text.contains("IPC/CPC 分类号：G06F, G06N\n"));
        assert!(text.contains("关键词：人工智能、机器学习、深度学习\n"));
        assert!(text.contains("相关文件（共 1 件）\n"));
        assert!(text.contains("公开号 | 专利名称 | 相同点 | 不同点 | 判定\n"));
        assert!(text.contains("CN1 |  |  |  | X\n"));
    }
}
