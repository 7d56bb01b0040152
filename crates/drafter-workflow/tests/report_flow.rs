//! Search Report Wizard Tests
//!
//! Drives the report wizard with a fixture search generator.
//!
use chrono::NaiveDate;
use drafter_workflow::prelude::*;
use drafter_workflow::report::{self, *};
use drafter_workflow::{record, ComputedGenerator, Record};
use std::sync::Arc;

fn fixture_references() -> Vec<Record> {
    vec![
        record([
            ("publicationNumber", "CN112345678A"),
            ("title", "一种基于深度学习的图像识别方法"),
            ("applicant", "某科技公司"),
            ("publicationDate", "2021-03-12"),
            ("similarities", "均采用卷积网络"),
            ("differences", "未涉及车载场景"),
            ("category", "X"),
        ]),
        record([
            ("publicationNumber", "CN113456789B"),
            ("title", "机器学习模型训练系统"),
            ("applicant", "某大学"),
            ("publicationDate", "2022-06-01"),
            ("similarities", "训练流程相近"),
            ("differences", "数据来源不同"),
            ("category", "A"),
        ]),
    ]
}

fn wizard() -> WorkflowMachine {
    let search =
        ComputedGenerator::new(|_| Some(FieldValue::Records(fixture_references())));
    let today = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
    WorkflowMachine::new(
        Arc::new(report::definition(search).unwrap()),
        report::initial_form("智能座舱提案.pdf", today),
    )
    .unwrap()
}

#[tokio::test]
async fn test_full_report_flow() {
    let mut wizard = wizard();

    assert!(wizard.next().moved());
    wizard.settle().await;
    assert!(wizard.form().text(FORMULA).starts_with("(IPC=G06F OR IPC=G06N) AND ("));

    assert!(wizard.next().moved());
    wizard.settle().await;
    assert_eq!(wizard.form().records(REFERENCES).len(), 2);

    assert!(wizard.next().moved());
    wizard.set(USAGE_PROSPECT, "高").unwrap();
    wizard.set(AUTHORIZATION_PROSPECT, "中").unwrap();
    wizard.set(PROPOSAL_GRADE, "A").unwrap();
    wizard.set(STANDARD_ADAPTATION, true).unwrap();
    wizard.regenerate(CONCLUSION).unwrap();
    wizard.settle().await;
    let conclusion = wizard.form().text(CONCLUSION).to_string();
    assert!(conclusion.contains("1件X类对比文件、0件Y类对比文件、1件A类对比文件"));
    assert!(conclusion.contains("【标准适配】已适配相关标准"));
    assert!(conclusion.ends_with("【提案等级】A - 建议优先推进"));

    assert!(wizard.next().moved());
    assert_eq!(wizard.generate_document(), Transition::DocumentReady);
    let text = wizard.document().unwrap().to_text();
    assert!(text.starts_with("专利检索报告\n"));
    assert!(text.contains("专利检索报告-智能座舱提案-2024-03-05\n"));
    assert!(text.contains("2024-03-05\n"));
    assert!(text.contains("相关文件（共 2 件）\n"));
    assert!(text.contains("CN112345678A | 一种基于深度学习的图像识别方法 | 均采用卷积网络 | 未涉及车载场景 | X\n"));
    assert!(text.contains(&conclusion));
}

#[tokio::test]
async fn test_keywords_required() {
    let mut wizard = wizard();
    wizard.update_list(KEYWORDS, Vec::clear).unwrap();

    assert_eq!(
        wizard.next(),
        Transition::Rejected {
            step: 1,
            unmet: vec![KEYWORDS]
        }
    );

    let suggestions = expand_keyword("机器学习", wizard.form().list(KEYWORDS));
    wizard
        .update_list(KEYWORDS, |words| {
            words.extend(suggestions.iter().map(ToString::to_string));
        })
        .unwrap();
    assert_eq!(wizard.form().list(KEYWORDS), ["ML", "自动学习", "统计学习"]);
    assert!(wizard.next().moved());
}

#[tokio::test]
async fn test_template_change_regenerates_formula() {
    let mut wizard = wizard();
    wizard.next();
    wizard.settle().await;

    wizard
        .set(FORMULA_TEMPLATE, FormulaTemplate::KeywordsOnly.id())
        .unwrap();
    wizard.regenerate(FORMULA).unwrap();
    wizard.settle().await;
    assert!(wizard.form().text(FORMULA).starts_with("(TI=人工智能 OR AB=人工智能"));

    wizard.set(FORMULA_TEMPLATE, "unknown").unwrap();
    assert!(matches!(
        wizard.regenerate(FORMULA),
        Err(WorkflowError::MissingInputs(_))
    ));
}

#[tokio::test]
async fn test_ipc_edits_invalidate_document() {
    let mut wizard = wizard();
    for _ in 0..4 {
        wizard.next();
        wizard.settle().await;
    }
    assert_eq!(wizard.generate_document(), Transition::DocumentReady);

    let extra = suggest_ipc("H04W", wizard.form().records(IPC_CODES));
    wizard
        .update_records(IPC_CODES, |codes| codes.extend(extra))
        .unwrap();
    assert!(wizard.document().is_none());

    assert_eq!(wizard.generate_document(), Transition::DocumentReady);
    let text = wizard.document().unwrap().to_text();
    assert!(text.contains("IPC/CPC 分类号：G06F, G06N, H04W\n"));
}
