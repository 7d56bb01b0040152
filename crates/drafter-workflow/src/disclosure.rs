//! Invention disclosure wizard
//!
//! Five steps: basic information, technical background, technical
//! solution, beneficial effects, and the assembled 专利交底书. The
//! background is drafted by the model on entry to step 2; effects and
//! protection points are prefilled from fixed drafts on entry to step 4.

use crate::blocks::ContentBlocks;
use crate::document::{DocumentLayout, Source};
use crate::error::WorkflowError;
use crate::form::{FieldValue, FormState};
use crate::generators::{BackgroundGenerator, ComputedGenerator, TemplateGenerator};
use crate::review::review_records;
use crate::step::{Gate, Requirement, StepAction, StepSpec, WorkflowDefinition};
use drafter_core::{GenerationClient, GenerationRequest, PromptTemplate};

pub const INVENTION_NAME: &str = GenerationRequest::INVENTION_NAME;
pub const CONTACT_PERSON: &str = "contactPerson";
pub const APPLICATION_TYPE: &str = "applicationType";
pub const TECHNICAL_FIELD: &str = GenerationRequest::TECHNICAL_FIELD;
pub const EXISTING_PROBLEMS: &str = GenerationRequest::EXISTING_PROBLEMS;
pub const TECH_BACKGROUND: &str = "techBackground";
pub const CONTENT_BLOCKS: &str = "contentBlocks";
/// Records with `term` and `definition` keys
pub const KEYWORDS: &str = "keywords";
/// Records with `type` and `message` keys
pub const REVIEW_WARNINGS: &str = "reviewWarnings";
pub const BENEFICIAL_EFFECTS: &str = "beneficialEffects";
pub const PROTECTION_POINTS: &str = "protectionPoints";

/// Accepted application types
pub const APPLICATION_TYPES: &[&str] = &["发明", "实用新型"];

const KEYWORD_COLUMNS: &[(&str, &str)] = &[("术语", "term"), ("定义", "definition")];

const EFFECTS_DRAFT: &str = "本发明技术方案具有以下有益效果：

1. 提高了{technicalField}领域的技术效率，相比现有技术提升显著；
2. 降低了实施成本，使技术方案更易于推广应用；
3. 改善了用户体验，操作更加便捷、可靠；
4. 具有良好的扩展性，可适应不同应用场景的需求。";

const PROTECTION_DRAFT: &str = "本发明的技术关键点和欲保护点包括：

1. {inventionName}的核心技术架构及其实现方法；
2. 关键技术模块的创新设计及优化方案；
3. 技术方案中涉及的数据处理方法和流程；
4. 系统整体的协同工作机制和控制策略。";

/// Empty disclosure form
#[must_use]
pub fn initial_form() -> FormState {
    FormState::new()
        .with(INVENTION_NAME, "")
        .with(CONTACT_PERSON, "")
        .with(APPLICATION_TYPE, "")
        .with(TECHNICAL_FIELD, "")
        .with(EXISTING_PROBLEMS, "")
        .with(TECH_BACKGROUND, "")
        .with(CONTENT_BLOCKS, ContentBlocks::new())
        .with(KEYWORDS, FieldValue::Records(Vec::new()))
        .with(REVIEW_WARNINGS, FieldValue::Records(Vec::new()))
        .with(BENEFICIAL_EFFECTS, "")
        .with(PROTECTION_POINTS, "")
}

/// Disclosure wizard backed by a generation client
///
/// # Errors
/// - `WorkflowError::InvalidDefinition` if the step list is malformed
pub fn definition(client: GenerationClient) -> Result<WorkflowDefinition, WorkflowError> {
    let steps = vec![
        StepSpec::new(1, "基本信息").with_gate(
            Gate::filled(&[INVENTION_NAME, CONTACT_PERSON, TECHNICAL_FIELD])
                .with(Requirement::OneOf(APPLICATION_TYPE, APPLICATION_TYPES)),
        ),
        StepSpec::new(2, "技术背景")
            .with_gate(Gate::filled(&[TECH_BACKGROUND]))
            .with_action(StepAction::on_entry(
                TECH_BACKGROUND,
                BackgroundGenerator::new(client),
            )),
        StepSpec::new(3, "技术方案")
            .with_gate(Gate::filled(&[CONTENT_BLOCKS]))
            .with_action(StepAction::manual(
                REVIEW_WARNINGS,
                ComputedGenerator::new(|form| form.blocks(CONTENT_BLOCKS).map(review_records)),
            )),
        StepSpec::new(4, "有益效果")
            .with_gate(Gate::filled(&[BENEFICIAL_EFFECTS, PROTECTION_POINTS]))
            .with_action(StepAction::on_entry(
                BENEFICIAL_EFFECTS,
                TemplateGenerator::new(PromptTemplate::new(EFFECTS_DRAFT)),
            ))
            .with_action(StepAction::on_entry(
                PROTECTION_POINTS,
                TemplateGenerator::new(PromptTemplate::new(PROTECTION_DRAFT)),
            )),
        StepSpec::new(5, "生成文档"),
    ];
    WorkflowDefinition::new("disclosure", steps, layout())
}

/// Layout of the 专利交底书
#[must_use]
pub fn layout() -> DocumentLayout {
    DocumentLayout::new("专利交底书")
        .with_section(
            "一、基本信息",
            vec![
                Source::line("发明名称", INVENTION_NAME),
                Source::line("联系人", CONTACT_PERSON),
                Source::line("申请类型", APPLICATION_TYPE),
                Source::Line {
                    label: "技术领域",
                    field: TECHNICAL_FIELD,
                    prefix: "本发明创造技术方案所属技术领域为",
                },
            ],
        )
        .with_section("二、本发明技术背景", vec![Source::Paragraph(TECH_BACKGROUND)])
        .with_section(
            "三、本发明的技术方案",
            vec![
                Source::Blocks(CONTENT_BLOCKS),
                Source::Table {
                    title: "关键词表",
                    field: KEYWORDS,
                    columns: KEYWORD_COLUMNS,
                },
            ],
        )
        .with_section(
            "四、本发明技术方案带来的有益效果",
            vec![Source::Paragraph(BENEFICIAL_EFFECTS)],
        )
        .with_section(
            "五、本发明的技术关键点和欲保护点",
            vec![Source::Paragraph(PROTECTION_POINTS)],
        )
}
