//! Prompt templates
//!
//! Templates use `{name}` placeholders. `{{` and `}}` produce literal
//! braces. Values are inserted verbatim: no escaping is performed, and a
//! value that itself contains `{name}` is not expanded again.

use crate::error::MissingFieldError;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static pattern is valid")
});

/// Background-of-the-invention drafting prompt
pub const BACKGROUND_TEMPLATE: &str = r#"你是一位专业的专利代理师，请根据以下信息为一份专利申请撰写"背景技术"（Background of the Invention）部分。

输入信息：
1. 发明名称：{inventionName}
2. 技术领域：{technicalField}
3. 现有技术问题/缺点：{existingProblems}

撰写要求：
1. **技术领域**：首先简要说明该发明所属的技术领域。
2. **背景技术**：介绍该领域目前的常规技术或主流方案。
3. **现有技术缺点**：重点阐述现有技术中存在的问题、缺点或不足。请充分利用提供的"现有技术问题"信息，并进行合理的专业扩展和深化。分析这些问题产生的原因（如：算法复杂度高、硬件依赖强、处理流程繁琐等）。
4. **技术需求**：最后总结，说明因此迫切需要一种新的技术方案（即本发明）来解决上述问题。
5. **语言风格**：使用专业、严谨的专利法律和技术术语。语气客观、中立。
6. **格式**：分段撰写，逻辑清晰。500字以内。不要包含"发明内容"或具体的技术实现细节，仅聚焦于背景和问题。

请直接输出背景技术的内容，不要包含Markdown标题（如# 背景技术）或其他开场白。"#;

static BACKGROUND: Lazy<PromptTemplate> = Lazy::new(|| PromptTemplate::new(BACKGROUND_TEMPLATE));

/// Shared background drafting template
#[inline]
#[must_use]
pub fn background_template() -> &'static PromptTemplate {
    &BACKGROUND
}

/// Parsed prompt template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
    placeholders: Vec<String>,
}

impl PromptTemplate {
    /// Parse template source
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let mut placeholders: Vec<String> = Vec::new();
        for caps in TOKEN.captures_iter(&source) {
            if let Some(name) = caps.get(1) {
                if !placeholders.iter().any(|p| p == name.as_str()) {
                    placeholders.push(name.as_str().to_string());
                }
            }
        }
        Self {
            source,
            placeholders,
        }
    }

    /// Template source text
    #[inline]
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Distinct placeholder names in order of first appearance
    #[inline]
    #[must_use]
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// Fill placeholders from `fields`
    ///
    /// Fields without a matching placeholder are ignored.
    ///
    /// # Errors
    /// - `MissingFieldError` for the first placeholder with no field
    pub fn render(&self, fields: &BTreeMap<String, String>) -> Result<String, MissingFieldError> {
        if let Some(missing) = self.placeholders.iter().find(|p| !fields.contains_key(*p)) {
            return Err(MissingFieldError::new(missing.clone()));
        }

        let rendered = TOKEN.replace_all(&self.source, |caps: &Captures<'_>| {
            match caps.get(1) {
                Some(name) => fields
                    .get(name.as_str())
                    .cloned()
                    .unwrap_or_default(),
                None if &caps[0] == "{{" => "{".to_string(),
                None => "}".to_string(),
            }
        });
        Ok(rendered.into_owned())
    }
}

/// Render `template` with `fields`
///
/// # Errors
/// - `MissingFieldError` if a placeholder has no field
pub fn render(template: &str, fields: &BTreeMap<String, String>) -> Result<String, MissingFieldError> {
    PromptTemplate::new(template).render(fields)
}
