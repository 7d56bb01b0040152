//! Document assembly
//!
//! A [`DocumentLayout`] names the fixed sections of a generated document
//! and where each entry takes its content from. [`assemble`] projects a
//! form onto the layout. It is pure and total: absent or empty fields give
//! empty entries, never errors.

use crate::blocks::BlockKind;
use crate::form::{FieldValue, FormState};
use serde::Serialize;
use std::fmt::Write as _;

/// Where a document entry takes its content from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// `label：prefix + text` from a text field; blank text gives an empty line
    Line {
        label: &'static str,
        field: &'static str,
        prefix: &'static str,
    },
    /// Paragraph from a text field
    Paragraph(&'static str),
    /// Text paragraphs and captioned figures from a blocks field
    Blocks(&'static str),
    /// Items of a list field, or one column of a records field, joined
    Joined {
        label: &'static str,
        field: &'static str,
        key: Option<&'static str>,
        separator: &'static str,
    },
    /// Flag rendered as 是 or 否
    Flag {
        label: &'static str,
        field: &'static str,
    },
    /// Table over a records field; omitted when there are no records
    ///
    /// `{count}` in the title is replaced with the number of rows.
    Table {
        title: &'static str,
        field: &'static str,
        columns: &'static [(&'static str, &'static str)],
    },
}

impl Source {
    /// Labeled line from a text field
    #[inline]
    #[must_use]
    pub const fn line(label: &'static str, field: &'static str) -> Self {
        Self::Line {
            label,
            field,
            prefix: "",
        }
    }
}

/// One fixed section of a layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSpec {
    heading: &'static str,
    sources: Vec<Source>,
}

impl SectionSpec {
    /// Create section
    #[must_use]
    pub fn new(heading: &'static str, sources: Vec<Source>) -> Self {
        Self { heading, sources }
    }

    /// Heading
    #[inline]
    #[must_use]
    pub fn heading(&self) -> &'static str {
        self.heading
    }
}

/// Fixed document structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLayout {
    title: &'static str,
    sections: Vec<SectionSpec>,
}

impl DocumentLayout {
    /// Create layout without sections
    #[must_use]
    pub fn new(title: &'static str) -> Self {
        Self {
            title,
            sections: Vec::new(),
        }
    }

    /// With section
    #[must_use]
    pub fn with_section(mut self, heading: &'static str, sources: Vec<Source>) -> Self {
        self.sections.push(SectionSpec::new(heading, sources));
        self
    }

    /// Title
    #[inline]
    #[must_use]
    pub fn title(&self) -> &'static str {
        self.title
    }

    /// Sections in order
    #[inline]
    #[must_use]
    pub fn sections(&self) -> &[SectionSpec] {
        &self.sections
    }

    /// Assemble a document from a form
    #[must_use]
    pub fn assemble(&self, form: &FormState) -> Document {
        assemble(self, form)
    }
}

/// One rendered entry of a section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Entry {
    Line { label: String, text: String },
    Paragraph { text: String },
    Figure { number: usize, caption: String, image_ref: String },
    Table { title: String, headers: Vec<String>, rows: Vec<Vec<String>> },
}

impl Entry {
    /// Check if the entry carries no content
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Line { text, .. } | Self::Paragraph { text } => text.is_empty(),
            Self::Figure { .. } => false,
            Self::Table { rows, .. } => rows.is_empty(),
        }
    }
}

/// Rendered section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub heading: String,
    pub entries: Vec<Entry>,
}

impl Section {
    /// Check if no entry carries content
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(Entry::is_empty)
    }
}

/// Read-only assembled document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub title: String,
    pub sections: Vec<Section>,
}

impl Document {
    /// Section by heading
    #[must_use]
    pub fn section(&self, heading: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.heading == heading)
    }

    /// Plain-text rendering for export
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title);
        for section in &self.sections {
            let _ = writeln!(out, "\n{}", section.heading);
            for entry in &section.entries {
                match entry {
                    Entry::Line { label, text } => {
                        let _ = writeln!(out, "{label}：{text}");
                    }
                    Entry::Paragraph { text } if text.is_empty() => {}
                    Entry::Paragraph { text } => {
                        let _ = writeln!(out, "{text}");
                    }
                    Entry::Figure {
                        number, caption, ..
                    } => {
                        let _ = writeln!(out, "图 {number}：{caption}");
                    }
                    Entry::Table {
                        title,
                        headers,
                        rows,
                    } => {
                        let _ = writeln!(out, "{title}");
                        let _ = writeln!(out, "{}", headers.join(" | "));
                        for row in rows {
                            let _ = writeln!(out, "{}", row.join(" | "));
                        }
                    }
                }
            }
        }
        out
    }
}

/// Project a form onto a layout
#[must_use]
pub fn assemble(layout: &DocumentLayout, form: &FormState) -> Document {
    Document {
        title: layout.title.to_string(),
        sections: layout
            .sections
            .iter()
            .map(|spec| Section {
                heading: spec.heading.to_string(),
                entries: spec
                    .sources
                    .iter()
                    .flat_map(|source| entries(source, form))
                    .collect(),
            })
            .collect(),
    }
}

fn entries(source: &Source, form: &FormState) -> Vec<Entry> {
    match source {
        Source::Line {
            label,
            field,
            prefix,
        } => {
            let value = form.text(field).trim();
            let text = if value.is_empty() {
                String::new()
            } else {
                format!("{prefix}{value}")
            };
            vec![Entry::Line {
                label: (*label).to_string(),
                text,
            }]
        }
        Source::Paragraph(field) => vec![Entry::Paragraph {
            text: form.text(field).trim().to_string(),
        }],
        Source::Blocks(field) => block_entries(form, field),
        Source::Joined {
            label,
            field,
            key,
            separator,
        } => {
            let items: Vec<&str> = match (form.get(field), key) {
                (Some(FieldValue::List(items)), _) => items.iter().map(String::as_str).collect(),
                (Some(FieldValue::Records(records)), Some(key)) => records
                    .iter()
                    .filter_map(|r| r.get(*key).map(String::as_str))
                    .collect(),
                _ => Vec::new(),
            };
            vec![Entry::Line {
                label: (*label).to_string(),
                text: items.join(*separator),
            }]
        }
        Source::Flag { label, field } => vec![Entry::Line {
            label: (*label).to_string(),
            text: if form.flag(field) { "是" } else { "否" }.to_string(),
        }],
        Source::Table {
            title,
            field,
            columns,
        } => {
            let records = form.records(field);
            if records.is_empty() {
                return Vec::new();
            }
            let rows: Vec<Vec<String>> = records
                .iter()
                .map(|record| {
                    columns
                        .iter()
                        .map(|(_, key)| record.get(*key).cloned().unwrap_or_default())
                        .collect()
                })
                .collect();
            vec![Entry::Table {
                title: title.replace("{count}", &rows.len().to_string()),
                headers: columns.iter().map(|(h, _)| (*h).to_string()).collect(),
                rows,
            }]
        }
    }
}

fn block_entries(form: &FormState, field: &str) -> Vec<Entry> {
    let Some(blocks) = form.blocks(field) else {
        return Vec::new();
    };

    let mut figures = 0;
    let mut out = Vec::new();
    for block in blocks {
        match (block.kind, &block.image_ref) {
            (BlockKind::Text, _) if block.content.trim().is_empty() => {}
            (BlockKind::Text, _) => out.push(Entry::Paragraph {
                text: block.content.trim().to_string(),
            }),
            (BlockKind::Image, Some(image_ref)) => {
                figures += 1;
                out.push(Entry::Figure {
                    number: figures,
                    caption: block.content.clone(),
                    image_ref: image_ref.clone(),
                });
            }
            (BlockKind::Image, None) => {}
        }
    }
    out
}
