//! Technical-solution content blocks
//!
//! An ordered, never-empty list of text and image blocks. Order is stable
//! under insertion and removal.

use crate::error::BlockError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Kind of content block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Text,
    Image,
}

/// One block of the technical solution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlock {
    /// Unique id
    pub id: String,
    /// Block kind
    pub kind: BlockKind,
    /// Text, or the caption of an image block
    pub content: String,
    /// Reference to uploaded image data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
}

impl ContentBlock {
    /// Create empty block with a fresh id
    #[must_use]
    pub fn new(kind: BlockKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            content: String::new(),
            image_ref: None,
        }
    }

    /// Create text block
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::new(BlockKind::Text)
        }
    }

    /// Create image block with caption and reference
    #[must_use]
    pub fn image(caption: impl Into<String>, image_ref: impl Into<String>) -> Self {
        Self {
            content: caption.into(),
            image_ref: Some(image_ref.into()),
            ..Self::new(BlockKind::Image)
        }
    }

    /// Check if this is a text block with non-blank content
    #[inline]
    #[must_use]
    pub fn has_text(&self) -> bool {
        self.kind == BlockKind::Text && !self.content.trim().is_empty()
    }
}

/// Ordered, never-empty content block list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ContentBlock>", into = "Vec<ContentBlock>")]
pub struct ContentBlocks {
    blocks: Vec<ContentBlock>,
}

impl ContentBlocks {
    /// Create list holding one empty text block
    #[must_use]
    pub fn new() -> Self {
        Self {
            blocks: vec![ContentBlock::new(BlockKind::Text)],
        }
    }

    /// Create list from blocks
    ///
    /// # Errors
    /// - `BlockError::Empty` if `blocks` is empty
    /// - `BlockError::DuplicateId` if two blocks share an id
    pub fn from_blocks(blocks: Vec<ContentBlock>) -> Result<Self, BlockError> {
        if blocks.is_empty() {
            return Err(BlockError::Empty);
        }
        let mut seen = HashSet::with_capacity(blocks.len());
        if let Some(dup) = blocks.iter().find(|b| !seen.insert(b.id.as_str())) {
            return Err(BlockError::DuplicateId(dup.id.clone()));
        }
        Ok(Self { blocks })
    }

    /// Append an empty block, returning its id
    pub fn add(&mut self, kind: BlockKind) -> String {
        let block = ContentBlock::new(kind);
        let id = block.id.clone();
        self.blocks.push(block);
        id
    }

    /// Append a block, returning its id
    ///
    /// # Errors
    /// - `BlockError::DuplicateId` if a block already carries the id
    pub fn push(&mut self, block: ContentBlock) -> Result<String, BlockError> {
        if self.get(&block.id).is_some() {
            return Err(BlockError::DuplicateId(block.id));
        }
        let id = block.id.clone();
        self.blocks.push(block);
        Ok(id)
    }

    /// Replace the content of a block
    ///
    /// # Errors
    /// - `BlockError::UnknownBlock` if no block has `id`
    pub fn update(&mut self, id: &str, content: impl Into<String>) -> Result<(), BlockError> {
        self.get_mut(id)?.content = content.into();
        Ok(())
    }

    /// Attach uploaded image data to an image block
    ///
    /// The caption becomes the uploaded file name.
    ///
    /// # Errors
    /// - `BlockError::UnknownBlock` if no block has `id`
    /// - `BlockError::NotImage` if the block is a text block
    pub fn attach_image(
        &mut self,
        id: &str,
        image_ref: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Result<(), BlockError> {
        let block = self.get_mut(id)?;
        if block.kind != BlockKind::Image {
            return Err(BlockError::NotImage(id.to_string()));
        }
        block.image_ref = Some(image_ref.into());
        block.content = file_name.into();
        Ok(())
    }

    /// Remove a block
    ///
    /// # Errors
    /// - `BlockError::UnknownBlock` if no block has `id`
    /// - `BlockError::LastBlock` if it is the only block
    pub fn remove(&mut self, id: &str) -> Result<ContentBlock, BlockError> {
        let index = self
            .blocks
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| BlockError::UnknownBlock(id.to_string()))?;
        if self.blocks.len() == 1 {
            return Err(BlockError::LastBlock);
        }
        Ok(self.blocks.remove(index))
    }

    /// Number of blocks
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Check if the list is empty; never true
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterate blocks in order
    pub fn iter(&self) -> std::slice::Iter<'_, ContentBlock> {
        self.blocks.iter()
    }

    /// Block by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ContentBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Check if any text block has non-blank content
    #[must_use]
    pub fn has_text(&self) -> bool {
        self.blocks.iter().any(ContentBlock::has_text)
    }

    /// Text of all text blocks, joined with `separator`
    #[must_use]
    pub fn joined_text(&self, separator: &str) -> String {
        self.blocks
            .iter()
            .filter(|b| b.kind == BlockKind::Text)
            .map(|b| b.content.as_str())
            .collect::<Vec<_>>()
            .join(separator)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut ContentBlock, BlockError> {
        self.blocks
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| BlockError::UnknownBlock(id.to_string()))
    }
}

impl Default for ContentBlocks {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<Vec<ContentBlock>> for ContentBlocks {
    type Error = BlockError;

    fn try_from(blocks: Vec<ContentBlock>) -> Result<Self, Self::Error> {
        Self::from_blocks(blocks)
    }
}

impl From<ContentBlocks> for Vec<ContentBlock> {
    fn from(blocks: ContentBlocks) -> Self {
        blocks.blocks
    }
}

impl<'a> IntoIterator for &'a ContentBlocks {
    type Item = &'a ContentBlock;
    type IntoIter = std::slice::Iter<'a, ContentBlock>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn new_list_has_one_text_block() {
        let blocks = ContentBlocks::new();
        assert_eq!(blocks.len(), 1);
        assert!(!blocks.has_text());
    }

    #[test]
    fn removing_last_block_is_rejected() {
        let mut blocks = ContentBlocks::new();
        let id = blocks.iter().next().unwrap().id.clone();

        assert_eq!(blocks.remove(&id), Err(BlockError::LastBlock));
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn remove_unknown_block() {
        let mut blocks = ContentBlocks::new();
        assert!(matches!(
            blocks.remove("missing"),
            Err(BlockError::UnknownBlock(_))
        ));
    }

    #[test]
    fn attach_image_requires_image_block() {
        let mut blocks = ContentBlocks::new();
        let text_id = blocks.iter().next().unwrap().id.clone();
        let image_id = blocks.add(BlockKind::Image);

        assert!(matches!(
            blocks.attach_image(&text_id, "blob:1", "a.png"),
            Err(BlockError::NotImage(_))
        ));
        blocks.attach_image(&image_id, "blob:1", "结构图.png").unwrap();
        let image = blocks.get(&image_id).unwrap();
        assert_eq!(image.content, "结构图.png");
        assert_eq!(image.image_ref.as_deref(), Some("blob:1"));
    }

    #[test]
    fn deserialize_rejects_empty_list() {
        let result: Result<ContentBlocks, _> = serde_json::from_str("[]");
        assert!(result.is_err());

        let blocks: ContentBlocks =
            serde_json::from_str(r#"[{"id":"1","kind":"text","content":"方案"}]"#).unwrap();
        assert!(blocks.has_text());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let block = ContentBlock::text("第一段");
        let twin = ContentBlock {
            content: "第二段".to_string(),
            ..block.clone()
        };

        assert_eq!(
            ContentBlocks::from_blocks(vec![block.clone(), twin.clone()]),
            Err(BlockError::DuplicateId(block.id.clone()))
        );

        let json = format!(
            r#"[{{"id":"{0}","kind":"text","content":"a"}},{{"id":"{0}","kind":"image","content":"b"}}]"#,
            block.id
        );
        assert!(serde_json::from_str::<ContentBlocks>(&json).is_err());

        let mut blocks = ContentBlocks::from_blocks(vec![block.clone()]).unwrap();
        assert_eq!(blocks.push(twin), Err(BlockError::DuplicateId(block.id.clone())));
        assert_eq!(blocks.len(), 1);
        assert!(blocks.push(ContentBlock::text("第三段")).is_ok());
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn joined_text_skips_images() {
        let blocks = ContentBlocks::from_blocks(vec![
            ContentBlock::text("第一段"),
            ContentBlock::image("图", "ref"),
            ContentBlock::text("第二段"),
        ])
        .unwrap();
        assert_eq!(blocks.joined_text("\n\n"), "第一段\n\n第二段");
    }

    proptest! {
        #[test]
        fn prop_order_stable_under_add_and_remove(
            ops in proptest::collection::vec((any::<bool>(), 0..16usize), 0..40)
        ) {
            let mut blocks = ContentBlocks::new();
            let mut model: Vec<String> = blocks.iter().map(|b| b.id.clone()).collect();

            for (add, pick) in ops {
                if add {
                    model.push(blocks.add(BlockKind::Text));
                } else {
                    let id = model[pick % model.len()].clone();
                    match blocks.remove(&id) {
                        Ok(_) => model.retain(|m| *m != id),
                        Err(err) => {
                            prop_assert_eq!(err, BlockError::LastBlock);
                            prop_assert_eq!(model.len(), 1);
                        }
                    }
                }
                let ids: Vec<String> = blocks.iter().map(|b| b.id.clone()).collect();
                prop_assert_eq!(&ids, &model);
                prop_assert!(!blocks.is_empty());
            }
        }
    }
}
