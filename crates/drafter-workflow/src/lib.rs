//! Drafter Workflow - gated multi-step drafting wizards
//!
//! A wizard is a [`WorkflowDefinition`] driven by a [`WorkflowMachine`]:
//! - Steps advance only when their [`Gate`] holds for the current form
//! - Entering a step can start background generations for empty fields
//! - The last-started generation for a field wins; edits supersede pending ones
//! - The terminal step assembles a read-only [`Document`]
//!
//! Two wizards are provided: the invention disclosure ([`disclosure`]) and
//! the patent search report ([`report`]).
//!
//! # Example
//!
//! ```rust,ignore
//! use drafter_workflow::{disclosure, WorkflowMachine};
//! use std::sync::Arc;
//!
//! # async fn example(client: drafter_core::GenerationClient) -> Result<(), drafter_workflow::WorkflowError> {
//! let definition = Arc::new(disclosure::definition(client)?);
//! let mut wizard = WorkflowMachine::new(definition, disclosure::initial_form())?;
//!
//! wizard.set(disclosure::INVENTION_NAME, "一种数据存证方法")?;
//! wizard.set(disclosure::CONTACT_PERSON, "张三")?;
//! wizard.set(disclosure::APPLICATION_TYPE, "发明")?;
//! wizard.set(disclosure::TECHNICAL_FIELD, "区块链技术")?;
//!
//! wizard.next();
//! wizard.settle().await;
//! println!("{}", wizard.form().text(disclosure::TECH_BACKGROUND));
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod blocks;
pub mod disclosure;
pub mod document;
pub mod error;
pub mod form;
pub mod generators;
pub mod machine;
pub mod report;
pub mod review;
pub mod step;
pub mod tracker;

pub use blocks::{BlockKind, ContentBlock, ContentBlocks};
pub use document::{assemble, Document, DocumentLayout, Entry, Section, Source};
pub use error::{BlockError, WorkflowError};
pub use form::{record, FieldValue, FormState, Record};
pub use generators::{
    BackgroundGenerator, ComputedGenerator, FieldGenerator, GenerationJob, TemplateGenerator,
};
pub use machine::{Completion, Merge, Transition, WorkflowMachine, WorkflowState};
pub use review::{review, ReviewWarning, WarningKind};
pub use step::{Gate, Requirement, StepAction, StepSpec, Trigger, WorkflowDefinition};
pub use tracker::{GenerationTracker, Ticket};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving a wizard
    pub use crate::{
        FieldValue, FormState, Gate, Merge, StepAction, StepSpec, Transition, WorkflowDefinition,
        WorkflowError, WorkflowMachine,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
