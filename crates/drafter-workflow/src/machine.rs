//! Wizard state machine
//!
//! [`WorkflowMachine`] owns one wizard instance:
//! - The current 1-based step, advanced only when the step's gate holds
//! - The form, edited directly by the host or filled by generations
//! - Background generations, spawned on the Tokio runtime and merged back
//!   when the host drains completions
//!
//! Navigation never waits for a generation. Completions are tagged with a
//! [`Ticket`]; a completion whose ticket has been superseded by a newer
//! generation or a direct edit of the same field is discarded.

use crate::blocks::ContentBlocks;
use crate::document::Document;
use crate::error::{BlockError, WorkflowError};
use crate::form::{FieldValue, FormState, Record};
use crate::step::{StepAction, StepSpec, Trigger, WorkflowDefinition};
use crate::tracker::{GenerationTracker, Ticket};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Outcome of a navigation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Moved forward; `started` lists fields whose generation began on entry
    Advanced {
        from: usize,
        to: usize,
        started: Vec<String>,
    },
    /// Moved back one step
    Retreated { from: usize, to: usize },
    /// Gate of `step` does not hold
    Rejected {
        step: usize,
        unmet: Vec<&'static str>,
    },
    /// Already on the terminal step
    AtTerminal,
    /// Already on the first step
    AtStart,
    /// Document requested before reaching the terminal step
    NotAtTerminal { step: usize },
    /// Document assembled
    DocumentReady,
}

impl Transition {
    /// Check if the current step changed
    #[inline]
    #[must_use]
    pub fn moved(&self) -> bool {
        matches!(self, Self::Advanced { .. } | Self::Retreated { .. })
    }

    /// Check if a gate blocked the request
    #[inline]
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Outcome of merging one completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Merge {
    /// Result written to the field
    Applied { field: String },
    /// Generation failed; the field is unchanged
    Failed { field: String, error: String },
    /// Superseded by a newer generation or an edit
    Discarded { field: String },
}

impl Merge {
    /// Target field
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::Applied { field } | Self::Failed { field, .. } | Self::Discarded { field } => {
                field
            }
        }
    }
}

/// Message sent by a finished generation task
#[derive(Debug)]
pub struct Completion {
    ticket: Ticket,
    result: Result<FieldValue, WorkflowError>,
}

impl Completion {
    /// Ticket of the generation
    #[inline]
    #[must_use]
    pub fn ticket(&self) -> &Ticket {
        &self.ticket
    }
}

/// Serializable snapshot of a wizard instance
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    pub workflow: &'static str,
    pub current_step: usize,
    pub label: &'static str,
    pub terminal: bool,
    pub form: FormState,
    pub generating: Vec<String>,
    pub errors: BTreeMap<String, String>,
    pub document: Option<Document>,
}

/// One running wizard
pub struct WorkflowMachine {
    definition: Arc<WorkflowDefinition>,
    current: usize,
    form: FormState,
    tracker: GenerationTracker,
    errors: BTreeMap<String, String>,
    document: Option<Document>,
    runtime: Handle,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
}

impl WorkflowMachine {
    /// Start a wizard on step 1
    ///
    /// # Errors
    /// - `WorkflowError::NoRuntime` if called outside a Tokio runtime
    /// - `WorkflowError::UnknownField` if an action targets an undeclared field
    pub fn new(definition: Arc<WorkflowDefinition>, form: FormState) -> Result<Self, WorkflowError> {
        let runtime = Handle::try_current().map_err(|_| WorkflowError::NoRuntime)?;
        if let Some(action) = definition
            .steps()
            .iter()
            .flat_map(StepSpec::actions)
            .find(|a| !form.contains(a.field()))
        {
            return Err(WorkflowError::UnknownField(action.field().to_string()));
        }

        let (completions_tx, completions) = mpsc::unbounded_channel();
        debug!(workflow = definition.name(), "Starting workflow");
        Ok(Self {
            definition,
            current: 1,
            form,
            tracker: GenerationTracker::new(),
            errors: BTreeMap::new(),
            document: None,
            runtime,
            completions_tx,
            completions,
        })
    }

    /// Definition
    #[inline]
    #[must_use]
    pub fn definition(&self) -> &WorkflowDefinition {
        &self.definition
    }

    /// Current 1-based step
    #[inline]
    #[must_use]
    pub fn current_step(&self) -> usize {
        self.current
    }

    /// Current step definition
    #[must_use]
    pub fn step(&self) -> &StepSpec {
        // current is always within 1..=terminal
        &self.definition.steps()[self.current - 1]
    }

    /// Check if the current step is the last one
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.current == self.definition.terminal()
    }

    /// Form
    #[inline]
    #[must_use]
    pub fn form(&self) -> &FormState {
        &self.form
    }

    /// Check if a generation whose result would be merged is running
    #[inline]
    #[must_use]
    pub fn is_generating(&self, field: &str) -> bool {
        self.tracker.is_in_flight(field)
    }

    /// Check if any generation is running
    #[inline]
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.tracker.has_in_flight()
    }

    /// Error of the last failed generation for a field
    #[must_use]
    pub fn generation_error(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    /// Assembled document, present only after a successful request
    #[inline]
    #[must_use]
    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    /// Snapshot for hosts
    #[must_use]
    pub fn state(&self) -> WorkflowState {
        WorkflowState {
            workflow: self.definition.name(),
            current_step: self.current,
            label: self.step().label(),
            terminal: self.is_terminal(),
            form: self.form.clone(),
            generating: self.tracker.in_flight().map(str::to_string).collect(),
            errors: self.errors.clone(),
            document: self.document.clone(),
        }
    }

    /// Advance one step if the current gate holds
    ///
    /// Entering a step starts its on-entry generations for fields that are
    /// empty and not already generating.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Transition {
        if self.is_terminal() {
            debug!(step = self.current, "Already on terminal step");
            return Transition::AtTerminal;
        }

        let unmet = self.step().gate().unmet(&self.form);
        if !unmet.is_empty() {
            info!(step = self.current, ?unmet, "Step gate not satisfied");
            return Transition::Rejected {
                step: self.current,
                unmet,
            };
        }

        let from = self.current;
        self.current += 1;
        let started = self.enter();
        debug!(from, to = self.current, ?started, "Advanced");
        Transition::Advanced {
            from,
            to: self.current,
            started,
        }
    }

    /// Go back one step
    ///
    /// Running generations are not cancelled and still merge when they
    /// complete.
    pub fn back(&mut self) -> Transition {
        if self.current == 1 {
            return Transition::AtStart;
        }
        let from = self.current;
        self.current -= 1;
        self.document = None;
        debug!(from, to = self.current, "Retreated");
        Transition::Retreated {
            from,
            to: self.current,
        }
    }

    /// Assemble the document on the terminal step
    ///
    /// Every earlier gate is checked again, since fields may have been edited
    /// after their step was passed.
    pub fn generate_document(&mut self) -> Transition {
        if !self.is_terminal() {
            return Transition::NotAtTerminal { step: self.current };
        }
        for step in &self.definition.steps()[..self.current - 1] {
            let unmet = step.gate().unmet(&self.form);
            if !unmet.is_empty() {
                info!(step = step.position(), ?unmet, "Document blocked by gate");
                return Transition::Rejected {
                    step: step.position(),
                    unmet,
                };
            }
        }

        self.document = Some(self.definition.layout().assemble(&self.form));
        info!(workflow = self.definition.name(), "Document assembled");
        Transition::DocumentReady
    }

    /// Start the generation for a field on demand
    ///
    /// A generation already running for the field is superseded.
    ///
    /// # Errors
    /// - `WorkflowError::NoGenerator` if no action targets the field
    /// - `WorkflowError::MissingInputs` if the form lacks the generator's inputs
    pub fn regenerate(&mut self, field: &str) -> Result<Ticket, WorkflowError> {
        let definition = Arc::clone(&self.definition);
        let (_, action) = definition
            .action_for(field)
            .ok_or_else(|| WorkflowError::NoGenerator(field.to_string()))?;
        self.start(action)
            .ok_or_else(|| WorkflowError::MissingInputs(field.to_string()))
    }

    /// Replace a field value
    ///
    /// # Errors
    /// - `WorkflowError::UnknownField` if the field is not declared
    /// - `WorkflowError::WrongKind` if the value kind differs
    pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) -> Result<(), WorkflowError> {
        self.form.set(field, value.into())?;
        self.edited(field);
        Ok(())
    }

    /// Edit a blocks field
    ///
    /// The edit applies atomically: if `edit` fails the blocks are unchanged.
    ///
    /// # Errors
    /// - `WorkflowError::UnknownField` or `WorkflowError::WrongKind` if the
    ///   field is not a declared blocks field
    /// - `WorkflowError::Block` if `edit` fails
    pub fn update_blocks<R>(
        &mut self,
        field: &str,
        edit: impl FnOnce(&mut ContentBlocks) -> Result<R, BlockError>,
    ) -> Result<R, WorkflowError> {
        let blocks = match self.form.slot(field)? {
            FieldValue::Blocks(blocks) => blocks,
            other => return Err(wrong_kind(field, "blocks", other)),
        };
        let mut draft = blocks.clone();
        let out = edit(&mut draft)?;
        *blocks = draft;
        self.edited(field);
        Ok(out)
    }

    /// Edit a records field
    ///
    /// # Errors
    /// - `WorkflowError::UnknownField` or `WorkflowError::WrongKind` if the
    ///   field is not a declared records field
    pub fn update_records(
        &mut self,
        field: &str,
        edit: impl FnOnce(&mut Vec<Record>),
    ) -> Result<(), WorkflowError> {
        let records = match self.form.slot(field)? {
            FieldValue::Records(records) => records,
            other => return Err(wrong_kind(field, "records", other)),
        };
        edit(records);
        self.edited(field);
        Ok(())
    }

    /// Edit a list field
    ///
    /// # Errors
    /// - `WorkflowError::UnknownField` or `WorkflowError::WrongKind` if the
    ///   field is not a declared list field
    pub fn update_list(
        &mut self,
        field: &str,
        edit: impl FnOnce(&mut Vec<String>),
    ) -> Result<(), WorkflowError> {
        let items = match self.form.slot(field)? {
            FieldValue::List(items) => items,
            other => return Err(wrong_kind(field, "list", other)),
        };
        edit(items);
        self.edited(field);
        Ok(())
    }

    /// Merge one completion
    pub fn apply(&mut self, completion: Completion) -> Merge {
        let Completion { ticket, result } = completion;
        let field = ticket.field().to_string();

        if !self.tracker.finish(&ticket) {
            warn!(
                field = %field,
                sequence = ticket.sequence(),
                "Discarding superseded generation"
            );
            return Merge::Discarded { field };
        }

        match result.and_then(|value| self.form.set(&field, value)) {
            Ok(()) => {
                self.errors.remove(&field);
                self.document = None;
                info!(field = %field, "Generation merged");
                Merge::Applied { field }
            }
            Err(err) => {
                error!(field = %field, error = %err, "Generation failed");
                let message = err.to_string();
                self.errors.insert(field.clone(), message.clone());
                Merge::Failed {
                    field,
                    error: message,
                }
            }
        }
    }

    /// Merge every completion already received
    pub fn apply_ready(&mut self) -> Vec<Merge> {
        let mut merges = Vec::new();
        while let Ok(completion) = self.completions.try_recv() {
            merges.push(self.apply(completion));
        }
        merges
    }

    /// Wait for and merge the next completion
    ///
    /// Returns `None` when nothing is ready and no generation that would be
    /// merged is running.
    pub async fn next_merge(&mut self) -> Option<Merge> {
        if let Ok(completion) = self.completions.try_recv() {
            return Some(self.apply(completion));
        }
        if !self.tracker.has_in_flight() {
            return None;
        }
        let completion = self.completions.recv().await?;
        Some(self.apply(completion))
    }

    /// Merge completions until no generation is running
    pub async fn settle(&mut self) -> Vec<Merge> {
        let mut merges = Vec::new();
        while let Some(merge) = self.next_merge().await {
            merges.push(merge);
        }
        merges
    }

    fn enter(&mut self) -> Vec<String> {
        let definition = Arc::clone(&self.definition);
        let Some(step) = definition.step(self.current) else {
            return Vec::new();
        };

        let mut started = Vec::new();
        for action in step
            .actions()
            .iter()
            .filter(|a| a.trigger() == Trigger::OnEntry)
        {
            let field = action.field();
            if !self.form.is_empty(field) || self.tracker.is_in_flight(field) {
                continue;
            }
            if self.start(action).is_some() {
                started.push(field.to_string());
            }
        }
        started
    }

    fn start(&mut self, action: &StepAction) -> Option<Ticket> {
        let field = action.field();
        let Some(job) = action.generator().prepare(&self.form) else {
            debug!(field, "Generation inputs incomplete");
            return None;
        };

        let ticket = self.tracker.begin(field);
        self.errors.remove(field);
        debug!(field, sequence = ticket.sequence(), "Generation started");

        let tx = self.completions_tx.clone();
        let task_ticket = ticket.clone();
        self.runtime.spawn(async move {
            // A panicking job still completes its ticket
            let result = AssertUnwindSafe(job)
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(WorkflowError::Panicked(panic_message(&*payload))));
            // Receiver is gone once the wizard is dropped
            let _ = tx.send(Completion {
                ticket: task_ticket,
                result,
            });
        });
        Some(ticket)
    }

    fn edited(&mut self, field: &str) {
        if self.tracker.is_in_flight(field) {
            debug!(field, "Edit supersedes running generation");
        }
        self.tracker.edit(field);
        self.errors.remove(field);
        self.document = None;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

impl std::fmt::Debug for WorkflowMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowMachine")
            .field("workflow", &self.definition.name())
            .field("current", &self.current)
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}

fn wrong_kind(field: &str, expected: &'static str, actual: &FieldValue) -> WorkflowError {
    WorkflowError::WrongKind {
        field: field.to_string(),
        expected,
        actual: actual.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::BlockKind;
    use crate::document::{DocumentLayout, Source};
    use crate::generators::{ComputedGenerator, FieldGenerator, GenerationJob};
    use crate::step::{Gate, StepAction};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::sync::oneshot;

    /// Generator whose jobs complete when the test releases them
    #[derive(Default)]
    struct LatchGenerator {
        latches: Mutex<VecDeque<oneshot::Receiver<Result<FieldValue, WorkflowError>>>>,
    }

    impl LatchGenerator {
        fn latch(&self) -> oneshot::Sender<Result<FieldValue, WorkflowError>> {
            let (tx, rx) = oneshot::channel();
            self.latches.lock().push_back(rx);
            tx
        }
    }

    impl FieldGenerator for Arc<LatchGenerator> {
        fn prepare(&self, _form: &FormState) -> Option<GenerationJob> {
            let rx = self.latches.lock().pop_front()?;
            Some(Box::pin(async move {
                rx.await
                    .unwrap_or_else(|_| Err(WorkflowError::MissingInputs("latch".to_string())))
            }))
        }
    }

    fn definition(summary: Arc<LatchGenerator>) -> Arc<WorkflowDefinition> {
        let definition = WorkflowDefinition::new(
            "test",
            vec![
                StepSpec::new(1, "名称").with_gate(Gate::filled(&["name"])),
                StepSpec::new(2, "摘要")
                    .with_gate(Gate::filled(&["summary"]))
                    .with_action(StepAction::on_entry("summary", summary)),
                StepSpec::new(3, "正文")
                    .with_gate(Gate::filled(&["body"]))
                    .with_action(StepAction::manual(
                        "title",
                        ComputedGenerator::new(|form| {
                            let name = form.text("name");
                            (!name.is_empty()).then(|| FieldValue::from(format!("《{name}》")))
                        }),
                    )),
                StepSpec::new(4, "文档"),
            ],
            DocumentLayout::new("文档")
                .with_section("一", vec![Source::line("名称", "name")])
                .with_section("二", vec![Source::Paragraph("summary")]),
        )
        .unwrap();
        Arc::new(definition)
    }

    fn form() -> FormState {
        FormState::new()
            .with("name", "")
            .with("summary", "")
            .with("title", "")
            .with("body", ContentBlocks::new())
    }

    fn machine() -> (WorkflowMachine, Arc<LatchGenerator>) {
        let latch = Arc::new(LatchGenerator::default());
        let machine = WorkflowMachine::new(definition(latch.clone()), form()).unwrap();
        (machine, latch)
    }

    /// Generator whose jobs panic while running
    struct PanickingGenerator;

    impl FieldGenerator for PanickingGenerator {
        fn prepare(&self, _form: &FormState) -> Option<GenerationJob> {
            Some(Box::pin(async {
                let value: Option<FieldValue> = None;
                Ok::<_, WorkflowError>(value.expect("search backend crashed"))
            }))
        }
    }

    #[tokio::test]
    async fn panicking_generation_fails_the_field() {
        let definition = WorkflowDefinition::new(
            "panic",
            vec![
                StepSpec::new(1, "名称").with_gate(Gate::filled(&["name"])),
                StepSpec::new(2, "检索")
                    .with_action(StepAction::on_entry("summary", PanickingGenerator)),
            ],
            DocumentLayout::new("文档"),
        )
        .unwrap();
        let mut machine = WorkflowMachine::new(Arc::new(definition), form()).unwrap();
        machine.set("name", "存证方法").unwrap();

        assert!(machine.next().moved());
        let merges = tokio::time::timeout(std::time::Duration::from_secs(3), machine.settle())
            .await
            .expect("settle must not hang on a panicked job");
        assert!(matches!(
            merges.as_slice(),
            [Merge::Failed { field, .. }] if field == "summary"
        ));
        assert!(!machine.is_generating("summary"));
        assert!(machine
            .generation_error("summary")
            .unwrap()
            .contains("search backend crashed"));

        // The field is no longer in flight, so re-entry starts it again
        machine.back();
        assert_eq!(
            machine.next(),
            Transition::Advanced {
                from: 1,
                to: 2,
                started: vec!["summary".to_string()]
            }
        );
        let merges = tokio::time::timeout(std::time::Duration::from_secs(3), machine.settle())
            .await
            .unwrap();
        assert_eq!(merges.len(), 1);
    }

    #[tokio::test]
    async fn gate_blocks_advance() {
        let (mut machine, _) = machine();

        assert_eq!(
            machine.next(),
            Transition::Rejected {
                step: 1,
                unmet: vec!["name"]
            }
        );
        assert_eq!(machine.current_step(), 1);
        assert_eq!(machine.back(), Transition::AtStart);
    }

    #[tokio::test]
    async fn entry_generation_merges_without_blocking() {
        let (mut machine, latch) = machine();
        let release = latch.latch();
        machine.set("name", "存证方法").unwrap();

        let transition = machine.next();
        assert_eq!(
            transition,
            Transition::Advanced {
                from: 1,
                to: 2,
                started: vec!["summary".to_string()]
            }
        );
        assert!(machine.is_generating("summary"));
        assert!(machine.next().is_rejected());

        // Navigation is independent of the running generation
        assert!(machine.back().moved());
        release.send(Ok(FieldValue::from("摘要内容"))).unwrap();
        assert_eq!(
            machine.settle().await,
            vec![Merge::Applied {
                field: "summary".to_string()
            }]
        );
        assert_eq!(machine.form().text("summary"), "摘要内容");
        assert_eq!(machine.current_step(), 1);
    }

    #[tokio::test]
    async fn reentry_does_not_restart_filled_or_running_fields() {
        let (mut machine, latch) = machine();
        let _release = latch.latch();
        machine.set("name", "存证方法").unwrap();

        machine.next();
        machine.back();
        // Still running, so entry does not start a second generation
        let Transition::Advanced { started, .. } = machine.next() else {
            panic!("expected advance");
        };
        assert!(started.is_empty());

        machine.set("summary", "手写摘要").unwrap();
        machine.back();
        let Transition::Advanced { started, .. } = machine.next() else {
            panic!("expected advance");
        };
        assert!(started.is_empty());
    }

    #[tokio::test]
    async fn last_started_generation_wins() {
        let (mut machine, latch) = machine();
        machine.set("name", "存证方法").unwrap();
        let first = latch.latch();
        let second = latch.latch();

        let first_ticket = machine.regenerate("summary").unwrap();
        let second_ticket = machine.regenerate("summary").unwrap();
        assert!(first_ticket.sequence() < second_ticket.sequence());

        second.send(Ok(FieldValue::from("第二次"))).unwrap();
        assert_eq!(
            machine.next_merge().await,
            Some(Merge::Applied {
                field: "summary".to_string()
            })
        );

        // The older generation finishes late and must not overwrite
        first.send(Ok(FieldValue::from("第一次"))).unwrap();
        let completion = machine.completions.recv().await.unwrap();
        assert_eq!(
            machine.apply(completion),
            Merge::Discarded {
                field: "summary".to_string()
            }
        );
        assert_eq!(machine.form().text("summary"), "第二次");
    }

    #[tokio::test]
    async fn edit_supersedes_running_generation() {
        let (mut machine, latch) = machine();
        machine.set("name", "存证方法").unwrap();
        let release = latch.latch();
        machine.regenerate("summary").unwrap();

        machine.set("summary", "用户输入").unwrap();
        assert!(!machine.is_generating("summary"));
        assert!(machine.settle().await.is_empty());

        release.send(Ok(FieldValue::from("模型输出"))).unwrap();
        let completion = machine.completions.recv().await.unwrap();
        assert_eq!(
            machine.apply(completion),
            Merge::Discarded {
                field: "summary".to_string()
            }
        );
        assert_eq!(machine.form().text("summary"), "用户输入");
    }

    #[tokio::test]
    async fn failed_generation_keeps_value_and_records_error() {
        let (mut machine, latch) = machine();
        machine.set("name", "存证方法").unwrap();
        machine.set("summary", "旧摘要").unwrap();
        let release = latch.latch();
        machine.regenerate("summary").unwrap();

        release
            .send(Err(WorkflowError::MissingInputs("summary".to_string())))
            .unwrap();
        let merges = machine.settle().await;
        assert!(matches!(&merges[..], [Merge::Failed { field, .. }] if field == "summary"));
        assert_eq!(machine.form().text("summary"), "旧摘要");
        assert!(machine.generation_error("summary").is_some());
    }

    #[tokio::test]
    async fn regenerate_errors() {
        let (mut machine, _) = machine();

        assert!(matches!(
            machine.regenerate("body"),
            Err(WorkflowError::NoGenerator(_))
        ));
        assert!(matches!(
            machine.regenerate("title"),
            Err(WorkflowError::MissingInputs(_))
        ));

        machine.set("name", "存证方法").unwrap();
        machine.regenerate("title").unwrap();
        machine.settle().await;
        assert_eq!(machine.form().text("title"), "《存证方法》");
    }

    #[tokio::test]
    async fn edits_validate_field_kind() {
        let (mut machine, _) = machine();

        assert!(matches!(
            machine.set("unknown", "x"),
            Err(WorkflowError::UnknownField(_))
        ));
        assert!(matches!(
            machine.set("name", true),
            Err(WorkflowError::WrongKind { .. })
        ));
        assert!(matches!(
            machine.update_list("name", |_| {}),
            Err(WorkflowError::WrongKind { .. })
        ));
    }

    #[tokio::test]
    async fn failed_block_edit_leaves_blocks_unchanged() {
        let (mut machine, _) = machine();
        let id = machine
            .update_blocks("body", |blocks| Ok(blocks.add(BlockKind::Image)))
            .unwrap();
        assert_eq!(machine.form().blocks("body").unwrap().len(), 2);

        let result = machine.update_blocks("body", |blocks| {
            blocks.remove(&id)?;
            blocks.update("missing", "x")
        });
        assert!(matches!(result, Err(WorkflowError::Block(_))));
        assert_eq!(machine.form().blocks("body").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn document_only_on_terminal_step() {
        let (mut machine, latch) = machine();
        assert_eq!(
            machine.generate_document(),
            Transition::NotAtTerminal { step: 1 }
        );

        machine.set("name", "存证方法").unwrap();
        let release = latch.latch();
        machine.next();
        release.send(Ok(FieldValue::from("摘要"))).unwrap();
        machine.settle().await;
        machine.next();
        machine
            .update_blocks("body", |blocks| {
                let id = blocks.iter().next().map(|b| b.id.clone()).unwrap_or_default();
                blocks.update(&id, "正文")
            })
            .unwrap();
        assert!(machine.next().moved());
        assert_eq!(machine.next(), Transition::AtTerminal);

        assert_eq!(machine.generate_document(), Transition::DocumentReady);
        let document = machine.document().unwrap();
        assert_eq!(document.sections[1].entries.len(), 1);

        // Clearing an earlier field invalidates the document and blocks a new one
        machine.set("name", "").unwrap();
        assert!(machine.document().is_none());
        assert_eq!(
            machine.generate_document(),
            Transition::Rejected {
                step: 1,
                unmet: vec!["name"]
            }
        );
    }

    #[tokio::test]
    async fn state_snapshot_serializes() {
        let (mut machine, latch) = machine();
        let _release = latch.latch();
        machine.set("name", "存证方法").unwrap();
        machine.next();

        let state = machine.state();
        assert_eq!(state.current_step, 2);
        assert_eq!(state.generating, vec!["summary".to_string()]);

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["currentStep"], 2);
        assert_eq!(json["label"], "摘要");
        assert_eq!(json["form"]["name"]["value"], "存证方法");
    }

    #[test]
    fn requires_runtime() {
        let latch = Arc::new(LatchGenerator::default());
        assert!(matches!(
            WorkflowMachine::new(definition(latch), form()),
            Err(WorkflowError::NoRuntime)
        ));
    }

    #[tokio::test]
    async fn action_fields_must_be_declared() {
        let latch = Arc::new(LatchGenerator::default());
        let result = WorkflowMachine::new(definition(latch), FormState::new().with("name", ""));
        assert!(matches!(result, Err(WorkflowError::UnknownField(_))));
    }
}
