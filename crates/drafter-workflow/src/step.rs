//! Declarative wizard steps
//!
//! A [`WorkflowDefinition`] is an ordered list of [`StepSpec`]s with
//! contiguous 1-based positions. Each step carries:
//! - A label
//! - A [`Gate`] that must hold before advancing past the step
//! - Generation actions that fill fields on entry or on demand

use crate::document::DocumentLayout;
use crate::error::WorkflowError;
use crate::form::FormState;
use crate::generators::FieldGenerator;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Condition on one form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Field holds non-blank content (text, list, records or blocks)
    Filled(&'static str),
    /// Text field equals one of the allowed values
    OneOf(&'static str, &'static [&'static str]),
}

impl Requirement {
    /// Field the requirement applies to
    #[inline]
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::Filled(field) | Self::OneOf(field, _) => field,
        }
    }

    /// Check the requirement
    #[must_use]
    pub fn holds(&self, form: &FormState) -> bool {
        match self {
            Self::Filled(field) => !form.is_empty(field),
            Self::OneOf(field, allowed) => {
                let value = form.text(field).trim();
                allowed.iter().any(|a| *a == value)
            }
        }
    }
}

/// Validation predicate gating advancement past a step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gate {
    requirements: Vec<Requirement>,
}

impl Gate {
    /// Gate that always holds
    #[inline]
    #[must_use]
    pub fn open() -> Self {
        Self::default()
    }

    /// Gate requiring all listed fields to be filled
    #[must_use]
    pub fn filled(fields: &[&'static str]) -> Self {
        Self {
            requirements: fields.iter().copied().map(Requirement::Filled).collect(),
        }
    }

    /// With requirement
    #[must_use]
    pub fn with(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Fields whose requirement does not hold, in declaration order
    #[must_use]
    pub fn unmet(&self, form: &FormState) -> Vec<&'static str> {
        self.requirements
            .iter()
            .filter(|r| !r.holds(form))
            .map(Requirement::field)
            .collect()
    }

    /// Check the gate
    #[inline]
    #[must_use]
    pub fn passes(&self, form: &FormState) -> bool {
        self.requirements.iter().all(|r| r.holds(form))
    }

    /// Requirements in declaration order
    #[inline]
    #[must_use]
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }
}

/// When a generation action runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// On step entry, when the target field is empty, and on demand
    OnEntry,
    /// Only on demand
    Manual,
}

/// Generation filling one field
#[derive(Clone)]
pub struct StepAction {
    field: &'static str,
    trigger: Trigger,
    generator: Arc<dyn FieldGenerator>,
}

impl StepAction {
    /// Create action run on step entry
    #[must_use]
    pub fn on_entry(field: &'static str, generator: impl FieldGenerator + 'static) -> Self {
        Self {
            field,
            trigger: Trigger::OnEntry,
            generator: Arc::new(generator),
        }
    }

    /// Create action run only on demand
    #[must_use]
    pub fn manual(field: &'static str, generator: impl FieldGenerator + 'static) -> Self {
        Self {
            field,
            trigger: Trigger::Manual,
            generator: Arc::new(generator),
        }
    }

    /// Target field
    #[inline]
    #[must_use]
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// Trigger
    #[inline]
    #[must_use]
    pub fn trigger(&self) -> Trigger {
        self.trigger
    }

    /// Generator
    #[inline]
    #[must_use]
    pub fn generator(&self) -> &Arc<dyn FieldGenerator> {
        &self.generator
    }
}

impl fmt::Debug for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepAction")
            .field("field", &self.field)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

/// One wizard step
#[derive(Debug, Clone)]
pub struct StepSpec {
    position: usize,
    label: &'static str,
    gate: Gate,
    actions: Vec<StepAction>,
}

impl StepSpec {
    /// Create step with an open gate and no actions
    #[must_use]
    pub fn new(position: usize, label: &'static str) -> Self {
        Self {
            position,
            label,
            gate: Gate::open(),
            actions: Vec::new(),
        }
    }

    /// With gate
    #[must_use]
    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = gate;
        self
    }

    /// With generation action
    #[must_use]
    pub fn with_action(mut self, action: StepAction) -> Self {
        self.actions.push(action);
        self
    }

    /// 1-based position
    #[inline]
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Human label
    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Gate
    #[inline]
    #[must_use]
    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    /// Generation actions
    #[inline]
    #[must_use]
    pub fn actions(&self) -> &[StepAction] {
        &self.actions
    }
}

/// Ordered wizard steps and the layout of the final document
#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    name: &'static str,
    steps: Vec<StepSpec>,
    layout: DocumentLayout,
}

impl WorkflowDefinition {
    /// Create definition
    ///
    /// # Errors
    /// - `WorkflowError::InvalidDefinition` if there are no steps, positions
    ///   are not `1..=N` in order, or two actions target the same field
    pub fn new(
        name: &'static str,
        steps: Vec<StepSpec>,
        layout: DocumentLayout,
    ) -> Result<Self, WorkflowError> {
        if steps.is_empty() {
            return Err(WorkflowError::InvalidDefinition(format!(
                "workflow `{name}` has no steps"
            )));
        }
        for (index, step) in steps.iter().enumerate() {
            if step.position != index + 1 {
                return Err(WorkflowError::InvalidDefinition(format!(
                    "step `{}` has position {}, expected {}",
                    step.label,
                    step.position,
                    index + 1
                )));
            }
        }

        let mut targets = BTreeSet::new();
        for action in steps.iter().flat_map(|s| s.actions.iter()) {
            if !targets.insert(action.field) {
                return Err(WorkflowError::InvalidDefinition(format!(
                    "field `{}` is generated by more than one action",
                    action.field
                )));
            }
        }

        Ok(Self {
            name,
            steps,
            layout,
        })
    }

    /// Workflow name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Steps in order
    #[inline]
    #[must_use]
    pub fn steps(&self) -> &[StepSpec] {
        &self.steps
    }

    /// Position of the terminal step
    #[inline]
    #[must_use]
    pub fn terminal(&self) -> usize {
        self.steps.len()
    }

    /// Step at a 1-based position
    #[must_use]
    pub fn step(&self, position: usize) -> Option<&StepSpec> {
        position.checked_sub(1).and_then(|i| self.steps.get(i))
    }

    /// Document layout
    #[inline]
    #[must_use]
    pub fn layout(&self) -> &DocumentLayout {
        &self.layout
    }

    /// Action generating a field, with the position of its step
    #[must_use]
    pub fn action_for(&self, field: &str) -> Option<(usize, &StepAction)> {
        self.steps.iter().find_map(|step| {
            step.actions
                .iter()
                .find(|a| a.field == field)
                .map(|a| (step.position, a))
        })
    }
}
