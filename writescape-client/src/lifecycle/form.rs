//! Per-field and per-form submission bookkeeping.

/// One form input and its validation state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftField {
    /// Current text.
    pub value: String,
    /// Whether a rule currently fails.
    pub has_errors: bool,
    /// Message of the failing rule, empty when valid.
    pub message: String,
    /// Last value the backend confirmed; only used by edit forms.
    pub prev_saved_value: String,
}

impl DraftField {
    /// A field holding `value`, with `value` also recorded as the saved baseline.
    #[must_use]
    pub fn saved(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            prev_saved_value: value.clone(),
            value,
            ..Self::default()
        }
    }

    /// Replaces the value and clears any previous error.
    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.clear_error();
    }

    /// Marks the field invalid.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.has_errors = true;
        self.message = message.into();
    }

    /// Marks the field valid.
    pub fn clear_error(&mut self) {
        self.has_errors = false;
        self.message.clear();
    }

    /// Runs the "must not be blank" rule.
    pub fn require(&mut self, message: &str) {
        if self.value.trim().is_empty() {
            self.set_error(message);
        }
    }

    /// Whether the value differs from the saved baseline.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.value != self.prev_saved_value
    }

    /// Records the current value as the backend-confirmed baseline.
    pub fn mark_saved(&mut self) {
        self.prev_saved_value.clone_from(&self.value);
    }
}

/// Where a form is in its submit cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmissionPhase {
    /// Nothing submitted yet, or edited since the last result.
    #[default]
    Idle,
    /// Rules are running.
    Validating,
    /// A rule failed; no request was issued.
    Invalid,
    /// The request is in flight.
    Submitting,
    /// The backend accepted the submission.
    Settled,
    /// The request failed; the entered values are kept.
    Failed,
}

impl SubmissionPhase {
    /// Whether a new submit may start.
    #[must_use]
    pub const fn accepts_submit(self) -> bool {
        !matches!(self, Self::Validating | Self::Submitting)
    }
}
