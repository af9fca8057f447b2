//! Pipeline state machine.
//!
//! The machine is the only owner of pipeline state. A run first claims a
//! token with [`PipelineMachine::reserve`], shows its file with
//! [`PipelineMachine::start`], then moves through
//! [`PipelineMachine::apply`], which rejects transitions from superseded
//! runs and transitions the stage graph does not allow.

use std::fmt;

use thiserror::Error;

/// Identifies one pipeline run. Only the newest token may commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunToken(u64);

impl RunToken {
    pub fn generation(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run #{}", self.0)
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    /// Stage the run was in when it failed.
    pub during: PipelineStage,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PipelineStage {
    #[default]
    Idle,
    FileSelected,
    Validating,
    Preprocessing,
    FetchingIntermediate,
    Generating,
    Rendered,
    Failed(Box<FailureReport>),
}

impl PipelineStage {
    pub fn label(&self) -> &'static str {
        match self {
            PipelineStage::Idle => "Waiting for an image",
            PipelineStage::FileSelected => "Image selected",
            PipelineStage::Validating => "Checking image",
            PipelineStage::Preprocessing => "Removing background",
            PipelineStage::FetchingIntermediate => "Downloading processed image",
            PipelineStage::Generating => "Generating 3D model",
            PipelineStage::Rendered => "Model ready",
            PipelineStage::Failed(_) => "Failed",
        }
    }
}

/// Defined moves through the stage graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// FileSelected → Validating
    StartValidation,
    /// Validating → Preprocessing
    Validated,
    /// Preprocessing → FetchingIntermediate
    Preprocessed { processed_url: String },
    /// FetchingIntermediate → Generating
    IntermediateFetched,
    /// Generating → Rendered
    Generated { asset_url: String },
    /// Any non-idle stage → Failed
    Fail { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("{token} was superseded by run #{current}")]
    Stale { token: RunToken, current: u64 },

    #[error("cannot apply {transition} while {from:?}")]
    Invalid {
        from: PipelineStage,
        transition: &'static str,
    },
}

impl Transition {
    fn name(&self) -> &'static str {
        match self {
            Transition::StartValidation => "StartValidation",
            Transition::Validated => "Validated",
            Transition::Preprocessed { .. } => "Preprocessed",
            Transition::IntermediateFetched => "IntermediateFetched",
            Transition::Generated { .. } => "Generated",
            Transition::Fail { .. } => "Fail",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineMachine {
    generation: u64,
    stage: PipelineStage,
    file_name: Option<String>,
    processed_url: Option<String>,
    asset_url: Option<String>,
}

impl Default for PipelineMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMachine {
    pub fn new() -> Self {
        Self {
            generation: 0,
            stage: PipelineStage::Idle,
            file_name: None,
            processed_url: None,
            asset_url: None,
        }
    }

    /// Claim the token for the next run. Earlier runs become stale at once;
    /// what is shown does not change until [`PipelineMachine::start`].
    pub fn reserve(&mut self) -> RunToken {
        self.invalidate();
        self.current_token()
    }

    /// Show `file_name` as the selection of the reserved run `token`.
    pub fn start(&mut self, token: RunToken, file_name: impl Into<String>) -> Result<(), TransitionError> {
        if !self.is_current(token) {
            return Err(TransitionError::Stale {
                token,
                current: self.generation,
            });
        }
        self.stage = PipelineStage::FileSelected;
        self.file_name = Some(file_name.into());
        self.processed_url = None;
        self.asset_url = None;
        Ok(())
    }

    /// Make every outstanding token stale without changing what is shown.
    pub fn invalidate(&mut self) {
        self.generation += 1;
    }

    pub fn current_token(&self) -> RunToken {
        RunToken(self.generation)
    }

    pub fn is_current(&self, token: RunToken) -> bool {
        token.0 == self.generation
    }

    pub fn apply(&mut self, token: RunToken, transition: Transition) -> Result<&PipelineStage, TransitionError> {
        if !self.is_current(token) {
            return Err(TransitionError::Stale {
                token,
                current: self.generation,
            });
        }

        let invalid = |from: &PipelineStage, transition: &Transition| TransitionError::Invalid {
            from: from.clone(),
            transition: transition.name(),
        };

        let next = match (&self.stage, &transition) {
            (PipelineStage::FileSelected, Transition::StartValidation) => PipelineStage::Validating,
            (PipelineStage::Validating, Transition::Validated) => PipelineStage::Preprocessing,
            (PipelineStage::Preprocessing, Transition::Preprocessed { processed_url }) => {
                self.processed_url = Some(processed_url.clone());
                PipelineStage::FetchingIntermediate
            }
            (PipelineStage::FetchingIntermediate, Transition::IntermediateFetched) => PipelineStage::Generating,
            (PipelineStage::Generating, Transition::Generated { asset_url }) => {
                self.asset_url = Some(asset_url.clone());
                PipelineStage::Rendered
            }
            (PipelineStage::Idle | PipelineStage::Failed(_), Transition::Fail { .. }) => {
                return Err(invalid(&self.stage, &transition));
            }
            (_, Transition::Fail { message }) => {
                // A model that fails to load is no longer displayed.
                if self.stage == PipelineStage::Rendered {
                    self.asset_url = None;
                }
                PipelineStage::Failed(Box::new(FailureReport {
                    during: self.stage.clone(),
                    message: message.clone(),
                }))
            }
            (from, transition) => return Err(invalid(from, transition)),
        };

        self.stage = next;
        Ok(&self.stage)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stage(&self) -> &PipelineStage {
        &self.stage
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn processed_url(&self) -> Option<&str> {
        self.processed_url.as_deref()
    }

    pub fn asset_url(&self) -> Option<&str> {
        self.asset_url.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn begin(machine: &mut PipelineMachine, file_name: &str) -> RunToken {
        let token = machine.reserve();
        machine.start(token, file_name).unwrap();
        token
    }

    fn run_to_rendered(machine: &mut PipelineMachine) -> RunToken {
        let token = begin(machine, "cat.png");
        machine.apply(token, Transition::StartValidation).unwrap();
        machine.apply(token, Transition::Validated).unwrap();
        machine
            .apply(
                token,
                Transition::Preprocessed {
                    processed_url: "X".to_string(),
                },
            )
            .unwrap();
        machine.apply(token, Transition::IntermediateFetched).unwrap();
        machine
            .apply(
                token,
                Transition::Generated {
                    asset_url: "Y".to_string(),
                },
            )
            .unwrap();
        token
    }

    #[test]
    fn test_happy_path_reaches_rendered() {
        let mut machine = PipelineMachine::new();
        run_to_rendered(&mut machine);
        assert_eq!(machine.stage(), &PipelineStage::Rendered);
        assert_eq!(machine.processed_url(), Some("X"));
        assert_eq!(machine.asset_url(), Some("Y"));
        assert_eq!(machine.file_name(), Some("cat.png"));
    }

    #[test]
    fn test_stages_cannot_be_skipped() {
        let mut machine = PipelineMachine::new();
        let token = begin(&mut machine, "cat.png");

        let err = machine.apply(token, Transition::Validated).unwrap_err();
        assert!(matches!(err, TransitionError::Invalid { transition: "Validated", .. }));

        machine.apply(token, Transition::StartValidation).unwrap();
        let err = machine
            .apply(
                token,
                Transition::Generated {
                    asset_url: "Y".to_string(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, TransitionError::Invalid { .. }));
        assert_eq!(machine.stage(), &PipelineStage::Validating);
        assert_eq!(machine.asset_url(), None);
    }

    #[test]
    fn test_stale_token_cannot_commit() {
        let mut machine = PipelineMachine::new();
        let first = begin(&mut machine, "a.png");
        let second = begin(&mut machine, "b.png");

        let err = machine.apply(first, Transition::StartValidation).unwrap_err();
        assert_eq!(
            err,
            TransitionError::Stale {
                token: first,
                current: 2
            }
        );
        assert!(machine.apply(second, Transition::StartValidation).is_ok());
        assert_eq!(machine.file_name(), Some("b.png"));
    }

    #[test]
    fn test_fail_records_stage() {
        let mut machine = PipelineMachine::new();
        let token = begin(&mut machine, "cat.png");
        machine.apply(token, Transition::StartValidation).unwrap();
        machine
            .apply(
                token,
                Transition::Fail {
                    message: "not an image".to_string(),
                },
            )
            .unwrap();

        match machine.stage() {
            PipelineStage::Failed(report) => {
                assert_eq!(report.during, PipelineStage::Validating);
                assert_eq!(report.message, "not an image");
            }
            other => panic!("expected Failed, got {:?}", other),
        }

        // Failed is terminal until a new selection.
        let again = machine.apply(
            token,
            Transition::Fail {
                message: "twice".to_string(),
            },
        );
        assert!(again.is_err());
        let next = begin(&mut machine, "dog.png");
        assert_eq!(machine.stage(), &PipelineStage::FileSelected);
        assert_eq!(next.generation(), 2);
    }

    #[test]
    fn test_idle_cannot_fail() {
        let mut machine = PipelineMachine::new();
        machine.invalidate();
        let token = machine.current_token();
        let err = machine
            .apply(
                token,
                Transition::Fail {
                    message: "boom".to_string(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, TransitionError::Invalid { .. }));
    }

    #[test]
    fn test_rendered_model_failure_clears_asset() {
        let mut machine = PipelineMachine::new();
        let token = run_to_rendered(&mut machine);
        machine
            .apply(
                token,
                Transition::Fail {
                    message: "bad glb".to_string(),
                },
            )
            .unwrap();
        assert_eq!(machine.asset_url(), None);
        assert_eq!(machine.processed_url(), Some("X"));
    }

    #[test]
    fn test_reservation_order_decides_which_run_is_current() {
        let mut machine = PipelineMachine::new();
        let older = machine.reserve();
        let newer = machine.reserve();

        machine.start(newer, "b.png").unwrap();
        let err = machine.start(older, "a.png").unwrap_err();
        assert_eq!(
            err,
            TransitionError::Stale {
                token: older,
                current: 2
            }
        );
        assert_eq!(machine.file_name(), Some("b.png"));
        assert_eq!(machine.stage(), &PipelineStage::FileSelected);
    }

    #[test]
    fn test_reserve_leaves_shown_run_untouched() {
        let mut machine = PipelineMachine::new();
        let shown = run_to_rendered(&mut machine);
        let next = machine.reserve();

        assert!(!machine.is_current(shown));
        assert!(machine.is_current(next));
        assert_eq!(machine.stage(), &PipelineStage::Rendered);
        assert_eq!(machine.asset_url(), Some("Y"));
    }

    #[test]
    fn test_invalidate_keeps_display_state() {
        let mut machine = PipelineMachine::new();
        let token = run_to_rendered(&mut machine);
        machine.invalidate();
        assert!(!machine.is_current(token));
        assert_eq!(machine.stage(), &PipelineStage::Rendered);
    }
}
