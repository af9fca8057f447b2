//! Sequences one photo through validation, preprocessing, the intermediate
//! download and generation.
//!
//! Runs are never cancelled. A newer selection makes older runs stale and
//! every commit checks the run token, so a slow superseded run can finish its
//! remote calls but cannot touch what the widget shows.

use std::cell::RefCell;

use tracing::{error, info, warn};

use super::state::{PipelineMachine, PipelineStage, RunToken, Transition, TransitionError};
use crate::config::RunOptions;
use crate::display::{DisplayRegistry, ObjectUrlBackend, Slot};
use crate::error::PipelineError;
use crate::media::ImageBlob;
use crate::remote::{Connector, Fetcher, InferenceClient};

/// Everything the widget renders, taken after each commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSnapshot {
    pub generation: u64,
    pub stage: PipelineStage,
    pub file_name: Option<String>,
    pub original_src: Option<String>,
    pub processed_src: Option<String>,
    pub asset_url: Option<String>,
}

impl PipelineSnapshot {
    pub fn failure(&self) -> Option<&str> {
        match &self.stage {
            PipelineStage::Failed(report) => Some(report.message.as_str()),
            _ => None,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Rendered { asset_url: String },
    Failed(PipelineError),
    /// A newer selection took over; this run's results were discarded.
    Superseded,
}

enum Halt {
    Failed(PipelineError),
    Superseded,
}

impl From<PipelineError> for Halt {
    fn from(err: PipelineError) -> Self {
        Halt::Failed(err)
    }
}

type Observer = Box<dyn Fn(&PipelineSnapshot)>;

pub struct Pipeline<C: Connector, F: Fetcher, B: ObjectUrlBackend> {
    client: InferenceClient<C>,
    fetcher: F,
    options: RunOptions,
    machine: RefCell<PipelineMachine>,
    display: RefCell<DisplayRegistry<B>>,
    observer: Option<Observer>,
}

impl<C: Connector, F: Fetcher, B: ObjectUrlBackend> Pipeline<C, F, B> {
    pub fn new(client: InferenceClient<C>, fetcher: F, urls: B, options: RunOptions) -> Self {
        Self {
            client,
            fetcher,
            options,
            machine: RefCell::new(PipelineMachine::new()),
            display: RefCell::new(DisplayRegistry::new(urls)),
            observer: None,
        }
    }

    /// Call `observer` with a fresh snapshot after every state change.
    pub fn on_change(mut self, observer: impl Fn(&PipelineSnapshot) + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        let machine = self.machine.borrow();
        let display = self.display.borrow();
        PipelineSnapshot {
            generation: machine.generation(),
            stage: machine.stage().clone(),
            file_name: machine.file_name().map(str::to_string),
            original_src: display.src(Slot::Original).map(str::to_string),
            processed_src: display.src(Slot::Processed).map(str::to_string),
            asset_url: machine.asset_url().map(str::to_string),
        }
    }

    fn notify(&self) {
        if let Some(observer) = &self.observer {
            observer(&self.snapshot());
        }
    }

    /// Claim the next run. Call this when the user picks a file, before its
    /// bytes are read: runs picked earlier become stale even if their reads
    /// finish later.
    pub fn reserve(&self) -> RunToken {
        let token = self.machine.borrow_mut().reserve();
        info!("{}: reserved", token);
        token
    }

    /// Show the selected file for the reserved run `token`. The original
    /// image is displayed right away; the processed pane is cleared. Returns
    /// false if a newer pick took over.
    fn select(&self, token: RunToken, upload: &ImageBlob) -> bool {
        if let Err(e) = self.machine.borrow_mut().start(token, upload.name()) {
            info!("{}", e);
            return false;
        }
        {
            let mut display = self.display.borrow_mut();
            display.clear(Slot::Processed);
            if let Err(e) = display.show_blob(Slot::Original, upload) {
                warn!("{}: {}", token, e);
            }
        }
        info!("{}: selected {:?}", token, upload);
        self.notify();
        true
    }

    /// Select `upload` and run it through the whole pipeline.
    pub async fn process(&self, upload: ImageBlob) -> RunOutcome {
        let token = self.reserve();
        self.process_reserved(token, upload).await
    }

    /// Run `upload` under a token from [`Pipeline::reserve`].
    pub async fn process_reserved(&self, token: RunToken, upload: ImageBlob) -> RunOutcome {
        if !self.select(token, &upload) {
            return RunOutcome::Superseded;
        }
        self.run(token, upload).await
    }

    /// The picked file `file_name` could not be read. Shows the failure
    /// unless a newer pick took over.
    pub fn reject(&self, token: RunToken, file_name: &str, err: PipelineError) -> RunOutcome {
        if let Err(e) = self.machine.borrow_mut().start(token, file_name) {
            info!("{}", e);
            return RunOutcome::Superseded;
        }
        {
            let mut display = self.display.borrow_mut();
            display.clear(Slot::Original);
            display.clear(Slot::Processed);
        }
        self.fail(token, err)
    }

    async fn run(&self, token: RunToken, upload: ImageBlob) -> RunOutcome {
        match self.execute(token, &upload).await {
            Ok(asset_url) => {
                info!("{}: model ready at {}", token, asset_url);
                RunOutcome::Rendered { asset_url }
            }
            Err(Halt::Superseded) => {
                info!("{}: superseded, discarding results", token);
                RunOutcome::Superseded
            }
            Err(Halt::Failed(err)) => self.fail(token, err),
        }
    }

    fn fail(&self, token: RunToken, err: PipelineError) -> RunOutcome {
        error!("{}: error processing image: {}", token, err);
        match self.commit(
            token,
            Transition::Fail {
                message: err.to_string(),
            },
        ) {
            Ok(()) => RunOutcome::Failed(err),
            Err(_) => RunOutcome::Superseded,
        }
    }

    async fn execute(&self, token: RunToken, upload: &ImageBlob) -> Result<String, Halt> {
        self.commit(token, Transition::StartValidation)?;
        let ack = self.client.check_input_image(upload).await?;
        info!("{}: image accepted ({} outputs)", token, ack.outputs);

        self.commit(token, Transition::Validated)?;
        let processed = self.client.preprocess(upload, &self.options.preprocess).await?;

        self.commit(
            token,
            Transition::Preprocessed {
                processed_url: processed.url.clone(),
            },
        )?;
        let intermediate = self
            .fetcher
            .fetch_blob(&processed.url)
            .await
            .map_err(|e| {
                error!("Error fetching image as blob: {}", e);
                PipelineError::Fetch(e)
            })?;

        self.commit(token, Transition::IntermediateFetched)?;
        let asset = self
            .client
            .generate(&intermediate, self.options.resolution)
            .await?;

        self.commit(
            token,
            Transition::Generated {
                asset_url: asset.url.clone(),
            },
        )?;
        Ok(asset.url)
    }

    /// Apply `transition` if `token` is still current, then publish.
    fn commit(&self, token: RunToken, transition: Transition) -> Result<(), Halt> {
        let processed_url = match &transition {
            Transition::Preprocessed { processed_url } => Some(processed_url.clone()),
            _ => None,
        };

        let applied = self.machine.borrow_mut().apply(token, transition).map(|stage| stage.clone());
        match applied {
            Ok(stage) => {
                info!("{}: {}", token, stage.label());
                if let Some(url) = processed_url {
                    self.display.borrow_mut().show_remote(Slot::Processed, url);
                }
                self.notify();
                Ok(())
            }
            Err(TransitionError::Stale { .. }) => Err(Halt::Superseded),
            Err(e) => {
                // Only reachable through a sequencing bug; stop the run.
                error!("{}: {}", token, e);
                Err(Halt::Superseded)
            }
        }
    }

    /// The viewer could not load the model this run produced.
    pub fn report_asset_failure(&self, asset_url: &str, message: &str) {
        let token = {
            let machine = self.machine.borrow();
            if machine.asset_url() != Some(asset_url) {
                return;
            }
            machine.current_token()
        };
        error!("{}: failed to load model {}: {}", token, asset_url, message);
        let _ = self.commit(
            token,
            Transition::Fail {
                message: format!("Could not display the model: {}", message),
            },
        );
    }

    /// Revoke every display URL and make in-flight runs stale.
    pub fn teardown(&self) {
        self.machine.borrow_mut().invalidate();
        self.display.borrow_mut().release_all();
    }
}
