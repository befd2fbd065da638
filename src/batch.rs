use crate::converter::{display_name, ImageConverter};
use crate::types::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Cooperative stop request, checked between items only.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Running,
    Completed,
}

/// What the worker reports back, in the order it happens.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Result { index: usize, result: ConversionResult },
    Progress(BatchProgress),
    Done(BatchSummary),
}

pub struct BatchRunner {
    converter: ImageConverter,
    cancel: CancelToken,
    state: BatchState,
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchRunner {
    pub fn new() -> Self {
        Self {
            converter: ImageConverter::new(),
            cancel: CancelToken::new(),
            state: BatchState::Idle,
        }
    }

    /// Swap in a converter configured differently, e.g. another resampling filter.
    pub fn with_converter(mut self, converter: ImageConverter) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Convert `inputs` one after another on the calling thread.
    ///
    /// Each item produces `on_result` then `on_progress`; `on_done` fires once
    /// at the end. Per-item failures are reported and skipped. Bad options, an
    /// empty list, or a destination that disappears stop the run with an error.
    pub fn run<P, R, D>(
        &mut self,
        inputs: &[PathBuf],
        options: &ConversionOptions,
        mut on_progress: P,
        mut on_result: R,
        on_done: D,
    ) -> Result<BatchSummary, ConversionError>
    where
        P: FnMut(BatchProgress),
        R: FnMut(usize, &ConversionResult),
        D: FnOnce(&BatchSummary),
    {
        if inputs.is_empty() {
            return Err(ConversionError::EmptyBatch);
        }
        options.validate()?;

        let total = inputs.len();
        let destination = &options.destination_directory;
        let mut summary = BatchSummary {
            total,
            ..BatchSummary::default()
        };

        log::info!(
            "Starting batch of {} files to {} (quality {}, {:?})",
            total,
            options.output_format,
            options.quality(),
            options.resize_mode
        );
        self.state = BatchState::Running;

        for (index, input) in inputs.iter().enumerate() {
            if self.cancel.is_cancelled() {
                log::warn!("Batch cancelled after {}/{} files", index, total);
                summary.cancelled = true;
                break;
            }

            if !destination.is_dir() {
                log::error!(
                    "Destination {} vanished, stopping after {}/{} files",
                    destination.display(),
                    index,
                    total
                );
                self.state = BatchState::Completed;
                return Err(ConversionError::DestinationUnavailable {
                    path: destination.clone(),
                });
            }

            log::info!("Processing file {}/{}: {}", index + 1, total, display_name(input));
            let result = self.converter.convert_one(input, options, destination);

            on_result(index, &result);
            summary.record(result);
            on_progress(BatchProgress {
                completed: index + 1,
                total,
            });
        }

        self.state = BatchState::Completed;
        log::info!(
            "Batch finished: {}/{} succeeded, {} failed",
            summary.succeeded,
            total,
            summary.failed
        );
        on_done(&summary);

        Ok(summary)
    }

    /// Run the batch on a blocking worker and stream its events over a channel.
    ///
    /// The receiver yields every `Result`/`Progress` pair and a final `Done`;
    /// the join handle carries the summary or the error that stopped the run.
    pub fn spawn(
        mut self,
        inputs: Vec<PathBuf>,
        options: ConversionOptions,
    ) -> (
        mpsc::UnboundedReceiver<BatchEvent>,
        JoinHandle<Result<BatchSummary, ConversionError>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = tokio::task::spawn_blocking(move || {
            // A dropped receiver just means nobody is listening any more.
            let progress_tx = tx.clone();
            let result_tx = tx.clone();
            self.run(
                &inputs,
                &options,
                |progress| {
                    let _ = progress_tx.send(BatchEvent::Progress(progress));
                },
                |index, result| {
                    let _ = result_tx.send(BatchEvent::Result {
                        index,
                        result: result.clone(),
                    });
                },
                |summary| {
                    let _ = tx.send(BatchEvent::Done(summary.clone()));
                },
            )
        });

        (rx, handle)
    }
}
