// Trainer — the n-critic schedule over a DataLoader
//
// For every real batch:
//   1. n_critic - 1 critic-only steps
//   2. one full step (critic, then generator)
//
// all on the same real batch, each drawing its own fakes. Every step is
// recorded in a StepLog; EpochLog holds per-epoch averages.
//
// Batches whose size differs from the model's batch_size are skipped with a
// warning (fakes are always batch_size, and the penalty interpolates real
// and fake sample by sample). Use `drop_last` on the loader to avoid them.

use std::fmt;

use wgan_core::backend::Backend;
use wgan_core::error::{Error, Result};
use wgan_core::tensor::Tensor;
use wgan_data::DataLoader;
use wgan_nn::Module;

use crate::gan::{loss_values, LossMap, WassersteinGan};

// Training result types

/// Losses of a single step. `generator` is `None` for critic-only steps.
#[derive(Debug, Clone, PartialEq)]
pub struct StepLog {
    pub epoch: usize,
    /// Batch index within the epoch.
    pub batch: usize,
    /// Global step counter, starting at 0.
    pub step: usize,
    pub generator: Option<f64>,
    pub critic: f64,
    pub lipschitz: f64,
}

impl StepLog {
    fn from_losses<B: Backend>(
        epoch: usize,
        batch: usize,
        step: usize,
        losses: &LossMap<B>,
    ) -> Result<Self> {
        let values = loss_values(losses)?;
        let get = |k: &str| {
            values
                .get(k)
                .copied()
                .ok_or_else(|| Error::msg(format!("step did not report '{k}'")))
        };
        Ok(StepLog {
            epoch,
            batch,
            step,
            generator: values.get("generator").copied(),
            critic: get("critic")?,
            lipschitz: get("lipschitz")?,
        })
    }

    pub fn is_finite(&self) -> bool {
        self.critic.is_finite()
            && self.lipschitz.is_finite()
            && self.generator.map_or(true, f64::is_finite)
    }
}

/// Averages over one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochLog {
    /// Epoch number (0-indexed).
    pub epoch: usize,
    /// Steps taken, critic-only and full.
    pub steps: usize,
    /// Batches skipped for having the wrong size.
    pub skipped: usize,
    /// Mean generator loss over full steps (NaN if none ran).
    pub generator: f64,
    /// Mean critic loss over all steps.
    pub critic: f64,
    pub lipschitz: f64,
}

/// Everything recorded by [`Trainer::fit`].
#[derive(Debug, Clone, Default)]
pub struct TrainHistory {
    pub steps: Vec<StepLog>,
    pub epochs: Vec<EpochLog>,
}

impl TrainHistory {
    pub fn last_epoch(&self) -> Option<&EpochLog> {
        self.epochs.last()
    }

    /// Full steps only.
    pub fn generator_steps(&self) -> impl Iterator<Item = &StepLog> {
        self.steps.iter().filter(|s| s.generator.is_some())
    }
}

impl fmt::Display for TrainHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Training complete: {} epochs, {} steps",
            self.epochs.len(),
            self.steps.len()
        )?;
        for log in &self.epochs {
            writeln!(
                f,
                "  epoch {}: generator = {:.6}, critic = {:.6}, lipschitz = {:.6}",
                log.epoch, log.generator, log.critic, log.lipschitz
            )?;
        }
        Ok(())
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

// Trainer

/// Runs epochs of the n-critic schedule.
#[derive(Debug, Clone)]
pub struct Trainer {
    epochs: usize,
    /// Overrides the model's `n_critic` when set.
    n_critic: Option<usize>,
    /// Return an error on the first NaN/inf loss instead of warning.
    abort_on_non_finite: bool,
}

impl Trainer {
    pub fn new(epochs: usize) -> Self {
        Trainer {
            epochs,
            n_critic: None,
            abort_on_non_finite: false,
        }
    }

    pub fn n_critic(mut self, n: usize) -> Self {
        self.n_critic = Some(n);
        self
    }

    pub fn abort_on_non_finite(mut self, abort: bool) -> Self {
        self.abort_on_non_finite = abort;
        self
    }

    pub fn epochs(&self) -> usize {
        self.epochs
    }

    /// Train `model` on every batch of `loader` for the configured epochs.
    pub fn fit<B, G, C>(
        &self,
        model: &mut WassersteinGan<B, G, C>,
        loader: &mut DataLoader<'_, B>,
    ) -> Result<TrainHistory>
    where
        B: Backend,
        G: Module<B>,
        C: Module<B>,
    {
        let n_critic = self.n_critic.unwrap_or(model.config().n_critic);
        if n_critic == 0 {
            return Err(Error::config("n_critic must be at least 1"));
        }
        tracing::info!(
            epochs = self.epochs,
            n_critic,
            batches = loader.num_batches(),
            batch_size = model.batch_size(),
            "starting training"
        );

        let mut history = TrainHistory::default();
        for epoch in 0..self.epochs {
            let first_step = history.steps.len();
            let mut skipped = 0;
            for (batch_idx, batch) in loader.iter_batches().enumerate() {
                let batch = batch?;
                if batch.dims().first() != Some(&model.batch_size()) {
                    tracing::warn!(
                        epoch,
                        batch = batch_idx,
                        shape = ?batch.dims(),
                        batch_size = model.batch_size(),
                        "skipping batch of the wrong size"
                    );
                    skipped += 1;
                    continue;
                }
                self.run_batch(model, &batch, epoch, batch_idx, n_critic, &mut history)?;
            }

            let steps = &history.steps[first_step..];
            let log = EpochLog {
                epoch,
                steps: steps.len(),
                skipped,
                generator: mean(steps.iter().filter_map(|s| s.generator)),
                critic: mean(steps.iter().map(|s| s.critic)),
                lipschitz: mean(steps.iter().map(|s| s.lipschitz)),
            };
            tracing::info!(
                epoch,
                steps = log.steps,
                generator = log.generator,
                critic = log.critic,
                lipschitz = log.lipschitz,
                "epoch done"
            );
            history.epochs.push(log);
        }
        Ok(history)
    }

    fn run_batch<B, G, C>(
        &self,
        model: &mut WassersteinGan<B, G, C>,
        batch: &Tensor<B>,
        epoch: usize,
        batch_idx: usize,
        n_critic: usize,
        history: &mut TrainHistory,
    ) -> Result<()>
    where
        B: Backend,
        G: Module<B>,
        C: Module<B>,
    {
        for i in 0..n_critic {
            let losses = if i + 1 < n_critic {
                model.train_critic(batch, None)?
            } else {
                model.train_step(batch, None)?
            };
            let log = StepLog::from_losses(epoch, batch_idx, history.steps.len(), &losses)?;
            tracing::debug!(
                step = log.step,
                generator = ?log.generator,
                critic = log.critic,
                lipschitz = log.lipschitz,
                "step"
            );
            if !log.is_finite() {
                tracing::warn!(step = log.step, ?log, "non-finite loss");
                if self.abort_on_non_finite {
                    return Err(Error::msg(format!(
                        "non-finite loss at step {}: critic = {}, lipschitz = {}, generator = {:?}",
                        log.step, log.critic, log.lipschitz, log.generator
                    )));
                }
            }
            history.steps.push(log);
        }
        Ok(())
    }
}
