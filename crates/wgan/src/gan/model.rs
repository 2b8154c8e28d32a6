// WassersteinGan — critic and generator trained against each other
//
// One full step:
//
//   z        ~ N(0, I)                       (batch_size, latent_dim)
//   x̂        = generator(z)
//   real_out = critic(x),  fake_out = critic(x̂)
//   critic   = mean(real_out) - mean(fake_out) + grad_weight * penalty(x, x̂)
//   gen      = mean(fake_out)
//   critic optimizer ← ∂critic/∂θ_critic
//   generator optimizer ← ∂gen/∂θ_gen
//
// The critic-only step stops after the critic update.
//
// Both gradient stores of a full step are computed before either optimizer
// runs. Optimizers write parameters in place, so an update applied first
// would otherwise leak into the other network's gradient.
//
// Each optimizer only ever sees its own network's parameter list; the
// constructor rejects overlapping parameter sets.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use wgan_core::backend::Backend;
use wgan_core::backprop::GradStore;
use wgan_core::error::{Error, Result};
use wgan_core::op::TensorId;
use wgan_core::tensor::Tensor;
use wgan_nn::Module;
use wgan_optim::{Adam, Optimizer};

use crate::cache::{CacheRegistry, MemoCache};
use crate::checkpoint;
use crate::config::WganConfig;
use crate::gan::latent::LatentPrior;
use crate::gan::loss::{generator_loss, gradient_penalty, wasserstein_loss};

/// Named scalar losses returned by a training step.
pub type LossMap<B> = BTreeMap<&'static str, Tensor<B>>;

/// Every loss name a step can report.
pub const LOSS_KEYS: [&str; 3] = ["generator", "critic", "lipschitz"];

/// A generator `G` and a critic `C` with one optimizer each.
pub struct WassersteinGan<B: Backend, G: Module<B>, C: Module<B>> {
    generator: G,
    critic: C,
    gen_opt: Box<dyn Optimizer<B>>,
    critic_opt: Box<dyn Optimizer<B>>,
    prior: LatentPrior<B>,
    config: WganConfig,
    device: B::Device,
    caches: CacheRegistry,
    preview: MemoCache<usize, Tensor<B>>,
}

fn ids<B: Backend>(params: &[Tensor<B>]) -> HashSet<TensorId> {
    params.iter().map(|p| p.id()).collect()
}

impl<B: Backend, G: Module<B>, C: Module<B>> WassersteinGan<B, G, C> {
    /// Assemble a model from two networks and their optimizers.
    ///
    /// Fails when the two networks share a parameter, or when an optimizer
    /// holds a parameter of the other network.
    pub fn new(
        generator: G,
        critic: C,
        gen_opt: Box<dyn Optimizer<B>>,
        critic_opt: Box<dyn Optimizer<B>>,
        config: WganConfig,
        device: B::Device,
    ) -> Result<Self> {
        config.validate()?;

        let gen_ids = ids(&generator.parameters());
        let critic_ids = ids(&critic.parameters());
        if !gen_ids.is_disjoint(&critic_ids) {
            return Err(Error::config(
                "generator and critic share parameters; each network needs its own",
            ));
        }
        if gen_opt.params().iter().any(|p| critic_ids.contains(&p.id())) {
            return Err(Error::config("generator optimizer holds critic parameters"));
        }
        if critic_opt.params().iter().any(|p| gen_ids.contains(&p.id())) {
            return Err(Error::config("critic optimizer holds generator parameters"));
        }

        let caches = CacheRegistry::new();
        let prior = LatentPrior::new(config.latent_dim, config.dtype, device.clone(), &caches);
        let preview = caches.cache(4);
        tracing::debug!(
            generator_params = generator.num_parameters(),
            critic_params = critic.num_parameters(),
            gen_opt = gen_opt.name(),
            critic_opt = critic_opt.name(),
            "built wasserstein gan"
        );
        Ok(WassersteinGan {
            generator,
            critic,
            gen_opt,
            critic_opt,
            prior,
            config,
            device,
            caches,
            preview,
        })
    }

    /// Adam on both networks with the usual WGAN-GP settings
    /// (β₁ = 0.5, β₂ = 0.9).
    pub fn with_adam(
        generator: G,
        critic: C,
        lr: f64,
        config: WganConfig,
        device: B::Device,
    ) -> Result<Self> {
        let gen_opt = Adam::new(generator.parameters(), lr).with_betas(0.5, 0.9);
        let critic_opt = Adam::new(critic.parameters(), lr).with_betas(0.5, 0.9);
        Self::new(
            generator,
            critic,
            Box::new(gen_opt),
            Box::new(critic_opt),
            config,
            device,
        )
    }

    pub fn config(&self) -> &WganConfig {
        &self.config
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn critic(&self) -> &C {
        &self.critic
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    pub fn prior(&self) -> &LatentPrior<B> {
        &self.prior
    }

    pub fn latent_dim(&self) -> usize {
        self.config.latent_dim
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    pub fn generator_optimizer(&self) -> &dyn Optimizer<B> {
        self.gen_opt.as_ref()
    }

    pub fn critic_optimizer(&self) -> &dyn Optimizer<B> {
        self.critic_opt.as_ref()
    }

    /// Loss names reported by [`WassersteinGan::train_step`].
    pub fn loss_keys(&self) -> &'static [&'static str] {
        &LOSS_KEYS
    }

    // Sampling

    /// `n` latent vectors from the prior, shape `(n, latent_dim)`.
    pub fn sample_latent_data(&self, n: usize) -> Result<Tensor<B>> {
        self.prior.sample(n)
    }

    /// Log-density of each latent row under the prior, shape `(n,)`.
    pub fn latent_log_prob(&self, z: &Tensor<B>) -> Result<Tensor<B>> {
        self.prior.log_prob(z)
    }

    /// Run the generator on `z` with the configured call options.
    pub fn transform(&self, z: &Tensor<B>) -> Result<Tensor<B>> {
        self.config.call.call(&self.generator, z)
    }

    /// `n` fresh fake samples.
    pub fn generate(&self, n: usize) -> Result<Tensor<B>> {
        self.transform(&self.sample_latent_data(n)?)
    }

    /// A latent batch of size `n` that stays the same until
    /// [`WassersteinGan::reset_caches`]; for watching one set of fakes evolve.
    pub fn preview_latent(&self, n: usize) -> Result<Tensor<B>> {
        self.preview
            .get_or_try_insert_with(n, || Ok(self.sample_latent_data(n)?.detach()))
    }

    /// Generator output on the preview latent batch, without history.
    pub fn preview(&self, n: usize) -> Result<Tensor<B>> {
        Ok(self.transform(&self.preview_latent(n)?)?.detach())
    }

    /// Drop every memoized value (preview batch, prior constant).
    pub fn reset_caches(&self) {
        let n = self.caches.clear_all();
        tracing::debug!(caches = n, "cleared caches");
    }

    // Losses

    /// Critic scores of the real and the fake batch.
    pub fn critic_outputs(
        &self,
        samples: &Tensor<B>,
        fake_samples: &Tensor<B>,
    ) -> Result<(Tensor<B>, Tensor<B>)> {
        let call = &self.config.call;
        let real_out = call.call(&self.critic, samples)?;
        let fake_out = call.call(&self.critic, fake_samples)?;
        Ok((real_out, fake_out))
    }

    /// `(critic_loss, lipschitz)` where `lipschitz` is the weighted penalty
    /// term added to the Wasserstein loss, or a zero scalar when the penalty
    /// is disabled.
    pub fn critic_loss(
        &self,
        samples: &Tensor<B>,
        fake_samples: &Tensor<B>,
        real_out: &Tensor<B>,
        fake_out: &Tensor<B>,
    ) -> Result<(Tensor<B>, Tensor<B>)> {
        let lipschitz = if self.config.use_gradient_penalty {
            gradient_penalty(&self.critic, samples, fake_samples)?.scale(self.config.grad_weight)?
        } else {
            Tensor::<B>::zeros((), real_out.dtype(), real_out.device())?
        };
        let loss = wasserstein_loss(real_out, fake_out)?.add(&lipschitz)?;
        Ok((loss, lipschitz))
    }

    pub fn generator_loss(&self, fake_out: &Tensor<B>) -> Result<Tensor<B>> {
        generator_loss(fake_out)
    }

    // Updates

    /// Apply precomputed gradients to the critic. Gradients for any other
    /// tensor in `grads` are ignored.
    pub fn apply_critic_grads(&mut self, grads: &GradStore<B>) -> Result<()> {
        self.critic_opt.step(grads)?;
        Ok(())
    }

    pub fn apply_gen_grads(&mut self, grads: &GradStore<B>) -> Result<()> {
        self.gen_opt.step(grads)?;
        Ok(())
    }

    /// Backpropagate `critic_loss` and update the critic's parameters.
    pub fn apply_critic_update(&mut self, critic_loss: &Tensor<B>) -> Result<()> {
        let grads = critic_loss.backward()?;
        self.apply_critic_grads(&grads)
    }

    /// Backpropagate `gen_loss` and update the generator's parameters.
    pub fn apply_gen_update(&mut self, gen_loss: &Tensor<B>) -> Result<()> {
        let grads = gen_loss.backward()?;
        self.apply_gen_grads(&grads)
    }

    // Steps

    /// One critic update against a fresh fake batch.
    ///
    /// Returns `critic` and `lipschitz`. `mask` is accepted for interface
    /// compatibility and not used.
    pub fn train_critic(
        &mut self,
        samples: &Tensor<B>,
        _mask: Option<&Tensor<B>>,
    ) -> Result<LossMap<B>> {
        // The generator is not updated here; cut it out of the graph.
        let fake_samples = self.generate(self.config.batch_size)?.detach();
        let (real_out, fake_out) = self.critic_outputs(samples, &fake_samples)?;
        let (critic_loss, lipschitz) =
            self.critic_loss(samples, &fake_samples, &real_out, &fake_out)?;
        self.apply_critic_update(&critic_loss)?;

        let mut losses = LossMap::new();
        losses.insert("critic", critic_loss.detach());
        losses.insert("lipschitz", lipschitz.detach());
        Ok(losses)
    }

    /// One critic update followed by one generator update, both from the same
    /// fake batch.
    ///
    /// Returns `generator`, `critic` and `lipschitz`. `mask` is accepted and
    /// not used.
    pub fn train_step(
        &mut self,
        samples: &Tensor<B>,
        _mask: Option<&Tensor<B>>,
    ) -> Result<LossMap<B>> {
        let fake_samples = self.generate(self.config.batch_size)?;
        let (real_out, fake_out) = self.critic_outputs(samples, &fake_samples)?;
        let (critic_loss, lipschitz) =
            self.critic_loss(samples, &fake_samples, &real_out, &fake_out)?;
        let gen_loss = self.generator_loss(&fake_out)?;

        let critic_grads = critic_loss.backward()?;
        let gen_grads = gen_loss.backward()?;
        self.apply_critic_grads(&critic_grads)?;
        self.apply_gen_grads(&gen_grads)?;

        let mut losses = LossMap::new();
        losses.insert("generator", gen_loss.detach());
        losses.insert("critic", critic_loss.detach());
        losses.insert("lipschitz", lipschitz.detach());
        Ok(losses)
    }

    // Parameters

    /// Scalar parameter count of generator and critic together.
    pub fn num_parameters(&self) -> usize {
        self.generator.num_parameters() + self.critic.num_parameters()
    }

    /// Every parameter, prefixed with `generator.` or `critic.`.
    pub fn named_parameters(&self) -> Vec<(String, Tensor<B>)> {
        let gen = self
            .generator
            .named_parameters()
            .into_iter()
            .map(|(k, v)| (format!("generator.{k}"), v));
        let critic = self
            .critic
            .named_parameters()
            .into_iter()
            .map(|(k, v)| (format!("critic.{k}"), v));
        gen.chain(critic).collect()
    }

    /// Write all parameters to `path`, creating parent directories.
    pub fn save_weights(&self, path: impl AsRef<Path>) -> Result<()> {
        checkpoint::save_tensors(path, &self.named_parameters())
    }

    /// Load parameters saved by [`WassersteinGan::save_weights`] in place.
    ///
    /// Every parameter of both networks must be present with its shape.
    /// Returns the number of tensors loaded.
    pub fn load_weights(&self, path: impl AsRef<Path>) -> Result<usize> {
        let loaded: BTreeMap<String, Tensor<B>> =
            checkpoint::load_tensors::<B>(path, &self.device)?
                .into_iter()
                .collect();
        let params = self.named_parameters();
        for (name, param) in &params {
            let src = loaded
                .get(name)
                .ok_or_else(|| Error::msg(format!("checkpoint has no tensor '{name}'")))?;
            if src.dims() != param.dims() {
                return Err(Error::ShapeMismatch {
                    expected: param.shape().clone(),
                    got: src.shape().clone(),
                });
            }
            param.update_data_inplace(&src.to_f64_vec()?)?;
        }
        Ok(params.len())
    }
}

/// Host values of a loss map.
pub fn loss_values<B: Backend>(losses: &LossMap<B>) -> Result<BTreeMap<&'static str, f64>> {
    losses
        .iter()
        .map(|(k, v)| Ok((*k, v.to_scalar_f64()?)))
        .collect()
}
