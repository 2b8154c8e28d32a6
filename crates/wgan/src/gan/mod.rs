// gan — the Wasserstein GAN with gradient penalty
//
//   latent   standard-normal prior over the generator's input
//   loss     Wasserstein loss, generator loss, gradient penalty
//   model    WassersteinGan: critic-only step and full step

pub mod latent;
pub mod loss;
pub mod model;

pub use latent::LatentPrior;
pub use loss::{
    generator_loss, gradient_penalty, gradient_penalty_with_epsilon, per_sample_norm,
    wasserstein_loss,
};
pub use model::{loss_values, LossMap, WassersteinGan, LOSS_KEYS};
