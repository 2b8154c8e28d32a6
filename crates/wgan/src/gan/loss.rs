// Losses of the Wasserstein GAN
//
//   wasserstein_loss(real, fake) = mean(real) - mean(fake)
//   generator_loss(fake)         = mean(fake)
//   gradient_penalty(x, x̂)       = (mean(‖∇_u critic(û)‖ - 1))²
//
// where û = ε x + (1 - ε) x̂ with one ε ~ U[0, 1) per sample, broadcast over
// the non-batch axes. Note the penalty squares the *mean* deviation, it is
// not mean((‖∇‖ - 1)²). With these signs, minimizing the critic loss raises
// fake scores above real ones, the reverse of the usual WGAN convention.
// Both the signs and the penalty form are intentional.
//
// The gradient ∇_u is taken with a graph-preserving backward, so the penalty
// is itself differentiable with respect to the critic's parameters.

use wgan_core::backend::Backend;
use wgan_core::error::{Error, Result};
use wgan_core::tensor::Tensor;
use wgan_nn::Module;

/// `mean(real_scores) - mean(fake_scores)`, a scalar.
pub fn wasserstein_loss<B: Backend>(
    real_scores: &Tensor<B>,
    fake_scores: &Tensor<B>,
) -> Result<Tensor<B>> {
    real_scores.mean_all()?.sub(&fake_scores.mean_all()?)
}

/// `mean(fake_scores)`, a scalar.
pub fn generator_loss<B: Backend>(fake_scores: &Tensor<B>) -> Result<Tensor<B>> {
    fake_scores.mean_all()
}

/// L2 norm of each sample over every non-batch axis, shape `(batch,)`.
///
/// A rank-1 tensor has no non-batch axis: each element is its own sample and
/// the norm is `|g|`.
pub fn per_sample_norm<B: Backend>(grad: &Tensor<B>) -> Result<Tensor<B>> {
    let sq = grad.square()?;
    if grad.rank() <= 1 {
        return sq.sqrt();
    }
    let axes: Vec<usize> = (1..grad.rank()).collect();
    sq.sum_dims(&axes, false)?.sqrt()
}

/// Gradient penalty with freshly drawn interpolation weights.
pub fn gradient_penalty<B, C>(critic: &C, x: &Tensor<B>, x_hat: &Tensor<B>) -> Result<Tensor<B>>
where
    B: Backend,
    C: Module<B> + ?Sized,
{
    if x.dims() != x_hat.dims() {
        return Err(Error::ShapeMismatch {
            expected: x.shape().clone(),
            got: x_hat.shape().clone(),
        });
    }
    let epsilon = Tensor::<B>::rand(x.shape().per_sample_scalar()?, x.dtype(), x.device())?;
    gradient_penalty_with_epsilon(critic, x, x_hat, &epsilon)
}

/// Gradient penalty for given interpolation weights `epsilon`, which must
/// broadcast against `x` (normally shape `(batch, 1, ..., 1)`).
pub fn gradient_penalty_with_epsilon<B, C>(
    critic: &C,
    x: &Tensor<B>,
    x_hat: &Tensor<B>,
    epsilon: &Tensor<B>,
) -> Result<Tensor<B>>
where
    B: Backend,
    C: Module<B> + ?Sized,
{
    let one_minus = epsilon.affine(-1.0, 1.0)?;
    // Differentiate with respect to û itself, not through x and x̂.
    let u_hat = epsilon
        .mul(x)?
        .add(&one_minus.mul(x_hat)?)?
        .detach()
        .set_variable();

    let scores = critic.forward(&u_hat)?;
    let grad = scores
        .sum_all()?
        .grad_wrt(&[&u_hat])?
        .into_iter()
        .next()
        .ok_or_else(|| Error::NoGradient(format!("{:?}", u_hat.id())))?;

    per_sample_norm(&grad)?
        .affine(1.0, -1.0)?
        .mean_all()?
        .square()
}
