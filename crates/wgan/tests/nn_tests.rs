// Integration tests for wgan-nn and wgan-optim
//
// These tests verify that the layers and optimizers work together correctly
// using the CPU backend.

use wgan::nn::{LeakyReLU, Module, Sigmoid};
use wgan::prelude::*;

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() < tol
}

fn assert_vec_approx(got: &[f64], expected: &[f64], tol: f64) {
    assert_eq!(
        got.len(),
        expected.len(),
        "length mismatch: {} vs {}",
        got.len(),
        expected.len()
    );
    for (i, (g, e)) in got.iter().zip(expected.iter()).enumerate() {
        assert!(
            approx_eq(*g, *e, tol),
            "index {}: got {} expected {} (tol {})",
            i,
            g,
            e,
            tol
        );
    }
}

// Linear layer tests

#[test]
fn test_linear_shape() -> wgan::Result<()> {
    let dev = CpuDevice;
    let linear = Linear::<CpuBackend>::new(10, 5, true, DType::F64, &dev)?;

    assert_eq!(linear.weight().dims(), &[5, 10]);
    assert_eq!(linear.bias().unwrap().dims(), &[1, 5]);

    // Forward: [batch=3, 10] → [3, 5]
    let x = CpuTensor::rand((3, 10), DType::F64, &dev)?;
    let y = linear.forward(&x)?;
    assert_eq!(y.dims(), &[3, 5]);
    Ok(())
}

#[test]
fn test_linear_init_range() -> wgan::Result<()> {
    let linear = Linear::<CpuBackend>::new(16, 8, true, DType::F64, &CpuDevice)?;
    let k = 0.25;
    for p in linear.parameters() {
        assert!(p.is_variable());
        assert!(p.to_f64_vec()?.iter().all(|v| v.abs() <= k));
    }
    Ok(())
}

#[test]
fn test_linear_from_tensors() -> wgan::Result<()> {
    let dev = CpuDevice;
    let w = CpuTensor::from_f64_slice(&[1.0, 0.0, 0.0, 1.0], (2, 2), DType::F64, &dev)?;
    let b = CpuTensor::from_f64_slice(&[0.5, -0.5], (1, 2), DType::F64, &dev)?;
    let linear = Linear::from_tensors(w, Some(b))?;

    let x = CpuTensor::from_f64_slice(&[3.0, 7.0], (1, 2), DType::F64, &dev)?;
    let y = linear.forward(&x)?;
    // y = x @ W^T + b = [3, 7] @ I + [0.5, -0.5] = [3.5, 6.5]
    assert_vec_approx(&y.to_f64_vec()?, &[3.5, 6.5], 1e-10);
    Ok(())
}

#[test]
fn test_linear_gradients() -> wgan::Result<()> {
    let dev = CpuDevice;
    let w = CpuTensor::from_f64_slice(&[1.0, 2.0], (1, 2), DType::F64, &dev)?;
    let linear = Linear::from_tensors(w, None)?;
    let x = CpuTensor::from_f64_slice(&[1.0, 3.0, 2.0, 5.0], (2, 2), DType::F64, &dev)?;
    let loss = linear.forward(&x)?.sum_all()?;
    let grads = loss.backward()?;
    // ∂/∂W Σ x W^T = column sums of x
    let gw = grads.get(linear.weight()).unwrap();
    assert_vec_approx(&gw.to_f64_vec()?, &[3.0, 8.0], 1e-12);
    Ok(())
}

// Activations

#[test]
fn test_activations() -> wgan::Result<()> {
    let dev = CpuDevice;
    let x = CpuTensor::from_f64_slice(&[-2.0, 0.0, 3.0], 3, DType::F64, &dev)?;

    assert_vec_approx(&ReLU.forward(&x)?.to_f64_vec()?, &[0.0, 0.0, 3.0], 1e-12);
    assert_vec_approx(
        &LeakyReLU::with_slope(0.1).forward(&x)?.to_f64_vec()?,
        &[-0.2, 0.0, 3.0],
        1e-12,
    );
    let t = Tanh.forward(&x)?.to_f64_vec()?;
    assert!(approx_eq(t[2], 3.0f64.tanh(), 1e-12));
    let s = Sigmoid.forward(&x)?.to_f64_vec()?;
    assert!(approx_eq(s[1], 0.5, 1e-12));
    Ok(())
}

#[test]
fn test_leaky_relu_gradient() -> wgan::Result<()> {
    let dev = CpuDevice;
    let x = CpuTensor::from_f64_slice(&[-2.0, 3.0], 2, DType::F64, &dev)?.set_variable();
    let y = LeakyReLU::with_slope(0.2).forward(&x)?.sum_all()?;
    let g = y.grad_wrt(&[&x])?;
    assert_vec_approx(&g[0].to_f64_vec()?, &[0.2, 1.0], 1e-12);
    Ok(())
}

// Sequential / mlp

#[test]
fn test_mlp_layout_and_training_flag() -> wgan::Result<()> {
    let dev = CpuDevice;
    let net = mlp::<CpuBackend>(
        &[3, 5, 4, 1],
        Activation::Relu,
        Some(Activation::Tanh),
        DType::F32,
        &dev,
    )?;
    // Linear ReLU Linear ReLU Linear Tanh
    assert_eq!(net.len(), 6);
    assert_eq!(net.num_parameters(), 3 * 5 + 5 + 5 * 4 + 4 + 4 + 1);
    assert!(net.parameters().iter().all(|p| p.is_variable()));

    let y = net.forward(&CpuTensor::randn((7, 3), DType::F32, &dev)?)?;
    assert_eq!(y.dims(), &[7, 1]);
    assert!(y.to_f64_vec()?.iter().all(|v| v.abs() <= 1.0));

    net.eval();
    assert!(!net.is_training());
    net.train();
    assert!(net.is_training());
    Ok(())
}

#[test]
fn test_mlp_needs_two_sizes() {
    assert!(mlp::<CpuBackend>(&[3], Activation::Relu, None, DType::F32, &CpuDevice).is_err());
}

// Optimizers

fn quadratic_step(opt: &mut dyn Optimizer<CpuBackend>, w: &CpuTensor) -> wgan::Result<f64> {
    // loss = Σ w², minimum at 0
    let loss = w.square()?.sum_all()?;
    let grads = loss.backward()?;
    opt.step(&grads)?;
    loss.to_scalar_f64()
}

#[test]
fn test_sgd_step_exact() -> wgan::Result<()> {
    let dev = CpuDevice;
    let w = CpuTensor::from_f64_slice(&[1.0, -2.0], 2, DType::F64, &dev)?.set_variable();
    let mut opt = SGD::new(vec![w.clone()], 0.1, 0.0, 0.0);
    quadratic_step(&mut opt, &w)?;
    // w -= 0.1 * 2w
    assert_vec_approx(&w.to_f64_vec()?, &[0.8, -1.6], 1e-12);
    assert_eq!(opt.step_count(), 1);
    Ok(())
}

#[test]
fn test_sgd_momentum() -> wgan::Result<()> {
    let dev = CpuDevice;
    let w = CpuTensor::from_f64_slice(&[1.0], 1, DType::F64, &dev)?.set_variable();
    let mut opt = SGD::new(vec![w.clone()], 0.1, 0.9, 0.0);
    quadratic_step(&mut opt, &w)?; // v = 2, w = 0.8
    quadratic_step(&mut opt, &w)?; // v = 0.9·2 + 1.6 = 3.4, w = 0.46
    assert_vec_approx(&w.to_f64_vec()?, &[0.46], 1e-12);
    Ok(())
}

#[test]
fn test_adam_first_step_is_lr_sized() -> wgan::Result<()> {
    let dev = CpuDevice;
    let w = CpuTensor::from_f64_slice(&[1.0, -3.0], 2, DType::F64, &dev)?.set_variable();
    let mut opt = Adam::new(vec![w.clone()], 0.01);
    quadratic_step(&mut opt, &w)?;
    // Bias-corrected first step moves each weight by ~lr against its gradient.
    assert_vec_approx(&w.to_f64_vec()?, &[0.99, -2.99], 1e-6);
    Ok(())
}

#[test]
fn test_rmsprop_converges() -> wgan::Result<()> {
    let dev = CpuDevice;
    let w = CpuTensor::from_f64_slice(&[2.0, -1.0], 2, DType::F64, &dev)?.set_variable();
    let mut opt = RMSProp::new(vec![w.clone()], 0.01);
    let first = quadratic_step(&mut opt, &w)?;
    let mut last = first;
    for _ in 0..200 {
        last = quadratic_step(&mut opt, &w)?;
    }
    assert!(last < first * 0.1, "loss {first} → {last}");
    Ok(())
}

#[test]
fn test_optimizer_skips_params_without_gradient() -> wgan::Result<()> {
    let dev = CpuDevice;
    let used = CpuTensor::from_f64_slice(&[1.0], 1, DType::F64, &dev)?.set_variable();
    let unused = CpuTensor::from_f64_slice(&[5.0], 1, DType::F64, &dev)?.set_variable();
    let mut opt = Adam::new(vec![used.clone(), unused.clone()], 0.1);
    quadratic_step(&mut opt, &used)?;
    assert_eq!(unused.to_f64_vec()?, vec![5.0]);
    assert_ne!(used.to_f64_vec()?, vec![1.0]);
    Ok(())
}

#[test]
fn test_learning_rate_accessors() {
    let w = CpuTensor::zeros(1, DType::F64, &CpuDevice).unwrap().set_variable();
    let mut opt = RMSProp::new(vec![w], 0.5);
    assert_eq!(opt.learning_rate(), 0.5);
    opt.set_learning_rate(0.25);
    assert_eq!(opt.learning_rate(), 0.25);
    assert_eq!(opt.name(), "rmsprop");
    assert_eq!(opt.params().len(), 1);
}
