// Tests for tri-state options and WganConfig

use wgan::config::{Setting, DEFAULT_GRAD_WEIGHT, DEFAULT_N_CRITIC};
use wgan::prelude::*;

#[test]
fn test_retrieve_consumes_and_honors_falsy_values() -> wgan::Result<()> {
    let mut opts = Options::new()
        .with("use_gradient_penalty", false)
        .with("grad_weight", 0.0)
        .with("n_critic", 0usize);

    assert!(!opts.retrieve("use_gradient_penalty", true)?);
    assert_eq!(opts.retrieve("grad_weight", 10.0)?, 0.0);
    assert_eq!(opts.retrieve("n_critic", 5usize)?, 0);
    assert!(opts.is_empty());
    opts.finish()
}

#[test]
fn test_not_set_and_absent_use_the_default() -> wgan::Result<()> {
    let mut opts = Options::new().with_not_set("grad_weight");
    assert_eq!(opts.get("grad_weight"), &Setting::NotSet);
    assert_eq!(opts.get("latent_dim"), &Setting::Absent);

    assert_eq!(opts.retrieve("grad_weight", 10.0)?, 10.0);
    assert_eq!(opts.retrieve("latent_dim", 7usize)?, 7);
    assert!(!opts.contains("grad_weight"));
    Ok(())
}

#[test]
fn test_retrieve_setting_keeps_the_three_states() -> wgan::Result<()> {
    let mut opts = Options::new().with("a", true).with_not_set("b");
    assert_eq!(opts.retrieve_setting::<bool>("a")?, Setting::Value(true));
    assert_eq!(opts.retrieve_setting::<bool>("b")?, Setting::NotSet);
    assert_eq!(opts.retrieve_setting::<bool>("c")?, Setting::Absent);
    Ok(())
}

#[test]
fn test_wrong_type_is_a_config_error() {
    let mut opts = Options::new().with("batch_size", "many");
    let r = opts.retrieve("batch_size", 1usize);
    assert!(matches!(r, Err(wgan::Error::Config(_))));

    let mut opts = Options::new().with("batch_size", -3i64);
    assert!(opts.retrieve("batch_size", 1usize).is_err());
}

#[test]
fn test_config_from_options() -> wgan::Result<()> {
    let opts = Options::new()
        .with("batch_size", 32usize)
        .with("latent_dim", 2usize)
        .with("use_gradient_penalty", false)
        .with_not_set("grad_weight")
        .with("dtype", "f64")
        .with("tf_call_kw", CallOptions::training(true));
    let cfg = WganConfig::from_options(opts)?;
    assert_eq!(cfg.batch_size, 32);
    assert_eq!(cfg.latent_dim, 2);
    assert!(!cfg.use_gradient_penalty);
    assert_eq!(cfg.grad_weight, DEFAULT_GRAD_WEIGHT);
    assert_eq!(cfg.n_critic, DEFAULT_N_CRITIC);
    assert_eq!(cfg.dtype, DType::F64);
    assert_eq!(cfg.call, CallOptions::training(true));
    Ok(())
}

#[test]
fn test_unknown_option_rejected() {
    let opts = Options::new()
        .with("batch_size", 8usize)
        .with("learning_rte", 0.1);
    let err = WganConfig::from_options(opts).unwrap_err();
    assert!(err.to_string().contains("learning_rte"), "{err}");
}

#[test]
fn test_json_null_missing_and_false() -> wgan::Result<()> {
    let cfg = WganConfig::from_json_str(
        r#"{ "batch_size": 16, "grad_weight": null, "use_gradient_penalty": false }"#,
    )?;
    assert_eq!(cfg.batch_size, 16);
    assert_eq!(cfg.grad_weight, DEFAULT_GRAD_WEIGHT);
    assert!(!cfg.use_gradient_penalty);
    assert_eq!(cfg.latent_dim, WganConfig::default().latent_dim);
    Ok(())
}

#[test]
fn test_json_unknown_field_rejected() {
    let r = WganConfig::from_json_str(r#"{ "batch_size": 16, "gradweight": 1.0 }"#);
    assert!(matches!(r, Err(wgan::Error::Config(_))));
}

#[test]
fn test_json_call_options_alias() -> wgan::Result<()> {
    let cfg = WganConfig::from_json_str(r#"{ "tf_call_kw": { "training": false } }"#)?;
    assert_eq!(cfg.call.training, Some(false));
    Ok(())
}

#[test]
fn test_json_roundtrip() -> wgan::Result<()> {
    let cfg = WganConfig {
        batch_size: 12,
        latent_dim: 3,
        use_gradient_penalty: false,
        grad_weight: 0.5,
        n_critic: 2,
        dtype: DType::F64,
        call: CallOptions::training(false),
    };
    let text = cfg.to_json_string()?;
    assert_eq!(WganConfig::from_json_str(&text)?, cfg);
    Ok(())
}

#[test]
fn test_options_from_json_object() -> wgan::Result<()> {
    let value = serde_json::json!({ "batch_size": 4, "grad_weight": null, "dtype": "f32" });
    let opts = Options::from_json(value)?;
    assert_eq!(opts.len(), 3);
    assert_eq!(opts.get("grad_weight"), &Setting::NotSet);
    let cfg = WganConfig::from_options(opts)?;
    assert_eq!(cfg.batch_size, 4);
    assert_eq!(cfg.dtype, DType::F32);

    assert!(Options::from_json(serde_json::json!([1, 2])).is_err());
    Ok(())
}

#[test]
fn test_invalid_values_rejected() {
    assert!(WganConfig::from_json_str(r#"{ "batch_size": 0 }"#).is_err());
    assert!(WganConfig::from_json_str(r#"{ "n_critic": 0 }"#).is_err());
    assert!(WganConfig::from_json_str(r#"{ "dtype": "f16" }"#).is_err());
}

#[test]
fn test_config_from_file() -> wgan::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("wgan.json");
    std::fs::write(&path, r#"{ "latent_dim": 5, "n_critic": 1 }"#)?;
    let cfg = WganConfig::from_json_file(&path)?;
    assert_eq!(cfg.latent_dim, 5);
    assert_eq!(cfg.n_critic, 1);

    assert!(matches!(
        WganConfig::from_json_file(dir.path().join("missing.json")),
        Err(wgan::Error::Io(_))
    ));
    Ok(())
}
