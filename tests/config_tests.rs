//! Provider configuration precedence: provider block, then environment, then
//! the built-in default host.

use rstest::rstest;

use terraform_provider_fluence::config::{FluenceEnv, ProviderModel, resolve};
use terraform_provider_fluence::framework::AttrValue;
use terraform_provider_fluence::{DEFAULT_HOST, Diagnostics};

fn env(host: Option<&str>, api_key: Option<&str>) -> FluenceEnv {
    FluenceEnv {
        host: host.map(str::to_owned),
        api_key: api_key.map(str::to_owned),
    }
}

fn model(host: Option<&str>, api_key: Option<&str>) -> ProviderModel {
    ProviderModel {
        host: host.map(str::to_owned).into(),
        api_key: api_key.map(str::to_owned).into(),
    }
}

fn summaries(diags: &Diagnostics) -> Vec<String> {
    diags.iter().map(|d| d.summary.clone()).collect()
}

#[rstest]
#[case::config_wins(Some("https://config.test"), Some("https://env.test"), "https://config.test")]
#[case::env_fallback(None, Some("https://env.test"), "https://env.test")]
#[case::default_host(None, None, DEFAULT_HOST)]
fn host_precedence(
    #[case] configured: Option<&str>,
    #[case] from_env: Option<&str>,
    #[case] expected: &str,
) {
    let resolved = resolve(&model(configured, Some("key")), &env(from_env, None))
        .unwrap_or_else(|diags| panic!("resolve: {diags}"));

    assert_eq!(resolved.host, expected);
    assert_eq!(resolved.api_key, "key");
}

#[test]
fn api_key_falls_back_to_environment() {
    let resolved = resolve(&model(None, None), &env(None, Some("env-key")))
        .unwrap_or_else(|diags| panic!("resolve: {diags}"));

    assert_eq!(resolved.api_key, "env-key");
}

#[test]
fn missing_api_key_is_an_attribute_error() {
    let diags = resolve(&model(None, None), &env(None, None)).expect_err("key is required");

    assert_eq!(summaries(&diags), vec!["Missing Fluence API ApiKey"]);
    assert!(
        diags
            .iter()
            .all(|d| d.attribute.as_deref() == Some("api_key"))
    );
}

#[test]
fn unknown_values_stop_resolution() {
    let provider = ProviderModel {
        host: AttrValue::Unknown,
        api_key: AttrValue::Unknown,
    };

    let diags = resolve(&provider, &env(None, Some("env-key"))).expect_err("unknown values");

    assert_eq!(
        summaries(&diags),
        vec!["Unknown Fluence API Host", "Unknown Fluence API Key"]
    );
}

#[test]
fn resolved_config_debug_hides_api_key() {
    let resolved = resolve(&model(None, Some("super-secret")), &env(None, None))
        .unwrap_or_else(|diags| panic!("resolve: {diags}"));

    let rendered = format!("{resolved:?}");

    assert!(!rendered.contains("super-secret"), "{rendered}");
}
