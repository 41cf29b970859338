use playflow_core::config::AppConfig;
use playflow_core::{PlayflowError, SecretKind};
use playflow_test_utils::write_temp_config;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[run]
loop_max_iterations = 25
prefer_streaming = true
batch_concurrency = 8
event_buffer = 512

[secrets]
open_ai_api_key = "sk-test-key"
hugging_face_api_token = "hf_test"
eleven_labs_api_key = "el_test"

[openai]
base_url = "http://localhost:8080/v1/chat/completions"
request_timeout_secs = 15

[openai.retry]
max_retries = 5
initial_backoff_ms = 100
max_backoff_ms = 1000

[huggingface]
base_url = "http://localhost:8081"

[elevenlabs]
base_url = "http://localhost:8082"
"#;

    let tmp = write_temp_config(toml_content);
    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.run.loop_max_iterations, 25);
    assert!(config.run.prefer_streaming);
    assert_eq!(config.run.batch_concurrency, 8);
    assert_eq!(config.run.event_buffer, 512);

    assert_eq!(config.secrets.get(SecretKind::OpenAiApiKey), Some("sk-test-key"));
    assert_eq!(config.secrets.get(SecretKind::HuggingFaceApiToken), Some("hf_test"));
    assert_eq!(config.secrets.get(SecretKind::ElevenLabsApiKey), Some("el_test"));

    assert_eq!(
        config.openai.base_url.as_deref(),
        Some("http://localhost:8080/v1/chat/completions")
    );
    assert_eq!(config.openai.request_timeout_secs, 15);
    assert_eq!(config.openai.retry.max_retries, 5);
    assert_eq!(config.openai.retry.initial_backoff_ms, 100);
    assert_eq!(config.openai.retry.max_backoff_ms, 1000);
    assert_eq!(config.huggingface.base_url.as_deref(), Some("http://localhost:8081"));
    assert_eq!(config.elevenlabs.base_url.as_deref(), Some("http://localhost:8082"));
}

#[test]
fn test_load_minimal_config_uses_defaults() {
    let tmp = write_temp_config("[secrets]\nopen_ai_api_key = \"sk-only\"\n");
    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.run.loop_max_iterations, 10);
    assert!(!config.run.prefer_streaming);
    assert_eq!(config.run.batch_concurrency, 5);
    assert!(config.openai.base_url.is_none());
    assert!(config.secrets.hugging_face_api_token().is_none());
}

#[test]
fn test_env_var_expansion_in_secrets() {
    std::env::set_var("PLAYFLOW_TEST_OPENAI_KEY", "sk-from-env");
    let tmp = write_temp_config("[secrets]\nopen_ai_api_key = \"${PLAYFLOW_TEST_OPENAI_KEY}\"\n");
    let config = AppConfig::load(tmp.path()).expect("load config");
    std::env::remove_var("PLAYFLOW_TEST_OPENAI_KEY");

    assert_eq!(config.secrets.open_ai_api_key(), Some("sk-from-env"));
}

#[test]
fn test_missing_file_is_config_not_found() {
    let err = AppConfig::load(std::path::Path::new("/nonexistent/playflow.toml")).unwrap_err();
    assert!(matches!(err, PlayflowError::ConfigNotFound(_)));
}

#[test]
fn test_invalid_toml_is_config_error() {
    let tmp = write_temp_config("[run\nloop_max_iterations = ");
    let err = AppConfig::load(tmp.path()).unwrap_err();
    assert!(matches!(err, PlayflowError::Config(_)));
}
