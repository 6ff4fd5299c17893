use clap::Parser;
use prompt_tuner::cli::Cli;
use prompt_tuner::config::Settings;
use prompt_tuner::domain::output::ViewMode;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_config_file() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("prompt-tuner.toml");

    let toml = r#"
[server]
host = "0.0.0.0"
port = 8088

[backend]
base_url = "https://workflows.internal"
timeout_seconds = 30

[schema]
cache_ttl_seconds = 60
directory = "schemas"

[schema.root_overrides]
summarize = "SummaryInput"

[validation]
debounce_ms = 150

[output]
default_view = "cards"
export_basename = "results"
"#;
    fs::write(&path, toml)?;

    let settings = Settings::from_file(&path)?;
    assert_eq!(settings.server.host, "0.0.0.0");
    assert_eq!(settings.server.port, 8088);
    assert_eq!(settings.backend.base_url, "https://workflows.internal");
    assert_eq!(settings.backend.timeout_seconds, 30);
    assert_eq!(settings.backend.schema_path, "/api/v1/workflows/{name}/schema");
    assert_eq!(settings.schema.cache_ttl_seconds, 60);
    assert_eq!(settings.schema.directory.as_deref(), Some(std::path::Path::new("schemas")));
    assert_eq!(
        settings.schema.root_overrides.get("summarize").map(String::as_str),
        Some("SummaryInput")
    );
    assert_eq!(settings.validation.debounce_ms, 150);
    assert_eq!(settings.output.default_view, ViewMode::Cards);
    assert_eq!(settings.output.export_basename, "results");

    Ok(())
}

#[test]
fn test_cli_overrides_file() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("custom.toml");
    fs::write(&path, "[server]\nhost = \"127.0.0.1\"\nport = 7000\n")?;

    let cli = Cli::parse_from([
        "prompt-tuner",
        "--config",
        path.to_str().unwrap(),
        "--port",
        "9000",
        "--backend-url",
        "http://backend:8000",
    ]);
    let settings = Settings::new_with_cli(&cli)?;
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 9000);
    assert_eq!(settings.backend.base_url, "http://backend:8000");

    Ok(())
}

#[test]
fn test_invalid_config_is_rejected() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("bad.toml");
    fs::write(
        &path,
        "[server]\nhost = \"\"\nport = 5000\n\n[schema]\ncache_ttl_seconds = 0\n",
    )?;

    let err = Settings::from_file(&path).unwrap_err().to_string();
    assert!(err.contains("Configuration validation failed"));
    assert!(err.contains("server.host"));
    assert!(err.contains("schema.cache_ttl_seconds"));

    Ok(())
}
