//! `ragline config`: Configuration management commands.

use std::path::{Path, PathBuf};

use ragline_config::{AppConfig, IndexBackend};
use ragline_pipeline::PipelineSettings;

use super::load_config;

const REDACTED: &str = "[REDACTED]";

pub async fn validate(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("   ❌ {e}");
            return Err(e);
        }
    };
    println!("   ✅ Config parsed successfully");

    if let Err(e) = PipelineSettings::from_config(&config).validate() {
        println!("   ❌ {e}");
        return Err(e.into());
    }

    let warnings = warnings(&config);
    if warnings.is_empty() {
        println!("   ✅ All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   ⚠️  {w}");
        }
    }

    probe_provider(&config).await;

    println!();
    println!("   Provider:    {}", config.default_provider);
    println!("   Model:       {}", config.generation.completion_model_id);
    println!("   Embeddings:  {}", config.retrieval.embedding_model_id);
    println!("   Index:       {:?}", config.retrieval.backend);
    println!(
        "   Gateway:     {}:{}",
        config.gateway.host, config.gateway.port
    );

    Ok(())
}

/// Report whether the default provider answers; never fails validation.
async fn probe_provider(config: &AppConfig) {
    let Some(handle) = ragline_providers::build_from_config(config).default() else {
        return;
    };
    match handle.completion.health_check().await {
        Ok(true) => println!("   ✅ Provider {} is reachable", config.default_provider),
        Ok(false) => println!(
            "   ⚠️  Provider {} rejected the health check (check the API key)",
            config.default_provider
        ),
        Err(e) => println!("   ⚠️  Provider {} unreachable: {e}", config.default_provider),
    }
}

/// Problems that do not stop loading but will likely fail a query.
fn warnings(config: &AppConfig) -> Vec<&'static str> {
    let mut warnings = Vec::new();

    if config.default_provider != "ollama"
        && config.provider_api_key(&config.default_provider).is_none()
    {
        warnings.push("No API key set (set RAGLINE_API_KEY or OPENAI_API_KEY env var)");
    }

    let retrieval = &config.retrieval;
    match retrieval.backend {
        IndexBackend::Memory if retrieval.snapshot_path.is_none() => {
            warnings.push("Memory index has no snapshot_path; every search will fail");
        }
        IndexBackend::Pinecone if retrieval.pinecone_host.is_none() => {
            warnings.push("Pinecone backend needs retrieval.pinecone_host (or PINECONE_HOST)");
        }
        IndexBackend::Pinecone if retrieval.pinecone_api_key.is_none() => {
            warnings.push("Pinecone backend needs PINECONE_API_KEY");
        }
        _ => {}
    }

    if config.gateway.host == "0.0.0.0" && config.gateway.allowed_origins.is_empty() {
        warnings.push("Gateway bound to 0.0.0.0 and accepts any CORS origin");
    }

    warnings
}

pub async fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let toml_str = toml::to_string_pretty(&redacted(config))?;
    println!("{toml_str}");
    Ok(())
}

fn redacted(mut config: AppConfig) -> AppConfig {
    fn mask(secret: &mut Option<String>) {
        if secret.is_some() {
            *secret = Some(REDACTED.into());
        }
    }

    mask(&mut config.api_key);
    mask(&mut config.retrieval.pinecone_api_key);
    for provider in config.providers.values_mut() {
        mask(&mut provider.api_key);
    }
    config
}

fn resolve_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::config_path)
}

pub async fn path(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", resolve_path(config_path).display());
    Ok(())
}

pub async fn init(config_path: Option<&Path>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = resolve_path(config_path);
    write_default(&path, force)?;
    println!("✅ Wrote default config to {}", path.display());
    Ok(())
}

fn write_default(path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !force {
        return Err(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )
        .into());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(())
}
