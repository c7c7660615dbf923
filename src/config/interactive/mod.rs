#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::Path;

use super::{BoundaryConfig, Config, ConfigError, GeocoderConfig, OllamaConfig, TieBreak};

#[inline]
pub fn run_interactive_config(base_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Ward RAG Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(base_dir)?;

    eprintln!("{}", style("Ollama Configuration").bold().yellow());
    eprintln!("Configure the Ollama instance used for embeddings and answers.");
    eprintln!();

    configure_ollama(&mut config.ollama)?;

    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(config.llm.model.clone())
        .interact_text()?;
    config.llm.set_model(chat_model)?;

    eprintln!();
    eprintln!("{}", style("Ward Boundaries").bold().yellow());
    configure_boundaries(&mut config.boundaries)?;

    eprintln!();
    eprintln!("{}", style("Geocoding").bold().yellow());
    configure_geocoder(&mut config.geocoder)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_ollama_connection(&config.ollama) {
        eprintln!("{}", style("✓ Ollama connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to Ollama").yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before ingesting.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    eprintln!("  Host: {}", style(&config.ollama.host).cyan());
    eprintln!("  Port: {}", style(config.ollama.port).cyan());
    eprintln!("  Embedding Model: {}", style(&config.ollama.model).cyan());
    eprintln!("  Batch Size: {}", style(config.ollama.batch_size).cyan());
    eprintln!("  Chat Model: {}", style(&config.llm.model).cyan());

    match config.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }

    eprintln!();
    eprintln!("{}", style("Boundaries:").bold().yellow());
    eprintln!("  Source: {}", style(&config.boundaries.source).cyan());
    eprintln!("  City: {}", style(&config.boundaries.city).cyan());
    eprintln!(
        "  Properties: id={} name={}",
        style(&config.boundaries.id_property).cyan(),
        style(&config.boundaries.name_property).cyan()
    );
    eprintln!("  Vector Table: {}", style(&config.boundaries.table_name).cyan());

    eprintln!();
    eprintln!("{}", style("Geocoder:").bold().yellow());
    eprintln!("  URL: {}", style(&config.geocoder.base_url).cyan());
    eprintln!("  Region: {}", style(&config.geocoder.region).cyan());
    eprintln!("  Tie-break: {:?}", style(config.geocoder.tie_break).cyan());

    eprintln!();
    eprintln!(
        "HTTP: timeout {}s, {} attempts",
        config.http.timeout_seconds, config.http.retry_attempts
    );
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(base_dir: &Path) -> Result<Config> {
    Config::load(base_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No usable configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: base_dir.to_path_buf(),
                ..Config::default()
            })
        },
        |config| {
            if config.config_file_path().exists() {
                eprintln!("{}", style("Found existing configuration.").green());
            }
            Ok(config)
        },
    )
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            temp_config.validate()?;
            Ok(())
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(ollama.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(ollama.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_model(model)?;
    ollama.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_boundaries(boundaries: &mut BoundaryConfig) -> Result<()> {
    let source: String = Input::new()
        .with_prompt("Boundary GeoJSON (URL or path)")
        .default(boundaries.source.clone())
        .interact_text()?;
    boundaries.set_source(source)?;

    boundaries.city = Input::new()
        .with_prompt("City name")
        .default(boundaries.city.clone())
        .interact_text()?;

    Ok(())
}

fn configure_geocoder(geocoder: &mut GeocoderConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("Geocoder URL")
        .default(geocoder.base_url.clone())
        .interact_text()?;
    geocoder.set_base_url(base_url)?;

    let region: String = Input::new()
        .with_prompt("Region appended to landmark names")
        .default(geocoder.region.clone())
        .allow_empty(true)
        .interact_text()?;
    geocoder.set_region(region);

    let policies = &["first", "strict"];
    let default_index = usize::from(geocoder.tie_break == TieBreak::Strict);
    let policy_index = Select::new()
        .with_prompt("When several places rank equally")
        .default(default_index)
        .items(policies)
        .interact()?;
    geocoder.tie_break = if policy_index == 1 {
        TieBreak::Strict
    } else {
        TieBreak::First
    };

    Ok(())
}

fn test_ollama_connection(ollama: &OllamaConfig) -> bool {
    let url = format!(
        "{}://{}:{}/api/version",
        ollama.protocol, ollama.host, ollama.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
