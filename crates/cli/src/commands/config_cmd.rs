//! `deepsift config`: Configuration management commands.

use deepsift_config::{AppConfig, Overrides};

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("   ok  Config parsed");
            config
        }
        Err(e) => {
            println!("   !!  Config error: {e}");
            return Err(e.into());
        }
    };

    let budget = config.budget();
    match config.provider_config(&Overrides::default()) {
        Ok(providers) => {
            println!("   ok  Providers ready");
            println!();
            println!("   Search:   {}", providers.search.kind());
            println!("   LLM:      {}", providers.llm.kind());
            let models = providers.llm.models();
            println!(
                "   Models:   {} / {} / {}",
                models.query_model, models.reflection_model, models.answer_model
            );
        }
        Err(e) => {
            println!("   !!  {e}");
            return Err(e.into());
        }
    }
    println!(
        "   Budget:   {} queries, {} loops",
        budget.initial_query_count, budget.max_loops
    );
    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let mut value = toml::Value::try_from(&config)?;
    redact(&mut value);
    println!("{}", toml::to_string_pretty(&value)?);
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_path().display());
    Ok(())
}

/// Mask every `api_key` in the tree.
fn redact(value: &mut toml::Value) {
    if let toml::Value::Table(table) = value {
        for (key, v) in table.iter_mut() {
            if key == "api_key" {
                *v = toml::Value::String("***".into());
            } else {
                redact(v);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        let path = AppConfig::config_path();
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn keys_are_redacted() {
        let mut config = AppConfig::default();
        config.google.api_key = Some("secret-gemini".into());
        config.brave.api_key = Some("secret-brave".into());

        let mut value = toml::Value::try_from(&config).unwrap();
        redact(&mut value);
        let text = toml::to_string_pretty(&value).unwrap();
        assert!(!text.contains("secret"));
        assert!(text.contains("***"));
    }
}
