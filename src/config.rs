use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_DIR: &str = "mail_digest";

pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:0/";
pub const DEFAULT_GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama2";
pub const DEFAULT_EMBED_MODEL: &str = "all-minilm";
pub const DEFAULT_COLLECTION: &str = "emails";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    pub client_id: Option<String>,
    pub client_secrets_path: Option<String>,
    pub redirect_uri: Option<String>,
    pub token_path: Option<String>,
    pub gmail_api_base: Option<String>,
    pub ollama_url: Option<String>,
    pub model: Option<String>,
    pub embed_model: Option<String>,
    pub db_path: Option<String>,
    pub collection: Option<String>,
    pub summary_dir: Option<String>,
}

impl Config {
    pub fn redirect_uri(&self) -> String {
        self.redirect_uri
            .clone()
            .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string())
    }

    pub fn gmail_api_base(&self) -> String {
        self.gmail_api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_GMAIL_API_BASE.to_string())
    }

    /// `{ollama_url}/api/generate`
    pub fn generate_url(&self) -> String {
        format!("{}/api/generate", self.ollama_base())
    }

    /// `{ollama_url}/api/embeddings`
    pub fn embeddings_url(&self) -> String {
        format!("{}/api/embeddings", self.ollama_base())
    }

    fn ollama_base(&self) -> String {
        self.ollama_url
            .as_deref()
            .unwrap_or(DEFAULT_OLLAMA_URL)
            .trim_end_matches('/')
            .to_string()
    }

    pub fn model(&self) -> String {
        self.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    pub fn embed_model(&self) -> String {
        self.embed_model
            .clone()
            .unwrap_or_else(|| DEFAULT_EMBED_MODEL.to_string())
    }

    pub fn collection(&self) -> String {
        self.collection
            .clone()
            .unwrap_or_else(|| DEFAULT_COLLECTION.to_string())
    }
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join(APP_DIR))
}

fn data_dir() -> Result<PathBuf> {
    Ok(dirs::data_dir()
        .ok_or_else(|| anyhow::anyhow!("no data dir available"))?
        .join(APP_DIR))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

/// Reads `path`; a missing file is written out as a template and defaults apply.
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        let sample = Config {
            client_secrets_path: Some("credentials.json".to_string()),
            redirect_uri: Some(DEFAULT_REDIRECT_URI.to_string()),
            ollama_url: Some(DEFAULT_OLLAMA_URL.to_string()),
            model: Some(DEFAULT_MODEL.to_string()),
            embed_model: Some(DEFAULT_EMBED_MODEL.to_string()),
            ..Config::default()
        };
        let tom = toml::to_string_pretty(&sample)?;
        fs::write(path, tom)?;
        log::info!("Created template config at {}", path.display());
        return Ok(sample);
    }
    let s = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&s)?;
    Ok(cfg)
}

/// Relative paths in the config resolve against the config directory.
fn resolve_in(base: Result<PathBuf>, configured: Option<&str>, default_name: &str) -> Result<PathBuf> {
    match configured {
        Some(p) if Path::new(p).is_absolute() => Ok(PathBuf::from(p)),
        Some(p) => Ok(config_dir()?.join(p)),
        None => {
            let dir = base?;
            fs::create_dir_all(&dir)?;
            Ok(dir.join(default_name))
        }
    }
}

pub fn resolve_token_path(cfg: &Config) -> Result<PathBuf> {
    resolve_in(config_dir(), cfg.token_path.as_deref(), "token.json")
}

pub fn resolve_client_secrets_path(cfg: &Config) -> Result<PathBuf> {
    resolve_in(
        config_dir(),
        cfg.client_secrets_path.as_deref(),
        "credentials.json",
    )
}

pub fn resolve_db_path(cfg: &Config) -> Result<PathBuf> {
    resolve_in(data_dir(), cfg.db_path.as_deref(), "vector_index.db")
}

pub fn resolve_summary_dir(cfg: &Config) -> Result<PathBuf> {
    let dir = resolve_in(data_dir(), cfg.summary_dir.as_deref(), "summaries")?;
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_writes_template_and_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let cfg = load_config_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.model(), "llama2");
        assert_eq!(cfg.generate_url(), "http://localhost:11434/api/generate");

        let reread = load_config_from(&path).unwrap();
        assert_eq!(reread.embed_model(), DEFAULT_EMBED_MODEL);
        assert_eq!(reread.client_secrets_path.as_deref(), Some("credentials.json"));
    }

    #[test]
    fn partial_config_falls_back_per_field() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "ollama_url = \"http://gpu-box:11434/\"\nmodel = \"mistral\"\n",
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.model(), "mistral");
        assert_eq!(cfg.embeddings_url(), "http://gpu-box:11434/api/embeddings");
        assert_eq!(cfg.collection(), "emails");
        assert_eq!(cfg.gmail_api_base(), DEFAULT_GMAIL_API_BASE);
        assert_eq!(cfg.redirect_uri(), DEFAULT_REDIRECT_URI);
    }

    #[test]
    fn absolute_paths_are_kept() {
        let cfg = Config {
            token_path: Some("/var/lib/digest/token.json".to_string()),
            ..Config::default()
        };
        assert_eq!(
            resolve_token_path(&cfg).unwrap(),
            PathBuf::from("/var/lib/digest/token.json")
        );
    }
}
