use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "tricook").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("tricook.db");

        Ok(Config { db_path, data_dir })
    }

    /// The OpenAI key used by the `parse` command. Environment-only; never
    /// written to disk.
    pub fn openai_api_key(&self) -> Result<String> {
        let key = std::env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY is not set. Export it to use the parse command")?;
        let key = key.trim().to_string();
        if key.is_empty() {
            anyhow::bail!("OPENAI_API_KEY is empty");
        }
        Ok(key)
    }
}
