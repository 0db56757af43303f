//! Core application

use anyhow::{Context, Result, bail};
use std::time::Duration;

use crate::cache::{CacheService, ConnectionRegistry};
use crate::core::cli::{self, Commands};
use crate::core::config::CacheConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};

pub struct CoreApp {
    cache: CacheService,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        let config = CacheConfig::load(&cli_config)?;
        let app = Self::init(&config).await?;
        app.execute(command).await
    }

    /// Connect the cache service described by `config`
    pub async fn init(config: &CacheConfig) -> Result<Self> {
        Self::with_registry(config, &ConnectionRegistry::redis()).await
    }

    pub async fn with_registry(
        config: &CacheConfig,
        registry: &ConnectionRegistry,
    ) -> Result<Self> {
        let cache = CacheService::connect(config, registry)
            .await
            .context("Failed to initialize cache service")?;

        tracing::debug!(backend = cache.backend_name(), "Cache initialized");

        Ok(Self { cache })
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        // Command output owns stdout
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    /// Run one command and return the line it prints
    pub async fn execute_command(&self, command: Commands) -> Result<String> {
        let cache = &self.cache;
        let output = match command {
            Commands::Get { key, default } => cache
                .get::<String>(&key, default)
                .await?
                .unwrap_or_else(|| "(nil)".to_string()),
            Commands::Set {
                key,
                value,
                lifetime,
            } => {
                if !cache.set(&key, &value, Duration::from_secs(lifetime)).await {
                    bail!("Failed to store '{}'", key);
                }
                "OK".to_string()
            }
            Commands::Ttl { key } => cache.ttl(&key).await?.to_string(),
            Commands::Delete { key } => cache.delete(&key).await.to_string(),
            Commands::DeleteAll { yes } => {
                if !yes {
                    bail!("delete-all flushes every key on the server; pass --yes to confirm");
                }
                if !cache.delete_all().await {
                    bail!("Failed to flush the cache server");
                }
                "OK".to_string()
            }
            Commands::Incr { key, step } => cache.increment(&key, step).await?.to_string(),
            Commands::Decr { key, step } => cache.decrement(&key, step).await?.to_string(),
            Commands::Exists { key } => cache.exists(&key).await?.to_string(),
            Commands::Expire { key, seconds } => cache
                .expire(&key, Duration::from_secs(seconds))
                .await
                .to_string(),
            Commands::Ping => {
                cache.ping().await?;
                "PONG".to_string()
            }
        };
        Ok(output)
    }

    async fn execute(&self, command: Commands) -> Result<()> {
        let output = self.execute_command(command).await?;
        println!("{}", output);
        Ok(())
    }
}
