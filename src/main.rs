use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, anyhow};
use clap::Parser;
use tokio::io::AsyncWriteExt as _;
use tracing::error;

use strapi_media::{ExtractContext, config::Config, fetch::HttpFetcher, local::LocalStore};

#[derive(Parser)]
struct Opts {
    #[clap(short, long, env = "STRAPI_MEDIA_CONFIG")]
    config: PathBuf,
    /// JSON array of entities as returned by the CMS api.
    #[clap(short, long)]
    input: PathBuf,
    #[clap(short = 't', long)]
    entity_type: String,
    /// Defaults to stdout.
    #[clap(short, long)]
    output: Option<PathBuf>,
    #[clap(long, env = "STRAPI_JWT_TOKEN", hide_env_values = true)]
    jwt_token: Option<String>,
}

async fn run(opts: Opts) -> anyhow::Result<bool> {
    let config = tokio::fs::read_to_string(&opts.config)
        .await
        .with_context(|| "read config")?;
    let mut config: Config = serde_yaml::from_str(&config)
        .with_context(|| format!("parse config from {}", opts.config.display()))?;
    config.validate().map_err(|msg| anyhow!("{msg}"))?;
    if opts.jwt_token.is_some() {
        config.jwt_token = opts.jwt_token;
    }

    let entities = tokio::fs::read_to_string(&opts.input)
        .await
        .with_context(|| format!("read entities from {}", opts.input.display()))?;
    let mut entities: Vec<serde_json::Value> = serde_json::from_str(&entities)
        .with_context(|| format!("parse entities from {}", opts.input.display()))?;

    tokio::fs::create_dir_all(&config.download_dir)
        .await
        .with_context(|| format!("create {}", config.download_dir.display()))?;
    let store = LocalStore::open(&config.cache_db)
        .await
        .with_context(|| format!("open {}", config.cache_db))?;
    let ctx = ExtractContext::from_config(
        &config,
        store.cache(),
        HttpFetcher::new(&config.download_dir),
        store.nodes(),
    );

    let report = strapi_media::download_media_files(&mut entities, &opts.entity_type, &ctx).await;
    for (index, error) in &report.failures {
        error!(%index, %error, "Failed to download media");
    }

    let output = serde_json::to_string_pretty(&entities).with_context(|| "serialize entities")?;
    match &opts.output {
        Some(path) => tokio::fs::write(path, output)
            .await
            .with_context(|| format!("write {}", path.display()))?,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(output.as_bytes())
                .await
                .with_context(|| "write stdout")?;
            stdout.flush().await.with_context(|| "flush stdout")?;
        }
    }
    Ok(report.is_success())
}

#[tokio::main]
async fn main() -> ExitCode {
    let opts = Opts::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    match run(opts).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(?e, "critical error");
            ExitCode::FAILURE
        }
    }
}
