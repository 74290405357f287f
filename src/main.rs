//! CLI entry point for shop-transfer.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use transfer_core::api::ApiClient;
use transfer_core::config::{FileConfig, load_default_file_config, load_file_config};
use transfer_core::transfer::{
    DEFAULT_PDFTOPPM, DEFAULT_PREVIEW_PREFIX, DisabledRenderer, PdftoppmRenderer,
    PreviewRenderer, TransferClient, TransferObserver,
};

mod cli;
mod commands;
mod output;

use cli::{Cli, Command};
use commands::CommandContext;
use output::TerminalView;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(command = ?cli.command, "CLI arguments parsed");

    let file_config = match &cli.config {
        Some(path) => load_file_config(path)?,
        None => {
            let loaded = load_default_file_config()?;
            debug!(path = ?loaded.path, loaded = loaded.config.is_some(), "config resolved");
            loaded.config_or_default()
        }
    };

    let ctx = build_context(&cli, &file_config)?;

    match &cli.command {
        Command::Upload(args) => commands::run_upload_command(&ctx, args).await,
        Command::Import(args) => commands::run_import_command(&ctx, args).await,
        Command::ImportList => commands::run_import_list_command(&ctx).await,
        Command::Verify { product_id } => commands::run_verify_command(&ctx, product_id).await,
        Command::Download(args) => commands::run_download_command(&ctx, args).await,
        Command::Categories => commands::run_categories_command(&ctx).await,
    }
}

/// Merges flags over file config and builds the transfer client.
fn build_context(cli: &Cli, file_config: &FileConfig) -> Result<CommandContext> {
    let api_url = cli
        .api_url
        .clone()
        .or_else(|| file_config.api_base_url.clone())
        .context(
            "no API URL: pass --api-url, set SHOP_TRANSFER_API_URL or add api_base_url to the config file",
        )?;
    let api = ApiClient::new(&api_url, file_config.timeouts())
        .with_context(|| format!("cannot use API URL {api_url}"))?;

    let renderer: Arc<dyn PreviewRenderer> = if preview_disabled(&cli.command) {
        Arc::new(DisabledRenderer)
    } else {
        let program = file_config
            .pdftoppm_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PDFTOPPM));
        Arc::new(PdftoppmRenderer::new(program))
    };

    let view = Arc::new(TerminalView::new(cli.quiet));
    let observer: Arc<dyn TransferObserver> = view.clone();
    let client = TransferClient::builder(api)
        .upload_mode(cli.upload_mode.or(file_config.upload_mode).unwrap_or_default())
        .download_mode(
            cli.download_mode
                .or(file_config.download_mode)
                .unwrap_or_default(),
        )
        .preview_renderer(renderer)
        .preview_prefix(
            file_config
                .preview_prefix
                .clone()
                .unwrap_or_else(|| DEFAULT_PREVIEW_PREFIX.to_string()),
        )
        .preview_public_base_url(file_config.preview_public_base_url.clone())
        .observer(observer)
        .build();
    debug!(
        upload_mode = %client.upload_mode(),
        download_mode = %client.download_mode(),
        "transfer client ready"
    );

    Ok(CommandContext {
        client,
        view,
        init_data: cli.init_data.clone(),
        user_id: cli.user_id,
        output_dir: file_config
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(".")),
    })
}

fn preview_disabled(command: &Command) -> bool {
    match command {
        Command::Upload(args) => args.no_preview,
        Command::Import(args) => args.upload.no_preview,
        _ => false,
    }
}
