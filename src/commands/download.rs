//! Purchase verification and download command handlers.

use std::process::ExitCode;

use anyhow::Result;

use transfer_core::transfer::DownloadReceipt;
use transfer_core::ui::{format_bytes, format_size_mb};

use super::{CommandContext, abandoned, conclude, run_guarded};
use crate::cli::DownloadArgs;

pub async fn run_verify_command(ctx: &CommandContext, product_id: &str) -> Result<ExitCode> {
    let auth = ctx.auth()?;
    let record = ctx.client.verify_purchase(product_id, &auth).await?;

    println!("product_id = {}", record.product_id);
    println!("title = {}", record.product_title);
    println!("order_id = {}", record.order_id);
    println!("size = {}", format_size_mb(record.file_size_mb));
    println!("downloads = {}", record.download_count);
    println!(
        "file = {}",
        if record.has_file { "available" } else { "not available" }
    );
    Ok(ExitCode::SUCCESS)
}

pub async fn run_download_command(ctx: &CommandContext, args: &DownloadArgs) -> Result<ExitCode> {
    let auth = ctx.auth()?;
    let output_dir = args.output_dir.as_ref().unwrap_or(&ctx.output_dir);

    ctx.view.begin()?;
    let guard = ctx.view.guard();
    let transfer = ctx.client.download(&args.product_id, output_dir, &auth);
    let Some(result) = run_guarded(&guard, transfer).await else {
        return Ok(abandoned(&ctx.view));
    };
    let Some(receipt) = conclude(&ctx.view, result, DownloadReceipt::artifact) else {
        return Ok(ExitCode::FAILURE);
    };

    println!("size = {}", format_bytes(receipt.bytes_written));
    if let Some(expected) = receipt.expected_bytes.filter(|_| receipt.size_mismatch()) {
        eprintln!(
            "Warning: received {} but the server announced {}",
            format_bytes(receipt.bytes_written),
            format_bytes(expected)
        );
    }
    Ok(ExitCode::SUCCESS)
}
