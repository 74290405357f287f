//! Upload and import command handlers.

use std::process::ExitCode;

use anyhow::{Context, Result, bail};

use transfer_core::api::{DEFAULT_CATEGORY, ProductMetadata};
use transfer_core::auth::AuthContext;
use transfer_core::transfer::{UploadReceipt, UploadRequest};
use transfer_core::ui::{format_bytes, select_category};

use super::{CommandContext, abandoned, conclude, run_guarded};
use crate::cli::{ImportArgs, UploadArgs};

pub async fn run_upload_command(ctx: &CommandContext, args: &UploadArgs) -> Result<ExitCode> {
    let auth = ctx.auth()?;
    send(ctx, &upload_request(args), &auth).await
}

pub async fn run_import_command(ctx: &CommandContext, args: &ImportArgs) -> Result<ExitCode> {
    if let Some(price) = args.price
        && !(price.is_finite() && price >= 0.0)
    {
        bail!("Invalid price: {price}. Expected a non-negative number");
    }
    let auth = ctx.auth()?;

    let mut metadata = match args.listing {
        Some(position) => {
            let products = ctx.client.api().import_products(&auth).await?;
            let index = usize::try_from(position.saturating_sub(1))?;
            let product = products.get(index).with_context(|| {
                format!(
                    "no import listing #{position} ({} available)",
                    products.len()
                )
            })?;
            product.to_metadata(&args.imported_from)
        }
        None => ProductMetadata {
            imported_from: Some(args.imported_from.clone()),
            ..ProductMetadata::default()
        },
    };
    if let Some(title) = &args.title {
        metadata.title.clone_from(title);
    }
    if args.description.is_some() {
        metadata.description.clone_from(&args.description);
    }
    if args.price.is_some() {
        metadata.price = args.price;
    }
    if metadata.title.trim().is_empty() {
        bail!("Imported product needs a title");
    }

    let categories = ctx.client.api().categories().await;
    let requested = args.category.as_deref().or(metadata.category.as_deref());
    metadata.category = Some(select_category(&categories, requested, DEFAULT_CATEGORY));

    let request = upload_request(&args.upload).with_metadata(metadata);
    send(ctx, &request, &auth).await
}

fn upload_request(args: &UploadArgs) -> UploadRequest {
    let request = UploadRequest::new(args.file.clone());
    match &args.mime {
        Some(mime) => request.with_mime_type(mime.clone()),
        None => request,
    }
}

async fn send(
    ctx: &CommandContext,
    request: &UploadRequest,
    auth: &AuthContext,
) -> Result<ExitCode> {
    ctx.view.begin()?;
    let guard = ctx.view.guard();
    let Some(result) = run_guarded(&guard, ctx.client.upload(request, auth)).await else {
        return Ok(abandoned(&ctx.view));
    };
    let Some(receipt) = conclude(&ctx.view, result, UploadReceipt::artifact) else {
        return Ok(ExitCode::FAILURE);
    };

    println!("product_id = {}", receipt.product_id);
    println!("object_key = {}", receipt.object_key);
    println!("size = {}", format_bytes(receipt.file_size));
    if let Some(preview) = &receipt.preview_url {
        println!("preview = {preview}");
    }
    Ok(ExitCode::SUCCESS)
}
