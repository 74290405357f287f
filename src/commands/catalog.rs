//! Read-only catalog commands: categories and pending imports.

use std::process::ExitCode;

use anyhow::Result;

use transfer_core::api::ImportProduct;

use super::CommandContext;

pub async fn run_categories_command(ctx: &CommandContext) -> Result<ExitCode> {
    for category in ctx.client.api().categories().await {
        println!("{category}");
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn run_import_list_command(ctx: &CommandContext) -> Result<ExitCode> {
    let auth = ctx.auth()?;
    let products = ctx.client.api().import_products(&auth).await?;
    if products.is_empty() {
        println!("No imported products are waiting for a file.");
        return Ok(ExitCode::SUCCESS);
    }
    for (index, product) in products.iter().enumerate() {
        println!("{}", listing_line(index + 1, product));
    }
    Ok(ExitCode::SUCCESS)
}

fn listing_line(position: usize, product: &ImportProduct) -> String {
    let mut line = format!("{position:>3}. {}", product.title);
    if let Some(price) = product.price {
        line.push_str(&format!(" [{price:.2}]"));
    }
    if let Some(category) = &product.category {
        line.push_str(&format!(" ({category})"));
    }
    line
}
