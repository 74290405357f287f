//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use transfer_core::auth::{INIT_DATA_ENV, USER_ID_ENV};
use transfer_core::transfer::{DownloadMode, UploadMode};

/// Environment variable holding the backend API root.
pub const API_URL_ENV: &str = "SHOP_TRANSFER_API_URL";

/// Platform recorded for imported products unless overridden.
pub const DEFAULT_IMPORT_SOURCE: &str = "gumroad";

/// Upload product files to the shop and download purchased ones.
#[derive(Parser, Debug)]
#[command(name = "shop-transfer")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Backend API root, e.g. https://shop.example.com/api/
    #[arg(long, env = API_URL_ENV, global = true)]
    pub api_url: Option<String>,

    /// Signed session data forwarded with every request
    #[arg(long, env = INIT_DATA_ENV, global = true, hide_env_values = true)]
    pub init_data: Option<String>,

    /// User id; read from the session data when omitted
    #[arg(long, env = USER_ID_ENV, global = true)]
    pub user_id: Option<u64>,

    /// Config file (default: $XDG_CONFIG_HOME/shop-transfer/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Object-storage upload transport: presigned_put or native_api
    #[arg(long, global = true, value_name = "MODE")]
    pub upload_mode: Option<UploadMode>,

    /// Download transport: proxy_stream or presigned_url
    #[arg(long, global = true, value_name = "MODE")]
    pub download_mode: Option<DownloadMode>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload a new product file
    Upload(UploadArgs),
    /// Upload the file of an imported product together with its details
    Import(ImportArgs),
    /// List imported products that still need a file
    ImportList,
    /// Check that a product was purchased and has a file
    Verify {
        /// Product identifier
        product_id: String,
    },
    /// Download a purchased product file
    Download(DownloadArgs),
    /// List the shop's product categories
    Categories,
}

#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    /// File to upload
    pub file: PathBuf,

    /// MIME type (guessed from the extension when omitted)
    #[arg(long)]
    pub mime: Option<String>,

    /// Do not render a first-page preview for PDFs
    #[arg(long)]
    pub no_preview: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    #[command(flatten)]
    pub upload: UploadArgs,

    /// Product title
    #[arg(long, required_unless_present = "listing")]
    pub title: Option<String>,

    /// Product description
    #[arg(long)]
    pub description: Option<String>,

    /// Price in the shop currency
    #[arg(long)]
    pub price: Option<f64>,

    /// Category; must be one the backend lists
    #[arg(long)]
    pub category: Option<String>,

    /// Take the product details from entry N of `import-list` (1-based)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub listing: Option<u32>,

    /// Platform the product was imported from
    #[arg(long, default_value = DEFAULT_IMPORT_SOURCE)]
    pub imported_from: String,
}

#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    /// Product identifier
    pub product_id: String,

    /// Directory to save into (default: config `output_dir`, else `.`)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_upload_parses_file_and_mime() {
        let cli = Cli::try_parse_from([
            "shop-transfer",
            "upload",
            "guide.pdf",
            "--mime",
            "application/pdf",
        ])
        .unwrap();
        let Command::Upload(args) = cli.command else {
            panic!("expected upload command");
        };
        assert_eq!(args.file, PathBuf::from("guide.pdf"));
        assert_eq!(args.mime.as_deref(), Some("application/pdf"));
        assert!(!args.no_preview);
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "shop-transfer",
            "download",
            "TBF-1",
            "-vv",
            "--init-data",
            "query_id=1",
            "--user-id",
            "42",
            "--download-mode",
            "presigned-url",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.init_data.as_deref(), Some("query_id=1"));
        assert_eq!(cli.user_id, Some(42));
        assert_eq!(cli.download_mode, Some(DownloadMode::PresignedUrl));
        let Command::Download(args) = cli.command else {
            panic!("expected download command");
        };
        assert_eq!(args.product_id, "TBF-1");
        assert!(args.output_dir.is_none());
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let cli = Cli::try_parse_from(["shop-transfer", "-q", "categories"]).unwrap();
        assert!(cli.quiet);
        assert!(matches!(cli.command, Command::Categories));
    }

    #[test]
    fn test_cli_unknown_upload_mode_rejected() {
        let err = Cli::try_parse_from(["shop-transfer", "--upload-mode", "ftp", "categories"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_import_requires_title_or_listing() {
        let err = Cli::try_parse_from(["shop-transfer", "import", "course.zip"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let cli = Cli::try_parse_from(["shop-transfer", "import", "course.zip", "--listing", "2"])
            .unwrap();
        let Command::Import(args) = cli.command else {
            panic!("expected import command");
        };
        assert_eq!(args.listing, Some(2));
        assert_eq!(args.imported_from, DEFAULT_IMPORT_SOURCE);
    }

    #[test]
    fn test_cli_import_listing_is_one_based() {
        let err = Cli::try_parse_from(["shop-transfer", "import", "a.zip", "--listing", "0"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_import_full_metadata() {
        let cli = Cli::try_parse_from([
            "shop-transfer",
            "import",
            "course.zip",
            "--title",
            "Course",
            "--price",
            "19.5",
            "--category",
            "Education",
        ])
        .unwrap();
        let Command::Import(args) = cli.command else {
            panic!("expected import command");
        };
        assert_eq!(args.title.as_deref(), Some("Course"));
        assert_eq!(args.price, Some(19.5));
        assert_eq!(args.category.as_deref(), Some("Education"));
        assert_eq!(args.upload.file, PathBuf::from("course.zip"));
    }

    #[test]
    fn test_cli_subcommand_required() {
        assert!(Cli::try_parse_from(["shop-transfer"]).is_err());
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Cli::try_parse_from(["shop-transfer", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Cli::try_parse_from(["shop-transfer", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
