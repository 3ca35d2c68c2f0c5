mod cli;
mod commands;
mod downloader;
mod error;
mod progress;
mod ui;
mod uploader;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::cli::{parse_field, FormMethod, RedirectStyle};
use crate::commands::UploadRequest;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a file and print the page it is shared on
    Upload {
        /// File to upload
        #[arg(index = 1)]
        file: PathBuf,

        /// Base URL of the share site; file pages are built beneath it
        #[arg(short = 's', long)]
        server: Url,

        /// Upload endpoint (defaults to <server>/upload)
        #[arg(short = 'a', long)]
        action: Option<Url>,

        /// HTTP method used to submit the form
        #[arg(short = 'm', long, value_enum, default_value = "post")]
        method: FormMethod,

        /// Form field name carrying the file
        #[arg(long, default_value = "file")]
        field: String,

        /// Extra text fields sent with the form (key=value, repeatable)
        #[arg(short = 'F', long = "form", value_parser = parse_field)]
        extra: Vec<(String, String)>,

        /// Shape of the file page URL built from the server's receipt
        #[arg(short = 'r', long, value_enum, default_value = "id")]
        redirect: RedirectStyle,
    },

    /// Download one or more files, each with its own progress bar
    Download {
        /// URLs to fetch
        #[arg(required = true)]
        urls: Vec<Url>,

        /// Directory to save downloaded files
        #[arg(short = 'd', long = "download-dir", default_value = "downloads")]
        download_dir: PathBuf,

        /// Treat each URL as a file page and follow its download link
        #[arg(short = 'p', long)]
        page: bool,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        match args.command {
            Command::Upload {
                file,
                server,
                action,
                method,
                field,
                extra,
                redirect,
            } => {
                crate::commands::run_upload(UploadRequest {
                    file,
                    server,
                    action,
                    method,
                    field,
                    extra,
                    redirect,
                })
                .await
            }
            Command::Download {
                urls,
                mut download_dir,
                page,
            } => {
                // Output dir might not exist yet, so we resolve it relative to current dir
                if download_dir.is_relative() {
                    if let Ok(cwd) = std::env::current_dir() {
                        download_dir = cwd.join(&download_dir);
                    }
                }
                crate::commands::run_downloads(urls, download_dir, page).await
            }
        }
    })
}
