use anyhow::{bail, Context, Result};
use indicatif::{HumanBytes, MultiProgress, ProgressDrawTarget};
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use url::Url;

use crate::cli::{FormMethod, RedirectStyle};
use crate::downloader::Downloader;
use crate::error::TransferError;
use crate::progress::BarIndicator;
use crate::ui::{ConsoleNavigator, ConsoleNotifier};
use crate::uploader::{UploadForm, Uploader};
use crate::utils::{as_directory, get_filename_from_url, sanitize_filename};

pub fn build_client() -> Client {
    Client::builder()
        .user_agent(concat!("fshare/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| Client::new())
}

fn multi_progress() -> MultiProgress {
    let multi_progress = MultiProgress::new();
    // Force draw target to stderr so stdout only carries result URLs
    multi_progress.set_draw_target(ProgressDrawTarget::stderr_with_hz(5));
    multi_progress
}

pub struct UploadRequest {
    pub file: PathBuf,
    pub server: Url,
    pub action: Option<Url>,
    pub method: FormMethod,
    pub field: String,
    pub extra: Vec<(String, String)>,
    pub redirect: RedirectStyle,
}

pub async fn run_upload(request: UploadRequest) -> Result<()> {
    // File page URLs are joined beneath the server URL, which would drop these.
    if request.server.query().is_some() || request.server.fragment().is_some() {
        bail!("Server URL must not carry a query or fragment: {}", request.server);
    }

    let action = match request.action {
        Some(action) => action,
        None => as_directory(&request.server)
            .join("upload")
            .context("Failed to derive upload action from server URL")?,
    };

    let label = request
        .file
        .file_name()
        .map(|n| format!("Uploading {}", n.to_string_lossy()))
        .unwrap_or_else(|| "Uploading".to_string());
    let multi_progress = multi_progress();
    let indicator = Arc::new(BarIndicator::new(&multi_progress, label));

    let uploader = Uploader::new(
        build_client(),
        request.server,
        request.redirect,
        Arc::new(ConsoleNavigator),
        Arc::new(ConsoleNotifier),
    );
    let form = UploadForm {
        action,
        method: request.method,
        field: request.field,
        file: request.file,
        extra: request.extra,
    };

    uploader
        .submit(&form, indicator)
        .await
        .with_context(|| format!("Failed to upload {:?}", form.file))?;
    Ok(())
}

/// Start every download at once; each gets its own counter and progress bar.
pub async fn run_downloads(urls: Vec<Url>, output: PathBuf, from_page: bool) -> Result<()> {
    if !output.exists() {
        fs::create_dir_all(&output).await.context("Failed to create output directory")?;
    }

    let multi_progress = multi_progress();
    let downloader = Arc::new(Downloader::new(build_client(), output));
    let total = urls.len();
    let mut handles = vec![];

    for url in urls {
        let downloader = downloader.clone();
        let multi_progress = multi_progress.clone();

        let handle = tokio::spawn(async move {
            let result: Result<PathBuf, TransferError> = async {
                let target = if from_page {
                    downloader.resolve_page(&url).await?
                } else {
                    url.clone()
                };
                let label = format!("Downloading {}", sanitize_filename(&get_filename_from_url(&target)));
                let indicator = Arc::new(BarIndicator::new(&multi_progress, label));
                downloader.download(&target, indicator).await
            }
            .await;

            match result {
                Ok(path) => {
                    let size = fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
                    multi_progress.suspend(|| {
                        println!("Saved {} ({})", path.display(), HumanBytes(size))
                    });
                    true
                }
                Err(e) => {
                    multi_progress.suspend(|| eprintln!("Failed to download {}: {}", url, e));
                    false
                }
            }
        });
        handles.push(handle);
    }

    let mut failed = 0;
    for handle in handles {
        if !handle.await? {
            failed += 1;
        }
    }

    if failed > 0 {
        bail!("{} of {} downloads failed", failed, total);
    }
    Ok(())
}
