use futures::{Stream, StreamExt};
use reqwest::header::{self, HeaderMap};
use reqwest::{Client, StatusCode};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};
use url::Url;

use crate::error::TransferError;
use crate::progress::{track, ProgressIndicator, Rounding};
use crate::utils::{create_unique_file, get_filename_from_url, sanitize_filename};

// Upper bound on the up-front buffer reservation; the header is not trusted further.
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

pub struct Downloader {
    client: Client,
    output_dir: PathBuf,
}

impl Downloader {
    pub fn new(client: Client, output_dir: PathBuf) -> Self {
        Self { client, output_dir }
    }

    /// Fetch `url` into the output directory, reporting progress on `indicator`.
    ///
    /// Failures are logged and hide the indicator. There is no retry.
    pub async fn download(
        &self,
        url: &Url,
        indicator: Arc<dyn ProgressIndicator>,
    ) -> Result<PathBuf, TransferError> {
        indicator.reset();

        match self.fetch(url, indicator.clone()).await {
            Ok(path) => {
                indicator.hide();
                info!(url = %url, path = %path.display(), "download saved");
                Ok(path)
            }
            Err(e) => {
                error!(url = %url, kind = ?e.kind(), error = %e, "download failed");
                indicator.hide();
                Err(e)
            }
        }
    }

    async fn fetch(
        &self,
        url: &Url,
        indicator: Arc<dyn ProgressIndicator>,
    ) -> Result<PathBuf, TransferError> {
        let response = self.client.get(url.clone()).send().await?;
        let total = check_response(response.status(), response.headers())?;
        debug!(url = %url, total, "download started");

        let payload = read_body(response.bytes_stream(), total, indicator).await?;
        if payload.len() as u64 != total {
            debug!(url = %url, total, received = payload.len(), "body length differs from Content-Length");
        }
        self.save(url, &payload).await
    }

    /// Write `payload` under the last path segment of `url`, never overwriting.
    pub async fn save(&self, url: &Url, payload: &[u8]) -> Result<PathBuf, TransferError> {
        fs::create_dir_all(&self.output_dir).await?;
        let filename = sanitize_filename(&get_filename_from_url(url));
        let (mut file, path) = create_unique_file(&self.output_dir, &filename).await?;
        file.write_all(payload).await?;
        file.flush().await?;
        Ok(path)
    }

    /// Look up the download link published on a file page.
    pub async fn resolve_page(&self, page: &Url) -> Result<Url, TransferError> {
        let response = self.client.get(page.clone()).send().await?;
        if !response.status().is_success() {
            return Err(TransferError::Status(response.status()));
        }
        let html = response.text().await?;
        let link = find_download_attr(&html).ok_or(TransferError::MissingDownloadAttr)?;
        Ok(page.join(&link)?)
    }
}

/// Validate status and extract the declared body length before any byte is read.
pub fn check_response(status: StatusCode, headers: &HeaderMap) -> Result<u64, TransferError> {
    if !status.is_success() {
        return Err(TransferError::Status(status));
    }

    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or(TransferError::MissingContentLength)
}

/// Drain `stream` in order into one buffer, reporting whole percents of `total`.
pub async fn read_body<S, T, E>(
    stream: S,
    total: u64,
    indicator: Arc<dyn ProgressIndicator>,
) -> Result<Vec<u8>, TransferError>
where
    S: Stream<Item = Result<T, E>>,
    T: AsRef<[u8]>,
    E: Into<TransferError>,
{
    let mut payload = Vec::with_capacity(total.min(MAX_PREALLOC) as usize);
    let tracked = track(stream, Some(total), indicator, Rounding::Nearest);
    futures::pin_mut!(tracked);

    while let Some(chunk) = tracked.next().await {
        let chunk = chunk.map_err(Into::<TransferError>::into)?;
        payload.extend_from_slice(chunk.as_ref());
    }
    Ok(payload)
}

/// Value of `data-download` on the element whose id is `data`.
pub fn find_download_attr(html: &str) -> Option<String> {
    tags(html)
        .into_iter()
        .map(attributes)
        .find(|attrs| attrs.iter().any(|(name, value)| *name == "id" && value == "data"))
        .and_then(|attrs| {
            attrs
                .into_iter()
                .find(|(name, _)| *name == "data-download")
                .map(|(_, value)| value)
        })
        .filter(|v| !v.is_empty())
}

/// Bodies of `<...>` tags; a `>` inside a quoted attribute value does not close the tag.
fn tags(html: &str) -> Vec<&str> {
    let mut out = vec![];
    let mut start = None;
    let mut quote = None;

    for (i, c) in html.char_indices() {
        match (start, quote) {
            (None, _) => {
                if c == '<' {
                    start = Some(i + 1);
                }
            }
            (Some(_), Some(q)) => {
                if c == q {
                    quote = None;
                }
            }
            (Some(s), None) => match c {
                '"' | '\'' => quote = Some(c),
                '>' => {
                    out.push(&html[s..i]);
                    start = None;
                }
                _ => {}
            },
        }
    }
    out
}

/// `name=value` pairs of a tag body, skipping the tag name.
fn attributes(tag: &str) -> Vec<(&str, String)> {
    let mut attrs = vec![];
    let mut rest = tag.trim_start_matches(|c: char| !c.is_whitespace());

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        let name_end = rest
            .find(|c: char| c.is_whitespace() || c == '=')
            .unwrap_or(rest.len());
        if name_end == 0 {
            // stray '='
            rest = &rest[1..];
            continue;
        }
        let name = &rest[..name_end];
        rest = rest[name_end..].trim_start();

        let value = match rest.strip_prefix('=') {
            Some(after) => {
                let after = after.trim_start();
                match after.chars().next() {
                    Some(q @ ('"' | '\'')) => {
                        let inner = &after[1..];
                        let end = inner.find(q).unwrap_or(inner.len());
                        rest = inner.get(end + 1..).unwrap_or("");
                        &inner[..end]
                    }
                    _ => {
                        let end = after.find(char::is_whitespace).unwrap_or(after.len());
                        rest = &after[end..];
                        &after[..end]
                    }
                }
            }
            None => "",
        };
        attrs.push((name, value.replace("&amp;", "&")));
    }
    attrs
}
