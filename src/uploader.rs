use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use url::Url;

use crate::cli::{FormMethod, RedirectStyle};
use crate::error::TransferError;
use crate::progress::{track, ProgressIndicator, Rounding};
use crate::ui::{Navigator, Notifier};
use crate::utils::as_directory;

pub const FAILURE_NOTICE: &str = "Upload failed.";

/// What gets submitted: a file field plus optional text fields, sent to `action`.
#[derive(Debug, Clone)]
pub struct UploadForm {
    pub action: Url,
    pub method: FormMethod,
    pub field: String,
    pub file: PathBuf,
    pub extra: Vec<(String, String)>,
}

/// JSON body of a successful upload.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadReceipt {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default)]
    pub ext: Option<String>,
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

/// `<page>/file/<id>` or `<page>/file/<id>.<ext>`.
pub fn redirect_target(
    page: &Url,
    receipt: &UploadReceipt,
    style: RedirectStyle,
) -> Result<Url, url::ParseError> {
    let leaf = match (style, receipt.ext.as_deref()) {
        (RedirectStyle::IdExt, Some(ext)) if !ext.is_empty() => format!("{}.{}", receipt.id, ext),
        _ => receipt.id.clone(),
    };
    as_directory(page).join(&format!("file/{}", leaf))
}

pub struct Uploader {
    client: Client,
    page: Url,
    style: RedirectStyle,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
}

impl Uploader {
    pub fn new(
        client: Client,
        page: Url,
        style: RedirectStyle,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            client,
            page,
            style,
            navigator,
            notifier,
        }
    }

    /// Submit `form`, reporting send progress on `indicator`.
    ///
    /// Navigates only when the server accepted the file and returned a usable
    /// receipt. Every failure raises the same notice and hides the indicator.
    pub async fn submit(
        &self,
        form: &UploadForm,
        indicator: Arc<dyn ProgressIndicator>,
    ) -> Result<Url, TransferError> {
        indicator.reset();

        match self.attempt(form, indicator.clone()).await {
            Ok(target) => {
                indicator.hide();
                info!(target = %target, "upload complete");
                self.navigator.navigate(&target);
                Ok(target)
            }
            Err(e) => {
                warn!(action = %form.action, kind = ?e.kind(), error = %e, "upload failed");
                self.notifier.alert(FAILURE_NOTICE);
                indicator.hide();
                Err(e)
            }
        }
    }

    async fn attempt(
        &self,
        form: &UploadForm,
        indicator: Arc<dyn ProgressIndicator>,
    ) -> Result<Url, TransferError> {
        let receipt = self.send(form, indicator).await?;
        debug!(?receipt, "upload receipt");
        Ok(redirect_target(&self.page, &receipt, self.style)?)
    }

    async fn send(
        &self,
        form: &UploadForm,
        indicator: Arc<dyn ProgressIndicator>,
    ) -> Result<UploadReceipt, TransferError> {
        let file = File::open(&form.file).await?;
        let size = file.metadata().await?.len();
        let file_name = form
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());

        let stream = track(ReaderStream::new(file), Some(size), indicator, Rounding::Exact);
        let part = Part::stream_with_length(Body::wrap_stream(stream), size).file_name(file_name);

        let mut multipart = Form::new();
        for (key, value) in &form.extra {
            multipart = multipart.text(key.clone(), value.clone());
        }
        multipart = multipart.part(form.field.clone(), part);

        debug!(action = %form.action, bytes = size, "sending upload");
        let response = self
            .client
            .request(form.method.as_method(), form.action.clone())
            .multipart(multipart)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransferError::Status(response.status()));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
