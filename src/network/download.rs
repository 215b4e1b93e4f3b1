//! Download mode - stream a response body to disk while counting bytes

use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWriteExt, BufWriter};
use url::Url;

use crate::constants::DEFAULT_DOWNLOAD_NAME;
use crate::error::{Error, Result};
use crate::models::ResponseHead;
use crate::network::client::BodyStream;
use crate::progress::{ProgressCounter, ProgressWriter};

/// File name for a download: the `filename=` of Content-Disposition, else
/// the last URL path segment, else a default. Directory parts are dropped.
pub fn target_file_name(head: &ResponseHead, url: &Url) -> PathBuf {
    let from_disposition = head.headers.get("Content-Disposition").and_then(|d| {
        d.split(';')
            .map(str::trim)
            .find_map(|part| part.strip_prefix("filename="))
            .map(|name| name.trim_matches(|c| c == '"' || c == '\'' || c == ' '))
            .map(str::to_string)
    });

    let from_url = || {
        url.path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_string)
    };

    from_disposition
        .into_iter()
        .chain(from_url())
        .find_map(|name| {
            Path::new(&name)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .filter(|n| !n.is_empty())
        })
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DOWNLOAD_NAME))
}

/// Copy the body into `dest`, adding every written byte to `counter`.
/// Returns the number of bytes written.
pub async fn save_to_file(mut body: BodyStream, dest: &Path, counter: ProgressCounter) -> Result<u64> {
    let file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| Error::io(dest, e))?;
    let mut writer = ProgressWriter::new(BufWriter::new(file), counter);

    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    writer.flush().await?;
    tracing::debug!(path = %dest.display(), bytes = written, "download complete");
    Ok(written)
}
