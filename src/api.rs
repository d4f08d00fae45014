//! JSON-over-HTTP client for the catalog backend.
//!
//! Every endpoint answers with an envelope: `{"data": ...}` on success,
//! `{"error": "..."}` (or `{"message": "..."}`) otherwise.

use anyhow::{Context, Result, anyhow};
use futures::stream;
use reqwest::{Body, Client, Response, multipart};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::catalog::{VideoRecord, decode_records};
use crate::constants::constants;

// --- Wire types ---

#[derive(Debug, Deserialize)]
struct Envelope<T> {
  data: Option<T>,
  error: Option<String>,
  message: Option<String>,
}

#[derive(Debug, Serialize)]
struct PublishBody<'a> {
  platforms: &'a [String],
}

/// Result of publishing to one platform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PublishOutcome {
  pub platform: String,
  #[serde(default)]
  pub success: bool,
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default)]
  pub error: Option<String>,
  #[serde(default)]
  pub post_id: Option<String>,
}

impl PublishOutcome {
  /// The message to show next to the platform name.
  pub fn summary(&self) -> &str {
    if self.success {
      self.message.as_deref().unwrap_or("Published")
    } else {
      self.error.as_deref().or(self.message.as_deref()).unwrap_or("Unknown error")
    }
  }
}

/// Bytes streamed so far for an in-flight upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
  pub sent: u64,
  pub total: u64,
}

impl UploadProgress {
  pub fn ratio(&self) -> f64 {
    if self.total == 0 { 1.0 } else { (self.sent as f64 / self.total as f64).clamp(0.0, 1.0) }
  }
}

/// A new video to upload, as entered in the upload form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadRequest {
  pub path: PathBuf,
  pub title: String,
  pub description: String,
  /// Comma-separated, as typed.
  pub tags: String,
}

impl UploadRequest {
  /// Check what the backend would reject before sending any bytes.
  pub fn validate(&self) -> Result<()> {
    if self.path.as_os_str().is_empty() {
      return Err(anyhow!("Select a video file to upload."));
    }
    if self.title.trim().is_empty() {
      return Err(anyhow!("A title is required."));
    }
    if !has_allowed_extension(&self.path) {
      return Err(anyhow!(
        "Unsupported file format. Allowed: {}",
        constants().allowed_extensions.join(", ").to_uppercase()
      ));
    }
    Ok(())
  }

  /// Normalised tag list: split on commas, trimmed, empties dropped.
  pub fn tag_list(&self) -> Vec<String> {
    parse_tags(&self.tags)
  }
}

/// Split a comma-separated tag string.
pub fn parse_tags(raw: &str) -> Vec<String> {
  raw.split(',').map(str::trim).filter(|t| !t.is_empty()).map(str::to_string).collect()
}

fn has_allowed_extension(path: &Path) -> bool {
  path
    .extension()
    .and_then(|e| e.to_str())
    .is_some_and(|ext| constants().allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(ext)))
}

fn mime_for(path: &Path) -> &'static str {
  match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
    Some("mp4") => "video/mp4",
    Some("avi") => "video/x-msvideo",
    Some("mov") => "video/quicktime",
    Some("wmv") => "video/x-ms-wmv",
    Some("flv") => "video/x-flv",
    Some("webm") => "video/webm",
    _ => "application/octet-stream",
  }
}

// --- Client ---

#[derive(Debug, Clone)]
pub struct ApiClient {
  http: Client,
  base_url: String,
}

impl ApiClient {
  pub fn new(base_url: &str) -> Result<Self> {
    let http = Client::builder()
      .timeout(Duration::from_secs(constants().request_timeout_secs))
      .build()
      .context("Failed to build HTTP client")?;
    Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url, path)
  }

  pub async fn list_videos(&self) -> Result<Vec<VideoRecord>> {
    let url = self.url("/api/videos");
    debug!(url = %url, "api: list videos");
    let response = self.http.get(&url).send().await.with_context(|| format!("Failed to reach {}", url))?;
    let raw: Option<Vec<serde_json::Value>> = read_envelope(response).await?;
    let videos = decode_records(raw.unwrap_or_default());
    info!(count = videos.len(), "api: videos loaded");
    Ok(videos)
  }

  pub async fn get_video(&self, id: u64) -> Result<VideoRecord> {
    let url = self.url(&format!("/api/videos/{}", id));
    debug!(url = %url, "api: get video");
    let response = self.http.get(&url).send().await.with_context(|| format!("Failed to reach {}", url))?;
    read_envelope(response).await?.ok_or_else(|| anyhow!("Video {} not found", id))
  }

  pub async fn delete_video(&self, id: u64) -> Result<()> {
    let url = self.url(&format!("/api/videos/{}", id));
    info!(id, "api: delete video");
    let response = self.http.delete(&url).send().await.with_context(|| format!("Failed to reach {}", url))?;
    let _: Option<serde_json::Value> = read_envelope(response).await?;
    Ok(())
  }

  pub async fn publish_video(&self, id: u64, platforms: &[String]) -> Result<Vec<PublishOutcome>> {
    if platforms.is_empty() {
      return Err(anyhow!("Select at least one platform."));
    }
    let url = self.url(&format!("/api/videos/{}/publish", id));
    info!(id, platforms = ?platforms, "api: publish video");
    let response = self
      .http
      .post(&url)
      .json(&PublishBody { platforms })
      .send()
      .await
      .with_context(|| format!("Failed to reach {}", url))?;
    Ok(read_envelope(response).await?.unwrap_or_default())
  }

  /// Stream `request.path` as a multipart upload, reporting progress as
  /// chunks leave the file.
  pub async fn upload_video(
    &self,
    request: UploadRequest,
    progress: mpsc::UnboundedSender<UploadProgress>,
  ) -> Result<VideoRecord> {
    request.validate()?;

    let file = tokio::fs::File::open(&request.path)
      .await
      .with_context(|| format!("Failed to open {}", request.path.display()))?;
    let total = file.metadata().await.context("Failed to read file metadata")?.len();
    let file_name =
      request.path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "video".to_string());
    let chunk = constants().upload_chunk_bytes.max(1);

    info!(file = %file_name, bytes = total, "api: upload started");
    let _ = progress.send(UploadProgress { sent: 0, total });

    let chunks = stream::try_unfold((file, 0u64, progress), move |(mut file, sent, progress)| async move {
      let mut buf = vec![0u8; chunk];
      let n = file.read(&mut buf).await?;
      if n == 0 {
        return Ok::<_, std::io::Error>(None);
      }
      buf.truncate(n);
      let sent = sent + n as u64;
      let _ = progress.send(UploadProgress { sent, total });
      Ok(Some((buf, (file, sent, progress))))
    });

    let part = multipart::Part::stream_with_length(Body::wrap_stream(chunks), total)
      .file_name(file_name)
      .mime_str(mime_for(&request.path))
      .context("Invalid upload MIME type")?;
    let form = multipart::Form::new()
      .part("video", part)
      .text("title", request.title.trim().to_string())
      .text("description", request.description.trim().to_string())
      .text("tags", request.tag_list().join(","));

    let url = self.url("/api/videos");
    let response = self
      .http
      .post(&url)
      .timeout(Duration::from_secs(constants().upload_timeout_secs))
      .multipart(form)
      .send()
      .await
      .with_context(|| format!("Upload to {} failed", url))?;
    let created: VideoRecord = read_envelope(response).await?.ok_or_else(|| anyhow!("Server returned no video"))?;
    info!(id = created.id, "api: upload finished");
    Ok(created)
  }
}

/// Decode the envelope, turning non-2xx statuses into errors that carry the
/// server's own message.
async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<Option<T>> {
  let status = response.status();
  let body = response.text().await.context("Failed to read response body")?;
  decode_envelope(status.as_u16(), status.is_success(), &body)
}

fn decode_envelope<T: DeserializeOwned>(status: u16, ok: bool, body: &str) -> Result<Option<T>> {
  if !ok {
    let envelope: Option<Envelope<serde_json::Value>> = serde_json::from_str(body).ok();
    let reason = envelope.and_then(|e| e.error.or(e.message));
    warn!(status, reason = ?reason, "api: request failed");
    return Err(match reason {
      Some(reason) => anyhow!(reason),
      None => anyhow!("Server responded with HTTP {}", status),
    });
  }
  if body.trim().is_empty() {
    return Ok(None);
  }
  let envelope: Envelope<T> = serde_json::from_str(body).context("Unexpected response from server")?;
  match (envelope.data, envelope.error) {
    (Some(data), _) => Ok(Some(data)),
    (None, Some(error)) => Err(anyhow!(error)),
    (None, None) => Ok(None),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn upload(path: &str, title: &str) -> UploadRequest {
    UploadRequest { path: PathBuf::from(path), title: title.to_string(), ..Default::default() }
  }

  // --- envelopes ---

  #[test]
  fn envelope_yields_data() {
    let body = r#"{"data": [{"id": 1, "title": "a"}, {"id": 2, "title": "b", "tags": null}]}"#;
    let videos: Vec<VideoRecord> = decode_envelope(200, true, body).unwrap().unwrap();
    assert_eq!(videos.len(), 2);
    assert!(videos[1].tags.is_empty());
  }

  #[test]
  fn malformed_record_does_not_hide_the_rest() {
    let body = r#"{"data": [
      {"id": 1, "title": "ok"},
      {"id": 2, "title": "bad tag", "tags": ["a", null]},
      {"title": "no id"},
      {"id": 4, "title": 17}
    ]}"#;
    let raw: Vec<serde_json::Value> = decode_envelope(200, true, body).unwrap().unwrap();
    let videos = decode_records(raw);
    assert_eq!(videos.iter().map(|v| v.id).collect::<Vec<_>>(), [1, 2]);
    assert_eq!(videos[1].tags, ["a"]);
  }

  #[test]
  fn envelope_without_data_is_none() {
    let out: Option<Vec<VideoRecord>> = decode_envelope(200, true, r#"{"message": "deleted"}"#).unwrap();
    assert!(out.is_none());
    let out: Option<Vec<VideoRecord>> = decode_envelope(200, true, "").unwrap();
    assert!(out.is_none());
  }

  #[test]
  fn error_status_carries_server_message() {
    let err = decode_envelope::<VideoRecord>(404, false, r#"{"error": "Video not found"}"#).unwrap_err();
    assert_eq!(err.to_string(), "Video not found");
    let err = decode_envelope::<VideoRecord>(400, false, r#"{"message": "bad"}"#).unwrap_err();
    assert_eq!(err.to_string(), "bad");
  }

  #[test]
  fn error_status_without_json_reports_status() {
    let err = decode_envelope::<VideoRecord>(502, false, "<html>Bad Gateway</html>").unwrap_err();
    assert_eq!(err.to_string(), "Server responded with HTTP 502");
  }

  #[test]
  fn garbage_success_body_is_an_error() {
    assert!(decode_envelope::<VideoRecord>(200, true, "not json").is_err());
  }

  #[test]
  fn publish_outcomes_parse() {
    let body = r#"{"data": [
      {"platform": "instagram", "success": true, "message": "Published (simulated)", "post_id": "ig_1"},
      {"platform": "tiktok", "success": false, "error": "Credentials not configured"}
    ]}"#;
    let outcomes: Vec<PublishOutcome> = decode_envelope(200, true, body).unwrap().unwrap();
    assert_eq!(outcomes[0].summary(), "Published (simulated)");
    assert!(!outcomes[1].success);
    assert_eq!(outcomes[1].summary(), "Credentials not configured");
  }

  #[test]
  fn publish_body_serialises_platform_list() {
    let platforms = vec!["tiktok".to_string(), "twitter".to_string()];
    let json = serde_json::to_string(&PublishBody { platforms: &platforms }).unwrap();
    assert_eq!(json, r#"{"platforms":["tiktok","twitter"]}"#);
  }

  // --- upload validation ---

  #[test]
  fn upload_requires_title_and_file() {
    assert!(upload("", "Title").validate().is_err());
    assert!(upload("clip.mp4", "   ").validate().is_err());
    assert!(upload("clip.mp4", "Title").validate().is_ok());
  }

  #[test]
  fn upload_checks_extension_case_insensitively() {
    assert!(upload("clip.MOV", "t").validate().is_ok());
    assert!(upload("clip.webm", "t").validate().is_ok());
    assert!(upload("notes.txt", "t").validate().is_err());
    assert!(upload("noextension", "t").validate().is_err());
  }

  #[test]
  fn tags_are_split_trimmed_and_filtered() {
    assert_eq!(parse_tags(" travel, food ,,  night "), ["travel", "food", "night"]);
    assert!(parse_tags(" , ").is_empty());
  }

  #[test]
  fn mime_follows_extension() {
    assert_eq!(mime_for(Path::new("a.MP4")), "video/mp4");
    assert_eq!(mime_for(Path::new("a.webm")), "video/webm");
    assert_eq!(mime_for(Path::new("a")), "application/octet-stream");
  }

  #[test]
  fn progress_ratio_is_clamped() {
    assert_eq!(UploadProgress { sent: 0, total: 0 }.ratio(), 1.0);
    assert_eq!(UploadProgress { sent: 50, total: 100 }.ratio(), 0.5);
  }

  #[test]
  fn client_trims_trailing_slash() {
    let client = ApiClient::new("http://localhost:5000/").unwrap();
    assert_eq!(client.url("/api/videos"), "http://localhost:5000/api/videos");
  }

  #[tokio::test]
  async fn upload_of_missing_file_fails_before_network() {
    let client = ApiClient::new("http://127.0.0.1:9").unwrap();
    let (tx, _rx) = mpsc::unbounded_channel();
    let err = client.upload_video(upload("/definitely/not/here.mp4", "t"), tx).await.unwrap_err();
    assert!(err.to_string().contains("Failed to open"));
  }
}
