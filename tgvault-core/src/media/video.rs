use crate::errors::{Result, TgVaultError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Probed stream geometry, already rotation-adjusted (spec.md §4.4 "video
/// preprocessing" — a 90/270-degree rotated stream reports its *displayed*
/// width/height, not the raw encoded frame size).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoGeometry {
    pub width: u32,
    pub height: u32,
    pub duration_secs: u32,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    tags: Option<ProbeTags>,
    #[serde(default)]
    side_data_list: Option<Vec<ProbeSideData>>,
}

#[derive(Debug, Deserialize)]
struct ProbeTags {
    #[serde(default, rename = "rotate")]
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    #[serde(default)]
    rotation: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    duration: Option<String>,
}

/// Runs `ffprobe` against a local file and returns rotation-adjusted
/// geometry. Best-effort: any parse failure is reported as an error so the
/// upload pipeline can fall back to treating the file as a plain document.
pub async fn probe(path: &Path) -> Result<VideoGeometry> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_entries",
            "stream=width,height,side_data_list,tags:format=duration",
            "-select_streams",
            "v:0",
        ])
        .arg(path)
        .output()
        .await
        .map_err(TgVaultError::IoError)?;

    if !output.status.success() {
        return Err(TgVaultError::Internal(format!(
            "ffprobe exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let parsed: ProbeOutput = serde_json::from_slice(&output.stdout)
        .map_err(|e| TgVaultError::Internal(format!("failed to parse ffprobe output: {}", e)))?;

    let stream = parsed
        .streams
        .first()
        .ok_or_else(|| TgVaultError::Internal("ffprobe reported no video stream".into()))?;

    let mut width = stream.width.unwrap_or(0);
    let mut height = stream.height.unwrap_or(0);

    let rotation = stream
        .side_data_list
        .as_ref()
        .and_then(|list| list.first())
        .and_then(|sd| sd.rotation)
        .or_else(|| {
            stream
                .tags
                .as_ref()
                .and_then(|t| t.rotate.as_ref())
                .and_then(|r| r.parse::<i32>().ok())
        })
        .unwrap_or(0);

    if rotation.abs() == 90 || rotation.abs() == 270 {
        std::mem::swap(&mut width, &mut height);
    }

    let duration_secs = parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok())
        .map(|d| d.round() as u32)
        .unwrap_or(0);

    Ok(VideoGeometry {
        width,
        height,
        duration_secs,
    })
}

/// Remuxes (no re-encode) a video into a temp file with `-movflags
/// +faststart` so the moov atom is at the front, letting Telegram clients
/// start playback before the whole file downloads. On any ffmpeg failure the
/// original path is returned unchanged and the caller records a
/// `faststart_fallback` (spec.md §4.4, §3 `TransferHistory.faststartFallback`).
pub async fn remux_faststart(source: &Path, work_dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(work_dir).await?;
    let output_path = work_dir.join(format!(
        "{}-faststart.mp4",
        source.file_stem().and_then(|s| s.to_str()).unwrap_or("video")
    ));

    let status = Command::new("ffmpeg")
        .args(["-y", "-i"])
        .arg(source)
        .args(["-c", "copy", "-movflags", "+faststart"])
        .arg(&output_path)
        .status()
        .await
        .map_err(TgVaultError::IoError)?;

    if !status.success() {
        let _ = tokio::fs::remove_file(&output_path).await;
        return Err(TgVaultError::Internal("ffmpeg faststart remux failed".into()));
    }

    Ok(output_path)
}

/// Extracts a single preview frame (first keyframe near 1 second, clamped to
/// the clip's duration) as a JPEG, for use as the Bot API `thumbnail` field.
/// Best-effort: returns `Ok(None)` rather than failing the whole upload when
/// extraction does not succeed.
pub async fn extract_preview_frame(source: &Path, work_dir: &Path, duration_secs: u32) -> Result<Option<Vec<u8>>> {
    tokio::fs::create_dir_all(work_dir).await?;
    let seek = duration_secs.min(1);
    let output_path = work_dir.join(format!(
        "{}-preview.jpg",
        source.file_stem().and_then(|s| s.to_str()).unwrap_or("video")
    ));

    let status = Command::new("ffmpeg")
        .args(["-y", "-ss", &seek.to_string(), "-i"])
        .arg(source)
        .args(["-frames:v", "1", "-q:v", "3"])
        .arg(&output_path)
        .status()
        .await;

    let status = match status {
        Ok(s) => s,
        Err(_) => return Ok(None),
    };

    if !status.success() {
        let _ = tokio::fs::remove_file(&output_path).await;
        return Ok(None);
    }

    let bytes = tokio::fs::read(&output_path).await.ok();
    let _ = tokio::fs::remove_file(&output_path).await;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_output_parses_rotated_stream() {
        let json = r#"{
            "streams": [{"width": 1080, "height": 1920, "tags": {"rotate": "90"}}],
            "format": {"duration": "12.5"}
        }"#;
        let parsed: ProbeOutput = serde_json::from_str(json).unwrap();
        let stream = &parsed.streams[0];
        assert_eq!(stream.width, Some(1080));
        assert_eq!(stream.height, Some(1920));
    }
}
