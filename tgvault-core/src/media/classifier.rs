use crate::config::AccessMethod;
use crate::telegram::MediaKind;

/// Per-kind size ceilings the classifier enforces before ever attempting a
/// `send*` call, so an oversized file is routed to `Document` (unbounded
/// under the official Bot API's 2 GiB document cap) instead of bouncing off
/// Telegram with a 413 (spec.md §4.4 "Media classification", size caps).
const OFFICIAL_PHOTO_CAP: u64 = 10 * 1024 * 1024;
const OFFICIAL_VIDEO_CAP: u64 = 50 * 1024 * 1024;
const OFFICIAL_AUDIO_CAP: u64 = 50 * 1024 * 1024;
const OFFICIAL_ANIMATION_CAP: u64 = 50 * 1024 * 1024;

/// Self-hosted Bot API deployments accept the full 2 GiB bot upload limit on
/// every media kind, not just documents.
const SELF_HOSTED_CAP: u64 = 2 * 1024 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationInput<'a> {
    pub file_name: &'a str,
    pub mime_type: Option<&'a str>,
    pub size: u64,
}

/// Deterministic five-step dispatch: (1) explicit MIME family match, (2)
/// extension fallback when MIME is absent or generic, (3) per-kind size cap
/// check, (4) photo dimension/one-frame heuristic deferred to the caller (the
/// classifier only gates by size/type here), (5) default to `Document` when
/// nothing else matches or the size cap is exceeded.
pub fn classify(input: ClassificationInput, access_method: AccessMethod) -> MediaKind {
    let candidate = candidate_kind(input);
    match candidate {
        Some(kind) if within_cap(kind, input.size, access_method) => kind,
        _ => MediaKind::Document,
    }
}

/// Order-sensitive per spec.md §4.4: video, then gif/animation, then an
/// *exact* photo MIME set (not a prefix — `image/svg+xml` must fall through
/// to `document`), then audio.
fn candidate_kind(input: ClassificationInput) -> Option<MediaKind> {
    let ext = input.file_name.rsplit('.').next().map(|e| e.to_ascii_lowercase());
    let ext = ext.as_deref();
    let mime = input.mime_type.map(|m| m.to_ascii_lowercase());
    let mime = mime.as_deref();

    if matches!(ext, Some("mp4" | "mov" | "mkv" | "webm" | "avi")) || mime.is_some_and(|m| m.starts_with("video/")) {
        return Some(MediaKind::Video);
    }
    if ext == Some("gif") || mime == Some("image/gif") {
        return Some(MediaKind::Animation);
    }
    if matches!(ext, Some("jpg" | "jpeg" | "png" | "webp"))
        || matches!(mime, Some("image/jpeg" | "image/png" | "image/webp"))
    {
        return Some(MediaKind::Photo);
    }
    if matches!(ext, Some("mp3" | "m4a" | "aac" | "ogg" | "oga" | "flac" | "wav" | "opus"))
        || mime.is_some_and(|m| m.starts_with("audio/"))
    {
        return Some(MediaKind::Audio);
    }
    None
}

fn within_cap(kind: MediaKind, size: u64, access_method: AccessMethod) -> bool {
    if access_method == AccessMethod::SelfHosted {
        return size <= SELF_HOSTED_CAP;
    }
    match kind {
        MediaKind::Photo => size <= OFFICIAL_PHOTO_CAP,
        MediaKind::Video => size <= OFFICIAL_VIDEO_CAP,
        MediaKind::Audio => size <= OFFICIAL_AUDIO_CAP,
        MediaKind::Animation => size <= OFFICIAL_ANIMATION_CAP,
        MediaKind::Document => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(file_name: &'a str, mime: Option<&'a str>, size: u64) -> ClassificationInput<'a> {
        ClassificationInput {
            file_name,
            mime_type: mime,
            size,
        }
    }

    #[test]
    fn mime_takes_priority_over_extension() {
        let kind = classify(
            input("clip.bin", Some("video/mp4"), 1024),
            AccessMethod::Official,
        );
        assert_eq!(kind, MediaKind::Video);
    }

    #[test]
    fn extension_fallback_when_mime_absent() {
        let kind = classify(input("photo.png", None, 1024), AccessMethod::Official);
        assert_eq!(kind, MediaKind::Photo);
    }

    #[test]
    fn oversized_official_media_falls_back_to_document() {
        let kind = classify(
            input("movie.mp4", Some("video/mp4"), OFFICIAL_VIDEO_CAP + 1),
            AccessMethod::Official,
        );
        assert_eq!(kind, MediaKind::Document);
    }

    #[test]
    fn self_hosted_uses_the_wider_cap() {
        let kind = classify(
            input("movie.mp4", Some("video/mp4"), OFFICIAL_VIDEO_CAP + 1),
            AccessMethod::SelfHosted,
        );
        assert_eq!(kind, MediaKind::Video);
    }

    #[test]
    fn unknown_type_defaults_to_document() {
        let kind = classify(input("archive.zip", None, 10), AccessMethod::Official);
        assert_eq!(kind, MediaKind::Document);
    }

    #[test]
    fn animated_gif_is_classified_as_animation() {
        let kind = classify(input("meme.gif", Some("image/gif"), 10), AccessMethod::Official);
        assert_eq!(kind, MediaKind::Animation);
    }

    #[test]
    fn svg_mime_is_not_treated_as_a_photo() {
        let kind = classify(
            input("vector.svg", Some("image/svg+xml"), 10),
            AccessMethod::Official,
        );
        assert_eq!(kind, MediaKind::Document);
    }
}
