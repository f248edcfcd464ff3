// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use url::Url;

use crate::feed::{EpisodeRecord, ShowMetadata};

/// Maximum length of one sanitized path segment
const MAX_SEGMENT_LENGTH: usize = 100;

/// Folder used when a show has no usable title
const FALLBACK_SHOW_FOLDER: &str = "podcasts";

fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ')
}

/// Reduce free text to a whitelist of path-safe characters, runs of
/// separators collapsed to one dash
fn sanitize_segment(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        let c = if is_safe_char(c) { c } else { '-' };
        if c == '-' || c.is_whitespace() {
            pending_dash = !out.is_empty();
            continue;
        }
        if pending_dash {
            out.push('-');
            pending_dash = false;
        }
        out.push(c);
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '-');
    shorten(trimmed, MAX_SEGMENT_LENGTH)
}

/// Cut to `max_len` characters, preferring the last dash in the back half
fn shorten(text: &str, max_len: usize) -> String {
    let Some((cut, _)) = text.char_indices().nth(max_len) else {
        return text.to_string();
    };

    let head = &text[..cut];
    match head.rfind('-') {
        Some(pos) if pos > cut / 2 => head[..pos].to_string(),
        _ => head.trim_end_matches('-').to_string(),
    }
}

fn extension_from_url(url: &str, allowed: fn(&str) -> bool) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    let (_, ext) = last.rsplit_once('.')?;
    let ext = ext.to_lowercase();
    allowed(&ext).then_some(ext)
}

fn is_audio_extension(ext: &str) -> bool {
    matches!(
        ext,
        "mp3" | "m4a" | "mp4" | "aac" | "ogg" | "opus" | "wav" | "flac"
    )
}

fn is_image_extension(ext: &str) -> bool {
    matches!(ext, "jpg" | "jpeg" | "png" | "webp")
}

fn audio_extension_for_mime(mime: &str) -> Option<&'static str> {
    match mime.to_lowercase().as_str() {
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => Some("m4a"),
        "audio/aac" => Some("aac"),
        "audio/ogg" => Some("ogg"),
        "audio/opus" => Some("opus"),
        "audio/wav" | "audio/x-wav" => Some("wav"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        _ => None,
    }
}

/// Audio extension from the asset URL, then the MIME type, else `mp3`
pub fn audio_extension(episode: &EpisodeRecord) -> String {
    extension_from_url(&episode.asset_url, is_audio_extension)
        .or_else(|| {
            episode
                .asset_mime_type
                .as_deref()
                .and_then(audio_extension_for_mime)
                .map(String::from)
        })
        .unwrap_or_else(|| "mp3".to_string())
}

/// Image extension from an artwork URL, else `jpg`
pub fn artwork_extension(url: &str) -> String {
    extension_from_url(url, is_image_extension).unwrap_or_else(|| "jpg".to_string())
}

/// Path the asset is stored under on the station:
/// `<show>/<YYYY-MM-DD|undated>-<title>.<ext>`
pub fn remote_path(episode: &EpisodeRecord, show: &ShowMetadata) -> String {
    let folder = Some(sanitize_segment(&show.title))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| FALLBACK_SHOW_FOLDER.to_string());

    let date = episode
        .published
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "undated".to_string());

    let title = Some(sanitize_segment(&episode.title))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| sanitize_segment(&episode.id));

    format!("{folder}/{date}-{title}.{}", audio_extension(episode))
}

/// Scratch file stem for an episode, safe on every platform
pub fn scratch_stem(episode: &EpisodeRecord) -> String {
    let stem = sanitize_filename::sanitize(&episode.id);
    if stem.is_empty() {
        "episode".to_string()
    } else {
        shorten(&stem, MAX_SEGMENT_LENGTH)
    }
}
