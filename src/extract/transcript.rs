//! YouTube transcript retrieval.
//!
//! The watch page embeds a `captionTracks` list; each track carries a
//! `baseUrl` serving timed text as XML `<text start=".." dur="..">` segments.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::decode_entities;
use crate::error::AppError;

const SHORT_HOST: &str = "youtu.be";
const CANONICAL_HOST: &str = "youtube.com";
const CAPTION_TRACKS_KEY: &str = "\"captionTracks\":";

static SEGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<text\b([^>]*)>(.*?)</text>").unwrap());

static START_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\bstart="([^"]*)""#).unwrap());

static DUR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\bdur="([^"]*)""#).unwrap());

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// One timed caption line.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

#[derive(Debug, Deserialize)]
struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode", default)]
    language_code: String,
    #[serde(default)]
    kind: Option<String>,
}

/// True when the URL points at a video platform we pull transcripts from.
pub fn is_video_url(url: &Url) -> bool {
    let host = url.host_str().unwrap_or("").to_lowercase();
    host.contains(CANONICAL_HOST) || host.contains(SHORT_HOST)
}

/// Pull the video identifier out of a short (`youtu.be/<id>`) or canonical
/// (`youtube.com/watch?v=<id>`) link.
pub fn video_id(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();

    let id = if host.contains(SHORT_HOST) {
        url.path_segments()?.next().map(str::to_string)
    } else if host.contains(CANONICAL_HOST) {
        url.query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
            .or_else(|| {
                let mut segments = url.path_segments()?;
                match segments.next()? {
                    "shorts" | "embed" | "live" => segments.next().map(str::to_string),
                    _ => None,
                }
            })
    } else {
        None
    };

    id.filter(|id| !id.is_empty())
}

/// Fetch the transcript and join its segments with single spaces.
pub async fn extract_transcript(
    client: &Client,
    base: &Url,
    video_id: &str,
) -> Result<String, AppError> {
    let segments = fetch_transcript(client, base, video_id).await?;
    let seconds = segments.last().map_or(0.0, |s| s.start + s.duration);
    tracing::debug!(video_id, segments = segments.len(), seconds, "fetched transcript");
    Ok(segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" "))
}

pub async fn fetch_transcript(
    client: &Client,
    base: &Url,
    video_id: &str,
) -> Result<Vec<TranscriptSegment>, AppError> {
    let mut watch = base
        .join("/watch")
        .map_err(|e| AppError::extraction_with("Invalid transcript host", e))?;
    watch.query_pairs_mut().append_pair("v", video_id);

    let page = get_text(client, watch).await?;
    let tracks = caption_tracks(&page)
        .ok_or_else(|| AppError::extraction(format!("No transcript available for video {}", video_id)))?;

    let track = pick_track(&tracks)
        .ok_or_else(|| AppError::extraction(format!("No transcript available for video {}", video_id)))?;

    let track_url = base
        .join(&track.base_url)
        .map_err(|e| AppError::extraction_with("Invalid caption track URL", e))?;

    let xml = get_text(client, track_url).await?;
    Ok(parse_timed_text(&xml))
}

async fn get_text(client: &Client, url: Url) -> Result<String, AppError> {
    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            AppError::extraction_with("Timed out fetching transcript", e)
        } else {
            AppError::extraction_with("Transcript request failed", e)
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::extraction(format!(
            "Transcript host returned status {}",
            status.as_u16()
        )));
    }

    response
        .text()
        .await
        .map_err(|e| AppError::extraction_with("Failed to read transcript response", e))
}

fn caption_tracks(page: &str) -> Option<Vec<CaptionTrack>> {
    let start = page.find(CAPTION_TRACKS_KEY)? + CAPTION_TRACKS_KEY.len();
    serde_json::Deserializer::from_str(&page[start..])
        .into_iter::<Vec<CaptionTrack>>()
        .next()?
        .ok()
        .filter(|tracks| !tracks.is_empty())
}

/// Manual English first, then generated English, then whatever is first.
fn pick_track(tracks: &[CaptionTrack]) -> Option<&CaptionTrack> {
    let english = |t: &&CaptionTrack| t.language_code.starts_with("en");
    let generated = |t: &&CaptionTrack| t.kind.as_deref() == Some("asr");

    tracks
        .iter()
        .find(|t| english(t) && !generated(t))
        .or_else(|| tracks.iter().find(english))
        .or_else(|| tracks.first())
}

fn parse_timed_text(xml: &str) -> Vec<TranscriptSegment> {
    SEGMENT_RE
        .captures_iter(xml)
        .filter_map(|caps| {
            let attrs = &caps[1];
            // timed text escapes its payload twice
            let once = decode_entities(&caps[2]).into_owned();
            let text = TAG_RE.replace_all(&decode_entities(&once), "").into_owned();
            if text.trim().is_empty() {
                return None;
            }
            Some(TranscriptSegment {
                text,
                start: attr_f64(&START_RE, attrs),
                duration: attr_f64(&DUR_RE, attrs),
            })
        })
        .collect()
}

fn attr_f64(re: &Regex, attrs: &str) -> f64 {
    re.captures(attrs)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0.0)
}
