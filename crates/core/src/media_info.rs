// crates/core/src/media_info.rs
//! Summary of the tool's `-J` metadata dump, used to populate quality and
//! subtitle pickers before a download is submitted.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::MediaInfoError;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaInfo {
    pub title: String,
    pub thumb_url: String,
    /// Available heights, highest first.
    pub video_qualities: Vec<String>,
    /// Available audio-only bitrates in kbps, lowest first.
    pub audio_qualities: Vec<String>,
    pub sub_langs: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawDump {
    #[serde(default)]
    title: String,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<RawThumbnail>,
    #[serde(default)]
    formats: Vec<RawFormat>,
    #[serde(default)]
    subtitles: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawThumbnail {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    #[serde(default)]
    vcodec: Option<String>,
    #[serde(default)]
    acodec: Option<String>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    abr: Option<f64>,
}

impl MediaInfo {
    pub fn from_json(json: &[u8]) -> Result<Self, MediaInfoError> {
        let dump: RawDump = serde_json::from_slice(json)?;

        let mut heights = BTreeSet::new();
        let mut bitrates = BTreeSet::new();
        for f in &dump.formats {
            let has_video = f.vcodec.as_deref() != Some("none");
            let has_audio = f.acodec.as_deref() != Some("none");
            match (has_video, f.height) {
                (true, Some(h)) if h > 0 => {
                    heights.insert(h);
                }
                _ => {}
            }
            if !has_video && has_audio {
                if let Some(abr) = f.abr.filter(|a| *a > 0.0) {
                    bitrates.insert(abr.round() as u64);
                }
            }
        }

        let thumb_url = dump
            .thumbnails
            .last()
            .map(|t| t.url.clone())
            .filter(|u| !u.is_empty())
            .or(dump.thumbnail)
            .unwrap_or_default();

        Ok(Self {
            title: dump.title,
            thumb_url,
            video_qualities: heights.iter().rev().map(|h| h.to_string()).collect(),
            audio_qualities: bitrates.iter().map(|b| b.to_string()).collect(),
            sub_langs: dump.subtitles.into_keys().collect(),
        })
    }
}
