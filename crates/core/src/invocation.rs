// crates/core/src/invocation.rs
//! Download requests and the argument lists handed to the external tool.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RequestError;
use crate::progress::Stage;

/// Subtitle language used when the request leaves it blank.
pub const DEFAULT_SUB_LANG: &str = "en";

/// What the user wants out of the URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Video,
    Audio,
    Subs,
    Thumb,
}

impl MediaKind {
    /// Parse a form value. Blank or unknown values fall back to video.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "audio" => MediaKind::Audio,
            "subs" => MediaKind::Subs,
            "thumb" => MediaKind::Thumb,
            _ => MediaKind::Video,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Subs => "subs",
            MediaKind::Thumb => "thumb",
        }
    }

    /// Output-naming template, relative to the job directory.
    pub fn output_template(self) -> &'static str {
        match self {
            MediaKind::Video => "%(title)s_%(resolution)s.%(ext)s",
            MediaKind::Audio => "%(title)s_audio.%(ext)s",
            MediaKind::Subs => "%(title)s_%(language)s.%(ext)s",
            MediaKind::Thumb => "%(title)s_thumb.%(ext)s",
        }
    }

    /// Stage reported before the tool prints anything.
    pub fn initial_stage(self) -> Stage {
        match self {
            MediaKind::Video => Stage::DownloadingVideo,
            MediaKind::Audio => Stage::DownloadingAudio,
            MediaKind::Subs => Stage::DownloadingSubtitles,
            MediaKind::Thumb => Stage::DownloadingThumbnail,
        }
    }

    /// Extensions accepted as the finished artifact, lowercase.
    pub fn artifact_extensions(self) -> &'static [&'static str] {
        match self {
            MediaKind::Video => &["mp4"],
            MediaKind::Audio => &["mp3"],
            MediaKind::Subs => &["srt"],
            MediaKind::Thumb => &["jpg", "jpeg", "png", "webp"],
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated-on-demand download request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    /// Opaque cookie blob, JSON export or Netscape text.
    pub cookies: Option<String>,
    pub kind: MediaKind,
    /// Max vertical resolution for video, `--audio-quality` value for audio.
    pub quality: Option<String>,
    pub sub_lang: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl DownloadRequest {
    /// Build a request from raw form fields; blank strings become `None`.
    pub fn from_form(
        url: impl Into<String>,
        cookies: Option<String>,
        kind: Option<&str>,
        quality: Option<String>,
        sub_lang: Option<String>,
    ) -> Self {
        Self {
            url: url.into().trim().to_string(),
            cookies: non_blank(cookies),
            kind: kind.map(MediaKind::parse).unwrap_or_default(),
            quality: non_blank(quality),
            sub_lang: non_blank(sub_lang),
        }
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        check_url(&self.url)?;

        if let Some(q) = &self.quality {
            let ok = match self.kind {
                MediaKind::Video => q.len() <= 5 && q.bytes().all(|b| b.is_ascii_digit()),
                MediaKind::Audio => q.len() <= 8 && q.bytes().all(|b| b.is_ascii_alphanumeric()),
                MediaKind::Subs | MediaKind::Thumb => true,
            };
            if !ok {
                return Err(RequestError::InvalidQuality(q.clone(), self.kind.as_str()));
            }
        }

        if let Some(lang) = &self.sub_lang {
            let ok = lang
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b','));
            if !ok {
                return Err(RequestError::InvalidSubtitleLanguage(lang.clone()));
            }
        }

        Ok(())
    }

    /// Subtitle language after applying the default.
    pub fn effective_sub_lang(&self) -> &str {
        self.sub_lang.as_deref().unwrap_or(DEFAULT_SUB_LANG)
    }
}

/// A url must be present and must not look like an option to the tool.
pub fn check_url(url: &str) -> Result<(), RequestError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(RequestError::MissingUrl);
    }
    if url.starts_with('-') {
        return Err(RequestError::InvalidUrl(url.to_string()));
    }
    Ok(())
}

/// Format selector for video: prefer mp4+m4a, capped at `max_height` when set,
/// falling back to the best available stream.
pub fn video_format_selector(max_height: Option<&str>) -> String {
    match max_height {
        Some(h) => format!(
            "bestvideo[ext=mp4][height<={h}]+bestaudio[ext=m4a]/best[ext=mp4][height<={h}]/best"
        ),
        None => "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best".to_string(),
    }
}

/// Full argument list (without the program name) for one download job.
pub fn download_args(
    request: &DownloadRequest,
    job_dir: &Path,
    cookie_file: Option<&Path>,
) -> Vec<String> {
    let out_path = job_dir.join(request.kind.output_template());

    let mut args: Vec<String> = vec![
        "--newline".into(),
        "--progress-template".into(),
        "download:%(progress._percent_str)s".into(),
        "-o".into(),
        out_path.to_string_lossy().into_owned(),
    ];

    match request.kind {
        MediaKind::Audio => {
            args.extend(["-f", "bestaudio", "-x", "--audio-format", "mp3"].map(String::from));
            if let Some(q) = &request.quality {
                args.push("--audio-quality".into());
                args.push(q.clone());
            }
        }
        MediaKind::Subs => {
            args.extend(["--skip-download", "--write-sub", "--sub-lang"].map(String::from));
            args.push(request.effective_sub_lang().to_string());
            args.extend(["--sub-format", "srt", "--convert-subs", "srt"].map(String::from));
        }
        MediaKind::Thumb => {
            args.extend(["--skip-download", "--write-thumbnail"].map(String::from));
        }
        MediaKind::Video => {
            args.push("-f".into());
            args.push(video_format_selector(request.quality.as_deref()));
            args.extend(["--merge-output-format", "mp4"].map(String::from));
        }
    }

    if let Some(path) = cookie_file {
        args.push("--cookies".into());
        args.push(path.to_string_lossy().into_owned());
    }

    args.push("--".into());
    args.push(request.url.clone());
    args
}

/// Arguments for a metadata-only probe of `url`.
pub fn probe_args(url: &str, cookie_file: Option<&Path>) -> Vec<String> {
    let mut args: Vec<String> = ["-J", "--no-warnings", "--skip-download"]
        .map(String::from)
        .to_vec();
    if let Some(path) = cookie_file {
        args.push("--cookies".into());
        args.push(path.to_string_lossy().into_owned());
    }
    args.push("--".into());
    args.push(url.to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn request(kind: MediaKind) -> DownloadRequest {
        DownloadRequest {
            url: "https://example.com/watch?v=abc".into(),
            kind,
            ..Default::default()
        }
    }

    #[test]
    fn test_media_kind_parse_defaults_to_video() {
        assert_eq!(MediaKind::parse("audio"), MediaKind::Audio);
        assert_eq!(MediaKind::parse(" SUBS "), MediaKind::Subs);
        assert_eq!(MediaKind::parse("thumb"), MediaKind::Thumb);
        assert_eq!(MediaKind::parse(""), MediaKind::Video);
        assert_eq!(MediaKind::parse("gif"), MediaKind::Video);
    }

    #[test]
    fn test_from_form_blank_fields_become_none() {
        let req = DownloadRequest::from_form(
            "  https://example.com/v  ",
            Some("   ".into()),
            Some("audio"),
            Some("".into()),
            None,
        );
        assert_eq!(req.url, "https://example.com/v");
        assert_eq!(req.cookies, None);
        assert_eq!(req.kind, MediaKind::Audio);
        assert_eq!(req.quality, None);
    }

    #[test]
    fn test_validate_missing_url() {
        let req = DownloadRequest::from_form("   ", None, None, None, None);
        assert_eq!(req.validate(), Err(RequestError::MissingUrl));
    }

    #[test]
    fn test_validate_rejects_option_like_url() {
        let req = DownloadRequest::from_form("--batch-file=/etc/passwd", None, None, None, None);
        assert_eq!(
            req.validate(),
            Err(RequestError::InvalidUrl("--batch-file=/etc/passwd".into()))
        );
        assert_eq!(check_url("  -o x"), Err(RequestError::InvalidUrl("-o x".into())));
        assert_eq!(check_url("https://example.com/a-b"), Ok(()));
    }

    #[test]
    fn test_url_follows_end_of_options_marker() {
        let mut req = request(MediaKind::Video);
        req.url = "-f worst".into();
        let args = download_args(&req, Path::new("d"), None);
        let n = args.len();
        assert_eq!(&args[n - 2..], &["--".to_string(), "-f worst".to_string()]);

        let args = probe_args("-x", Some(Path::new("c.txt")));
        assert_eq!(
            args,
            vec!["-J", "--no-warnings", "--skip-download", "--cookies", "c.txt", "--", "-x"]
        );
    }

    #[test]
    fn test_validate_video_quality_must_be_numeric() {
        let mut req = request(MediaKind::Video);
        req.quality = Some("720".into());
        assert!(req.validate().is_ok());

        req.quality = Some("720]/worst[".into());
        assert!(matches!(
            req.validate(),
            Err(RequestError::InvalidQuality(_, "video"))
        ));
    }

    #[test]
    fn test_validate_audio_quality_allows_bitrate_suffix() {
        let mut req = request(MediaKind::Audio);
        req.quality = Some("128K".into());
        assert!(req.validate().is_ok());
        req.quality = Some("--exec".into());
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_validate_sub_lang() {
        let mut req = request(MediaKind::Subs);
        req.sub_lang = Some("es,en-US".into());
        assert!(req.validate().is_ok());
        req.sub_lang = Some("en;rm".into());
        assert_eq!(
            req.validate(),
            Err(RequestError::InvalidSubtitleLanguage("en;rm".into()))
        );
    }

    #[test]
    fn test_video_args_without_quality() {
        let dir = PathBuf::from("downloads/job1");
        let args = download_args(&request(MediaKind::Video), &dir, None);

        assert_eq!(args[0], "--newline");
        assert_eq!(args[3], "-o");
        assert_eq!(
            args[4],
            dir.join("%(title)s_%(resolution)s.%(ext)s").to_string_lossy()
        );
        let f = args.iter().position(|a| a == "-f").unwrap();
        assert_eq!(
            args[f + 1],
            "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best"
        );
        assert!(args.contains(&"--merge-output-format".to_string()));
        assert_eq!(args.last().unwrap(), "https://example.com/watch?v=abc");
    }

    #[test]
    fn test_video_args_with_quality_cap() {
        let mut req = request(MediaKind::Video);
        req.quality = Some("720".into());
        let args = download_args(&req, Path::new("d"), None);
        let f = args.iter().position(|a| a == "-f").unwrap();
        assert_eq!(
            args[f + 1],
            "bestvideo[ext=mp4][height<=720]+bestaudio[ext=m4a]/best[ext=mp4][height<=720]/best"
        );
    }

    #[test]
    fn test_audio_args_with_quality() {
        let mut req = request(MediaKind::Audio);
        req.quality = Some("5".into());
        let args = download_args(&req, Path::new("d"), None);
        let joined = args.join(" ");
        assert!(joined.contains("-f bestaudio -x --audio-format mp3 --audio-quality 5"));
        assert!(joined.contains("%(title)s_audio.%(ext)s"));
    }

    #[test]
    fn test_subs_args_default_language() {
        let args = download_args(&request(MediaKind::Subs), Path::new("d"), None);
        let joined = args.join(" ");
        assert!(joined.contains(
            "--skip-download --write-sub --sub-lang en --sub-format srt --convert-subs srt"
        ));
    }

    #[test]
    fn test_thumb_args_and_cookie_file() {
        let cookie = PathBuf::from("d/cookies.txt");
        let args = download_args(&request(MediaKind::Thumb), Path::new("d"), Some(&cookie));
        let n = args.len();
        assert_eq!(args[n - 4], "--cookies");
        assert_eq!(args[n - 3], cookie.to_string_lossy());
        assert_eq!(args[n - 2], "--");
        assert!(args.contains(&"--write-thumbnail".to_string()));
    }

    #[test]
    fn test_probe_args() {
        assert_eq!(
            probe_args("https://example.com/v", None),
            vec!["-J", "--no-warnings", "--skip-download", "--", "https://example.com/v"]
        );
    }
}
