// crates/core/src/cookies.rs
//! Cookie blob handling: browser JSON exports are converted to the Netscape
//! `cookies.txt` layout the external tool reads; anything else is assumed to
//! already be Netscape text and is passed through.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::CookieError;

/// File name used for the per-job cookie file.
pub const COOKIE_FILE_NAME: &str = "cookies.txt";

const NETSCAPE_HEADER: &str = "# Netscape HTTP Cookie File\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieFormat {
    /// JSON array as produced by browser cookie-export extensions.
    BrowserJson,
    Netscape,
}

/// One entry of a browser JSON export. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct BrowserCookie {
    #[serde(default)]
    domain: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    secure: bool,
    #[serde(default, rename = "expirationDate")]
    expiration_date: f64,
}

/// Guess the format: a JSON export always starts with `[`.
pub fn detect_format(raw: &str) -> CookieFormat {
    if raw.trim_start().starts_with('[') {
        CookieFormat::BrowserJson
    } else {
        CookieFormat::Netscape
    }
}

/// Convert a browser JSON export to Netscape format.
pub fn json_to_netscape(json: &str) -> Result<String, CookieError> {
    let cookies: Vec<BrowserCookie> = serde_json::from_str(json)?;

    let mut out = String::from(NETSCAPE_HEADER);
    for c in cookies {
        let include_subdomains = if c.domain.starts_with('.') { "TRUE" } else { "FALSE" };
        let secure = if c.secure { "TRUE" } else { "FALSE" };
        let expiry = (c.expiration_date + 0.5) as i64;
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
            c.domain, include_subdomains, c.path, secure, expiry, c.name, c.value
        ));
    }
    Ok(out)
}

/// Normalize any supported blob to Netscape text.
pub fn to_netscape(raw: &str) -> Result<String, CookieError> {
    match detect_format(raw) {
        CookieFormat::BrowserJson => json_to_netscape(raw),
        CookieFormat::Netscape => Ok(raw.to_string()),
    }
}

/// Write the converted cookie file into `dir`.
///
/// Returns `Ok(None)` for a blank blob. On Unix the file is created `0600`.
pub fn write_cookie_file(raw: &str, dir: &Path) -> Result<Option<PathBuf>, CookieError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }

    let text = to_netscape(raw)?;
    let path = dir.join(COOKIE_FILE_NAME);

    let mut opts = fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }

    let mut file = opts.open(&path).map_err(|e| CookieError::io(&path, e))?;
    file.write_all(text.as_bytes())
        .map_err(|e| CookieError::io(&path, e))?;

    Ok(Some(path))
}
