//! ACRCloud identification client.
//!
//! Requests are signed with HMAC-SHA1 over the canonical string
//! `method \n uri \n access_key \n data_type \n signature_version \n timestamp`,
//! base64-encoded and sent with the audio sample as a multipart form.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use hmac::{Hmac, Mac};
use log::debug;
use serde_json::Value;
use sha1::Sha1;

use crate::config::AcrCloudCredentials;
use crate::error::RecognizeError;
use crate::metadata::SongMetadata;
use crate::preprocess;
use crate::recognizer::{Recognition, Recognizer};

const HTTP_METHOD: &str = "POST";
const HTTP_URI: &str = "/v1/identify";
const DATA_TYPE: &str = "audio";
const SIGNATURE_VERSION: &str = "1";

/// Status code ACRCloud uses for "no result".
const NO_RESULT: i64 = 1001;
/// Daily quota and requests-per-second limits.
const LIMIT_EXCEEDED: i64 = 3003;
const QPS_LIMIT_EXCEEDED: i64 = 3015;

type HmacSha1 = Hmac<Sha1>;

pub struct AcrCloudClient {
    credentials: AcrCloudCredentials,
    agent: ureq::Agent,
}

impl AcrCloudClient {
    pub fn new(credentials: AcrCloudCredentials, agent: ureq::Agent) -> Self {
        AcrCloudClient { credentials, agent }
    }

    fn identify_url(&self) -> String {
        let host = self.credentials.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}{}", host, HTTP_URI)
        } else {
            format!("https://{}{}", host, HTTP_URI)
        }
    }

    /// Submit prepared WAV bytes.
    pub fn identify_sample(&self, sample: &[u8]) -> Result<Recognition, RecognizeError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
            .to_string();

        let to_sign = string_to_sign(&self.credentials.access_key, &timestamp);
        let signature = sign(&self.credentials.access_secret, &to_sign)?;

        let boundary = format!("----songtag{}", uuid::Uuid::new_v4().simple());
        let sample_bytes = sample.len().to_string();
        let body = multipart_body(
            &boundary,
            &[
                ("access_key", self.credentials.access_key.as_str()),
                ("data_type", DATA_TYPE),
                ("signature_version", SIGNATURE_VERSION),
                ("signature", signature.as_str()),
                ("sample_bytes", sample_bytes.as_str()),
                ("timestamp", timestamp.as_str()),
            ],
            sample,
        );

        debug!("POST {} ({} byte sample)", self.identify_url(), sample.len());

        let response = self
            .agent
            .post(&self.identify_url())
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={}", boundary),
            )
            .send_bytes(&body);

        let body = match response {
            Ok(resp) => resp.into_string()?,
            Err(ureq::Error::Status(429, _)) => {
                return Err(RecognizeError::RateLimited("HTTP 429".to_string()))
            }
            Err(ureq::Error::Status(code, resp)) => {
                return Err(RecognizeError::Service {
                    code: code as i64,
                    message: resp.into_string().unwrap_or_default(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let json: Value = serde_json::from_str(&body)?;
        parse_response(&json)
    }
}

impl Recognizer for AcrCloudClient {
    fn name(&self) -> &str {
        "ACRCloud"
    }

    fn recognize(&self, path: &Path) -> Result<Recognition, RecognizeError> {
        let sample = preprocess::prepare_sample(path)?;
        self.identify_sample(&sample)
    }
}

/// Canonical string covered by the request signature.
pub fn string_to_sign(access_key: &str, timestamp: &str) -> String {
    [
        HTTP_METHOD,
        HTTP_URI,
        access_key,
        DATA_TYPE,
        SIGNATURE_VERSION,
        timestamp,
    ]
    .join("\n")
}

/// Base64 HMAC-SHA1 of `message` keyed by `secret`.
pub fn sign(secret: &str, message: &str) -> Result<String, RecognizeError> {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .map_err(|e| RecognizeError::Client(format!("invalid signing key: {}", e)))?;
    mac.update(message.as_bytes());
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Encode text fields plus the `sample` file part as multipart/form-data.
pub fn multipart_body(boundary: &str, fields: &[(&str, &str)], sample: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(sample.len() + 1024);
    for (name, value) in fields {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"sample\"; filename=\"sample.wav\"\r\n",
    );
    body.extend_from_slice(b"Content-Type: audio/wav\r\n\r\n");
    body.extend_from_slice(sample);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

/// Interpret an identify response: code 0 with `metadata.music[0]` is a
/// match, 1001 is "no result", the quota codes mean the client is being
/// throttled and anything else is a service error.
pub fn parse_response(raw: &Value) -> Result<Recognition, RecognizeError> {
    let status = raw.get("status");
    let code = status
        .and_then(|s| s.get("code"))
        .and_then(|c| c.as_i64())
        .unwrap_or(-1);
    let message = || {
        status
            .and_then(|s| s.get("msg"))
            .and_then(|m| m.as_str())
            .unwrap_or("missing status")
            .to_string()
    };

    match code {
        0 => {
            let music = raw
                .get("metadata")
                .and_then(|m| m.get("music"))
                .and_then(|m| m.as_array())
                .and_then(|m| m.first());
            Ok(match music {
                Some(entry) => Recognition::Recognized(parse_music(entry)),
                None => Recognition::NotRecognized,
            })
        }
        NO_RESULT => Ok(Recognition::NotRecognized),
        LIMIT_EXCEEDED | QPS_LIMIT_EXCEEDED => Err(RecognizeError::RateLimited(message())),
        _ => Err(RecognizeError::Service {
            code,
            message: message(),
        }),
    }
}

/// Flatten one `metadata.music` entry. The service returns no artwork.
fn parse_music(entry: &Value) -> SongMetadata {
    let title = entry.get("title").and_then(|v| v.as_str()).map(String::from);
    let artist = entry
        .get("artists")
        .and_then(|a| a.as_array())
        .and_then(|a| a.first())
        .and_then(|a| a.get("name"))
        .and_then(|v| v.as_str())
        .map(String::from);
    let album = entry
        .get("album")
        .and_then(|a| a.get("name"))
        .and_then(|v| v.as_str())
        .map(String::from);
    let year = entry
        .get("release_date")
        .and_then(|v| v.as_str())
        .map(|date| date.chars().take(4).collect::<String>());

    SongMetadata::from_parts(title, artist, album, year, None)
}
