use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

/// EXIF date layout expected by ExifTool
pub const EXIF_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no timestamp in JSON")]
    MissingTimestamp,

    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn latitude_ref(&self) -> &'static str {
        if self.latitude >= 0.0 {
            "N"
        } else {
            "S"
        }
    }

    pub fn longitude_ref(&self) -> &'static str {
        if self.longitude >= 0.0 {
            "E"
        } else {
            "W"
        }
    }
}

/// What a Takeout sidecar tells us about its media file.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRecord {
    pub epoch_seconds: i64,
    pub taken: DateTime<Utc>,
    pub geo: Option<GeoPoint>,
}

impl MetadataRecord {
    /// Capture time formatted for the EXIF date tags (UTC)
    pub fn exif_date(&self) -> String {
        format_exif_date(&self.taken)
    }
}

pub fn format_exif_date(dt: &DateTime<Utc>) -> String {
    dt.format(EXIF_DATE_FORMAT).to_string()
}

/// Parse Google's JSON metadata.
///
/// `photoTakenTime.timestamp` is preferred, `creationTime.timestamp` is the
/// fallback. Google writes epoch seconds as strings, plain numbers are
/// accepted too.
pub fn parse_sidecar(json_bytes: &[u8]) -> Result<MetadataRecord, MetadataError> {
    let data: Value = serde_json::from_slice(json_bytes)?;

    let raw = timestamp_field(&data, "photoTakenTime")
        .or_else(|| timestamp_field(&data, "creationTime"))
        .ok_or(MetadataError::MissingTimestamp)?;

    let epoch_seconds = match raw {
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| MetadataError::InvalidTimestamp(s.clone()))?,
        other => other
            .as_i64()
            .ok_or_else(|| MetadataError::InvalidTimestamp(other.to_string()))?,
    };
    let taken = DateTime::from_timestamp(epoch_seconds, 0)
        .ok_or_else(|| MetadataError::InvalidTimestamp(epoch_seconds.to_string()))?;

    Ok(MetadataRecord {
        epoch_seconds,
        taken,
        geo: parse_geo(&data),
    })
}

fn timestamp_field<'a>(data: &'a Value, key: &str) -> Option<&'a Value> {
    data.get(key)?.get("timestamp").filter(|v| !v.is_null())
}

/// Google writes 0.0/0.0 when it has no location; a zero latitude means "no geo".
fn parse_geo(data: &Value) -> Option<GeoPoint> {
    let geo = data.get("geoData")?;
    let latitude = geo.get("latitude")?.as_f64()?;
    if latitude == 0.0 {
        return None;
    }
    let longitude = geo.get("longitude")?.as_f64()?;
    Some(GeoPoint {
        latitude,
        longitude,
    })
}
