//! Initial-selection parameters taken from the viewer URL.

use serde::{Deserialize, Serialize};
use url::Url;

/// Query key naming the series to show first.
pub const INITIAL_SERIES_PARAM: &str = "initialSeriesInstanceUID";

/// Query key naming the SOP instance to show first.
pub const INITIAL_SOP_PARAM: &str = "initialSOPInstanceUID";

/// Series and SOP instance UIDs requested by the URL.
///
/// Both keys may repeat, and each value may hold a comma separated list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlParams {
    #[serde(rename = "initialSeriesInstanceUID", default)]
    pub initial_series_instance_uid: Vec<String>,
    #[serde(rename = "initialSOPInstanceUID", default)]
    pub initial_sop_instance_uid: Vec<String>,
}

impl UrlParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, uid: impl Into<String>) -> Self {
        self.initial_series_instance_uid.push(uid.into());
        self
    }

    pub fn with_sop_instance(mut self, uid: impl Into<String>) -> Self {
        self.initial_sop_instance_uid.push(uid.into());
        self
    }

    /// Collects the initial-selection keys from a parsed URL.
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            let target = match key.as_ref() {
                INITIAL_SERIES_PARAM => &mut params.initial_series_instance_uid,
                INITIAL_SOP_PARAM => &mut params.initial_sop_instance_uid,
                _ => continue,
            };
            target.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|uid| !uid.is_empty())
                    .map(str::to_string),
            );
        }
        params
    }

    /// Parses either a full URL or a bare query string (`a=b&c=d`, with or
    /// without a leading `?`).
    pub fn parse(input: &str) -> Result<Self, url::ParseError> {
        match Url::parse(input) {
            Ok(url) => Ok(Self::from_url(&url)),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = Url::parse("http://localhost/")?;
                let query = input.trim_start_matches('?');
                let url = base.join(&format!("?{query}"))?;
                Ok(Self::from_url(&url))
            }
            Err(err) => Err(err),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.initial_series_instance_uid.is_empty() && self.initial_sop_instance_uid.is_empty()
    }

    pub fn has_series(&self, series_instance_uid: &str) -> bool {
        self.initial_series_instance_uid
            .iter()
            .any(|uid| uid == series_instance_uid)
    }

    pub fn has_sop_instance(&self, sop_instance_uid: &str) -> bool {
        self.initial_sop_instance_uid
            .iter()
            .any(|uid| uid == sop_instance_uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_url() {
        let params = UrlParams::parse(
            "https://viewer.example/viewer?StudyInstanceUIDs=1.2&initialSeriesInstanceUID=1.2.3&initialSOPInstanceUID=4.5,4.6",
        )
        .unwrap();
        assert_eq!(params.initial_series_instance_uid, vec!["1.2.3"]);
        assert_eq!(params.initial_sop_instance_uid, vec!["4.5", "4.6"]);
    }

    #[test]
    fn test_parse_query_string() {
        let params =
            UrlParams::parse("?initialSeriesInstanceUID=a&initialSeriesInstanceUID=b").unwrap();
        assert!(params.has_series("a"));
        assert!(params.has_series("b"));
        assert!(params.initial_sop_instance_uid.is_empty());
    }

    #[test]
    fn test_empty() {
        assert!(UrlParams::parse("foo=bar").unwrap().is_empty());
        assert!(!UrlParams::new().with_sop_instance("1").is_empty());
    }
}
