//! Live open-data portal provider.
//!
//! Boundaries come from a WFS endpoint serving GeoJSON, either directly or
//! wrapped in a zip archive. Observations come from an indicator CSV,
//! located either by a direct URL or by resolving a CKAN dataset to its
//! first CSV resource.

use std::io::{Read, Write};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::boundary::{self, RegionBoundary};
use crate::config::SourcesConfig;
use crate::error::{Error, Result};
use crate::indicator::Observation;

use super::Provider;

const SOURCE_NAME: &str = "portal";

/// Provider backed by the live open-data portals.
#[derive(Debug)]
pub struct PortalProvider {
    client: reqwest::Client,
    boundary_url: String,
    boundary_name_property: String,
    ckan_base_url: String,
    crime_dataset_id: String,
    indicator_csv_url: Option<String>,
}

impl PortalProvider {
    /// Build a provider from the source configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key cannot be used as a header value
    /// or the HTTP client cannot be constructed.
    pub fn new(config: &SourcesConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            let mut value =
                reqwest::header::HeaderValue::from_str(api_key).map_err(|_| {
                    Error::ConfigValidation {
                        message: "api_key contains characters not valid in a header".to_string(),
                    }
                })?;
            value.set_sensitive(true);
            headers.insert("apikey", value);
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            boundary_url: config.boundary_url.clone(),
            boundary_name_property: config.boundary_name_property.clone(),
            ckan_base_url: config.ckan_base_url.clone(),
            crime_dataset_id: config.crime_dataset_id.clone(),
            indicator_csv_url: config.indicator_csv_url.clone(),
        })
    }

    /// Resolve a CKAN dataset to the URL of its first CSV resource.
    async fn resolve_dataset_csv(&self, dataset_id: &str) -> Result<String> {
        let url = format!(
            "{}/package_show?id={}",
            self.ckan_base_url.trim_end_matches('/'),
            dataset_id
        );
        debug!("Resolving dataset resources via {url}");

        let response: CkanResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !response.success {
            return Err(Error::source_fetch(
                SOURCE_NAME,
                format!("package_show failed for dataset '{dataset_id}'"),
            ));
        }
        first_csv_url(response.result).ok_or_else(|| {
            Error::source_fetch(
                SOURCE_NAME,
                format!("dataset '{dataset_id}' has no CSV resource"),
            )
        })
    }
}

#[async_trait]
impl Provider for PortalProvider {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn boundaries(&self) -> Result<Vec<RegionBoundary>> {
        info!("Fetching boundaries from {}", self.boundary_url);
        let response = self
            .client
            .get(&self.boundary_url)
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?;
        debug!("Boundary response is {} bytes", bytes.len());

        // Some portals serve the GeoJSON wrapped in a zip archive
        let text = if bytes.starts_with(b"PK") {
            extract_geojson_member(&bytes)?
        } else {
            String::from_utf8(bytes.to_vec())
                .map_err(|e| Error::payload_decode("boundary response", e.to_string()))?
        };

        boundary::parse_boundaries(&text, &self.boundary_name_property, SOURCE_NAME)
    }

    async fn observations(&self) -> Result<Vec<Observation>> {
        let url = match &self.indicator_csv_url {
            Some(url) => url.clone(),
            None => self.resolve_dataset_csv(&self.crime_dataset_id).await?,
        };

        info!("Fetching indicator CSV from {url}");
        let text = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        super::parse_indicator_csv(&text, super::current_year())
    }
}

/// Envelope of a CKAN `package_show` response.
#[derive(Debug, Default, Deserialize)]
struct CkanResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: CkanPackage,
}

/// The dataset payload of a `package_show` response.
#[derive(Debug, Default, Deserialize)]
struct CkanPackage {
    #[serde(default)]
    resources: Vec<CkanResource>,
}

/// One downloadable resource attached to a CKAN dataset.
#[derive(Debug, Default, Deserialize)]
struct CkanResource {
    #[serde(default)]
    format: String,
    #[serde(default)]
    url: String,
}

/// Pull the first CSV resource URL out of a CKAN package.
fn first_csv_url(package: CkanPackage) -> Option<String> {
    package
        .resources
        .into_iter()
        .find(|resource| resource.format.eq_ignore_ascii_case("csv"))
        .map(|resource| resource.url)
}

/// Extract the first GeoJSON member from a zip archive.
fn extract_geojson_member(bytes: &[u8]) -> Result<String> {
    let mut tmpfile = tempfile::tempfile()?;
    tmpfile.write_all(bytes)?;
    let mut archive = zip::ZipArchive::new(tmpfile)
        .map_err(|e| Error::payload_decode("boundary archive", e.to_string()))?;

    let mut member_name = None;
    for index in 0..archive.len() {
        let member = archive
            .by_index(index)
            .map_err(|e| Error::payload_decode("boundary archive", e.to_string()))?;
        let lowered = member.name().to_ascii_lowercase();
        if lowered.ends_with(".geojson") || lowered.ends_with(".json") {
            member_name = Some(member.name().to_string());
            break;
        }
    }
    let member_name = member_name.ok_or_else(|| {
        Error::payload_decode("boundary archive", "no GeoJSON member in archive")
    })?;

    debug!("Extracting archive member {member_name}");
    let mut member = archive
        .by_name(&member_name)
        .map_err(|e| Error::payload_decode("boundary archive", e.to_string()))?;
    let mut text = String::new();
    member.read_to_string(&mut text)?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_with_default_config() {
        let provider = PortalProvider::new(&SourcesConfig::default()).unwrap();
        assert_eq!(provider.name(), "portal");
    }

    #[test]
    fn test_new_rejects_invalid_api_key() {
        let config = SourcesConfig {
            api_key: Some("bad\nkey".to_string()),
            ..SourcesConfig::default()
        };
        assert!(PortalProvider::new(&config).is_err());
    }

    #[test]
    fn test_first_csv_url_prefers_first_csv() {
        let package: CkanPackage = serde_json::from_str(
            r#"{
                "resources": [
                    {"format": "PDF", "url": "https://example.org/report.pdf"},
                    {"format": "csv", "url": "https://example.org/data.csv"},
                    {"format": "CSV", "url": "https://example.org/other.csv"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(
            first_csv_url(package).as_deref(),
            Some("https://example.org/data.csv")
        );
    }

    #[test]
    fn test_first_csv_url_none_without_csv() {
        let package: CkanPackage = serde_json::from_str(
            r#"{"resources": [{"format": "XLSX", "url": "https://example.org/data.xlsx"}]}"#,
        )
        .unwrap();
        assert!(first_csv_url(package).is_none());
    }

    #[test]
    fn test_ckan_response_tolerates_missing_fields() {
        let response: CkanResponse = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert!(!response.success);
        assert!(response.result.resources.is_empty());
    }

    #[test]
    fn test_extract_geojson_member() {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("readme.txt", options).unwrap();
        writer.write_all(b"ignore me").unwrap();
        writer.start_file("nsw_lga.geojson", options).unwrap();
        writer
            .write_all(b"{\"type\":\"FeatureCollection\",\"features\":[]}")
            .unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        assert!(bytes.starts_with(b"PK"));

        let text = extract_geojson_member(&bytes).unwrap();
        assert!(text.contains("FeatureCollection"));
    }

    #[test]
    fn test_extract_geojson_member_requires_geojson() {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("readme.txt", options).unwrap();
        writer.write_all(b"no boundaries here").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        assert!(extract_geojson_member(&bytes).is_err());
    }

    #[test]
    fn test_extract_geojson_member_rejects_garbage() {
        assert!(extract_geojson_member(b"PK but not actually a zip").is_err());
    }
}
