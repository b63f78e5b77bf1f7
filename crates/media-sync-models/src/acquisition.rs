use serde::{Deserialize, Serialize};
use crate::media_ids::TmdbId;

/// A movie already known to Radarr. Only the TMDB ID matters for dedup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogMovie {
    /// Missing or 0 for entries Radarr could not match
    #[serde(default)]
    pub tmdb_id: Option<TmdbId>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: u32,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QualityProfile {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddOptions {
    pub search_for_movie: bool,
}

/// Body of `POST /api/v3/movie`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddMovieRequest {
    pub tmdb_id: TmdbId,
    pub quality_profile_id: u32,
    pub root_folder_path: String,
    pub monitored: bool,
    pub add_options: AddOptions,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<u32>,
}

/// One entry of the validation error list Radarr returns with HTTP 400
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFailure {
    #[serde(default)]
    pub property_name: Option<String>,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub error_code: Option<String>,
}

/// Why Radarr refused to add a movie
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    /// The movie is already in the catalog
    AlreadyPresent,
    /// Radarr's own TMDB lookup could not find the ID
    NotFound,
    /// The target folder clashes with an existing movie
    PathConflict(String),
    Other(String),
}

impl RejectionReason {
    pub fn classify(failure: &ValidationFailure) -> Self {
        match failure.error_code.as_deref() {
            Some("MovieExistsValidator") => RejectionReason::AlreadyPresent,
            Some("MoviePathValidator") => RejectionReason::PathConflict(failure.error_message.clone()),
            _ if failure.error_message.contains("A movie with this ID was not found") => RejectionReason::NotFound,
            _ => RejectionReason::Other(failure.error_message.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(code: Option<&str>, message: &str) -> ValidationFailure {
        ValidationFailure {
            property_name: Some("TmdbId".to_string()),
            error_message: message.to_string(),
            error_code: code.map(str::to_string),
        }
    }

    #[test]
    fn test_classify_known_rejections() {
        assert_eq!(
            RejectionReason::classify(&failure(Some("MovieExistsValidator"), "This movie has already been added")),
            RejectionReason::AlreadyPresent
        );
        assert_eq!(
            RejectionReason::classify(&failure(None, "A movie with this ID was not found.")),
            RejectionReason::NotFound
        );
        assert_eq!(
            RejectionReason::classify(&failure(Some("MoviePathValidator"), "Path is already configured")),
            RejectionReason::PathConflict("Path is already configured".to_string())
        );
        assert_eq!(
            RejectionReason::classify(&failure(Some("NotEmptyValidator"), "Root folder must not be empty")),
            RejectionReason::Other("Root folder must not be empty".to_string())
        );
    }

    #[test]
    fn test_add_request_wire_format() {
        let request = AddMovieRequest {
            tmdb_id: TmdbId(603),
            quality_profile_id: 4,
            root_folder_path: "/movies".to_string(),
            monitored: true,
            add_options: AddOptions { search_for_movie: false },
            tags: vec![2, 7],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["tmdbId"], 603);
        assert_eq!(json["qualityProfileId"], 4);
        assert_eq!(json["rootFolderPath"], "/movies");
        assert_eq!(json["addOptions"]["searchForMovie"], false);
        assert_eq!(json["tags"], serde_json::json!([2, 7]));
    }

    #[test]
    fn test_validation_failures_deserialize() {
        let body = r#"[{"propertyName":"TmdbId","errorMessage":"This movie has already been added","errorCode":"MovieExistsValidator","attemptedValue":603}]"#;
        let failures: Vec<ValidationFailure> = serde_json::from_str(body).unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].error_code.as_deref(), Some("MovieExistsValidator"));
    }
}
