//! WMTS source configuration.

use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVICE: &str = "WMTS";
pub const DEFAULT_REQUEST: &str = "GetTile";
pub const DEFAULT_VERSION: &str = "1.0.0";
pub const DEFAULT_FORMAT: &str = "image/png";
pub const DEFAULT_STYLE: &str = "default";
pub const DEFAULT_TILE_MATRIX_SET: &str = "EPSG:28992";

/// Options describing one WMTS basemap source.
///
/// Field names follow the WMTS KVP parameter names when serialized
/// (`tileMatrixSet`, not `tile_matrix_set`), so a JSON config copied from a
/// web map deserializes directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WmtsOptions {
    /// Service endpoint, with or without a trailing `?`.
    pub url: String,
    pub layer: String,
    pub style: String,
    pub tile_matrix_set: String,
    pub service: String,
    pub request: String,
    pub version: String,
    pub format: String,
    /// RESTful URL template. Takes precedence over query composition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Additional query parameters, appended in order after the standard ones.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<(String, String)>,
}

impl Default for WmtsOptions {
    fn default() -> Self {
        Self {
            url: String::new(),
            layer: String::new(),
            style: DEFAULT_STYLE.to_string(),
            tile_matrix_set: DEFAULT_TILE_MATRIX_SET.to_string(),
            service: DEFAULT_SERVICE.to_string(),
            request: DEFAULT_REQUEST.to_string(),
            version: DEFAULT_VERSION.to_string(),
            format: DEFAULT_FORMAT.to_string(),
            template: None,
            extra: Vec::new(),
        }
    }
}

impl WmtsOptions {
    /// Options for `layer` at `url`, everything else defaulted.
    pub fn new(url: impl Into<String>, layer: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            layer: layer.into(),
            ..Self::default()
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    pub fn with_tile_matrix_set(mut self, tile_matrix_set: impl Into<String>) -> Self {
        self.tile_matrix_set = tile_matrix_set.into();
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Appends an extra query parameter.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }

    /// Static query parameters in the order they are sent.
    pub fn query_pairs(&self) -> Vec<(&str, &str)> {
        let mut pairs = vec![
            ("service", self.service.as_str()),
            ("request", self.request.as_str()),
            ("version", self.version.as_str()),
            ("layer", self.layer.as_str()),
            ("style", self.style.as_str()),
            ("tileMatrixSet", self.tile_matrix_set.as_str()),
            ("format", self.format.as_str()),
        ];
        pairs.extend(self.extra.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        pairs
    }

    /// URL of the service's GetCapabilities document.
    ///
    /// A `url` that already is a capabilities request (or a static `.xml`
    /// document) is returned unchanged.
    pub fn capabilities_url(&self) -> String {
        let url = self.url.as_str();
        if url.contains("GetCapabilities") || url.ends_with(".xml") {
            return url.to_string();
        }

        let mut result = url.to_string();
        if !result.contains('?') {
            result.push('?');
        }
        if !result.ends_with('?') && !result.ends_with('&') {
            result.push('&');
        }
        result.push_str("service=");
        result.push_str(&self.service);
        result.push_str("&request=GetCapabilities&version=");
        result.push_str(&self.version);
        result
    }
}
