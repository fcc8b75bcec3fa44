//! Tile request protocols.
//!
//! A protocol turns a [`TileAddress`] into the URL that fetches it. Two WMTS
//! encodings are provided:
//!
//! - [`TemplateProtocol`]: RESTful template substitution
//!   (`.../{TileMatrix}/{TileCol}/{TileRow}.png`).
//! - [`KvpProtocol`]: query-string `GetTile` requests.
//!
//! New wire protocols implement [`RequestProtocol`].

mod kvp;
mod options;
mod template;

pub use kvp::KvpProtocol;
pub use options::WmtsOptions;
pub use template::TemplateProtocol;

use thiserror::Error;

use crate::matrix::TileAddress;

/// Errors raised while configuring a protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// No service URL was configured.
    #[error("WMTS url is empty")]
    EmptyUrl,

    /// A required placeholder is absent from the template.
    #[error("URL template is missing the {{{0}}} placeholder")]
    MissingPlaceholder(&'static str),

    /// The template names a placeholder this protocol does not know.
    #[error("URL template has unknown placeholder {{{0}}}")]
    UnknownPlaceholder(String),

    /// A `{` without `}` or the reverse.
    #[error("URL template has unbalanced braces at byte {position}")]
    UnbalancedBraces { position: usize },
}

/// Translates a tile address into a concrete fetch URL.
pub trait RequestProtocol: Send + Sync {
    fn request_url(&self, tile: &TileAddress) -> String;
}

/// The protocol selected by a [`WmtsOptions`].
#[derive(Debug, Clone)]
pub enum WmtsProtocol {
    Template(TemplateProtocol),
    Kvp(KvpProtocol),
}

impl WmtsProtocol {
    /// Uses the template when one is configured, query composition otherwise.
    pub fn from_options(options: &WmtsOptions) -> Result<Self, ProtocolError> {
        match &options.template {
            Some(template) => Ok(Self::Template(TemplateProtocol::new(template, options)?)),
            None => Ok(Self::Kvp(KvpProtocol::new(options)?)),
        }
    }
}

impl RequestProtocol for WmtsProtocol {
    fn request_url(&self, tile: &TileAddress) -> String {
        match self {
            Self::Template(protocol) => protocol.request_url(tile),
            Self::Kvp(protocol) => protocol.request_url(tile),
        }
    }
}

/// Level as it appears in template URLs: two digits, zero-padded below 10.
pub fn level_identifier(level: u32) -> String {
    format!("{:02}", level)
}
