//! Key-value-pair (query string) GetTile requests.

use super::{ProtocolError, RequestProtocol, WmtsOptions};
use crate::matrix::TileAddress;

/// Builds `GetTile` URLs by appending query parameters to the service URL.
///
/// The static part of the query is composed once. Values are appended as
/// configured; nothing is percent-encoded, so pre-encoded values pass through
/// untouched.
#[derive(Debug, Clone)]
pub struct KvpProtocol {
    prefix: String,
}

impl KvpProtocol {
    pub fn new(options: &WmtsOptions) -> Result<Self, ProtocolError> {
        if options.url.is_empty() {
            return Err(ProtocolError::EmptyUrl);
        }

        let mut prefix = options.url.clone();
        if !prefix.contains('?') {
            prefix.push('?');
        }
        for (key, value) in options.query_pairs() {
            push_separator(&mut prefix);
            prefix.push_str(key);
            prefix.push('=');
            prefix.push_str(value);
        }
        push_separator(&mut prefix);

        Ok(Self { prefix })
    }
}

fn push_separator(url: &mut String) {
    if !url.ends_with('?') && !url.ends_with('&') {
        url.push('&');
    }
}

impl RequestProtocol for KvpProtocol {
    fn request_url(&self, tile: &TileAddress) -> String {
        format!(
            "{}TileCol={}&TileRow={}&tileMatrix={}",
            self.prefix,
            tile.col,
            tile.row,
            tile.level()
        )
    }
}
