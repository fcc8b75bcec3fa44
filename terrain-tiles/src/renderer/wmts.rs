//! WMTS constructors for [`TilesRenderer`].

use std::sync::Arc;

use super::{RendererConfig, RendererError, TilesRenderer};
use crate::fetch::HttpClient;
use crate::matrix::TileMatrixSet;
use crate::protocol::{WmtsOptions, WmtsProtocol};
use crate::scheme::WmtsTileScheme;

impl TilesRenderer {
    /// Builds an engine for a WMTS source whose matrix set is already known.
    ///
    /// # Errors
    ///
    /// Fails on an invalid config, a malformed URL template or when called
    /// outside a Tokio runtime.
    pub fn wmts(
        options: &WmtsOptions,
        matrix_set: TileMatrixSet,
        client: Arc<dyn HttpClient>,
        config: RendererConfig,
    ) -> Result<Self, RendererError> {
        let scheme = WmtsTileScheme::new(matrix_set, config.scheme)?;
        let protocol = WmtsProtocol::from_options(options)?;
        tracing::info!(
            layer = %options.layer,
            tile_matrix_set = %scheme.matrix_set().identifier(),
            levels = scheme.matrix_set().len(),
            template = options.template.is_some(),
            "WMTS basemap configured"
        );
        Self::new(Box::new(scheme), Box::new(protocol), client, config)
    }

    /// Fetches the service capabilities, then builds the engine from the
    /// configured tile matrix set.
    pub async fn wmts_from_capabilities(
        options: &WmtsOptions,
        client: Arc<dyn HttpClient>,
        config: RendererConfig,
    ) -> Result<Self, RendererError> {
        let scheme = WmtsTileScheme::from_capabilities(client.as_ref(), options, config.scheme).await?;
        let protocol = WmtsProtocol::from_options(options)?;
        Self::new(Box::new(scheme), Box::new(protocol), client, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{BoxFuture, FetchError};
    use bytes::Bytes;

    struct NoopClient;

    impl HttpClient for NoopClient {
        fn get(&self, _url: &str) -> BoxFuture<'_, Result<Bytes, FetchError>> {
            Box::pin(async { Err(FetchError::Http("offline".to_string())) })
        }
    }

    struct CapabilitiesClient(&'static str);

    impl HttpClient for CapabilitiesClient {
        fn get(&self, url: &str) -> BoxFuture<'_, Result<Bytes, FetchError>> {
            let body = if url.contains("GetCapabilities") {
                Ok(Bytes::from_static(self.0.as_bytes()))
            } else {
                Err(FetchError::Status {
                    status: 404,
                    url: url.to_string(),
                })
            };
            Box::pin(async move { body })
        }
    }

    const CAPABILITIES: &str = r#"<?xml version="1.0"?>
<Capabilities xmlns="http://www.opengis.net/wmts/1.0" xmlns:ows="http://www.opengis.net/ows/1.1">
  <Contents>
    <TileMatrixSet>
      <ows:Identifier>EPSG:28992</ows:Identifier>
      <TileMatrix>
        <ows:Identifier>00</ows:Identifier>
        <ScaleDenominator>12288000.0</ScaleDenominator>
        <TopLeftCorner>-285401.92 903401.92</TopLeftCorner>
        <TileWidth>256</TileWidth>
        <TileHeight>256</TileHeight>
        <MatrixWidth>1</MatrixWidth>
        <MatrixHeight>1</MatrixHeight>
      </TileMatrix>
      <TileMatrix>
        <ows:Identifier>01</ows:Identifier>
        <ScaleDenominator>6144000.0</ScaleDenominator>
        <TopLeftCorner>-285401.92 903401.92</TopLeftCorner>
        <TileWidth>256</TileWidth>
        <TileHeight>256</TileHeight>
        <MatrixWidth>2</MatrixWidth>
        <MatrixHeight>2</MatrixHeight>
      </TileMatrix>
    </TileMatrixSet>
  </Contents>
</Capabilities>"#;

    #[tokio::test]
    async fn test_wmts_builds_with_template() {
        let options = WmtsOptions::new("https://h/wmts", "grijs").with_template("/{TileMatrix}/{TileCol}/{TileRow}.png");
        let renderer = TilesRenderer::wmts(
            &options,
            TileMatrixSet::rd_new(),
            Arc::new(NoopClient),
            RendererConfig::default(),
        );
        assert!(renderer.is_ok());
    }

    #[tokio::test]
    async fn test_wmts_rejects_malformed_template() {
        let options = WmtsOptions::new("https://h/wmts", "grijs").with_template("/{TileMatrix}/{TileCol}.png");
        let result = TilesRenderer::wmts(
            &options,
            TileMatrixSet::rd_new(),
            Arc::new(NoopClient),
            RendererConfig::default(),
        );
        assert!(matches!(result, Err(RendererError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_wmts_from_capabilities() {
        let options = WmtsOptions::new("https://h/wmts?", "grijs");
        let renderer = TilesRenderer::wmts_from_capabilities(
            &options,
            Arc::new(CapabilitiesClient(CAPABILITIES)),
            RendererConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(renderer.stats().active_tiles, 0);
    }

    #[tokio::test]
    async fn test_wmts_from_capabilities_fetch_failure() {
        let options = WmtsOptions::new("https://h/wmts?", "grijs");
        let result =
            TilesRenderer::wmts_from_capabilities(&options, Arc::new(NoopClient), RendererConfig::default()).await;
        assert!(matches!(result, Err(RendererError::Scheme(_))));
    }
}
