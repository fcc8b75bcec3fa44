//! URL command - print the request URL of one tile.

use terrain_tiles::config::ConfigFile;
use terrain_tiles::fetch::ReqwestClient;
use terrain_tiles::matrix::TileMatrixSet;
use terrain_tiles::protocol::{RequestProtocol, WmtsOptions, WmtsProtocol};

use super::common::{resolve_matrix_set, runtime, BasemapArgs};
use crate::error::CliError;

/// Arguments for the url command.
pub struct UrlArgs {
    pub basemap: BasemapArgs,
    pub level: u32,
    pub col: u32,
    pub row: u32,
}

/// Run the url command.
pub fn run(args: &UrlArgs, config: &ConfigFile) -> Result<(), CliError> {
    let options = args.basemap.resolve(config);
    let matrix_set = if args.basemap.capabilities {
        let client = ReqwestClient::new()?;
        runtime()?.block_on(resolve_matrix_set(&args.basemap, &options, config, &client))?
    } else {
        TileMatrixSet::rd_new()
    };

    println!("{}", tile_url(&options, &matrix_set, args.level, args.col, args.row)?);
    Ok(())
}

/// Request URL of tile `(level, col, row)`.
pub fn tile_url(
    options: &WmtsOptions,
    matrix_set: &TileMatrixSet,
    level: u32,
    col: u32,
    row: u32,
) -> Result<String, CliError> {
    let address = matrix_set.address(level, col, row).ok_or_else(|| {
        let bounds = matrix_set
            .level(level)
            .map(|m| format!("level {} has {}x{} tiles", level, m.matrix_width, m.matrix_height))
            .unwrap_or_else(|| format!("the pyramid has {} levels", matrix_set.len()));
        CliError::Config(format!(
            "Tile {}-{}-{} is outside the pyramid: {}",
            level, col, row, bounds
        ))
    })?;

    let protocol = WmtsProtocol::from_options(options)?;
    Ok(protocol.request_url(&address))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kvp_url() {
        let options = WmtsOptions::new("https://service.pdok.nl/brt/achtergrondkaart/wmts/v2_0?", "grijs");
        let url = tile_url(&options, &TileMatrixSet::rd_new(), 5, 3, 7).unwrap();
        assert!(url.starts_with("https://service.pdok.nl/brt/achtergrondkaart/wmts/v2_0?"));
        assert!(url.ends_with("TileCol=3&TileRow=7&tileMatrix=5"));
    }

    #[test]
    fn test_template_url() {
        let options = WmtsOptions::new("https://h", "grijs")
            .with_template("https://h/{Layer}/{TileMatrix}/{TileCol}/{TileRow}.png");
        let url = tile_url(&options, &TileMatrixSet::rd_new(), 2, 1, 3).unwrap();
        assert_eq!(url, "https://h/grijs/02/1/3.png");
    }

    #[test]
    fn test_out_of_range_tile_is_config_error() {
        let options = WmtsOptions::new("https://h?", "grijs");
        let err = tile_url(&options, &TileMatrixSet::rd_new(), 0, 1, 0).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_CONFIG);

        let err = tile_url(&options, &TileMatrixSet::rd_new(), 40, 0, 0).unwrap_err();
        assert!(err.to_string().contains("17 levels"));
    }
}
