//! Levels command - print the tile matrix table of a pyramid.

use console::style;
use terrain_tiles::config::ConfigFile;
use terrain_tiles::fetch::ReqwestClient;
use terrain_tiles::matrix::TileMatrixSet;

use super::common::{resolve_matrix_set, runtime, BasemapArgs};
use crate::error::CliError;

/// Run the levels command.
pub fn run(args: &BasemapArgs, config: &ConfigFile) -> Result<(), CliError> {
    let options = args.resolve(config);
    let matrix_set = if args.capabilities {
        let client = ReqwestClient::new()?;
        runtime()?.block_on(resolve_matrix_set(args, &options, config, &client))?
    } else {
        TileMatrixSet::rd_new()
    };

    println!(
        "{} {} ({} levels)",
        style("Tile matrix set").bold(),
        matrix_set.identifier(),
        matrix_set.len()
    );
    println!();
    for line in level_table(&matrix_set) {
        println!("{}", line);
    }
    Ok(())
}

/// Formats one header row plus one row per level.
pub fn level_table(matrix_set: &TileMatrixSet) -> Vec<String> {
    let mut lines = vec![format!(
        "{:>5}  {:<10}  {:>12}  {:>12}  {:>11}",
        "level", "identifier", "m/px", "tile span m", "matrix"
    )];
    for level in matrix_set.levels() {
        lines.push(format!(
            "{:>5}  {:<10}  {:>12.4}  {:>12.2}  {:>11}",
            level.level,
            level.identifier,
            level.resolution(),
            level.tile_span_x,
            format!("{}x{}", level.matrix_width, level.matrix_height),
        ));
    }
    lines
}
