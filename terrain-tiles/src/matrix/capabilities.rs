//! WMTS capabilities parsing.
//!
//! Extracts one `Contents/TileMatrixSet` from a WMTS `Capabilities` document
//! and turns its `TileMatrix` entries into a [`TileMatrixSet`]. Only the
//! fields the tile engine needs are read; layers, styles and service metadata
//! are skipped.
//!
//! ```text
//! <Contents>
//!   <TileMatrixSet>
//!     <ows:Identifier>EPSG:28992</ows:Identifier>
//!     <TileMatrix>
//!       <ows:Identifier>00</ows:Identifier>
//!       <ScaleDenominator>12288000.0</ScaleDenominator>
//!       <TopLeftCorner>-285401.92 903401.92</TopLeftCorner>
//!       <TileWidth>256</TileWidth> <TileHeight>256</TileHeight>
//!       <MatrixWidth>1</MatrixWidth> <MatrixHeight>1</MatrixHeight>
//!     </TileMatrix>
//!     ...
//! ```

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

use super::{MatrixError, TileMatrixLevel, TileMatrixSet};

/// Errors that can occur while reading a capabilities document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CapabilitiesError {
    /// The document is not well-formed XML.
    #[error("Malformed capabilities XML: {0}")]
    Xml(String),

    /// No `TileMatrixSet` with the requested identifier.
    #[error("Tile matrix set '{0}' not found in capabilities")]
    SetNotFound(String),

    /// A `TileMatrix` is missing a required element.
    #[error("Tile matrix '{matrix}' is missing <{field}>")]
    MissingField { matrix: String, field: &'static str },

    /// An element holds a value that is not a number.
    #[error("Tile matrix '{matrix}': invalid <{field}> value '{value}'")]
    InvalidValue {
        matrix: String,
        field: &'static str,
        value: String,
    },

    /// The parsed levels do not form a valid pyramid.
    #[error(transparent)]
    Matrix(#[from] MatrixError),
}

#[derive(Debug, Default)]
struct RawMatrix {
    identifier: Option<String>,
    scale_denominator: Option<String>,
    top_left: Option<String>,
    tile_width: Option<String>,
    tile_height: Option<String>,
    matrix_width: Option<String>,
    matrix_height: Option<String>,
}

#[derive(Debug, Default)]
struct RawMatrixSet {
    identifier: Option<String>,
    matrices: Vec<RawMatrix>,
}

/// Parses the tile matrix set named `tile_matrix_set` from a capabilities document.
///
/// Levels are ordered by descending scale denominator and renumbered from 0,
/// whatever their published identifiers are.
pub fn parse_capabilities(
    xml: &str,
    tile_matrix_set: &str,
) -> Result<TileMatrixSet, CapabilitiesError> {
    let sets = read_matrix_sets(xml)?;
    let raw = sets
        .into_iter()
        .find(|s| s.identifier.as_deref() == Some(tile_matrix_set))
        .ok_or_else(|| CapabilitiesError::SetNotFound(tile_matrix_set.to_string()))?;

    let mut parsed = raw
        .matrices
        .into_iter()
        .map(ParsedMatrix::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    parsed.sort_by(|a, b| b.scale_denominator.total_cmp(&a.scale_denominator));

    let levels = parsed
        .into_iter()
        .enumerate()
        .map(|(level, m)| {
            TileMatrixLevel::from_scale_denominator(
                level as u32,
                m.identifier,
                m.scale_denominator,
                m.top_left,
                m.tile_size,
                m.matrix_size,
            )
        })
        .collect();

    let set = TileMatrixSet::new(tile_matrix_set, levels)?;
    tracing::debug!(
        tile_matrix_set = tile_matrix_set,
        levels = set.len(),
        "Parsed WMTS capabilities"
    );
    Ok(set)
}

fn read_matrix_sets(xml: &str) -> Result<Vec<RawMatrixSet>, CapabilitiesError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut sets = Vec::new();
    let mut current_set: Option<RawMatrixSet> = None;
    let mut current_matrix: Option<RawMatrix> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let parent = path.last().map(String::as_str);
                match (name.as_str(), parent) {
                    ("TileMatrixSet", Some("Contents")) => {
                        current_set = Some(RawMatrixSet::default());
                    }
                    ("TileMatrix", Some("TileMatrixSet")) if current_set.is_some() => {
                        current_matrix = Some(RawMatrix::default());
                    }
                    _ => {}
                }
                path.push(name);
            }
            Ok(Event::End(_)) => {
                let name = path.pop();
                match name.as_deref() {
                    Some("TileMatrix") => {
                        if let (Some(matrix), Some(set)) =
                            (current_matrix.take(), current_set.as_mut())
                        {
                            set.matrices.push(matrix);
                        }
                    }
                    Some("TileMatrixSet") if path.last().map(String::as_str) == Some("Contents") => {
                        if let Some(set) = current_set.take() {
                            sets.push(set);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| CapabilitiesError::Xml(e.to_string()))?
                    .into_owned();
                let element = path.last().map(String::as_str);
                let parent = path.len().checked_sub(2).map(|i| path[i].as_str());

                if let Some(matrix) = current_matrix.as_mut() {
                    if parent == Some("TileMatrix") {
                        let slot = match element {
                            Some("Identifier") => &mut matrix.identifier,
                            Some("ScaleDenominator") => &mut matrix.scale_denominator,
                            Some("TopLeftCorner") => &mut matrix.top_left,
                            Some("TileWidth") => &mut matrix.tile_width,
                            Some("TileHeight") => &mut matrix.tile_height,
                            Some("MatrixWidth") => &mut matrix.matrix_width,
                            Some("MatrixHeight") => &mut matrix.matrix_height,
                            _ => continue,
                        };
                        *slot = Some(text);
                    }
                } else if let Some(set) = current_set.as_mut() {
                    if element == Some("Identifier") && parent == Some("TileMatrixSet") {
                        set.identifier = Some(text);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(CapabilitiesError::Xml(e.to_string())),
            _ => {}
        }
    }

    Ok(sets)
}

struct ParsedMatrix {
    identifier: String,
    scale_denominator: f64,
    top_left: (f64, f64),
    tile_size: (u32, u32),
    matrix_size: (u32, u32),
}

impl TryFrom<RawMatrix> for ParsedMatrix {
    type Error = CapabilitiesError;

    fn try_from(raw: RawMatrix) -> Result<Self, Self::Error> {
        let identifier = raw.identifier.unwrap_or_else(|| "?".to_string());

        let required = |value: Option<String>, field: &'static str| {
            value.ok_or_else(|| CapabilitiesError::MissingField {
                matrix: identifier.clone(),
                field,
            })
        };
        let invalid = |field: &'static str, value: &str| CapabilitiesError::InvalidValue {
            matrix: identifier.clone(),
            field,
            value: value.to_string(),
        };
        let number = |value: Option<String>, field: &'static str| -> Result<u32, CapabilitiesError> {
            let value = required(value, field)?;
            value.trim().parse().map_err(|_| invalid(field, &value))
        };

        let scale = required(raw.scale_denominator, "ScaleDenominator")?;
        let scale_denominator: f64 = scale
            .trim()
            .parse()
            .map_err(|_| invalid("ScaleDenominator", &scale))?;

        let corner = required(raw.top_left, "TopLeftCorner")?;
        let coords = corner
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| invalid("TopLeftCorner", &corner))?;
        let top_left = match coords.as_slice() {
            [x, y] => (*x, *y),
            _ => return Err(invalid("TopLeftCorner", &corner)),
        };

        let tile_size = (
            number(raw.tile_width, "TileWidth")?,
            number(raw.tile_height, "TileHeight")?,
        );
        let matrix_size = (
            number(raw.matrix_width, "MatrixWidth")?,
            number(raw.matrix_height, "MatrixHeight")?,
        );

        Ok(Self {
            identifier,
            scale_denominator,
            top_left,
            tile_size,
            matrix_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix_xml(id: &str, scale: f64, size: u32) -> String {
        format!(
            "<TileMatrix>\
               <ows:Identifier>{id}</ows:Identifier>\
               <ScaleDenominator>{scale}</ScaleDenominator>\
               <TopLeftCorner>-285401.92 903401.92</TopLeftCorner>\
               <TileWidth>256</TileWidth><TileHeight>256</TileHeight>\
               <MatrixWidth>{size}</MatrixWidth><MatrixHeight>{size}</MatrixHeight>\
             </TileMatrix>"
        )
    }

    fn capabilities(matrices: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <Capabilities xmlns="http://www.opengis.net/wmts/1.0" xmlns:ows="http://www.opengis.net/ows/1.1">
              <ows:ServiceIdentification><ows:Title>BRT Achtergrondkaart</ows:Title></ows:ServiceIdentification>
              <Contents>
                <Layer>
                  <ows:Identifier>grijs</ows:Identifier>
                  <TileMatrixSetLink><TileMatrixSet>EPSG:28992</TileMatrixSet></TileMatrixSetLink>
                </Layer>
                <TileMatrixSet>
                  <ows:Identifier>EPSG:3857</ows:Identifier>
                  {other}
                </TileMatrixSet>
                <TileMatrixSet>
                  <ows:Identifier>EPSG:28992</ows:Identifier>
                  <ows:SupportedCRS>urn:ogc:def:crs:EPSG::28992</ows:SupportedCRS>
                  {matrices}
                </TileMatrixSet>
              </Contents>
            </Capabilities>"#,
            other = matrix_xml("0", 559082264.0287178, 1),
            matrices = matrices,
        )
    }

    #[test]
    fn test_parse_rd_levels() {
        let xml = capabilities(&format!(
            "{}{}{}",
            matrix_xml("00", 12288000.0, 1),
            matrix_xml("01", 6144000.0, 2),
            matrix_xml("02", 3072000.0, 4)
        ));

        let set = parse_capabilities(&xml, "EPSG:28992").unwrap();
        assert_eq!(set.identifier(), "EPSG:28992");
        assert_eq!(set.len(), 3);

        let level1 = set.level(1).unwrap();
        assert_eq!(level1.identifier, "01");
        assert_eq!(level1.matrix_width, 2);
        assert!((level1.resolution() - 1720.32).abs() < 1e-6);
        assert_eq!(level1.origin_x, -285401.92);
        assert_eq!(level1.origin_y, 903401.92);
    }

    #[test]
    fn test_levels_are_sorted_coarse_to_fine() {
        let xml = capabilities(&format!(
            "{}{}",
            matrix_xml("fine", 3072000.0, 4),
            matrix_xml("coarse", 12288000.0, 1)
        ));

        let set = parse_capabilities(&xml, "EPSG:28992").unwrap();
        assert_eq!(set.level(0).unwrap().identifier, "coarse");
        assert_eq!(set.level(1).unwrap().identifier, "fine");
    }

    #[test]
    fn test_layer_link_is_not_mistaken_for_a_set() {
        let xml = capabilities(&matrix_xml("00", 12288000.0, 1));
        let set = parse_capabilities(&xml, "EPSG:3857").unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.level(0).unwrap().identifier, "0");
    }

    #[test]
    fn test_unknown_set() {
        let xml = capabilities(&matrix_xml("00", 12288000.0, 1));
        assert_eq!(
            parse_capabilities(&xml, "EPSG:4326").unwrap_err(),
            CapabilitiesError::SetNotFound("EPSG:4326".to_string())
        );
    }

    #[test]
    fn test_missing_field() {
        let broken = matrix_xml("00", 12288000.0, 1).replace("<TileWidth>256</TileWidth>", "");
        let xml = capabilities(&broken);
        assert!(matches!(
            parse_capabilities(&xml, "EPSG:28992"),
            Err(CapabilitiesError::MissingField {
                field: "TileWidth",
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_corner() {
        let broken = matrix_xml("00", 12288000.0, 1).replace("-285401.92 903401.92", "west north");
        let xml = capabilities(&broken);
        assert!(matches!(
            parse_capabilities(&xml, "EPSG:28992"),
            Err(CapabilitiesError::InvalidValue {
                field: "TopLeftCorner",
                ..
            })
        ));
    }

    #[test]
    fn test_malformed_xml() {
        let result = parse_capabilities("<Capabilities><Contents></Capabilities>", "EPSG:28992");
        assert!(matches!(result, Err(CapabilitiesError::Xml(_))));
    }
}
