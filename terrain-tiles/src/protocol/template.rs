//! RESTful URL template substitution.

use super::{level_identifier, ProtocolError, RequestProtocol, WmtsOptions};
use crate::matrix::TileAddress;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    TileMatrix,
    TileCol,
    TileRow,
}

/// Builds tile URLs from a template such as
/// `https://host/{Layer}/{TileMatrix}/{TileCol}/{TileRow}.png`.
///
/// The template is parsed once. `{Layer}`, `{Style}` and `{TileMatrixSet}` are
/// resolved from the options at construction; `{TileMatrix}`, `{TileCol}` and
/// `{TileRow}` are required and replaced per tile, at every occurrence.
#[derive(Debug, Clone)]
pub struct TemplateProtocol {
    segments: Vec<Segment>,
}

impl TemplateProtocol {
    pub fn new(template: &str, options: &WmtsOptions) -> Result<Self, ProtocolError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.char_indices();

        while let Some((position, c)) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        match c {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(ProtocolError::UnbalancedBraces { position }),
                            _ => name.push(c),
                        }
                    }
                    if !closed {
                        return Err(ProtocolError::UnbalancedBraces { position });
                    }

                    let segment = match name.as_str() {
                        "TileMatrix" => Segment::TileMatrix,
                        "TileCol" => Segment::TileCol,
                        "TileRow" => Segment::TileRow,
                        "Layer" | "layer" => {
                            literal.push_str(&options.layer);
                            continue;
                        }
                        "Style" | "style" => {
                            literal.push_str(&options.style);
                            continue;
                        }
                        "TileMatrixSet" => {
                            literal.push_str(&options.tile_matrix_set);
                            continue;
                        }
                        _ => return Err(ProtocolError::UnknownPlaceholder(name)),
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(segment);
                }
                '}' => return Err(ProtocolError::UnbalancedBraces { position }),
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        for (required, segment) in [
            ("TileMatrix", Segment::TileMatrix),
            ("TileCol", Segment::TileCol),
            ("TileRow", Segment::TileRow),
        ] {
            if !segments.contains(&segment) {
                return Err(ProtocolError::MissingPlaceholder(required));
            }
        }

        Ok(Self { segments })
    }
}

impl RequestProtocol for TemplateProtocol {
    fn request_url(&self, tile: &TileAddress) -> String {
        let mut url = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => url.push_str(text),
                Segment::TileMatrix => url.push_str(&level_identifier(tile.level())),
                Segment::TileCol => url.push_str(&tile.col.to_string()),
                Segment::TileRow => url.push_str(&tile.row.to_string()),
            }
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::tests::test_matrix_set;
    use proptest::prelude::*;

    fn options() -> WmtsOptions {
        WmtsOptions::new("https://example.com/wmts", "grijs")
    }

    fn tile(level: u32, col: u32, row: u32) -> TileAddress {
        let set = test_matrix_set(level + 1, 1, 1000.0);
        TileAddress::new(set.level(level).unwrap().clone(), col, row)
    }

    #[test]
    fn test_level_is_zero_padded_below_ten() {
        let protocol = TemplateProtocol::new(".../{TileMatrix}/{TileCol}/{TileRow}.png", &options()).unwrap();

        assert_eq!(protocol.request_url(&tile(5, 3, 7)), ".../05/3/7.png");
        assert_eq!(protocol.request_url(&tile(12, 3, 7)), ".../12/3/7.png");
        assert_eq!(protocol.request_url(&tile(0, 0, 0)), ".../00/0/0.png");
    }

    #[test]
    fn test_layer_style_and_set_are_resolved() {
        let protocol = TemplateProtocol::new(
            "https://h/{Layer}/{Style}/{TileMatrixSet}/{TileMatrix}/{TileCol}/{TileRow}.png",
            &options(),
        )
        .unwrap();

        assert_eq!(
            protocol.request_url(&tile(1, 1, 0)),
            "https://h/grijs/default/EPSG:28992/01/1/0.png"
        );
    }

    #[test]
    fn test_repeated_placeholders_are_all_replaced() {
        let protocol =
            TemplateProtocol::new("{TileMatrix}/{TileCol}/{TileRow}?z={TileMatrix}", &options()).unwrap();
        assert_eq!(protocol.request_url(&tile(3, 2, 1)), "03/2/1?z=03");
    }

    #[test]
    fn test_missing_placeholder_is_rejected() {
        let result = TemplateProtocol::new("https://h/{TileMatrix}/{TileCol}.png", &options());
        assert!(matches!(result, Err(ProtocolError::MissingPlaceholder("TileRow"))));
    }

    #[test]
    fn test_unknown_placeholder_is_rejected() {
        let result = TemplateProtocol::new("{TileMatrix}/{TileCol}/{TileRow}/{Zoom}", &options());
        assert!(matches!(result, Err(ProtocolError::UnknownPlaceholder(name)) if name == "Zoom"));
    }

    #[test]
    fn test_unbalanced_braces_are_rejected() {
        for template in ["{TileMatrix}/{TileCol}/{TileRow", "{TileMatrix}/TileCol}/{TileRow}", "{{TileMatrix}"] {
            let result = TemplateProtocol::new(template, &options());
            assert!(
                matches!(result, Err(ProtocolError::UnbalancedBraces { .. })),
                "{} should be rejected",
                template
            );
        }
    }

    proptest! {
        #[test]
        fn prop_template_output_has_no_braces(level in 0u32..20, col in 0u32..1000, row in 0u32..1000) {
            let protocol = TemplateProtocol::new("/{TileMatrix}/{TileCol}/{TileRow}.png", &options()).unwrap();
            let address = TileAddress::new(tile(level, 0, 0).tile_matrix().clone(), col, row);
            let url = protocol.request_url(&address);

            let suffix = format!("/{}/{}.png", col, row);
            prop_assert!(!url.contains('{') && !url.contains('}'), "braces left in {}", url);
            prop_assert!(url.ends_with(&suffix), "{} does not end with {}", url, suffix);
        }
    }
}
