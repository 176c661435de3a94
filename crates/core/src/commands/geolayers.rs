//! GeoLayer commands.
//!
//! GeoLayers are held as GeoJSON `FeatureCollection` documents. A file
//! holding a single `Feature` or a bare geometry is wrapped on read so every
//! layer has a feature list.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value as Json};

use super::IfExists;
use crate::command::{CommandBehavior, CommandContext};
use crate::command_definitions::{CommandDefinition, ParameterDefinition, ParameterType};
use crate::error::{Error, Result};
use crate::parameter::ParameterSet;
use crate::processor::GeoLayer;
use crate::registry::RegistryEntry;

const GEOMETRY_TYPES: [&str; 7] = [
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
];

pub(crate) fn entries() -> Vec<RegistryEntry> {
    vec![
        RegistryEntry::new(
            CommandDefinition::new("ReadGeoLayerFromGeoJSON", "Read a GeoLayer from a GeoJSON file")
                .parameter(ParameterDefinition::required("InputFile", ParameterType::InputFile))
                .parameter(ParameterDefinition::required("GeoLayerID", ParameterType::Identifier))
                .parameter(
                    ParameterDefinition::optional("Name", ParameterType::String)
                        .with_description("Display name (default: GeoLayerID)"),
                )
                .parameter(ParameterDefinition::optional("Description", ParameterType::String))
                .parameter(IfExists::parameter("IfGeoLayerIDExists")),
            || Arc::new(ReadGeoLayerFromGeoJson),
        ),
        RegistryEntry::new(
            CommandDefinition::new("WriteGeoLayerToGeoJSON", "Write a GeoLayer to a GeoJSON file")
                .parameter(ParameterDefinition::required("GeoLayerID", ParameterType::Identifier))
                .parameter(ParameterDefinition::required("OutputFile", ParameterType::OutputFile)),
            || Arc::new(WriteGeoLayerToGeoJson),
        ),
        RegistryEntry::new(
            CommandDefinition::new("CopyGeoLayer", "Copy a GeoLayer to a new ID")
                .parameter(ParameterDefinition::required("GeoLayerID", ParameterType::Identifier))
                .parameter(ParameterDefinition::required(
                    "CopiedGeoLayerID",
                    ParameterType::Identifier,
                ))
                .parameter(IfExists::parameter("IfGeoLayerIDExists")),
            || Arc::new(CopyGeoLayer),
        ),
        RegistryEntry::new(
            CommandDefinition::new("FreeGeoLayers", "Remove GeoLayers from the processor")
                .parameter(
                    ParameterDefinition::required("GeoLayerIDs", ParameterType::String)
                        .with_description("Comma-separated IDs, or * for all"),
                ),
            || Arc::new(FreeGeoLayers),
        ),
    ]
}

/// Parse GeoJSON text into a `FeatureCollection`.
///
/// # Errors
///
/// Returns an error if the text is not JSON or not a GeoJSON object.
pub fn parse_geojson(text: &str, path: &str) -> Result<Json> {
    let document: Json = serde_json::from_str(text).map_err(|e| Error::json_error(path, e))?;

    let Some(kind) = document.get("type").and_then(Json::as_str) else {
        return Err(Error::invalid_geojson(path, "missing `type` member"));
    };

    match kind {
        "FeatureCollection" => {
            if document.get("features").is_some_and(Json::is_array) {
                Ok(document)
            } else {
                Err(Error::invalid_geojson(path, "`features` is not an array"))
            }
        }
        "Feature" => Ok(json!({ "type": "FeatureCollection", "features": [document] })),
        geometry if GEOMETRY_TYPES.contains(&geometry) => Ok(json!({
            "type": "FeatureCollection",
            "features": [{ "type": "Feature", "properties": {}, "geometry": document }],
        })),
        other => Err(Error::invalid_geojson(
            path,
            format!("unsupported type `{other}`"),
        )),
    }
}

fn read_geojson(path: &Path) -> Result<Json> {
    let display = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|e| Error::io_error("GeoJSON", &display, e))?;
    parse_geojson(&text, &display)
}

struct ReadGeoLayerFromGeoJson;

impl CommandBehavior for ReadGeoLayerFromGeoJson {
    fn run(&self, params: &ParameterSet, ctx: &mut CommandContext<'_>) -> Result<()> {
        let path = params.require_path("InputFile")?;
        let id = params.require_str("GeoLayerID")?;

        let exists = ctx.workspace.has_geolayer(id);
        let policy = IfExists::from_params(params, "IfGeoLayerIDExists");
        if !policy.should_store(ctx, "GeoLayer", id, exists, || {
            Error::GeoLayerExists(id.to_string())
        })? {
            return Ok(());
        }

        let document = read_geojson(path)?;
        let layer = GeoLayer {
            id: id.to_string(),
            name: params.str("Name").unwrap_or(id).to_string(),
            description: params.str("Description").unwrap_or_default().to_string(),
            source: Some(path.to_path_buf()),
            document,
        };
        let count = layer.feature_count();
        ctx.workspace.add_geolayer(layer);
        ctx.message(format!("Read GeoLayer `{id}` with {count} features"));
        Ok(())
    }
}

struct WriteGeoLayerToGeoJson;

impl CommandBehavior for WriteGeoLayerToGeoJson {
    fn run(&self, params: &ParameterSet, ctx: &mut CommandContext<'_>) -> Result<()> {
        let id = params.require_str("GeoLayerID")?;
        let path = params.require_path("OutputFile")?;
        let display = path.display().to_string();

        let layer = ctx
            .workspace
            .geolayer(id)
            .ok_or_else(|| Error::GeoLayerNotFound(id.to_string()))?;
        let text = serde_json::to_string_pretty(&layer.document)
            .map_err(|e| Error::json_error(&display, e))?;

        fs::write(path, text).map_err(|e| Error::io_error("GeoJSON", &display, e))?;
        ctx.message(format!("Wrote GeoLayer `{id}` to {display}"));
        Ok(())
    }
}

struct CopyGeoLayer;

impl CommandBehavior for CopyGeoLayer {
    fn run(&self, params: &ParameterSet, ctx: &mut CommandContext<'_>) -> Result<()> {
        let id = params.require_str("GeoLayerID")?;
        let copy_id = params.require_str("CopiedGeoLayerID")?;

        let mut copy = ctx
            .workspace
            .geolayer(id)
            .cloned()
            .ok_or_else(|| Error::GeoLayerNotFound(id.to_string()))?;

        let exists = ctx.workspace.has_geolayer(copy_id);
        let policy = IfExists::from_params(params, "IfGeoLayerIDExists");
        if !policy.should_store(ctx, "GeoLayer", copy_id, exists, || {
            Error::GeoLayerExists(copy_id.to_string())
        })? {
            return Ok(());
        }

        copy.id = copy_id.to_string();
        ctx.workspace.add_geolayer(copy);
        Ok(())
    }
}

struct FreeGeoLayers;

impl CommandBehavior for FreeGeoLayers {
    fn run(&self, params: &ParameterSet, ctx: &mut CommandContext<'_>) -> Result<()> {
        let ids = params.require_str("GeoLayerIDs")?;

        if ids.trim() == "*" {
            ctx.workspace.clear_geolayers();
            return Ok(());
        }

        for id in ids.split(',').map(str::trim).filter(|id| !id.is_empty()) {
            if ctx.workspace.remove_geolayer(id).is_none() {
                ctx.warn(
                    format!("GeoLayer `{id}` does not exist"),
                    Some("Check the GeoLayer ID"),
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feature_collection() {
        let text = r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{},"geometry":null}]}"#;
        let document = parse_geojson(text, "a.geojson").unwrap();
        assert_eq!(document["features"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_wraps_feature_and_geometry() {
        let feature = r#"{"type":"Feature","properties":{"name":"x"},"geometry":{"type":"Point","coordinates":[1,2]}}"#;
        let document = parse_geojson(feature, "f.geojson").unwrap();
        assert_eq!(document["type"], "FeatureCollection");
        assert_eq!(document["features"][0]["properties"]["name"], "x");

        let point = r#"{"type":"Point","coordinates":[1,2]}"#;
        let document = parse_geojson(point, "p.geojson").unwrap();
        assert_eq!(document["features"][0]["geometry"]["type"], "Point");
    }

    #[test]
    fn test_parse_rejects_invalid_documents() {
        assert!(matches!(parse_geojson("{", "a"), Err(Error::Json { .. })));
        assert!(matches!(
            parse_geojson(r#"{"features":[]}"#, "a"),
            Err(Error::InvalidGeoJson { .. })
        ));
        assert!(matches!(
            parse_geojson(r#"{"type":"Topology"}"#, "a"),
            Err(Error::InvalidGeoJson { .. })
        ));
        assert!(matches!(
            parse_geojson(r#"{"type":"FeatureCollection","features":{}}"#, "a"),
            Err(Error::InvalidGeoJson { .. })
        ));
    }
}
