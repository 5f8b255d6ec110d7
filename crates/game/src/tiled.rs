//! Tiled JSON level format.
//!
//! Only the parts the map loader needs are modelled: map size, object layers
//! and custom properties. Tile layers and anything else Tiled writes are
//! skipped.
//!
//! Tiled measures pixels from the top-left corner with y pointing down. The
//! physics world has y pointing up, so every position goes through
//! [`TiledMap::to_world`] before it reaches a builder.

use glam::Vec2;
use serde::Deserialize;
use serde_json::Value;

use crate::error::MapError;

/// A parsed `.json` map exported from Tiled.
#[derive(Debug, Clone, Deserialize)]
pub struct TiledMap {
    /// Width in tiles.
    pub width: u32,

    /// Height in tiles.
    pub height: u32,

    /// Tile width in pixels.
    pub tilewidth: u32,

    /// Tile height in pixels.
    pub tileheight: u32,

    #[serde(default)]
    pub layers: Vec<Layer>,

    #[serde(default)]
    pub properties: Vec<Property>,
}

/// A map layer. Everything but object groups is ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Layer {
    Objectgroup(ObjectGroup),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectGroup {
    pub name: String,

    #[serde(default)]
    pub objects: Vec<MapObject>,
}

/// A single authored object: rectangle, point or polyline.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MapObject {
    #[serde(default)]
    pub id: u32,

    #[serde(default)]
    pub name: String,

    /// Top-left corner (rectangles) or origin (points, polylines), y-down.
    pub x: f32,
    pub y: f32,

    #[serde(default)]
    pub width: f32,

    #[serde(default)]
    pub height: f32,

    /// Vertices relative to (`x`, `y`), y-down.
    #[serde(default)]
    pub polyline: Option<Vec<Point>>,

    #[serde(default)]
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// A custom property. Tiled stores the value as whatever JSON type the
/// property was declared with.
#[derive(Debug, Clone, Deserialize)]
pub struct Property {
    pub name: String,

    #[serde(default)]
    pub value: Value,
}

impl TiledMap {
    /// Parse and sanity-check a map document.
    pub fn parse(map_id: &str, text: &str) -> Result<Self, MapError> {
        let map: TiledMap = serde_json::from_str(text).map_err(|source| MapError::Parse {
            map: map_id.to_string(),
            source,
        })?;

        if map.width == 0 || map.height == 0 || map.tilewidth == 0 || map.tileheight == 0 {
            return Err(MapError::Invalid {
                map: map_id.to_string(),
                reason: format!(
                    "map size {}x{} tiles of {}x{} px is empty",
                    map.width, map.height, map.tilewidth, map.tileheight
                ),
            });
        }

        let fits = map.width.checked_mul(map.tilewidth).is_some()
            && map.height.checked_mul(map.tileheight).is_some();
        if !fits {
            return Err(MapError::Invalid {
                map: map_id.to_string(),
                reason: format!(
                    "map size {}x{} tiles of {}x{} px is too large",
                    map.width, map.height, map.tilewidth, map.tileheight
                ),
            });
        }
        Ok(map)
    }

    pub fn pixel_width(&self) -> f32 {
        self.width as f32 * self.tilewidth as f32
    }

    pub fn pixel_height(&self) -> f32 {
        self.height as f32 * self.tileheight as f32
    }

    /// Objects of the named object layer, empty if the layer is absent.
    pub fn objects(&self, layer: &str) -> &[MapObject] {
        self.layers
            .iter()
            .find_map(|l| match l {
                Layer::Objectgroup(group) if group.name == layer => Some(group.objects.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    /// Convert a y-down Tiled pixel position to a y-up world pixel position.
    pub fn to_world(&self, x: f32, y: f32) -> Vec2 {
        Vec2::new(x, self.pixel_height() - y)
    }

    /// World pixel position of an object's center.
    pub fn object_center(&self, object: &MapObject) -> Vec2 {
        self.to_world(object.x + object.width / 2.0, object.y + object.height / 2.0)
    }

    /// Map-level custom property.
    pub fn property(&self, name: &str) -> Option<&Value> {
        find_property(&self.properties, name)
    }
}

impl MapObject {
    /// Polyline vertices relative to the object origin, converted to y-up.
    pub fn polyline_vertices(&self) -> Option<Vec<Vec2>> {
        self.polyline
            .as_ref()
            .map(|points| points.iter().map(|p| Vec2::new(p.x, -p.y)).collect())
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        find_property(&self.properties, name)
    }

    /// String property. Non-string values are rendered as JSON text.
    pub fn prop_str(&self, name: &str) -> Option<String> {
        match self.property(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Boolean property; accepts `true`/`false` strings. Absent means `false`.
    pub fn prop_bool(&self, name: &str) -> bool {
        match self.property(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
            _ => false,
        }
    }

    /// Non-negative integer property; accepts numeric strings.
    pub fn prop_u32(&self, name: &str) -> Option<u32> {
        match self.property(name)? {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Property holding a `sep`-separated list. Blank entries are dropped.
    pub fn prop_list(&self, name: &str, sep: char) -> Vec<String> {
        self.prop_str(name)
            .map(|s| {
                s.split(sep)
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn find_property<'a>(properties: &'a [Property], name: &str) -> Option<&'a Value> {
    properties.iter().find(|p| p.name == name).map(|p| &p.value)
}
