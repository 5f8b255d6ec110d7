//! Shared fixtures: a small town and a cave linked by portals.

use serde_json::json;

use crate::source::MemorySource;

pub const PPM: f32 = 100.0;
pub const TOWN: &str = "maps/town.json";
pub const CAVE: &str = "maps/cave.json";
pub const POTION: &str = "items/potion.json";
pub const RUSTY_KEY: &str = "items/rusty_key.json";
pub const BROKEN_ITEM: &str = "items/broken.json";

fn prop(name: &str, value: serde_json::Value) -> serde_json::Value {
    json!({ "name": name, "value": value })
}

/// 40x15 tiles. Player spawn at (48, 40) world pixels.
///
/// Portal 0 is locked (key "Rusty Key") and needs an explicit interaction;
/// portal 1 is open and fires on contact. Both lead to portal 0 of the cave.
pub fn town_map() -> String {
    json!({
        "width": 40, "height": 15, "tilewidth": 16, "tileheight": 16,
        "layers": [
            { "type": "tilelayer", "name": "Tiles", "data": [] },
            { "type": "objectgroup", "name": "Ground", "objects": [
                { "id": 1, "x": 0, "y": 224, "width": 640, "height": 16 }
            ]},
            { "type": "objectgroup", "name": "Wall", "objects": [
                { "id": 2, "x": 0, "y": 0, "width": 16, "height": 224 }
            ]},
            { "type": "objectgroup", "name": "Platform", "objects": [
                { "id": 3, "x": 100, "y": 160,
                  "polyline": [{ "x": 0, "y": 0 }, { "x": 80, "y": 0 }] }
            ]},
            { "type": "objectgroup", "name": "CliffMarker", "objects": [
                { "id": 4, "x": 600, "y": 208, "width": 16, "height": 16 }
            ]},
            { "type": "objectgroup", "name": "Player", "objects": [
                { "id": 5, "x": 48, "y": 200 }
            ]},
            { "type": "objectgroup", "name": "Portal", "objects": [
                { "id": 6, "x": 560, "y": 192, "width": 16, "height": 32, "properties": [
                    prop("targetMap", json!(CAVE)),
                    prop("targetPortalId", json!(0)),
                    prop("willInteractOnContact", json!(false)),
                    prop("isLocked", json!(true)),
                    prop("key", json!("Rusty Key"))
                ]},
                { "id": 7, "x": 400, "y": 192, "width": 16, "height": 32, "properties": [
                    prop("targetMap", json!(CAVE)),
                    prop("targetPortalId", json!(0)),
                    prop("willInteractOnContact", json!(true))
                ]}
            ]},
            { "type": "objectgroup", "name": "Trigger", "objects": [
                { "id": 8, "x": 200, "y": 192, "width": 16, "height": 32, "properties": [
                    prop("cmds", json!("message(\"welcome\"); lock_portal(\"maps/cave.json\", 0)")),
                    prop("canBeTriggeredOnlyOnce", json!(true))
                ]}
            ]},
            { "type": "objectgroup", "name": "Npc", "objects": [
                { "id": 9, "x": 300, "y": 200, "properties": [prop("name", json!("Elder"))] }
            ]},
            { "type": "objectgroup", "name": "Chest", "objects": [
                { "id": 10, "x": 350, "y": 200, "properties": [
                    prop("items", json!(format!("{POTION},{RUSTY_KEY}")))
                ]}
            ]},
            { "type": "objectgroup", "name": "Enemy", "objects": [
                { "id": 11, "x": 500, "y": 200, "properties": [prop("name", json!("Slime"))] }
            ]},
            { "type": "objectgroup", "name": "Item", "objects": [
                { "id": 12, "x": 250, "y": 200, "properties": [
                    prop("json", json!(POTION)),
                    prop("amount", json!(2))
                ]}
            ]}
        ]
    })
    .to_string()
}

/// 20x10 tiles. Player spawn at (32, 40); portal 0 at (288, 32) leads back
/// to town portal 1.
pub fn cave_map() -> String {
    json!({
        "width": 20, "height": 10, "tilewidth": 16, "tileheight": 16,
        "layers": [
            { "type": "objectgroup", "name": "Ground", "objects": [
                { "id": 1, "x": 0, "y": 144, "width": 320, "height": 16 }
            ]},
            { "type": "objectgroup", "name": "Player", "objects": [
                { "id": 2, "x": 32, "y": 120 }
            ]},
            { "type": "objectgroup", "name": "Portal", "objects": [
                { "id": 3, "x": 280, "y": 112, "width": 16, "height": 32, "properties": [
                    prop("targetMap", json!(TOWN)),
                    prop("targetPortalId", json!(1)),
                    prop("willInteractOnContact", json!(true))
                ]}
            ]},
            { "type": "objectgroup", "name": "Enemy", "objects": [
                { "id": 4, "x": 100, "y": 120, "name": "Bat" },
                { "id": 5, "x": 200, "y": 120, "name": "Bat" }
            ]}
        ]
    })
    .to_string()
}

pub fn assets() -> MemorySource {
    MemorySource::new()
        .with(TOWN, town_map())
        .with(CAVE, cave_map())
        .with(
            POTION,
            r#"{ "itemType": "consumable", "name": "Potion", "desc": "Restores health.",
                 "icon": "icons/potion.png", "value": 10 }"#,
        )
        .with(
            RUSTY_KEY,
            r#"{ "itemType": "key", "name": "Rusty Key", "desc": "Opens an old door.",
                 "icon": "icons/rusty_key.png" }"#,
        )
        .with(BROKEN_ITEM, r#"{ "itemType": "consumable", "name": "#)
}
