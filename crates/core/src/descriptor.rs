//! Document-scoped custom tag descriptor.
//!
//! The descriptor is produced by the export tooling and fetched before
//! materialization can resolve any custom tag. Field names follow the exported
//! JSON (`viewName`, `layerInfos`, `loadPath`, ...).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Position and size of a box inside its layer, in layer-local units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxPos {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A named slot inside a custom layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxConstraint {
    pub box_name: String,
    #[serde(default)]
    pub rect: BoxPos,
    /// Boxes sharing a group id compete for the same space.
    #[serde(default)]
    pub collision_group_id: i32,
}

/// A custom layer tag: a fetched template with optional named boxes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerInfo {
    pub layer_name: String,
    pub load_path: String,
    #[serde(default)]
    pub boxes: Vec<BoxConstraint>,
    #[serde(default)]
    pub unboxed_layer_size: BoxPos,
}

impl LayerInfo {
    /// Partition the layer's boxes by collision group, keeping declaration order
    /// inside each group.
    pub fn collision_groups(&self) -> BTreeMap<i32, Vec<&BoxConstraint>> {
        let mut groups: BTreeMap<i32, Vec<&BoxConstraint>> = BTreeMap::new();
        for constraint in &self.boxes {
            groups
                .entry(constraint.collision_group_id)
                .or_default()
                .push(constraint);
        }
        groups
    }
}

/// A custom content tag (text or image) backed by a fetched template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentInfo {
    pub content_name: String,
    pub load_path: String,
}

/// The full descriptor for one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomTagDescriptor {
    pub view_name: String,
    #[serde(default)]
    pub layer_infos: Vec<LayerInfo>,
    #[serde(default)]
    pub contents: Vec<ContentInfo>,
}

impl CustomTagDescriptor {
    /// Parse the exported JSON form.
    ///
    /// # Errors
    /// Returns the `serde_json` error when the payload does not match the
    /// descriptor shape.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Find a layer by (case-insensitive) name.
    pub fn layer(&self, name: &str) -> Option<&LayerInfo> {
        self.layer_infos
            .iter()
            .find(|layer| layer.layer_name.eq_ignore_ascii_case(name))
    }

    /// Find a content entry by (case-insensitive) name.
    pub fn content(&self, name: &str) -> Option<&ContentInfo> {
        self.contents
            .iter()
            .find(|content| content.content_name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "viewName": "sample",
        "layerInfos": [{
            "layerName": "card",
            "loadPath": "resources://Views/sample/card.prefab",
            "boxes": [
                {"boxName": "title", "rect": {"x": 0, "y": 0, "width": 100, "height": 20}, "collisionGroupId": 0},
                {"boxName": "body", "collisionGroupId": 1},
                {"boxName": "badge", "collisionGroupId": 0}
            ],
            "unboxedLayerSize": {"x": 0, "y": 0, "width": 100, "height": 80}
        }],
        "contents": [{"contentName": "caption", "loadPath": "resources://Views/sample/caption"}]
    }"#;

    #[test]
    fn parses_exported_shape() -> Result<(), serde_json::Error> {
        let descriptor = CustomTagDescriptor::from_json(SAMPLE)?;
        assert_eq!(descriptor.view_name, "sample");
        assert_eq!(descriptor.layer_infos.len(), 1);
        assert_eq!(descriptor.contents[0].content_name, "caption");
        assert!(descriptor.layer("CARD").is_some());
        Ok(())
    }

    #[test]
    fn collision_groups_keep_declaration_order() -> Result<(), serde_json::Error> {
        let descriptor = CustomTagDescriptor::from_json(SAMPLE)?;
        let groups = descriptor.layer_infos[0].collision_groups();
        let zero: Vec<&str> = groups[&0].iter().map(|constraint| constraint.box_name.as_str()).collect();
        assert_eq!(zero, ["title", "badge"]);
        assert_eq!(groups[&1].len(), 1);
        Ok(())
    }
}
