//! Ordered effect layers.
//!
//! Layers live in an arena of slots addressed by a stable [`EffectId`]. The
//! composite order is a separate permutation over slot indices; every
//! mutation rewrites `EffectLayer::order` from it, so orders are always the
//! dense range `0..len`.

use std::collections::HashMap;

use lyricast_core::{BlendMode, LyricastError, LyricastResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::effect::{EffectParams, EffectType};
use crate::params::{Assign, ParamMap};
use crate::presets;

/// Stable handle to a layer, valid until the layer is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectId(Uuid);

impl EffectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EffectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EffectId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectLayer {
    pub id: EffectId,
    pub params: EffectParams,
    /// Keys the effect type does not know. Kept and exported, never interpreted.
    pub extra: ParamMap,
    pub enabled: bool,
    pub blend_mode: BlendMode,
    pub opacity: f32,
    /// Position in the composite order. Maintained by the stack.
    pub order: usize,
}

impl EffectLayer {
    pub fn effect_type(&self) -> EffectType {
        self.params.effect_type()
    }

    /// Known fields and extension keys merged into one map.
    pub fn parameters(&self) -> ParamMap {
        let mut map = self.extra.clone();
        map.extend(self.params.to_map());
        map
    }

    fn apply(&mut self, overrides: &ParamMap) {
        for (key, value) in overrides {
            match self.params.set(key, value) {
                Assign::Applied => {}
                Assign::Unknown => {
                    self.extra.insert(key.clone(), value.clone());
                }
                Assign::Mistyped => {
                    tracing::warn!(
                        effect = %self.effect_type(),
                        key = %key,
                        "ignoring parameter with unexpected value {:?}",
                        value
                    );
                }
            }
        }
    }
}

/// Serialized form of one layer in an exported configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LayerRecord {
    id: Option<EffectId>,
    effect_type: String,
    #[serde(default)]
    parameters: ParamMap,
    #[serde(default)]
    order: usize,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    blend_mode: BlendMode,
    #[serde(default = "default_opacity")]
    opacity: f32,
}

fn default_true() -> bool {
    true
}

fn default_opacity() -> f32 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StackRecord {
    version: u32,
    layers: Vec<LayerRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct EffectStack {
    slots: Vec<Option<EffectLayer>>,
    free: Vec<usize>,
    index: HashMap<EffectId, usize>,
    order: Vec<usize>,
}

impl EffectStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Add a layer at the end of the order. Overrides are merged over the
    /// type's defaults; unknown keys are kept in `extra`.
    pub fn add(&mut self, effect_type: EffectType, overrides: ParamMap) -> EffectId {
        let mut layer = EffectLayer {
            id: EffectId::new(),
            params: EffectParams::defaults(effect_type),
            extra: ParamMap::new(),
            enabled: true,
            blend_mode: BlendMode::Normal,
            opacity: 1.0,
            order: self.order.len(),
        };
        layer.apply(&overrides);
        let id = layer.id;
        self.insert(layer);
        tracing::debug!(%id, effect = %effect_type, "added effect layer");
        id
    }

    fn insert(&mut self, layer: EffectLayer) {
        let id = layer.id;
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(layer);
                slot
            }
            None => {
                self.slots.push(Some(layer));
                self.slots.len() - 1
            }
        };
        self.index.insert(id, slot);
        self.order.push(slot);
        self.renumber();
    }

    pub fn remove(&mut self, id: EffectId) -> bool {
        let Some(slot) = self.index.remove(&id) else {
            return false;
        };
        self.slots[slot] = None;
        self.free.push(slot);
        self.order.retain(|s| *s != slot);
        self.renumber();
        true
    }

    /// Merge `partial` into the layer's parameters.
    pub fn update_params(&mut self, id: EffectId, partial: &ParamMap) -> bool {
        match self.get_mut(id) {
            Some(layer) => {
                layer.apply(partial);
                true
            }
            None => false,
        }
    }

    /// Move a layer to `new_order` (clamped to the last position) and shift
    /// the others to keep the order dense.
    pub fn set_order(&mut self, id: EffectId, new_order: usize) -> bool {
        let Some(&slot) = self.index.get(&id) else {
            return false;
        };
        let Some(current) = self.order.iter().position(|s| *s == slot) else {
            return false;
        };
        self.order.remove(current);
        let target = new_order.min(self.order.len());
        self.order.insert(target, slot);
        self.renumber();
        true
    }

    /// Set `enabled` explicitly, or flip it when `enabled` is `None`.
    pub fn toggle(&mut self, id: EffectId, enabled: Option<bool>) -> bool {
        match self.get_mut(id) {
            Some(layer) => {
                layer.enabled = enabled.unwrap_or(!layer.enabled);
                true
            }
            None => false,
        }
    }

    pub fn set_blend_mode(&mut self, id: EffectId, mode: BlendMode) -> bool {
        match self.get_mut(id) {
            Some(layer) => {
                layer.blend_mode = mode;
                true
            }
            None => false,
        }
    }

    pub fn set_opacity(&mut self, id: EffectId, opacity: f32) -> bool {
        match self.get_mut(id) {
            Some(layer) => {
                layer.opacity = opacity.clamp(0.0, 1.0);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: EffectId) -> Option<&EffectLayer> {
        let slot = *self.index.get(&id)?;
        self.slots.get(slot)?.as_ref()
    }

    fn get_mut(&mut self, id: EffectId) -> Option<&mut EffectLayer> {
        let slot = *self.index.get(&id)?;
        self.slots.get_mut(slot)?.as_mut()
    }

    /// All layers in composite order.
    pub fn layers(&self) -> impl Iterator<Item = &EffectLayer> + '_ {
        self.order
            .iter()
            .filter_map(move |slot| self.slots.get(*slot).and_then(|l| l.as_ref()))
    }

    /// Enabled layers in composite order.
    pub fn active_layers(&self) -> Vec<&EffectLayer> {
        self.layers().filter(|l| l.enabled).collect()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.index.clear();
        self.order.clear();
    }

    /// Replace all layers with a named preset.
    pub fn apply_preset(&mut self, name: &str) -> LyricastResult<()> {
        let preset = presets::find(name).ok_or_else(|| {
            LyricastError::invalid(format!(
                "unknown effect preset '{}' (available: {})",
                name,
                presets::names().join(", ")
            ))
        })?;
        self.clear();
        for (effect_type, overrides) in preset.layers() {
            self.add(effect_type, overrides);
        }
        tracing::info!(preset = name, layers = self.len(), "applied effect preset");
        Ok(())
    }

    fn renumber(&mut self) {
        for (pos, slot) in self.order.iter().enumerate() {
            if let Some(layer) = self.slots.get_mut(*slot).and_then(|l| l.as_mut()) {
                layer.order = pos;
            }
        }
    }

    /// Serialize every layer (enabled or not) to JSON.
    pub fn export_configuration(&self) -> LyricastResult<String> {
        let record = StackRecord {
            version: 1,
            layers: self
                .layers()
                .map(|l| LayerRecord {
                    id: Some(l.id),
                    effect_type: l.effect_type().as_str().to_string(),
                    parameters: l.parameters(),
                    order: l.order,
                    enabled: l.enabled,
                    blend_mode: l.blend_mode,
                    opacity: l.opacity,
                })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&record)?)
    }

    /// Replace the stack with an exported configuration.
    ///
    /// Layers of unknown effect types are skipped with a warning. The stack is
    /// left untouched when the JSON itself is malformed.
    pub fn import_configuration(&mut self, json: &str) -> LyricastResult<usize> {
        let mut record: StackRecord = serde_json::from_str(json)?;
        record.layers.sort_by_key(|l| l.order);

        let mut imported = EffectStack::new();
        for entry in record.layers {
            let Some(effect_type) = EffectType::from_name(&entry.effect_type) else {
                tracing::warn!(effect = %entry.effect_type, "skipping unknown effect type");
                continue;
            };
            let mut layer = EffectLayer {
                id: entry.id.filter(|id| !imported.index.contains_key(id)).unwrap_or_default(),
                params: EffectParams::defaults(effect_type),
                extra: ParamMap::new(),
                enabled: entry.enabled,
                blend_mode: entry.blend_mode,
                opacity: entry.opacity.clamp(0.0, 1.0),
                order: 0,
            };
            layer.apply(&entry.parameters);
            imported.insert(layer);
        }
        let count = imported.len();
        *self = imported;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param_map;
    use crate::params::ParamValue;

    fn orders(stack: &EffectStack) -> Vec<(EffectType, usize)> {
        stack.layers().map(|l| (l.effect_type(), l.order)).collect()
    }

    #[test]
    fn test_add_assigns_dense_order() {
        let mut stack = EffectStack::new();
        stack.add(EffectType::Glow, param_map!());
        stack.add(EffectType::Outline, param_map!());
        stack.add(EffectType::Shadow, param_map!());
        assert_eq!(
            orders(&stack),
            vec![
                (EffectType::Glow, 0),
                (EffectType::Outline, 1),
                (EffectType::Shadow, 2)
            ]
        );
    }

    #[test]
    fn test_add_merges_overrides_and_keeps_unknown_keys() {
        let mut stack = EffectStack::new();
        let id = stack.add(
            EffectType::Glow,
            param_map! { "radius" => 9.0, "sparkle" => true },
        );
        let layer = stack.get(id).unwrap();
        assert_eq!(layer.params.get("radius"), Some(ParamValue::Number(9.0)));
        assert_eq!(layer.params.get("intensity"), Some(ParamValue::Number(0.8)));
        assert_eq!(layer.extra.get("sparkle"), Some(&ParamValue::Bool(true)));
        assert_eq!(layer.parameters().get("sparkle"), Some(&ParamValue::Bool(true)));
    }

    #[test]
    fn test_remove_renumbers() {
        let mut stack = EffectStack::new();
        let a = stack.add(EffectType::Glow, param_map!());
        let b = stack.add(EffectType::Outline, param_map!());
        let c = stack.add(EffectType::Shadow, param_map!());
        assert!(stack.remove(b));
        assert!(!stack.remove(b));
        assert_eq!(stack.get(a).unwrap().order, 0);
        assert_eq!(stack.get(c).unwrap().order, 1);
        // freed slot is reused without disturbing order
        let d = stack.add(EffectType::Fade, param_map!());
        assert_eq!(stack.get(d).unwrap().order, 2);
        assert_eq!(stack.len(), 3);
    }

    #[test]
    fn test_set_order_moves_and_clamps() {
        let mut stack = EffectStack::new();
        let a = stack.add(EffectType::Glow, param_map!());
        stack.add(EffectType::Outline, param_map!());
        let c = stack.add(EffectType::Shadow, param_map!());

        assert!(stack.set_order(c, 0));
        assert_eq!(
            orders(&stack),
            vec![
                (EffectType::Shadow, 0),
                (EffectType::Glow, 1),
                (EffectType::Outline, 2)
            ]
        );
        assert!(stack.set_order(a, 99));
        assert_eq!(stack.get(a).unwrap().order, 2);
        assert!(!stack.set_order(EffectId::new(), 0));
    }

    #[test]
    fn test_toggle_and_active_layers() {
        let mut stack = EffectStack::new();
        let a = stack.add(EffectType::Glow, param_map!());
        let b = stack.add(EffectType::Outline, param_map!());
        assert!(stack.toggle(a, None));
        assert!(!stack.get(a).unwrap().enabled);
        let active = stack.active_layers();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, b);
        assert!(stack.toggle(a, Some(true)));
        assert!(stack.toggle(a, Some(true)));
        assert_eq!(stack.active_layers().len(), 2);
        assert!(!stack.toggle(EffectId::new(), None));
    }

    #[test]
    fn test_update_params() {
        let mut stack = EffectStack::new();
        let id = stack.add(EffectType::Outline, param_map!());
        assert!(stack.update_params(id, &param_map! { "width" => 4.0 }));
        assert_eq!(
            stack.get(id).unwrap().params.get("width"),
            Some(ParamValue::Number(4.0))
        );
        assert!(!stack.update_params(EffectId::new(), &param_map! { "width" => 1.0 }));
    }

    #[test]
    fn test_opacity_clamped() {
        let mut stack = EffectStack::new();
        let id = stack.add(EffectType::Glow, param_map!());
        stack.set_opacity(id, 3.0);
        assert_eq!(stack.get(id).unwrap().opacity, 1.0);
        stack.set_blend_mode(id, BlendMode::Screen);
        assert_eq!(stack.get(id).unwrap().blend_mode, BlendMode::Screen);
    }

    #[test]
    fn test_export_import_configuration() {
        let mut stack = EffectStack::new();
        let a = stack.add(EffectType::Shadow, param_map! { "opacity" => 0.25 });
        let b = stack.add(EffectType::Glow, param_map! { "custom" => "x" });
        stack.toggle(b, Some(false));
        stack.set_blend_mode(a, BlendMode::Multiply);

        let json = stack.export_configuration().unwrap();
        let mut restored = EffectStack::new();
        assert_eq!(restored.import_configuration(&json).unwrap(), 2);

        let layers: Vec<&EffectLayer> = restored.layers().collect();
        assert_eq!(layers[0].id, a);
        assert_eq!(layers[0].blend_mode, BlendMode::Multiply);
        assert_eq!(layers[0].params.get("opacity"), Some(ParamValue::Number(0.25)));
        assert_eq!(layers[1].id, b);
        assert!(!layers[1].enabled);
        assert_eq!(layers[1].extra.get("custom"), Some(&ParamValue::Text("x".into())));
    }

    #[test]
    fn test_import_skips_unknown_types_and_keeps_stack_on_bad_json() {
        let mut stack = EffectStack::new();
        stack.add(EffectType::Glow, param_map!());
        assert!(stack.import_configuration("{not json").is_err());
        assert_eq!(stack.len(), 1);

        let json = r#"{"version":1,"layers":[
            {"effect_type":"sparkle","order":0},
            {"effect_type":"outline","order":1,"parameters":{"width":5.0}}
        ]}"#;
        assert_eq!(stack.import_configuration(json).unwrap(), 1);
        let layer = stack.layers().next().unwrap();
        assert_eq!(layer.effect_type(), EffectType::Outline);
        assert_eq!(layer.order, 0);
    }

    #[test]
    fn test_apply_preset() {
        let mut stack = EffectStack::new();
        stack.add(EffectType::Wave, param_map!());
        stack.apply_preset("karaoke_classic").unwrap();
        assert_eq!(
            orders(&stack),
            vec![(EffectType::Outline, 0), (EffectType::Glow, 1)]
        );
        assert!(stack.apply_preset("nope").is_err());
    }
}
