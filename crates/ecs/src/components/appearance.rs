use std::collections::BTreeMap;

use replica_common::NetId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::net_ids;
use crate::component::{Component, ComponentError};
use crate::state::{ComponentState, StatePayload};

/// Free-form visual keys consumed by presentation layers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Appearance {
    data: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppearanceState {
    pub data: BTreeMap<String, Value>,
}

impl StatePayload for AppearanceState {
    const NET_ID: NetId = net_ids::APPEARANCE;
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct AppearanceData {
    data: BTreeMap<String, Value>,
}

impl Appearance {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Component for Appearance {
    fn name(&self) -> &'static str {
        "Appearance"
    }

    fn net_id(&self) -> Option<NetId> {
        Some(net_ids::APPEARANCE)
    }

    fn expose_data(&mut self, data: &Value) -> Result<(), ComponentError> {
        let data: AppearanceData = super::parse_data("Appearance", data)?;
        self.data.extend(data.data);
        Ok(())
    }

    fn get_state(&self) -> Result<Option<ComponentState>, ComponentError> {
        ComponentState::encode(&AppearanceState {
            data: self.data.clone(),
        })
        .map(Some)
    }

    fn handle_state(
        &mut self,
        current: Option<&ComponentState>,
        _next: Option<&ComponentState>,
    ) -> Result<(), ComponentError> {
        if let Some(state) = current {
            self.data = state.decode::<AppearanceState>()?.data;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn state_replaces_all_keys() {
        let mut source = Appearance::default();
        source.set("sprite", "crate.png");
        source.set("lit", true);
        let state = source.get_state().unwrap().unwrap();

        let mut target = Appearance::default();
        target.set("stale", 1);
        target.handle_state(Some(&state), None).unwrap();
        assert_eq!(target, source);
        assert!(target.get("stale").is_none());
    }

    #[test]
    fn prototype_data_merges() {
        let mut a = Appearance::default();
        a.expose_data(&json!({ "data": { "sprite": "lamp.png" } })).unwrap();
        assert_eq!(a.get("sprite"), Some(&json!("lamp.png")));
        assert_eq!(a.len(), 1);
    }
}
