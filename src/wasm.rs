//! Browser bindings.
//!
//! Wraps [`ProtocolEngine`] for the viewer UI. Studies and protocol
//! documents cross the boundary as plain JS objects in the same camelCase
//! shape as the JSON documents; assignments come back as
//! `{ "<viewportIndex>": [displaySetInstanceUID, ...] }`.

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::attribute::UrlParams;
use crate::engine::ProtocolEngine;
use crate::protocol::Protocol;
use crate::study::Study;

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsError> {
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    Ok(value.serialize(&serializer)?)
}

#[wasm_bindgen(js_name = ProtocolEngine)]
pub struct WasmProtocolEngine {
    inner: ProtocolEngine,
}

impl Default for WasmProtocolEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen(js_class = ProtocolEngine)]
impl WasmProtocolEngine {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            inner: ProtocolEngine::default(),
        }
    }

    #[wasm_bindgen(js_name = setStudy)]
    pub fn set_study(&mut self, study: JsValue) -> Result<(), JsError> {
        let study: Study = serde_wasm_bindgen::from_value(study)?;
        self.inner.set_study(study);
        Ok(())
    }

    #[wasm_bindgen(js_name = setProtocolLibrary)]
    pub fn set_protocol_library(&mut self, protocols: JsValue) -> Result<(), JsError> {
        let protocols: Vec<Protocol> = serde_wasm_bindgen::from_value(protocols)?;
        self.inner.set_protocol_library(protocols)?;
        Ok(())
    }

    /// Takes the viewer's URL or its query string.
    #[wasm_bindgen(js_name = setUrlParams)]
    pub fn set_url_params(&mut self, url: &str) -> Result<(), JsError> {
        let params = UrlParams::parse(url)?;
        self.inner.set_url_params(params);
        Ok(())
    }

    #[wasm_bindgen(js_name = setProtocol)]
    pub fn set_protocol(&mut self, id: &str) -> Result<(), JsError> {
        self.inner.set_protocol(id)?;
        Ok(())
    }

    #[wasm_bindgen(js_name = getCurrentProtocol)]
    pub fn current_protocol(&self) -> Result<JsValue, JsError> {
        to_js(self.inner.current_protocol())
    }

    #[wasm_bindgen(js_name = nextStage)]
    pub fn next_stage(&mut self) -> bool {
        self.inner.next_stage()
    }

    #[wasm_bindgen(js_name = previousStage)]
    pub fn previous_stage(&mut self) -> bool {
        self.inner.previous_stage()
    }

    #[wasm_bindgen(js_name = setStage)]
    pub fn set_stage(&mut self, index: usize) -> bool {
        self.inner.set_stage(index)
    }

    #[wasm_bindgen(js_name = getNumStages)]
    pub fn num_stages(&self) -> usize {
        self.inner.num_stages()
    }

    #[wasm_bindgen(js_name = getCurrentStageIndex)]
    pub fn current_stage_index(&self) -> usize {
        self.inner.current_stage_index()
    }

    #[wasm_bindgen(js_name = hasNextStage)]
    pub fn has_next_stage(&self) -> bool {
        self.inner.has_next_stage()
    }

    #[wasm_bindgen(js_name = hasPreviousStage)]
    pub fn has_previous_stage(&self) -> bool {
        self.inner.has_previous_stage()
    }

    #[wasm_bindgen(js_name = getStageStatuses)]
    pub fn stage_statuses(&self) -> Result<JsValue, JsError> {
        to_js(&self.inner.stage_statuses())
    }

    #[wasm_bindgen(js_name = getViewportAssignment)]
    pub fn viewport_assignment(&self) -> Result<JsValue, JsError> {
        to_js(self.inner.viewport_assignment())
    }

    /// Merges settings into a viewport of the current stage.
    #[wasm_bindgen(js_name = updateViewportSettings)]
    pub fn update_viewport_settings(&mut self, viewport_index: usize, settings: JsValue) -> Result<(), JsError> {
        let settings = serde_wasm_bindgen::from_value(settings)?;
        self.inner.update_viewport_settings(viewport_index, settings)?;
        Ok(())
    }
}
