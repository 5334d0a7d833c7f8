// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Hook points into the request pipeline (C6). Mirrors `PluginContainer`'s
//! marker-interface pattern with a single trait of default no-op methods
//! instead of five separate optional interfaces, since Rust traits don't
//! need a runtime type-assertion per hook.

use serde_json::Value;

use crate::session::Session;

pub trait Plugin: Send + Sync {
    /// Runs before a non-heartbeat packet is dispatched. Returning `false`
    /// drops the packet without dispatching it.
    fn pre_read(&self, _session: &Session, _raw: &[u8]) -> bool {
        true
    }

    /// Runs after the request body has been decoded, before the handler
    /// runs.
    fn post_read(&self, _session: &Session, _decoded_request: &Value) {}

    fn heartbeat(&self, _session: &Session) {}

    fn pre_stop(&self) {}

    fn post_stop(&self) {}
}

#[derive(Default)]
pub struct PluginChain {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    /// Short-circuits on the first plugin that rejects the packet.
    pub fn do_pre_read(&self, session: &Session, raw: &[u8]) -> bool {
        self.plugins.iter().all(|p| p.pre_read(session, raw))
    }

    pub fn do_post_read(&self, session: &Session, decoded_request: &Value) {
        for p in &self.plugins {
            p.post_read(session, decoded_request);
        }
    }

    pub fn do_heartbeat(&self, session: &Session) {
        for p in &self.plugins {
            p.heartbeat(session);
        }
    }

    pub fn do_pre_stop(&self) {
        for p in &self.plugins {
            p.pre_stop();
        }
    }

    pub fn do_post_stop(&self) {
        for p in &self.plugins {
            p.post_stop();
        }
    }
}
