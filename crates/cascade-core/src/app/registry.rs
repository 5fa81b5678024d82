//! PluginRegistry - kind 名 → プラグインファクトリ
//!
//! Config declares plugins by `kind`; the registry turns a kind plus its
//! `options` table into a live `Stage` / `Segmenter`.
//!
//! # 内部実装
//! - HashMap<String, Arc<dyn Fn(&toml::Table) -> ...>> で管理
//! - 二重登録は RegistryError::AlreadyRegistered

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::CascadeError;
use crate::impls::{KeywordStage, SentenceSegmenter, keyword_stage, sentence_segmenter};
use crate::ports::{Segmenter, Stage};

pub type StageFactory =
    Arc<dyn Fn(&toml::Table) -> Result<Arc<dyn Stage>, CascadeError> + Send + Sync>;
pub type SegmenterFactory =
    Arc<dyn Fn(&toml::Table) -> Result<Arc<dyn Segmenter>, CascadeError> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("plugin kind '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("unknown plugin kind '{0}'")]
    UnknownKind(String),
}

#[derive(Default, Clone)]
pub struct PluginRegistry {
    stages: HashMap<String, StageFactory>,
    segmenters: HashMap<String, SegmenterFactory>,
}

impl PluginRegistry {
    /// Empty registry, no built-ins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `keyword` stage and `sentence` segmenter.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        // 空の registry への登録なので衝突しない
        let _ = registry.register_stage(keyword_stage::KIND, |options| {
            Ok(Arc::new(KeywordStage::from_options(options)?) as Arc<dyn Stage>)
        });
        let _ = registry.register_segmenter(sentence_segmenter::KIND, |_options| {
            Ok(Arc::new(SentenceSegmenter::new()) as Arc<dyn Segmenter>)
        });
        registry
    }

    pub fn register_stage<F>(&mut self, kind: &str, factory: F) -> Result<(), RegistryError>
    where
        F: Fn(&toml::Table) -> Result<Arc<dyn Stage>, CascadeError> + Send + Sync + 'static,
    {
        if self.stages.contains_key(kind) {
            return Err(RegistryError::AlreadyRegistered(kind.to_string()));
        }
        self.stages.insert(kind.to_string(), Arc::new(factory));
        Ok(())
    }

    pub fn register_segmenter<F>(&mut self, kind: &str, factory: F) -> Result<(), RegistryError>
    where
        F: Fn(&toml::Table) -> Result<Arc<dyn Segmenter>, CascadeError> + Send + Sync + 'static,
    {
        if self.segmenters.contains_key(kind) {
            return Err(RegistryError::AlreadyRegistered(kind.to_string()));
        }
        self.segmenters.insert(kind.to_string(), Arc::new(factory));
        Ok(())
    }

    pub fn stage_factory(&self, kind: &str) -> Result<StageFactory, RegistryError> {
        self.stages
            .get(kind)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownKind(kind.to_string()))
    }

    pub fn segmenter_factory(&self, kind: &str) -> Result<SegmenterFactory, RegistryError> {
        self.segmenters
            .get(kind)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownKind(kind.to_string()))
    }

    pub fn stage_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<_> = self.stages.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn segmenter_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<_> = self.segmenters.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("stages", &self.stage_kinds())
            .field("segmenters", &self.segmenter_kinds())
            .finish()
    }
}
