use std::time::Duration;

use serde::Deserialize;
use tower_lsp::lsp_types::ConfigurationItem;
use tracing::{debug, warn};

use pdx_core::sched::SchedulerConfig;

use super::state::PdxLanguageServer;

pub const SECTION: &str = "pdx.lsp";

/// The `pdx.lsp` settings section. Every field is optional.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LspSettings {
    #[serde(default)]
    pub debounce: DebounceSettings,
    #[serde(default)]
    pub performance: PerformanceSettings,
    #[serde(default)]
    pub workspace: WorkspaceSettings,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DebounceSettings {
    pub base_ms: Option<u64>,
    pub per_kib_ms: Option<u64>,
    pub max_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSettings {
    pub max_concurrent: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSettings {
    /// Index the whole workspace on startup. Defaults to true.
    pub index: Option<bool>,
}

impl LspSettings {
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        match serde_json::from_value(value) {
            Ok(settings) => Some(settings),
            Err(err) => {
                warn!("ignoring malformed {SECTION} settings: {err}");
                None
            }
        }
    }

    /// `base` with every provided override applied. Zero worker counts are ignored.
    pub fn scheduler_config(&self, base: &SchedulerConfig) -> SchedulerConfig {
        let ms = Duration::from_millis;
        SchedulerConfig {
            base_delay: self.debounce.base_ms.map(ms).unwrap_or(base.base_delay),
            per_kib: self.debounce.per_kib_ms.map(ms).unwrap_or(base.per_kib),
            max_delay: self.debounce.max_ms.map(ms).unwrap_or(base.max_delay),
            workers: self
                .performance
                .max_concurrent
                .filter(|v| *v > 0)
                .unwrap_or(base.workers),
        }
    }

    pub fn index_workspace(&self) -> bool {
        self.workspace.index.unwrap_or(true)
    }
}

impl PdxLanguageServer {
    /// Pull `pdx.lsp` from the client and apply it. Keeps the current settings on failure.
    pub(crate) async fn load_config(&self) -> LspSettings {
        let items = vec![ConfigurationItem {
            scope_uri: None,
            section: Some(SECTION.to_string()),
        }];
        let settings = match self.client.configuration(items).await {
            Ok(values) => values
                .into_iter()
                .next()
                .filter(|v| !v.is_null())
                .and_then(LspSettings::from_value)
                .unwrap_or_default(),
            Err(err) => {
                debug!("client has no configuration: {err}");
                LspSettings::default()
            }
        };
        let config = settings.scheduler_config(&SchedulerConfig::default());
        debug!(?config, "scheduler configured");
        self.scheduler.reconfigure(config);
        settings
    }
}
