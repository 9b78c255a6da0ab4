use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::asr;
use crate::cache::{Cache, MemoryCache, RedisCache, StorageKeys};
use crate::config::Config;
use crate::error::Result;
use crate::geo::GeoLocator;
use crate::models::{ActiveSolution, AsrCorrection, GeoLocation, SolutionConfig};
use crate::page::PageParams;
use crate::resolver::{ConfigResolver, ResolveEnv};
use crate::transport::{HttpClient, ReqwestTransport};

const DEFAULT_SEND_CONTEXT_PARAMS: &str = "login";

/// Everything the bootstrap needs, built once per session
pub struct BootstrapContext {
    pub config: Arc<Config>,
    pub page: PageParams,
    pub cache: Arc<dyn Cache>,
    pub http: Arc<dyn HttpClient>,
    pub base_asr_corrections: Vec<AsrCorrection>,
    pub build_config: Option<SolutionConfig>,
}

impl BootstrapContext {
    /// Build the context from configuration: Redis or in-memory cache, reqwest transport
    pub async fn from_config(config: Arc<Config>, page_url: &str) -> Result<Self> {
        let page = PageParams::parse(page_url)?;

        let cache: Arc<dyn Cache> = match config.storage.backend.as_str() {
            "redis" => Arc::new(RedisCache::new_with_config(&config).await?),
            _ => Arc::new(MemoryCache::new()),
        };
        let http: Arc<dyn HttpClient> = Arc::new(ReqwestTransport::new(config.http.max_attempts)?);
        let build_config = config.load_build_config()?;

        Ok(Self {
            config,
            page,
            cache,
            http,
            base_asr_corrections: asr::default_corrections(),
            build_config,
        })
    }

    pub fn storage_keys(&self) -> StorageKeys {
        StorageKeys::new(self.config.storage.storage_key.clone())
    }
}

/// Responsive breakpoints handed to the view renderer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakpoints {
    pub xs: u32,
    pub sm: u32,
    pub md: u32,
    pub lg: u32,
    pub xl: u32,
}

impl Default for Breakpoints {
    fn default() -> Self {
        Self {
            xs: 0,
            sm: 300,
            md: 480,
            lg: 1000,
            xl: 1300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThemePalette {
    pub light: BTreeMap<String, String>,
    pub dark: BTreeMap<String, String>,
}

fn dark_palette() -> BTreeMap<String, String> {
    [
        ("primary", "#161616"),
        ("secondary", "#0F6695"),
        ("accent", "#00FF00"),
        ("error", "#FF4B4B"),
        ("info", "#1E92D0"),
        ("success", "#335f13"),
        ("warning", "#FDFF00"),
        ("anchor", "#67BAD7"),
        ("sendButton", "#FFFFFF"),
        ("focusButton", "#CEFF00"),
        ("textButton", "#FFFFFF"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// State consumed by the view renderer once bootstrap completes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetSettings {
    pub solution_id: String,
    pub chat_title: String,
    pub document_title: String,
    pub iframe_url: String,
    pub knowledge_data: Vec<serde_json::Value>,
    pub locale: String,
    pub float: bool,
    pub response_icon: String,
    pub user_icon: String,
    pub send_context_params: String,
    pub teneo_url: String,
    pub theme: ThemePalette,
    pub breakpoints: Breakpoints,
    pub enable_live_chat: bool,
    pub is_agent_assist: bool,
    pub embed: bool,
    pub use_session_storage: bool,
    pub unique_key: String,
    pub request_parameters: String,
    pub asr_corrections: Vec<AsrCorrection>,
    pub should_tts_be_enabled_at_startup: bool,
    pub location: Option<GeoLocation>,
}

impl WidgetSettings {
    fn from_active(active: ActiveSolution, page: &PageParams) -> Self {
        let ActiveSolution {
            solution,
            request_parameters,
            asr_corrections,
        } = active;

        let unique_key = if page.mobile {
            format!("{}_mobile", solution.deep_link)
        } else {
            solution.deep_link.clone()
        };

        Self {
            solution_id: solution.id,
            chat_title: solution.chat_title,
            document_title: solution.name,
            iframe_url: solution.iframe_url,
            knowledge_data: solution.knowledge_data,
            locale: solution.locale,
            float: solution.float,
            response_icon: solution.response_icon,
            user_icon: solution.user_icon,
            send_context_params: solution
                .send_context_params
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SEND_CONTEXT_PARAMS.to_string()),
            teneo_url: solution.url,
            theme: ThemePalette {
                light: solution.theme,
                dark: dark_palette(),
            },
            breakpoints: Breakpoints::default(),
            enable_live_chat: solution.enable_live_chat && !page.is_agent_assist,
            is_agent_assist: page.is_agent_assist,
            embed: page.embed,
            use_session_storage: !page.embed,
            unique_key,
            request_parameters,
            asr_corrections,
            // Needs browser microphone permission; the host flips it after prompting.
            should_tts_be_enabled_at_startup: false,
            location: None,
        }
    }
}

/// Sequential bootstrap: config, then theme and context params, then geolocation
pub struct Setup {
    ctx: BootstrapContext,
    keys: StorageKeys,
}

impl Setup {
    pub fn new(ctx: BootstrapContext) -> Self {
        let keys = ctx.storage_keys();
        Self { ctx, keys }
    }

    pub async fn init(&self) -> Result<WidgetSettings> {
        tracing::info!(
            "Bootstrapping {} v{}",
            self.ctx.config.server.name,
            self.ctx.config.server.version
        );
        self.reset_dark_theme().await;

        let static_config_url = if self.ctx.config.solution.must_get_static_default_config {
            Some(self.ctx.page.static_config_url()?)
        } else {
            None
        };

        let env = ResolveEnv {
            load_fresh_config_for_new_sessions: self
                .ctx
                .config
                .solution
                .load_fresh_config_for_new_sessions,
            must_get_static_default_config: self.ctx.config.solution.must_get_static_default_config,
            deep_link: self.ctx.page.deep_link.as_deref(),
            sheet_id: self.ctx.page.sheet_id.as_deref(),
            is_agent_assist: self.ctx.page.is_agent_assist,
            static_config_url: static_config_url.as_deref(),
            build_config: self.ctx.build_config.as_ref(),
            base_asr_corrections: &self.ctx.base_asr_corrections,
            timeout: self.ctx.config.http_timeout(),
        };

        let resolver = ConfigResolver::new(
            Arc::clone(&self.ctx.cache),
            Arc::clone(&self.ctx.http),
            self.keys.clone(),
        );
        let active = resolver.resolve(&env).await.inspect_err(|e| {
            tracing::error!("Widget bootstrap failed: {}", e);
        })?;
        tracing::info!("Active solution: {}", active.solution.id);

        let sharable_solution = active.solution.deep_link.clone();
        let mut settings = WidgetSettings::from_active(active, &self.ctx.page);

        if self.ctx.config.geo.must_send_location_at_login {
            let locator = GeoLocator::new(
                Arc::clone(&self.ctx.cache),
                Arc::clone(&self.ctx.http),
                self.keys.clone(),
                &self.ctx.config.geo,
                self.ctx.config.http_timeout(),
            );
            settings.location = locator.capture().await;
        }

        self.log_telemetry_scope(&sharable_solution);
        Ok(settings)
    }

    async fn reset_dark_theme(&self) {
        if let Err(e) = self.ctx.cache.put(&self.keys.dark_theme(), "false").await {
            tracing::warn!("Failed to reset dark theme flag: {}", e);
        }
    }

    fn log_telemetry_scope(&self, solution_deep_link: &str) {
        if !self.ctx.config.telemetry_enabled() {
            return;
        }
        let logging = &self.ctx.config.logging;
        tracing::debug!(
            solution = %solution_deep_link,
            log_rocket = logging.log_rocket.is_some(),
            sentry = logging.sentry_dsn.is_some(),
            "Telemetry scope prepared"
        );
    }
}
