use std::sync::Arc;
use std::time::Duration;

use crate::asr;
use crate::cache::{self, Cache, StorageKeys};
use crate::colors;
use crate::error::{BootstrapError, Result};
use crate::models::{
    ActiveSolution, AsrCorrection, ContextParam, ContextValue, Solution, SolutionConfig,
};
use crate::transport::{Accept, HttpClient};

const SHEET_ID_PARAM: &str = "sheetId";

/// Inputs to a single resolution
#[derive(Debug, Clone, Default)]
pub struct ResolveEnv<'a> {
    pub load_fresh_config_for_new_sessions: bool,
    pub must_get_static_default_config: bool,
    pub deep_link: Option<&'a str>,
    pub sheet_id: Option<&'a str>,
    pub is_agent_assist: bool,
    /// Where `config.json` lives when the static default must be fetched
    pub static_config_url: Option<&'a str>,
    /// Embedded build-time default
    pub build_config: Option<&'a SolutionConfig>,
    pub base_asr_corrections: &'a [AsrCorrection],
    pub timeout: Duration,
}

/// Determines the active solution from cache, build default or server config
pub struct ConfigResolver {
    cache: Arc<dyn Cache>,
    http: Arc<dyn HttpClient>,
    keys: StorageKeys,
}

impl ConfigResolver {
    pub fn new(cache: Arc<dyn Cache>, http: Arc<dyn HttpClient>, keys: StorageKeys) -> Self {
        Self { cache, http, keys }
    }

    pub async fn resolve(&self, env: &ResolveEnv<'_>) -> Result<ActiveSolution> {
        let config = self.solution_config(env).await?;
        tracing::info!(
            "Active solution config has {} solution(s), default '{}'",
            config.solutions.len(),
            config.active_solution
        );
        build_active_solution(&config, env)
    }

    /// Cached config when usable, otherwise the default source
    pub async fn solution_config(&self, env: &ResolveEnv<'_>) -> Result<SolutionConfig> {
        tracing::debug!("Begin looking for solution config");

        if env.load_fresh_config_for_new_sessions {
            tracing::debug!("Loading fresh solution config");
        } else if let Some(config) = self.cached_config().await {
            if config.is_usable() {
                tracing::debug!("Found solution config in cache");
                return Ok(config);
            }
            tracing::debug!("Cached solution config has no solutions - reloading");
        }

        self.load_default_config(env).await
    }

    async fn cached_config(&self) -> Option<SolutionConfig> {
        let key = self.keys.config();
        match cache::get_json::<SolutionConfig>(self.cache.as_ref(), &key).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring unreadable cached config at {}: {}", key, e);
                None
            }
        }
    }

    async fn load_default_config(&self, env: &ResolveEnv<'_>) -> Result<SolutionConfig> {
        if !env.must_get_static_default_config {
            let config = env.build_config.cloned().ok_or_else(|| {
                BootstrapError::ConfigLoad("no build-time solution config available".to_string())
            })?;
            if !config.is_usable() {
                return Err(BootstrapError::ConfigLoad(
                    "build-time solution config has no solutions".to_string(),
                ));
            }
            tracing::debug!("Found and loaded build's solution config");
            return Ok(config);
        }

        let url = env.static_config_url.ok_or_else(|| {
            BootstrapError::ConfigLoad("no static config.json location".to_string())
        })?;
        let config = self.fetch_static_config(url, env.timeout).await.map_err(|e| {
            BootstrapError::ConfigLoad(format!("Could not load config.json from {url}: {e}"))
        })?;

        if let Err(e) = cache::put_json(self.cache.as_ref(), &self.keys.config(), &config).await {
            tracing::warn!("Failed to cache solution config: {}", e);
        }
        tracing::debug!("Found and loaded solution config from {}", url);
        Ok(config)
    }

    async fn fetch_static_config(&self, url: &str, timeout: Duration) -> Result<SolutionConfig> {
        let response = self.http.get(url, Accept::Json, timeout).await?;
        let body: Option<SolutionConfig> = serde_json::from_str(&response.body)?;
        match body {
            Some(config) if config.is_usable() => Ok(config),
            Some(_) => Err(BootstrapError::Internal(
                "config.json has no solutions".to_string(),
            )),
            None => Err(BootstrapError::Internal("config.json is empty".to_string())),
        }
    }
}

/// Turn a usable config into the active solution. Never mutates `config`.
pub fn build_active_solution(
    config: &SolutionConfig,
    env: &ResolveEnv<'_>,
) -> Result<ActiveSolution> {
    let mut solution = select_solution(config, env.deep_link)
        .cloned()
        .ok_or_else(|| BootstrapError::ConfigLoad("solution config has no solutions".to_string()))?;

    if let Some(sheet_id) = env.sheet_id {
        inject_sheet_id(&mut solution.context_params, sheet_id);
    }
    normalize_theme(&mut solution);
    if env.is_agent_assist {
        solution.enable_live_chat = false;
    }

    let request_parameters = request_parameters(&solution.context_params);
    let asr_corrections =
        asr::merge_corrections(env.base_asr_corrections, solution.asr_corrections.as_deref());
    tracing::debug!("Merged {} ASR corrections", asr_corrections.len());

    Ok(ActiveSolution {
        solution,
        request_parameters,
        asr_corrections,
    })
}

/// Deep link first, then `activeSolution` by id, then the first solution
pub fn select_solution<'c>(config: &'c SolutionConfig, deep_link: Option<&str>) -> Option<&'c Solution> {
    if let Some(link) = deep_link {
        if let Some(found) = config.solutions.iter().find(|s| s.deep_link == link) {
            tracing::debug!("Deep link '{}' selected solution '{}'", link, found.id);
            return Some(found);
        }
        tracing::debug!("No solution for deep link '{}' - falling back to default", link);
    } else {
        tracing::debug!("No deep link found in the current url - load default solution");
    }

    config
        .solutions
        .iter()
        .find(|s| s.id == config.active_solution)
        .or_else(|| config.solutions.first())
}

pub fn inject_sheet_id(params: &mut Vec<ContextParam>, sheet_id: &str) {
    let value = ContextValue {
        text: sheet_id.to_string(),
        active: true,
    };
    match params.iter().position(|p| p.name == SHEET_ID_PARAM) {
        Some(idx) => {
            let values = &mut params[idx].values;
            if values.is_empty() {
                values.push(value);
            } else {
                values[0].text = value.text;
            }
        }
        None => params.push(ContextParam {
            name: SHEET_ID_PARAM.to_string(),
            values: vec![value],
        }),
    }
}

/// Replace symbolic theme colors with hex; unknown names stay as they are
pub fn normalize_theme(solution: &mut Solution) {
    for (slot, color) in solution.theme.iter_mut() {
        if color.starts_with('#') {
            continue;
        }
        match colors::lookup(color) {
            Some(hex) => *color = hex.to_string(),
            None => tracing::debug!("Unknown theme color '{}' for slot '{}'", color, slot),
        }
    }
}

/// `&name=value` for every active context-parameter value, in order
pub fn request_parameters(params: &[ContextParam]) -> String {
    params
        .iter()
        .flat_map(|param| {
            param
                .values
                .iter()
                .filter(|v| v.active)
                .map(move |v| format!("&{}={}", param.name, urlencoding::encode(&v.text)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCache, MockCache};
    use crate::transport::{HttpResponse, MockHttpClient};

    const STATIC_URL: &str = "http://widget.local/static/config.json";

    fn solution(id: &str, deep_link: &str) -> Solution {
        Solution {
            id: id.to_string(),
            deep_link: deep_link.to_string(),
            ..Default::default()
        }
    }

    fn two_solutions(active: &str) -> SolutionConfig {
        SolutionConfig {
            active_solution: active.to_string(),
            solutions: vec![solution("a", "x"), solution("b", "y")],
        }
    }

    fn env<'a>() -> ResolveEnv<'a> {
        ResolveEnv {
            must_get_static_default_config: true,
            static_config_url: Some(STATIC_URL),
            timeout: Duration::from_secs(3),
            ..Default::default()
        }
    }

    fn no_http() -> Arc<dyn HttpClient> {
        let mut http = MockHttpClient::new();
        http.expect_get().never();
        Arc::new(http)
    }

    fn serving(body: &'static str) -> Arc<dyn HttpClient> {
        let mut http = MockHttpClient::new();
        http.expect_get()
            .withf(|url, accept, _| url == STATIC_URL && *accept == Accept::Json)
            .times(1)
            .returning(move |_, _, _| {
                Ok(HttpResponse {
                    status: 200,
                    body: body.to_string(),
                })
            });
        Arc::new(http)
    }

    #[test]
    fn test_unmatched_ids_fall_back_to_first() {
        let config = two_solutions("zzz");
        let picked = select_solution(&config, Some("nope")).expect("solution");
        assert_eq!(picked.id, "a");
        let picked = select_solution(&config, None).expect("solution");
        assert_eq!(picked.id, "a");
    }

    #[test]
    fn test_deep_link_takes_precedence() {
        let config = two_solutions("a");
        let picked = select_solution(&config, Some("y")).expect("solution");
        assert_eq!(picked.id, "b");
    }

    #[test]
    fn test_deep_link_miss_uses_active_solution() {
        let config = two_solutions("a");
        assert_eq!(select_solution(&config, Some("z")).expect("solution").id, "a");
        let config = two_solutions("b");
        assert_eq!(select_solution(&config, Some("z")).expect("solution").id, "b");
    }

    #[test]
    fn test_request_parameters_order_and_activity() {
        let params = vec![
            ContextParam {
                name: "a".to_string(),
                values: vec![ContextValue { text: "1".to_string(), active: true }],
            },
            ContextParam {
                name: "b".to_string(),
                values: vec![
                    ContextValue { text: "2".to_string(), active: false },
                    ContextValue { text: "3".to_string(), active: true },
                ],
            },
        ];
        assert_eq!(request_parameters(&params), "&a=1&b=3");
    }

    #[test]
    fn test_request_parameters_url_encodes_values() {
        let params = vec![ContextParam {
            name: "channel".to_string(),
            values: vec![ContextValue { text: "web chat&more".to_string(), active: true }],
        }];
        assert_eq!(request_parameters(&params), "&channel=web%20chat%26more");
        assert_eq!(request_parameters(&[]), "");
    }

    #[test]
    fn test_theme_hex_passthrough_and_name_resolution() {
        let mut s = solution("a", "x");
        s.theme.insert("primary".to_string(), "#123456".to_string());
        s.theme.insert("secondary".to_string(), "Red".to_string());
        s.theme.insert("accent".to_string(), "NotAColor".to_string());
        normalize_theme(&mut s);
        assert_eq!(s.theme["primary"], "#123456");
        assert_eq!(s.theme["secondary"], "#FF0000");
        assert_eq!(s.theme["accent"], "NotAColor");
    }

    #[test]
    fn test_sheet_id_overwrites_existing_param() {
        let mut params = vec![ContextParam {
            name: "sheetId".to_string(),
            values: vec![
                ContextValue { text: "old".to_string(), active: true },
                ContextValue { text: "other".to_string(), active: false },
            ],
        }];
        inject_sheet_id(&mut params, "new");
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].values[0].text, "new");
        assert_eq!(params[0].values[1].text, "other");
    }

    #[test]
    fn test_sheet_id_fills_param_without_values() {
        let mut params = vec![ContextParam {
            name: "sheetId".to_string(),
            values: vec![],
        }];
        inject_sheet_id(&mut params, "s2");
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].values.len(), 1);
        assert_eq!(request_parameters(&params), "&sheetId=s2");
    }

    #[test]
    fn test_sheet_id_appended_when_missing() {
        let mut params = vec![];
        inject_sheet_id(&mut params, "s1");
        assert_eq!(request_parameters(&params), "&sheetId=s1");
    }

    #[test]
    fn test_build_active_solution_does_not_mutate_input() {
        let mut config = two_solutions("a");
        config.solutions[0]
            .theme
            .insert("primary".to_string(), "Red".to_string());
        config.solutions[0].enable_live_chat = true;
        config.solutions[0].asr_corrections = Some("foo|bar".to_string());
        let snapshot = config.clone();

        let base = vec![["teh".to_string(), "the".to_string()]];
        let env = ResolveEnv {
            sheet_id: Some("s1"),
            is_agent_assist: true,
            base_asr_corrections: &base,
            ..env()
        };
        let active = build_active_solution(&config, &env).expect("active solution");

        assert_eq!(config, snapshot);
        assert_eq!(active.solution.theme["primary"], "#FF0000");
        assert!(!active.solution.enable_live_chat);
        assert_eq!(active.request_parameters, "&sheetId=s1");
        assert_eq!(active.asr_corrections.len(), 2);
    }

    #[tokio::test]
    async fn test_uses_usable_cached_config_without_network() {
        let cache = Arc::new(MemoryCache::new());
        let keys = StorageKeys::new("t-");
        cache::put_json(cache.as_ref(), &keys.config(), &two_solutions("b"))
            .await
            .expect("seed cache");

        let resolver = ConfigResolver::new(cache, no_http(), keys);
        let active = resolver.resolve(&env()).await.expect("resolve");
        assert_eq!(active.solution.id, "b");
    }

    #[tokio::test]
    async fn test_empty_cached_solutions_trigger_reload() {
        let cache = Arc::new(MemoryCache::new());
        let keys = StorageKeys::new("t-");
        cache
            .put(&keys.config(), r#"{"activeSolution":"a","solutions":[]}"#)
            .await
            .expect("seed cache");

        let http = serving(r#"{"activeSolution":"b","solutions":[{"id":"a"},{"id":"b"}]}"#);
        let resolver = ConfigResolver::new(cache.clone(), http, keys.clone());
        let active = resolver.resolve(&env()).await.expect("resolve");
        assert_eq!(active.solution.id, "b");

        let cached: SolutionConfig = cache::get_json(cache.as_ref(), &keys.config())
            .await
            .expect("read cache")
            .expect("config cached");
        assert_eq!(cached.solutions.len(), 2);
    }

    #[tokio::test]
    async fn test_null_cached_config_is_absent() {
        let cache = Arc::new(MemoryCache::new());
        let keys = StorageKeys::new("t-");
        cache.put(&keys.config(), "null").await.expect("seed cache");

        let http = serving(r#"{"activeSolution":"a","solutions":[{"id":"a"}]}"#);
        let resolver = ConfigResolver::new(cache, http, keys);
        assert_eq!(resolver.resolve(&env()).await.expect("resolve").solution.id, "a");
    }

    #[tokio::test]
    async fn test_fresh_flag_skips_cache() {
        let mut cache = MockCache::new();
        cache.expect_get().never();
        cache
            .expect_put()
            .withf(|key, _| key == "t-config")
            .times(1)
            .returning(|_, _| Ok(()));

        let http = serving(r#"{"activeSolution":"a","solutions":[{"id":"a"}]}"#);
        let resolver = ConfigResolver::new(Arc::new(cache), http, StorageKeys::new("t-"));
        let env = ResolveEnv {
            load_fresh_config_for_new_sessions: true,
            ..env()
        };
        assert_eq!(resolver.resolve(&env).await.expect("resolve").solution.id, "a");
    }

    #[tokio::test]
    async fn test_build_config_used_when_static_fetch_disabled() {
        let build = two_solutions("b");
        let resolver =
            ConfigResolver::new(Arc::new(MemoryCache::new()), no_http(), StorageKeys::new("t-"));
        let env = ResolveEnv {
            must_get_static_default_config: false,
            build_config: Some(&build),
            ..env()
        };
        assert_eq!(resolver.resolve(&env).await.expect("resolve").solution.id, "b");
    }

    #[tokio::test]
    async fn test_fetch_failure_is_config_load_error() {
        let mut http = MockHttpClient::new();
        http.expect_get()
            .returning(|_, _, _| Err(BootstrapError::Http("request timed out".to_string())));

        let resolver = ConfigResolver::new(
            Arc::new(MemoryCache::new()),
            Arc::new(http),
            StorageKeys::new("t-"),
        );
        let err = resolver.resolve(&env()).await.expect_err("should fail");
        match err {
            BootstrapError::ConfigLoad(msg) => assert!(msg.contains("timed out")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_null_body_is_config_load_error() {
        let resolver = ConfigResolver::new(
            Arc::new(MemoryCache::new()),
            serving("null"),
            StorageKeys::new("t-"),
        );
        let err = resolver.resolve(&env()).await.expect_err("should fail");
        assert!(matches!(err, BootstrapError::ConfigLoad(_)));
    }

    #[tokio::test]
    async fn test_unreadable_cache_falls_back_to_server() {
        let mut cache = MockCache::new();
        cache
            .expect_get()
            .returning(|_| Err(BootstrapError::Internal("cache down".to_string())));
        cache.expect_put().returning(|_, _| Ok(()));

        let http = serving(r#"{"activeSolution":"a","solutions":[{"id":"a"}]}"#);
        let resolver = ConfigResolver::new(Arc::new(cache), http, StorageKeys::new("t-"));
        assert_eq!(resolver.resolve(&env()).await.expect("resolve").solution.id, "a");
    }

    #[tokio::test]
    async fn test_server_config_with_null_fields_resolves() {
        let http = serving(
            r#"{"activeSolution":"a","solutions":[{"id":"a","responseIcon":null,"float":null,
                "contextParams":[null,{"name":"channel","values":[{"text":"web","active":true}]}]}]}"#,
        );
        let resolver =
            ConfigResolver::new(Arc::new(MemoryCache::new()), http, StorageKeys::new("t-"));
        let active = resolver.resolve(&env()).await.expect("resolve");
        assert_eq!(active.solution.id, "a");
        assert_eq!(active.solution.response_icon, "");
        assert!(!active.solution.float);
        assert_eq!(active.request_parameters, "&channel=web");
    }
}
