use std::sync::Arc;
use std::time::Duration;

use crate::cache::{self, Cache, StorageKeys};
use crate::config::{DEFAULT_GEO_URL, GeoConfig};
use crate::error::{BootstrapError, Result};
use crate::models::{GeoLocation, GeopluginResponse, NormalizedGeoResponse};
use crate::transport::{Accept, HttpClient};

/// Which field layout the geo provider answers with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GeoProvider {
    /// A configured provider using the normalized field names
    Normalized,
    /// geoplugin.net, fields prefixed with `geoplugin_`
    Geoplugin,
}

/// Captures the visitor's location, reusing the cached one while the IP is unchanged
pub struct GeoLocator {
    cache: Arc<dyn Cache>,
    http: Arc<dyn HttpClient>,
    keys: StorageKeys,
    ip_url: String,
    geo_url: String,
    provider: GeoProvider,
    timeout: Duration,
}

impl GeoLocator {
    pub fn new(
        cache: Arc<dyn Cache>,
        http: Arc<dyn HttpClient>,
        keys: StorageKeys,
        geo: &GeoConfig,
        timeout: Duration,
    ) -> Self {
        let (geo_url, provider) = match &geo.geo_url {
            Some(url) => (url.clone(), GeoProvider::Normalized),
            None => (DEFAULT_GEO_URL.to_string(), GeoProvider::Geoplugin),
        };
        Self {
            cache,
            http,
            keys,
            ip_url: geo.ip_url().to_string(),
            geo_url,
            provider,
            timeout,
        }
    }

    /// Location for this session, or `None` when it cannot be determined
    pub async fn capture(&self) -> Option<GeoLocation> {
        match self.try_capture().await {
            Ok(location) => Some(location),
            Err(e) => {
                tracing::error!("Unable to obtain location info: {}", e);
                None
            }
        }
    }

    async fn try_capture(&self) -> Result<GeoLocation> {
        let ip = self.current_ip().await?;

        if let Some(cached) = self.cached_location().await {
            if cached.ip == ip {
                tracing::debug!("Found location info in cache, IP hasn't changed");
                return Ok(cached);
            }
            tracing::debug!("IP changed since location was cached - refreshing");
        }

        let location = self.fetch_location(ip).await?;
        tracing::debug!(?location, "Obtained new location information");

        if let Err(e) = cache::put_json(self.cache.as_ref(), &self.keys.location(), &location).await
        {
            tracing::warn!("Failed to cache location: {}", e);
        }
        Ok(location)
    }

    async fn current_ip(&self) -> Result<String> {
        tracing::debug!("ipUrl {}", self.ip_url);
        let response = self.http.get(&self.ip_url, Accept::Any, self.timeout).await?;
        let ip = response.body.trim().to_string();
        if ip.is_empty() {
            return Err(BootstrapError::Http(format!(
                "{} returned an empty IP address",
                self.ip_url
            )));
        }
        Ok(ip)
    }

    async fn cached_location(&self) -> Option<GeoLocation> {
        let key = self.keys.location();
        match self.cache.exists(&key).await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                tracing::warn!("Could not check cached location: {}", e);
                return None;
            }
        }
        cache::get_json(self.cache.as_ref(), &key)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable cached location: {}", e);
                None
            })
    }

    async fn fetch_location(&self, ip: String) -> Result<GeoLocation> {
        let url = self.geo_url.replace("{ip}", &ip);
        tracing::debug!("geoUrl {}", url);
        let response = self.http.get(&url, Accept::Json, self.timeout).await?;

        let location = match self.provider {
            GeoProvider::Normalized => {
                serde_json::from_str::<NormalizedGeoResponse>(&response.body)?.into_location(ip)
            }
            GeoProvider::Geoplugin => {
                serde_json::from_str::<GeopluginResponse>(&response.body)?.into_location(ip)
            }
        };
        Ok(location)
    }
}
