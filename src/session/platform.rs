// Platform lookup over the known identity servers
// Servers are asked one after the other until one of them answers

use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::PlatformResolution;
use crate::session::{DiscussionError, PlatformInfoResolver};

/// Body of an identity server `info` response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfoResponse {
    /// Hostname of the platform the address belongs to, absent when unauthorized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hs: Option<String>,
    #[serde(default)]
    pub invited: bool,
}

impl PlatformInfoResponse {
    pub fn authorized(hostname: &str) -> Self {
        PlatformInfoResponse {
            hs: Some(hostname.to_string()),
            invited: false,
        }
    }

    pub fn resolution(&self) -> PlatformResolution {
        match &self.hs {
            Some(hostname) => PlatformResolution::Authorized {
                hostname: hostname.clone(),
            },
            None => PlatformResolution::Unauthorized,
        }
    }
}

/// Asks each identity server in turn, without retrying any of them.
/// The first answer wins; when every server fails the last error is returned.
pub struct FallbackPlatformResolver {
    servers: Vec<(String, Arc<dyn PlatformInfoResolver>)>,
}

impl FallbackPlatformResolver {
    pub fn new(servers: Vec<(String, Arc<dyn PlatformInfoResolver>)>) -> Self {
        Self { servers }
    }

    pub fn server_urls(&self) -> Vec<&str> {
        self.servers.iter().map(|(url, _)| url.as_str()).collect()
    }
}

#[async_trait]
impl PlatformInfoResolver for FallbackPlatformResolver {
    async fn resolve_platform(&self, email: &str) -> Result<PlatformResolution, DiscussionError> {
        let mut last_error = None;

        for (url, server) in &self.servers {
            match server.resolve_platform(email).await {
                Ok(resolution) => {
                    info!("[PlatformResolver] info request on {} succeeded", url);
                    return Ok(resolution);
                }
                Err(e) => {
                    warn!("[PlatformResolver] info request on {} failed: {}", url, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DiscussionError::PlatformLookupFailed {
            address: email.to_string(),
            reason: "no identity server configured".to_string(),
        }))
    }
}
