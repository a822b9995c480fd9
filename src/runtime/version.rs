use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::bus::{ErrorCode, ErrorInfo};
use crate::service::ServiceClient;

pub const LATEST_RELEASE_COMMAND: &str = "app.release.latest";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AppVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl fmt::Display for AppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for AppVersion {
    type Err = String;

    /// Accepts `1`, `1.2`, `v1.2.3` and ignores `-pre`/`+build` suffixes.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let core = trimmed
            .strip_prefix('v')
            .unwrap_or(trimmed)
            .split(['-', '+'])
            .next()
            .unwrap_or_default();

        let mut parts = [0u64; 3];
        let mut count = 0;
        for (idx, raw) in core.split('.').enumerate() {
            if idx >= parts.len() {
                return Err(format!("invalid version: {value}"));
            }
            parts[idx] = raw
                .parse()
                .map_err(|_| format!("invalid version: {value}"))?;
            count += 1;
        }
        if count == 0 {
            return Err(format!("invalid version: {value}"));
        }

        Ok(Self {
            major: parts[0],
            minor: parts[1],
            patch: parts[2],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    pub version: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub download_url: Option<String>,
}

/// Checks for newer releases.
///
/// Owned by the application context rather than living in a global, so
/// tests get a fresh instance and `reset` marks teardown.
pub struct VersionChecker {
    current: AppVersion,
    client: ServiceClient,
    latest: RwLock<Option<ReleaseInfo>>,
}

impl VersionChecker {
    pub fn new(current: AppVersion, client: ServiceClient) -> Self {
        Self {
            current,
            client,
            latest: RwLock::new(None),
        }
    }

    pub fn current(&self) -> AppVersion {
        self.current
    }

    /// Ask the backend for the latest release; `Some` only when it is newer.
    pub async fn check(&self) -> Result<Option<ReleaseInfo>, ErrorInfo> {
        let release: ReleaseInfo = self.client.call(LATEST_RELEASE_COMMAND, &()).await?;
        let version = release
            .version
            .parse::<AppVersion>()
            .map_err(|e| ErrorInfo::with_code(ErrorCode::PayloadDecode, e))?;

        *self.latest.write().expect("version checker lock poisoned") = Some(release.clone());

        if version > self.current {
            tracing::info!("update available: {} -> {version}", self.current);
            Ok(Some(release))
        } else {
            Ok(None)
        }
    }

    /// Last release seen by `check`, newer or not.
    pub fn latest(&self) -> Option<ReleaseInfo> {
        self.latest
            .read()
            .expect("version checker lock poisoned")
            .clone()
    }

    pub fn reset(&self) {
        *self.latest.write().expect("version checker lock poisoned") = None;
    }
}
