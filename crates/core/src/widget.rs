//! Widget configuration and the identity used to authorize access to it.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::roles::ROLE_ADMIN;
use crate::types::{DbId, WidgetId};

/// Smallest refresh interval a widget may be configured with.
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 5;

/// Largest refresh interval a widget may be configured with (one day).
pub const MAX_REFRESH_INTERVAL_SECS: u64 = 86_400;

// ---------------------------------------------------------------------------
// WidgetType
// ---------------------------------------------------------------------------

/// The closed set of widget kinds. Each maps to exactly one provider adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetType {
    Crypto,
    Football,
    Weather,
}

impl WidgetType {
    pub const ALL: [WidgetType; 3] = [WidgetType::Crypto, WidgetType::Football, WidgetType::Weather];

    /// Stable tag stored in the `widgets.widget_type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            WidgetType::Crypto => "crypto",
            WidgetType::Football => "football",
            WidgetType::Weather => "weather",
        }
    }

    /// Refresh cadence used when a widget is created without one.
    pub fn default_refresh_interval_secs(self) -> u64 {
        match self {
            WidgetType::Crypto => 30,
            WidgetType::Football => 300,
            WidgetType::Weather => 600,
        }
    }
}

impl fmt::Display for WidgetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WidgetType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WidgetType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::InvalidConfig(format!("Unknown widget type '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// WidgetConfig
// ---------------------------------------------------------------------------

/// Durable configuration of a single widget.
///
/// `widget_id`, `owner_id` and `widget_type` never change after creation;
/// `params` and `refresh_interval_secs` are mutated by configuration PATCH.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetConfig {
    pub widget_id: WidgetId,
    pub owner_id: DbId,
    pub widget_type: WidgetType,
    /// Provider-specific parameters (e.g. `currency`, `city`).
    pub params: BTreeMap<String, String>,
    pub refresh_interval_secs: u64,
}

impl WidgetConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Look up a provider parameter, treating blank values as absent.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(String::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Whether `identity` may read this widget's value or subscribe to it.
    pub fn is_visible_to(&self, identity: &Identity) -> bool {
        identity.is_admin() || identity.user_id == self.owner_id
    }
}

/// Input for creating a widget. The store assigns the id.
#[derive(Debug, Clone, Deserialize)]
pub struct NewWidget {
    pub owner_id: DbId,
    pub widget_type: WidgetType,
    pub params: BTreeMap<String, String>,
    pub refresh_interval_secs: u64,
}

impl NewWidget {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_refresh_interval(self.refresh_interval_secs)
    }

    pub fn into_config(self, widget_id: WidgetId) -> WidgetConfig {
        WidgetConfig {
            widget_id,
            owner_id: self.owner_id,
            widget_type: self.widget_type,
            params: self.params,
            refresh_interval_secs: self.refresh_interval_secs,
        }
    }
}

/// Partial configuration update.
///
/// Provided parameters are merged into the existing bag; an empty string
/// removes the key. Omitted fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WidgetPatch {
    pub params: Option<BTreeMap<String, String>>,
    pub refresh_interval_secs: Option<u64>,
}

impl WidgetPatch {
    pub fn is_empty(&self) -> bool {
        self.params.is_none() && self.refresh_interval_secs.is_none()
    }

    /// Apply the patch to `config`, validating the resulting interval.
    pub fn apply(self, config: &mut WidgetConfig) -> Result<(), CoreError> {
        if let Some(secs) = self.refresh_interval_secs {
            validate_refresh_interval(secs)?;
            config.refresh_interval_secs = secs;
        }
        if let Some(params) = self.params {
            for (key, value) in params {
                if value.is_empty() {
                    config.params.remove(&key);
                } else {
                    config.params.insert(key, value);
                }
            }
        }
        Ok(())
    }
}

pub fn validate_refresh_interval(secs: u64) -> Result<(), CoreError> {
    if (MIN_REFRESH_INTERVAL_SECS..=MAX_REFRESH_INTERVAL_SECS).contains(&secs) {
        Ok(())
    } else {
        Err(CoreError::InvalidConfig(format!(
            "refresh_interval_secs must be between {MIN_REFRESH_INTERVAL_SECS} and \
             {MAX_REFRESH_INTERVAL_SECS}, got {secs}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Opaque user identity supplied by the auth gate once per connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: DbId,
    pub role: String,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}
