use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::domain::TenantId;

const DEFAULT_RETURN_WINDOW_DAYS: u32 = 30;
const DEFAULT_MAX_RETURNS_PER_CUSTOMER: u32 = 3;
const DEFAULT_MAX_RETURN_VALUE_PERCENT: f64 = 80.0;
const DEFAULT_AUTO_FLAG_THRESHOLD: u32 = 2;

/// Per-tenant return configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenantPolicy {
    pub return_window_days: u32,
    pub allow_exchanges: bool,
    pub auto_approve_returns: bool,
    pub require_photos: bool,
    /// Additional order tags that mark an order as non-returnable.
    pub no_return_tags: Vec<String>,
    pub fraud_prevention: FraudPreventionSettings,
}

impl Default for TenantPolicy {
    fn default() -> Self {
        Self {
            return_window_days: DEFAULT_RETURN_WINDOW_DAYS,
            allow_exchanges: true,
            auto_approve_returns: false,
            require_photos: false,
            no_return_tags: Vec::new(),
            fraud_prevention: FraudPreventionSettings::default(),
        }
    }
}

impl TenantPolicy {
    /// Replace nonsensical values with documented defaults.
    pub fn sanitized(mut self) -> Self {
        let fraud = &mut self.fraud_prevention;
        if !(fraud.max_return_value_percent.is_finite() && fraud.max_return_value_percent > 0.0) {
            fraud.max_return_value_percent = DEFAULT_MAX_RETURN_VALUE_PERCENT;
        }
        if fraud.auto_flag_threshold == 0 {
            fraud.auto_flag_threshold = DEFAULT_AUTO_FLAG_THRESHOLD;
        }
        if fraud.max_returns_per_customer == 0 {
            fraud.max_returns_per_customer = DEFAULT_MAX_RETURNS_PER_CUSTOMER;
        }
        self.no_return_tags.retain(|tag| !tag.trim().is_empty());
        self
    }
}

/// Fraud screening dials for a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FraudPreventionSettings {
    pub enabled: bool,
    pub max_returns_per_customer: u32,
    pub max_return_value_percent: f64,
    pub auto_flag_threshold: u32,
    pub patterns: FraudPatternToggles,
}

impl Default for FraudPreventionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_returns_per_customer: DEFAULT_MAX_RETURNS_PER_CUSTOMER,
            max_return_value_percent: DEFAULT_MAX_RETURN_VALUE_PERCENT,
            auto_flag_threshold: DEFAULT_AUTO_FLAG_THRESHOLD,
            patterns: FraudPatternToggles::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FraudPatternToggles {
    pub frequent_returns: bool,
    pub high_value: bool,
    pub no_receipt: bool,
    pub new_account: bool,
    pub address_mismatch: bool,
}

impl Default for FraudPatternToggles {
    fn default() -> Self {
        Self {
            frequent_returns: true,
            high_value: true,
            no_receipt: true,
            new_account: true,
            address_mismatch: true,
        }
    }
}

/// Read-only source of tenant policies. Must be re-read per request.
pub trait PolicyResolver: Send + Sync {
    fn policy(&self, tenant: &TenantId) -> TenantPolicy;
}

/// Policy table loaded once at startup, falling back to defaults for unknown tenants.
#[derive(Debug, Clone, Default)]
pub struct StaticPolicyResolver {
    fallback: TenantPolicy,
    tenants: HashMap<TenantId, TenantPolicy>,
}

#[derive(Debug, Default, Deserialize)]
struct PolicyDocument {
    #[serde(default)]
    default: Option<TenantPolicy>,
    #[serde(default)]
    tenants: HashMap<String, TenantPolicy>,
}

impl StaticPolicyResolver {
    pub fn new(fallback: TenantPolicy) -> Self {
        Self {
            fallback: fallback.sanitized(),
            tenants: HashMap::new(),
        }
    }

    pub fn with_tenant(mut self, tenant: TenantId, policy: TenantPolicy) -> Self {
        self.tenants.insert(tenant, policy.sanitized());
        self
    }

    /// Parse `{ "default": {...}, "tenants": { "<id>": {...} } }`; omitted fields take defaults.
    pub fn from_reader<T: Read>(reader: T) -> Result<Self, PolicyLoadError> {
        let document: PolicyDocument = serde_json::from_reader(reader)?;
        let mut resolver = Self::new(document.default.unwrap_or_default());
        for (tenant, policy) in document.tenants {
            if tenant.trim().is_empty() {
                return Err(PolicyLoadError::EmptyTenantId);
            }
            resolver = resolver.with_tenant(TenantId(tenant), policy);
        }
        Ok(resolver)
    }

    pub fn from_path(path: &Path) -> Result<Self, PolicyLoadError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn tenant_count(&self) -> usize {
        self.tenants.len()
    }
}

impl PolicyResolver for StaticPolicyResolver {
    fn policy(&self, tenant: &TenantId) -> TenantPolicy {
        self.tenants
            .get(tenant)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyLoadError {
    #[error("unable to read tenant policy file: {0}")]
    Io(#[from] std::io::Error),
    #[error("tenant policy file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("tenant policy entries require a non-empty tenant id")]
    EmptyTenantId,
}
