#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::path::PathBuf;

use crm_kernel_contracts::tenant::{SessionToken, TenantId, UserId};

pub const ENV_HTTP_BIND: &str = "CRM_HTTP_BIND";
pub const ENV_STORE_PATH: &str = "CRM_ADAPTER_STORE_PATH";
pub const ENV_PERSISTENCE_ENABLED: &str = "CRM_ADAPTER_PERSISTENCE_ENABLED";
pub const ENV_SESSIONS: &str = "CRM_ADAPTER_SESSIONS";
pub const ENV_LOG_JSON: &str = "CRM_LOG_JSON";

const DEFAULT_HTTP_BIND: &str = "127.0.0.1:8080";
const DEFAULT_STORE_RELATIVE_PATH: &str = ".crm/adapter/contact_fields.jsonl";

/// A session opened at startup so bearer tokens resolve without an external
/// session service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterSessionSeed {
    pub token: SessionToken,
    pub tenant_id: TenantId,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    pub bind: SocketAddr,
    /// `None` keeps the store purely in memory.
    pub journal_path: Option<PathBuf>,
    pub sessions: Vec<AdapterSessionSeed>,
    pub log_json: bool,
}

impl AdapterConfig {
    pub fn from_env_var_map<F>(env_var: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_raw = non_empty(env_var(ENV_HTTP_BIND))
            .unwrap_or_else(|| DEFAULT_HTTP_BIND.to_string());
        let bind: SocketAddr = bind_raw
            .parse()
            .map_err(|err| format!("invalid {ENV_HTTP_BIND} '{bind_raw}': {err}"))?;

        let persistence_enabled = parse_flag(env_var(ENV_PERSISTENCE_ENABLED), true);
        let journal_path = if persistence_enabled {
            Some(
                non_empty(env_var(ENV_STORE_PATH))
                    .map(PathBuf::from)
                    .unwrap_or_else(|| default_adapter_store_path(env_var("HOME"))),
            )
        } else {
            None
        };

        let sessions = match non_empty(env_var(ENV_SESSIONS)) {
            Some(raw) => parse_session_seeds(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            bind,
            journal_path,
            sessions,
            log_json: parse_flag(env_var(ENV_LOG_JSON), false),
        })
    }
}

/// Parses `token=tenant/user` entries separated by commas.
fn parse_session_seeds(raw: &str) -> Result<Vec<AdapterSessionSeed>, String> {
    let mut out = Vec::new();
    for (idx, entry) in raw.split(',').enumerate() {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        // Error messages name the entry position only; tokens stay out of logs.
        let invalid = |what: &str| format!("invalid {ENV_SESSIONS} entry #{}: {what}", idx + 1);
        let (token, principal) = entry
            .split_once('=')
            .ok_or_else(|| invalid("expected token=tenant/user"))?;
        let (tenant, user) = principal
            .split_once('/')
            .ok_or_else(|| invalid("expected token=tenant/user"))?;
        out.push(AdapterSessionSeed {
            token: SessionToken::new(token.trim()).map_err(|_| invalid("bad token"))?,
            tenant_id: TenantId::new(tenant.trim()).map_err(|_| invalid("bad tenant"))?,
            user_id: UserId::new(user.trim()).map_err(|_| invalid("bad user"))?,
        });
    }
    Ok(out)
}

fn parse_flag(raw: Option<String>, default: bool) -> bool {
    match raw {
        Some(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => true,
            "0" | "false" | "off" | "no" => false,
            _ => default,
        },
        None => default,
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn default_adapter_store_path(home: Option<String>) -> PathBuf {
    match non_empty(home) {
        Some(home) => PathBuf::from(home).join(DEFAULT_STORE_RELATIVE_PATH),
        None => PathBuf::from(DEFAULT_STORE_RELATIVE_PATH),
    }
}
