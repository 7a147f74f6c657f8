// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./nudge.toml` > `~/.config/nudge/nudge.toml` > `/etc/nudge/nudge.toml`
//! with environment variable overrides via `NUDGE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::NudgeConfig;

/// Config sections addressable from `NUDGE_<SECTION>_<KEY>` variables.
const ENV_SECTIONS: &[&str] = &[
    "agent",
    "mode",
    "router",
    "responder",
    "followup",
    "storage",
    "gateway",
    "channel",
    "prometheus",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/nudge/nudge.toml` (system-wide)
/// 3. `~/.config/nudge/nudge.toml` (user XDG config)
/// 4. `./nudge.toml` (local directory)
/// 5. `NUDGE_*` environment variables
pub fn load_config() -> Result<NudgeConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<NudgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(NudgeConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<NudgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(NudgeConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(NudgeConfig::default()))
        .merge(Toml::file("/etc/nudge/nudge.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("nudge/nudge.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("nudge.toml"))
        .merge(env_provider())
}

/// Environment provider mapping `NUDGE_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `NUDGE_RESPONDER_MAX_ATTEMPTS` maps to `responder.max_attempts`.
fn env_provider() -> Env {
    Env::prefixed("NUDGE_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("mode_ads_only"), "mode.ads_only");
        assert_eq!(
            map_env_key("responder_max_attempts"),
            "responder.max_attempts"
        );
        assert_eq!(
            map_env_key("followup_sweep_interval_secs"),
            "followup.sweep_interval_secs"
        );
        assert_eq!(map_env_key("unknown"), "unknown");
    }

    #[test]
    fn env_overrides_file_values() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("nudge.toml", "[mode]\nads_only = false\n")?;
            jail.set_env("NUDGE_MODE_ADS_ONLY", "true");
            jail.set_env("NUDGE_GATEWAY_PORT", "9000");
            let config = load_config_from_path(Path::new("nudge.toml"))?;
            assert!(config.mode.ads_only);
            assert_eq!(config.gateway.port, 9000);
            Ok(())
        });
    }
}
