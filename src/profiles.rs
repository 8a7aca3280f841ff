//! Dashboard endpoint profiles: a JSON mapping of profile name ->
//! { api_base, ws_url } stored under the XDG config dir
//! ($XDG_CONFIG_HOME/fleetdeck/profiles.json, fallback
//! ~/.config/fleetdeck/profiles.json).

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProfileEntry {
    pub api_base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ws_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileEntry>,
    #[serde(default)]
    pub version: u32,
}

pub fn config_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join("fleetdeck")
    } else {
        dirs_next::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fleetdeck")
    }
}

pub fn profiles_path() -> PathBuf {
    config_dir().join("profiles.json")
}

pub fn load_profiles() -> ProfilesFile {
    match fs::read_to_string(profiles_path()) {
        Ok(s) => serde_json::from_str(&s).unwrap_or_default(),
        Err(_) => ProfilesFile::default(),
    }
}

pub fn save_profiles(p: &ProfilesFile) -> std::io::Result<()> {
    let path = profiles_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_vec_pretty(p).unwrap_or_default();
    fs::write(path, data)
}

pub enum ResolveProfile {
    /// Use the provided runtime inputs (maybe persisted by the caller).
    Direct(ProfileEntry),
    /// Loaded from an existing profile entry.
    Loaded(ProfileEntry),
    /// Should prompt the user to select among profile names.
    PromptSelect(Vec<String>),
    /// Should prompt the user to create the named profile.
    PromptCreate(String),
    /// Nothing to resolve (no arguments, no profiles).
    None,
}

pub struct ProfileRequest {
    pub profile_name: Option<String>,
    pub api_base: Option<String>,
    pub ws_url: Option<String>,
}

impl ProfileRequest {
    pub fn resolve(self, pf: &ProfilesFile) -> ResolveProfile {
        // Only a profile name given: load it or offer to create it.
        if self.api_base.is_none() {
            if let Some(name) = self.profile_name {
                return match pf.profiles.get(&name) {
                    Some(entry) => ResolveProfile::Loaded(entry.clone()),
                    None => ResolveProfile::PromptCreate(name),
                };
            }
        }
        // A base URL given: use it directly.
        if let Some(api_base) = self.api_base {
            return ResolveProfile::Direct(ProfileEntry {
                api_base,
                ws_url: self.ws_url,
            });
        }
        // Nothing given: select among saved profiles, if any.
        if pf.profiles.is_empty() {
            ResolveProfile::None
        } else {
            ResolveProfile::PromptSelect(pf.profiles.keys().cloned().collect())
        }
    }
}
