//! Chrome profile discovery and the throwaway copy a session runs against.
//!
//! Chrome refuses a second instance on a user-data-dir that is already open,
//! so a session never points at the real directory. It gets a temp dir holding
//! just the files that carry the signed-in state.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{BrowserSessionError, Result};

/// Files inside a profile directory that carry login state.
const PROFILE_FILES: &[&str] = &[
    "Preferences",
    "Cookies",
    "Network/Cookies",
    "Login Data",
    "Web Data",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromeProfile {
    /// Directory name under the user-data-dir, e.g. "Default" or "Profile 1".
    pub directory: String,
    /// Display name shown in Chrome's profile picker.
    pub name: String,
    pub email: Option<String>,
}

/// Platform default Chrome user-data-dir.
pub fn default_user_data_dir() -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        dirs::data_local_dir().map(|d| d.join("Google").join("Chrome").join("User Data"))
    } else if cfg!(target_os = "macos") {
        dirs::home_dir().map(|d| d.join("Library/Application Support/Google/Chrome"))
    } else {
        dirs::config_dir().map(|d| d.join("google-chrome"))
    }
}

/// List the profiles registered in `Local State`.
pub fn list_profiles(user_data_dir: &Path) -> Result<Vec<ChromeProfile>> {
    let local_state = user_data_dir.join("Local State");
    let raw = std::fs::read_to_string(&local_state)?;
    let state: Value = serde_json::from_str(&raw)?;

    let Some(cache) = state
        .get("profile")
        .and_then(|p| p.get("info_cache"))
        .and_then(Value::as_object)
    else {
        return Ok(Vec::new());
    };

    let mut profiles: Vec<ChromeProfile> = cache
        .iter()
        .map(|(directory, info)| {
            let name = info
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or(directory)
                .to_string();
            let email = info
                .get("user_name")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .or_else(|| preferences_email(&user_data_dir.join(directory)));
            ChromeProfile {
                directory: directory.clone(),
                name,
                email,
            }
        })
        .collect();
    profiles.sort_by(|a, b| a.directory.cmp(&b.directory));
    Ok(profiles)
}

/// Account email recorded in a profile's `Preferences`, if signed in.
fn preferences_email(profile_dir: &Path) -> Option<String> {
    let raw = std::fs::read_to_string(profile_dir.join("Preferences")).ok()?;
    let prefs: Value = serde_json::from_str(&raw).ok()?;

    prefs
        .get("account_info")
        .and_then(Value::as_array)
        .and_then(|accounts| accounts.first())
        .and_then(|a| a.get("email"))
        .and_then(Value::as_str)
        .or_else(|| {
            prefs
                .get("signin")
                .and_then(|s| s.get("AllowedUsername"))
                .and_then(Value::as_str)
        })
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Profile whose signed-in account matches `email` (case-insensitive).
pub fn find_profile_by_email(user_data_dir: &Path, email: &str) -> Result<ChromeProfile> {
    let wanted = email.trim().to_lowercase();
    list_profiles(user_data_dir)?
        .into_iter()
        .find(|p| {
            p.email
                .as_deref()
                .is_some_and(|e| e.to_lowercase().contains(&wanted))
        })
        .ok_or_else(|| BrowserSessionError::ProfileNotFound(email.to_string()))
}

/// Copy `Local State` plus the login-bearing files of `profile_dir` into `target`.
/// Missing files are skipped; a profile that was never used has no cookies yet.
pub fn copy_profile(user_data_dir: &Path, profile_dir: &str, target: &Path) -> Result<usize> {
    let mut copied = 0;

    let local_state = user_data_dir.join("Local State");
    if local_state.exists() {
        std::fs::copy(&local_state, target.join("Local State"))?;
        copied += 1;
    }

    let source = user_data_dir.join(profile_dir);
    let dest = target.join(profile_dir);
    for file in PROFILE_FILES {
        let from = source.join(file);
        if !from.exists() {
            debug!(file, profile_dir, "Profile file absent, skipping");
            continue;
        }
        let to = dest.join(file);
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)?;
        }
        match std::fs::copy(&from, &to) {
            Ok(_) => copied += 1,
            // Chrome holds an exclusive lock on Cookies on Windows while running.
            Err(e) => warn!(file, error = %e, "Could not copy profile file"),
        }
    }

    Ok(copied)
}
