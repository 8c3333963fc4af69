//! The storage shim evaluated ahead of the engine scripts.
//!
//! Desktop pages have no extension storage, so the shim provides a
//! `chrome.storage.sync` backed by one `localStorage` entry and seeds it
//! with the presets switched on the first time it runs.

use crate::error::Result;
use crate::settings::{Settings, presets};

/// Settings written into an empty store: every preset, enabled.
pub fn seed_settings() -> Settings {
    Settings {
        custom_rules: presets()
            .into_iter()
            .map(|mut rule| {
                rule.enabled = true;
                rule
            })
            .collect(),
        ..Settings::default()
    }
}

/// JavaScript installing the storage shim under `key`, seeded with `seed`.
pub fn storage_shim(key: &str, seed: &Settings) -> Result<String> {
    let key = serde_json::to_string(key)?;
    let seed = serde_json::to_string(seed)?;
    Ok(format!(
        r#"(() => {{
  const KEY = {key};
  const load = () => {{
    try {{
      return JSON.parse(localStorage.getItem(KEY) || "{{}}");
    }} catch (_) {{
      return {{}};
    }}
  }};
  const save = (record) => localStorage.setItem(KEY, JSON.stringify(record));
  window.chrome = window.chrome || {{}};
  window.chrome.storage = {{
    sync: {{
      get: (defaults) => {{
        const base = defaults && typeof defaults === "object" && !Array.isArray(defaults) ? defaults : {{}};
        return Promise.resolve({{ ...base, ...load() }});
      }},
      set: (entries) => {{
        save({{ ...load(), ...entries }});
        return Promise.resolve();
      }},
      remove: (keys) => {{
        const record = load();
        [].concat(keys).forEach((name) => delete record[name]);
        save(record);
        return Promise.resolve();
      }},
    }},
  }};
  window.chrome.runtime = {{ onMessage: {{ addListener: () => {{}} }} }};
  if (localStorage.getItem(KEY) === null) {{
    save({seed});
  }}
}})();"#
    ))
}
