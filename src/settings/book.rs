//! The rule editor: the only component that writes settings.

use serde_json::{Map, Value};

use crate::error::{EmbedError, Result};
use crate::handle::EngineSender;
use crate::rules::compile_pattern;
use crate::settings::{
    CUSTOM_RULES_KEY, LEGACY_KINESCOPE_KEY, Notifier, Rule, Settings, SettingsStore, THEME_KEY,
    Theme, heal_presets, presets,
};

/// Editable view of the persisted rule list.
///
/// Opening a `RuleBook` migrates legacy records and restores missing presets.
/// Every successful edit is written to the store and then pushed to all
/// subscribed engines as a `SETTINGS_UPDATED` message.
///
/// # Example
///
/// ```rust,no_run
/// use tana_tweaks::{MemoryStore, RuleBook};
///
/// # async fn example() -> tana_tweaks::Result<()> {
/// let mut book = RuleBook::open(MemoryStore::new()).await?;
/// let id = book
///     .add_rule(
///         "YouTube",
///         r"youtube\.com/watch\?v=([\w-]+)",
///         r#"<iframe src="https://www.youtube.com/embed/{{match1}}"></iframe>"#,
///     )
///     .await?;
/// book.set_enabled(&id, false).await?;
/// # Ok(())
/// # }
/// ```
pub struct RuleBook<S: SettingsStore> {
    store: S,
    settings: Settings,
    notifier: Notifier,
}

impl<S: SettingsStore> RuleBook<S> {
    /// Load the rule list from `store`, migrating and healing it if needed.
    pub async fn open(store: S) -> Result<Self> {
        let stored: Vec<Rule> = match store.get(CUSTOM_RULES_KEY).await? {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => serde_json::from_value(value)?,
        };
        let theme = store
            .get(THEME_KEY)
            .await?
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();

        let custom_rules = match store.get(LEGACY_KINESCOPE_KEY).await? {
            Some(flag) => {
                tracing::info!("Migrating legacy settings");
                let rules = migrate_legacy(flag.as_bool().unwrap_or(false), stored);
                store.remove(LEGACY_KINESCOPE_KEY).await?;
                store.set(rules_entry(&rules)?).await?;
                rules
            }
            None => {
                let mut rules = stored;
                if heal_presets(&mut rules) {
                    store.set(rules_entry(&rules)?).await?;
                }
                rules
            }
        };

        Ok(Self {
            store,
            settings: Settings {
                custom_rules,
                theme,
            },
            notifier: Notifier::new(),
        })
    }

    /// Current settings, as last persisted.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Rules in stored order.
    pub fn rules(&self) -> &[Rule] {
        &self.settings.custom_rules
    }

    /// Look up a rule by id.
    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.settings.custom_rules.iter().find(|r| r.id == id)
    }

    /// Push future edits to the engine behind `sender`.
    pub fn subscribe(&mut self, sender: EngineSender) {
        self.notifier.subscribe(sender);
    }

    /// Append a new enabled user rule and return its generated id.
    pub async fn add_rule(&mut self, name: &str, pattern: &str, template: &str) -> Result<String> {
        let (name, pattern, template) = validate(name, pattern, template)?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        let mut rules = self.settings.custom_rules.clone();
        rules.push(Rule {
            id: id.clone(),
            name,
            enabled: true,
            pattern,
            embed_template: template,
            is_preset: false,
        });
        self.commit(rules).await?;
        Ok(id)
    }

    /// Replace the name, pattern and template of a user rule.
    pub async fn update_rule(
        &mut self,
        id: &str,
        name: &str,
        pattern: &str,
        template: &str,
    ) -> Result<()> {
        let (name, pattern, template) = validate(name, pattern, template)?;
        let mut rules = self.settings.custom_rules.clone();
        let rule = unlocked_rule(&mut rules, id)?;
        rule.name = name;
        rule.pattern = pattern;
        rule.embed_template = template;
        self.commit(rules).await
    }

    /// Delete a user rule. Presets cannot be deleted.
    pub async fn delete_rule(&mut self, id: &str) -> Result<()> {
        let mut rules = self.settings.custom_rules.clone();
        unlocked_rule(&mut rules, id)?;
        rules.retain(|r| r.id != id);
        self.commit(rules).await
    }

    /// Enable or disable any rule, presets included.
    pub async fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<()> {
        let mut rules = self.settings.custom_rules.clone();
        find_rule(&mut rules, id)?.enabled = enabled;
        self.commit(rules).await
    }

    /// Persist the UI theme. Engines are not notified; the theme does not
    /// affect embedding.
    pub async fn set_theme(&mut self, theme: Theme) -> Result<()> {
        let mut entries = Map::new();
        entries.insert(THEME_KEY.into(), serde_json::to_value(theme)?);
        self.store.set(entries).await?;
        self.settings.theme = theme;
        Ok(())
    }

    /// Store `rules`, then adopt and broadcast them. A failed write leaves
    /// the book unchanged.
    async fn commit(&mut self, rules: Vec<Rule>) -> Result<()> {
        self.store.set(rules_entry(&rules)?).await?;
        self.settings.custom_rules = rules;
        let delivered = self.notifier.broadcast(&self.settings);
        tracing::debug!("Settings saved, notified {delivered} engines");
        Ok(())
    }
}

fn find_rule<'a>(rules: &'a mut [Rule], id: &str) -> Result<&'a mut Rule> {
    rules
        .iter_mut()
        .find(|r| r.id == id)
        .ok_or_else(|| EmbedError::RuleNotFound(id.to_string()))
}

fn unlocked_rule<'a>(rules: &'a mut [Rule], id: &str) -> Result<&'a mut Rule> {
    let rule = find_rule(rules, id)?;
    if rule.is_preset {
        return Err(EmbedError::PresetLocked(id.to_string()));
    }
    Ok(rule)
}

/// Presets first (Kinescope enabled iff the legacy flag was set), then the
/// user's own rules. Stale preset copies from the old list are discarded.
fn migrate_legacy(kinescope_enabled: bool, stored: Vec<Rule>) -> Vec<Rule> {
    let mut rules = presets();
    if kinescope_enabled {
        if let Some(kinescope) = rules.iter_mut().find(|r| r.id == "preset-kinescope") {
            kinescope.enabled = true;
        }
    }
    rules.extend(
        stored
            .into_iter()
            .filter(|r| !r.is_preset && !r.id.starts_with("preset-")),
    );
    rules
}

fn rules_entry(rules: &[Rule]) -> Result<Map<String, Value>> {
    let mut entries = Map::new();
    entries.insert(CUSTOM_RULES_KEY.into(), serde_json::to_value(rules)?);
    Ok(entries)
}

fn validate(name: &str, pattern: &str, template: &str) -> Result<(String, String, String)> {
    let (name, pattern, template) = (name.trim(), pattern.trim(), template.trim());
    if name.is_empty() {
        return Err(EmbedError::InvalidRule("rule name is empty".into()));
    }
    if pattern.is_empty() {
        return Err(EmbedError::InvalidRule("URL pattern is empty".into()));
    }
    if let Err(e) = compile_pattern(pattern) {
        return Err(EmbedError::InvalidRule(format!("invalid regex pattern: {e}")));
    }
    if template.is_empty() {
        return Err(EmbedError::InvalidRule("embed template is empty".into()));
    }
    Ok((name.to_string(), pattern.to_string(), template.to_string()))
}
