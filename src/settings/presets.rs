//! Built-in rules shipped with the extension.

use crate::settings::Rule;

fn preset(id: &str, name: &str, pattern: &str, embed_template: &str) -> Rule {
    Rule {
        id: id.to_string(),
        name: name.to_string(),
        enabled: false,
        pattern: pattern.to_string(),
        embed_template: embed_template.to_string(),
        is_preset: true,
    }
}

/// The built-in rules, all disabled, in display order.
pub fn presets() -> Vec<Rule> {
    vec![
        preset(
            "preset-kinescope",
            "Kinescope",
            r"kinescope\.io/(?:embed/)?([a-zA-Z0-9_-]+)",
            r#"<iframe src="https://kinescope.io/embed/{{match1}}" allow="autoplay; fullscreen; picture-in-picture; encrypted-media; gyroscope; accelerometer; clipboard-write; screen-wake-lock;" allowfullscreen></iframe>"#,
        ),
        preset(
            "preset-vk",
            "VK Video",
            r"vkvideo\.ru/video(\d+)_(\d+)",
            r#"<iframe src="https://vkvideo.ru/video_ext.php?oid={{match1}}&id={{match2}}" allow="autoplay; encrypted-media; fullscreen; picture-in-picture" allowfullscreen></iframe>"#,
        ),
        preset(
            "preset-wistia",
            "Wistia",
            r"wistia\.com/medias/([a-zA-Z0-9]+)",
            r#"<iframe src="https://fast.wistia.net/embed/iframe/{{match1}}" allow="autoplay; fullscreen" allowfullscreen></iframe>"#,
        ),
        preset(
            "preset-loom",
            "Loom",
            r"loom\.com/share/([a-zA-Z0-9]+)",
            r#"<iframe src="https://www.loom.com/embed/{{match1}}" allowfullscreen></iframe>"#,
        ),
    ]
}

/// Re-insert every preset missing from `rules`, disabled, at the front of the
/// list. Existing rules keep their order and state.
///
/// Returns `true` if anything was inserted.
pub fn heal_presets(rules: &mut Vec<Rule>) -> bool {
    let mut healed = false;
    for preset in presets() {
        if !rules.iter().any(|r| r.id == preset.id) {
            tracing::debug!("Restoring missing preset {}", preset.id);
            rules.insert(0, preset);
            healed = true;
        }
    }
    healed
}
