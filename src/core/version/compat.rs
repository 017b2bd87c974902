// ─── Game Version Compatibility ───
// Backward-compatible predecessors tried when a mod has no build for the
// exact game version. Order matters: nearest patch first, bare minor last.

const COMPATIBILITY: &[(&str, &[&str])] = &[
    ("1.19.2", &["1.19.1", "1.19"]),
    ("1.19.1", &["1.19"]),
    ("1.20.1", &["1.20"]),
    ("1.20.2", &["1.20.1", "1.20"]),
    ("1.20.3", &["1.20.2", "1.20.1", "1.20"]),
    ("1.20.4", &["1.20.3", "1.20.2", "1.20.1", "1.20"]),
    ("1.20.5", &["1.20.4", "1.20.3", "1.20.2", "1.20.1", "1.20"]),
    ("1.20.6", &["1.20.5", "1.20.4", "1.20.3", "1.20.2", "1.20.1", "1.20"]),
    ("1.21.1", &["1.21"]),
    ("1.21.2", &["1.21.1", "1.21"]),
    ("1.21.3", &["1.21.2", "1.21.1", "1.21"]),
    ("1.21.4", &["1.21.3", "1.21.2", "1.21.1", "1.21"]),
    ("1.21.5", &["1.21.4", "1.21.3", "1.21.2", "1.21.1", "1.21"]),
    ("1.21.6", &["1.21.5", "1.21.4", "1.21.3", "1.21.2", "1.21.1", "1.21"]),
    ("1.21.7", &["1.21.6", "1.21.5", "1.21.4", "1.21.3", "1.21.2", "1.21.1", "1.21"]),
];

/// Fallback versions for `game_version`, empty when none are declared.
pub fn fallback_versions(game_version: &str) -> &'static [&'static str] {
    COMPATIBILITY
        .iter()
        .find(|(version, _)| *version == game_version)
        .map(|(_, fallbacks)| *fallbacks)
        .unwrap_or(&[])
}

/// The exact version followed by its fallbacks, in search order.
pub fn search_order(game_version: &str) -> Vec<String> {
    std::iter::once(game_version)
        .chain(fallback_versions(game_version).iter().copied())
        .map(str::to_string)
        .collect()
}
