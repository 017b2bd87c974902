// ─── Identity Matcher ───
// Decides whether a local jar already represents a configured entry.

use super::model::ModEntry;

/// Known identifiers and the extra name tokens their jars ship under.
struct Alias {
    id: &'static str,
    tokens: &'static [&'static str],
    /// Core mods whose companion addons share their prefix.
    exact_prefix: bool,
}

const ALIASES: &[Alias] = &[
    // Modrinth project ids
    Alias { id: "P7dR8mSH", tokens: &["fabric-api", "fabricapi"], exact_prefix: false },
    Alias { id: "AANobbMI", tokens: &["sodium-fabric"], exact_prefix: true },
    Alias { id: "gvQqBUqZ", tokens: &["lithium"], exact_prefix: false },
    Alias { id: "rAfhHfow", tokens: &["phosphor"], exact_prefix: false },
    Alias { id: "YL57xq9U", tokens: &["iris", "iris-shaders"], exact_prefix: false },
    Alias { id: "mOgUt4GM", tokens: &["modmenu", "mod-menu"], exact_prefix: false },
    Alias { id: "nfn13YXA", tokens: &["rei", "roughlyenoughitems"], exact_prefix: false },
    Alias { id: "Orvt0mRa", tokens: &["indium"], exact_prefix: false },
    // CurseForge project ids
    Alias { id: "419699", tokens: &["fabric-api", "fabricapi"], exact_prefix: false },
    Alias { id: "394468", tokens: &["sodium"], exact_prefix: true },
    Alias { id: "360438", tokens: &["lithium"], exact_prefix: false },
    Alias { id: "372124", tokens: &["phosphor"], exact_prefix: false },
    Alias { id: "455508", tokens: &["iris", "iris-shaders"], exact_prefix: false },
    Alias { id: "308702", tokens: &["modmenu", "mod-menu"], exact_prefix: false },
    Alias { id: "310111", tokens: &["rei", "roughlyenoughitems"], exact_prefix: false },
    Alias { id: "459496", tokens: &["indium"], exact_prefix: false },
    Alias { id: "325471", tokens: &["jei", "justenoughitems"], exact_prefix: false },
    Alias { id: "238222", tokens: &["journeymap"], exact_prefix: false },
];

/// Tokens that mark an addon of an exact-prefix mod (Sodium Extra, Reese's Sodium Options).
const EXCLUSION_TOKENS: &[&str] = &["extra", "options", "reeses"];

fn alias_for(id: &str) -> Option<&'static Alias> {
    ALIASES.iter().find(|a| a.id == id)
}

/// Lower-cased name variants the entry may appear under in a file name.
pub fn name_variants(entry: &ModEntry) -> Vec<String> {
    let mut variants = vec![entry.name.to_lowercase()];
    if let Some(alias) = alias_for(&entry.id) {
        variants.extend(alias.tokens.iter().map(|t| t.to_lowercase()));
    }

    let spaced: Vec<String> = variants.iter().filter(|v| v.contains(' ')).cloned().collect();
    for variant in spaced {
        variants.push(variant.replace(' ', "-"));
        variants.push(variant.replace(' ', "_"));
        variants.push(variant.replace(' ', ""));
    }

    let mut seen = std::collections::HashSet::new();
    variants.retain(|v| !v.is_empty() && seen.insert(v.clone()));
    variants
}

/// True when `file_name` already represents `entry`.
///
/// Entries with a pinned file name (GitHub) match that name exactly,
/// ignoring case. Everything else goes through the name-variant heuristic.
pub fn matches(file_name: &str, entry: &ModEntry) -> bool {
    let file = file_name.to_lowercase();

    if let Some(pinned) = &entry.file_name {
        return file == pinned.to_lowercase();
    }

    let variants = name_variants(entry);

    if alias_for(&entry.id).is_some_and(|a| a.exact_prefix) {
        if EXCLUSION_TOKENS.iter().any(|t| file.contains(t)) {
            return false;
        }
        return variants
            .iter()
            .any(|v| file.starts_with(&format!("{v}-")) || file == format!("{v}.jar"));
    }

    variants.iter().any(|v| file.contains(v.as_str()))
}

/// First file in `files` that represents `entry`, if any.
pub fn find_match<'a, I>(files: I, entry: &ModEntry) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    files.into_iter().find(|f| matches(f, entry))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sodium() -> ModEntry {
        ModEntry::new("Sodium", "AANobbMI")
    }

    #[test]
    fn spaced_names_expand_to_separator_variants() {
        let variants = name_variants(&ModEntry::new("Dynamic FPS", "LQ3K71Q1"));
        assert!(variants.contains(&"dynamic fps".to_string()));
        assert!(variants.contains(&"dynamic-fps".to_string()));
        assert!(variants.contains(&"dynamic_fps".to_string()));
        assert!(variants.contains(&"dynamicfps".to_string()));
    }

    #[test]
    fn alias_tokens_are_included() {
        let variants = name_variants(&ModEntry::new("Roughly Enough Items", "nfn13YXA"));
        assert!(variants.contains(&"rei".to_string()));
        assert!(variants.contains(&"roughlyenoughitems".to_string()));
    }

    #[test]
    fn matching_ignores_case_and_extension_case() {
        let entry = ModEntry::new("Lithium", "gvQqBUqZ");
        assert!(matches("Lithium-Fabric-0.11.2.JAR", &entry));
        assert!(matches("lithium-fabric-0.11.2.jar", &entry));
        assert_eq!(matches("Mod.JAR", &ModEntry::new("mod", "x")), matches("mod.jar", &ModEntry::new("mod", "x")));
    }

    #[test]
    fn fabric_api_matches_by_alias() {
        let entry = ModEntry::new("Fabric API", "P7dR8mSH");
        assert!(matches("fabric-api-0.92.0.jar", &entry));
    }

    #[test]
    fn sodium_rejects_its_addons() {
        assert!(!matches("sodium-extra-0.5.jar", &sodium()));
        assert!(!matches("reeses-sodium-options-1.7.jar", &sodium()));
        assert!(!matches("sodium-options-1.0.jar", &sodium()));
    }

    #[test]
    fn sodium_requires_prefix() {
        assert!(matches("sodium-fabric-0.5.8+mc1.20.1.jar", &sodium()));
        assert!(matches("Sodium.jar", &sodium()));
        assert!(!matches("my-sodium-fork.jar", &sodium()));
    }

    #[test]
    fn curseforge_sodium_is_exact_prefix_too() {
        let entry = ModEntry::new("Sodium", "394468");
        assert!(matches("sodium-mc1.20.1-0.5.3.jar", &entry));
        assert!(!matches("sodium-extra-mc1.20.1.jar", &entry));
    }

    #[test]
    fn pinned_file_name_matches_exactly() {
        let entry = ModEntry::new("Custom Mod", "owner/repo").with_file_name("custom-mod-v1.jar");
        assert!(matches("Custom-Mod-V1.jar", &entry));
        assert!(!matches("custom-mod-v2.jar", &entry));
    }

    #[test]
    fn find_match_returns_first_hit() {
        let files = ["cloth-config-11.1.jar", "fabric-api-0.92.0.jar"];
        let entry = ModEntry::new("Fabric API", "P7dR8mSH");
        assert_eq!(find_match(files.iter().copied(), &entry), Some("fabric-api-0.92.0.jar"));
        assert_eq!(find_match(files.iter().copied(), &sodium()), None);
    }
}
