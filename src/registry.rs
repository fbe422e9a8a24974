//! Engine registry
//!
//! Static table of guest engines, looked up by id. The built-in table covers
//! the engines shipped in the guest image; V-Slice mods are located by root
//! detection, every other engine extracts archives as-is.

use crate::error::{Error, Result};
use crate::types::{EngineProfile, InstallStrategy};
use std::collections::HashSet;

/// Immutable lookup table of engine profiles
#[derive(Clone, Debug)]
pub struct EngineRegistry {
    engines: Vec<EngineProfile>,
}

impl EngineRegistry {
    /// Build a registry from a list of profiles
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if two profiles share an id.
    pub fn new(engines: Vec<EngineProfile>) -> Result<Self> {
        let mut seen = HashSet::new();
        for engine in &engines {
            if !seen.insert(engine.id.clone()) {
                return Err(Error::Config {
                    message: format!("duplicate engine id {:?}", engine.id),
                    key: Some("engines".to_string()),
                });
            }
        }
        Ok(Self { engines })
    }

    /// Registry holding the built-in engine table
    pub fn builtin() -> Self {
        Self {
            engines: builtin_engines(),
        }
    }

    /// Look up an engine by id
    pub fn lookup(&self, id: &str) -> Option<&EngineProfile> {
        self.engines.iter().find(|engine| engine.id == id)
    }

    /// All registered engines, in registration order
    pub fn list(&self) -> &[EngineProfile] {
        &self.engines
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// The engines available in the stock guest image
pub fn builtin_engines() -> Vec<EngineProfile> {
    use InstallStrategy::{DirectExtract, RootDetect};

    vec![
        EngineProfile::new(
            "pslice",
            "P-Slice Engine",
            "Psych Engine fork with V-Slice features.",
            "/usr/local/bin/P-Slice Engine/Funkin",
            DirectExtract,
        ),
        EngineProfile::new(
            "vslice",
            "V-Slice (Funkin)",
            "The actively developed base game with PolyMod support.",
            "/usr/local/bin/V-Slice (Funkin)/Funkin",
            RootDetect,
        ),
        EngineProfile::new(
            "psychonline",
            "Psych Online",
            "Psych Engine 0.7.3 with online multiplayer.",
            "/usr/local/bin/Psych Online/Funkin",
            DirectExtract,
        ),
        EngineProfile::new(
            "novaflare",
            "NovaFlare Engine",
            "Engine with online multiplayer support.",
            "/usr/local/bin/NovaFlare Engine/Funkin",
            DirectExtract,
        ),
        EngineProfile::new(
            "psych104",
            "Psych Engine 1.0.4",
            "Latest version of Psych Engine.",
            "/usr/local/bin/Psych Engine 1.0.4/Funkin",
            DirectExtract,
        ),
        EngineProfile::new(
            "psych073",
            "Psych Engine 0.7.3",
            "A stable and popular version of Psych Engine.",
            "/usr/local/bin/Psych Engine 0.7.3/Funkin",
            DirectExtract,
        ),
        EngineProfile::new(
            "psych063",
            "Psych Engine 0.6.3",
            "Classic version of Psych Engine.",
            "/usr/local/bin/Psych Engine 0.6.3/Funkin",
            DirectExtract,
        ),
        EngineProfile::new(
            "shadow",
            "Shadow Engine",
            "A modified version of Psych Engine 0.7.3.",
            "/usr/local/bin/Shadow Engine/Funkin",
            DirectExtract,
        ),
        EngineProfile::new(
            "codename",
            "Codename Engine",
            "A classic engine.",
            "/usr/local/bin/Codename Engine/Funkin",
            DirectExtract,
        ),
        // Plain X11 shell for poking around the guest
        EngineProfile::new(
            "default",
            "Alpine X11 Shell",
            "Launch a basic Alpine Linux shell for testing.",
            "/usr/bin/xterm",
            DirectExtract,
        ),
    ]
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let registry = EngineRegistry::builtin();
        let vslice = registry.lookup("vslice").unwrap();
        assert_eq!(vslice.install_strategy, InstallStrategy::RootDetect);
        assert_eq!(vslice.executable_path, "/usr/local/bin/V-Slice (Funkin)/Funkin");

        let codename = registry.lookup("codename").unwrap();
        assert_eq!(codename.install_strategy, InstallStrategy::DirectExtract);
    }

    #[test]
    fn test_unknown_id() {
        assert!(EngineRegistry::builtin().lookup("missing").is_none());
    }

    #[test]
    fn test_only_vslice_uses_root_detect() {
        let registry = EngineRegistry::builtin();
        let root_detect: Vec<&str> = registry
            .list()
            .iter()
            .filter(|e| e.install_strategy == InstallStrategy::RootDetect)
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(root_detect, vec!["vslice"]);
    }

    #[test]
    fn test_builtin_executables_are_absolute() {
        for engine in builtin_engines() {
            assert!(
                engine.executable_path.starts_with('/'),
                "{} has a relative executable",
                engine.id
            );
        }
    }

    #[test]
    fn test_new_rejects_duplicates() {
        let mut engines = builtin_engines();
        engines.push(engines[0].clone());
        assert!(matches!(
            EngineRegistry::new(engines),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_list_preserves_order() {
        let registry = EngineRegistry::builtin();
        assert_eq!(registry.list().first().unwrap().id, "pslice");
        assert_eq!(registry.list().last().unwrap().id, "default");
    }
}
