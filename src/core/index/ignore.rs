use std::path::Path;

use glob::{MatchOptions, Pattern};
use tracing::warn;

use crate::core::error::{PackError, PackResult};

/// Per-pack ignore file, one glob per line.
pub const IGNORE_FILE: &str = ".packwizignore";

const DEFAULT_IGNORES: [&str; 9] = [
    ".git/**",
    ".gitattributes",
    ".gitignore",
    ".DS_Store",
    "*.zip",
    "*.mrpack",
    ".packwizignore",
    "packwiz",
    "packwiz.exe",
];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
struct IgnorePattern {
    glob: Pattern,
    /// Contains a `/`, so it is matched against whole relative paths.
    anchored: bool,
    /// Written with a trailing `/`, so it never matches the file itself.
    dir_only: bool,
}

/// Which pack-relative paths the index refresh skips.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    patterns: Vec<IgnorePattern>,
}

impl IgnoreRules {
    /// Built-in rules only.
    pub fn defaults() -> Self {
        let mut rules = Self {
            patterns: Vec::new(),
        };
        for line in DEFAULT_IGNORES {
            rules.push_line(line);
        }
        rules
    }

    /// Built-in rules plus the pack's ignore file, when present.
    pub fn load(pack_root: &Path) -> PackResult<Self> {
        let mut rules = Self::defaults();
        let path = pack_root.join(IGNORE_FILE);
        if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|e| PackError::io(&path, e))?;
            for line in raw.lines() {
                rules.push_line(line);
            }
        }
        Ok(rules)
    }

    fn push_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return;
        }

        let dir_only = line.ends_with('/');
        let body = line.trim_end_matches('/');
        let anchored = body.contains('/');
        let body = body.trim_start_matches('/');

        match Pattern::new(body) {
            Ok(glob) => self.patterns.push(IgnorePattern {
                glob,
                anchored,
                dir_only,
            }),
            Err(e) => warn!("Ignoring invalid pattern '{}': {}", line, e),
        }
    }

    pub fn is_ignored(&self, relative_path: &str) -> bool {
        let components: Vec<&str> = relative_path.split('/').collect();

        self.patterns.iter().any(|pattern| {
            let candidates = if pattern.dir_only {
                components.len().saturating_sub(1)
            } else {
                components.len()
            };

            if pattern.anchored {
                (1..=candidates).any(|end| {
                    pattern
                        .glob
                        .matches_with(&components[..end].join("/"), MATCH_OPTIONS)
                })
            } else {
                components[..candidates]
                    .iter()
                    .any(|part| pattern.glob.matches_with(part, MATCH_OPTIONS))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_skip_vcs_and_archives() {
        let rules = IgnoreRules::defaults();
        assert!(rules.is_ignored(".git/objects/ab/cdef"));
        assert!(rules.is_ignored("exports/pack.mrpack"));
        assert!(rules.is_ignored(".gitignore"));
        assert!(!rules.is_ignored("mods/sodium.pw.toml"));
        assert!(!rules.is_ignored("config/options.txt"));
    }

    #[test]
    fn pack_ignore_file_adds_rules() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(IGNORE_FILE),
            "# local stuff\nsaves/\nconfig/private.json\n*.log\n",
        )
        .unwrap();

        let rules = IgnoreRules::load(dir.path()).unwrap();
        assert!(rules.is_ignored("saves/world/level.dat"));
        assert!(!rules.is_ignored("saves"));
        assert!(rules.is_ignored("config/private.json"));
        assert!(!rules.is_ignored("config/public.json"));
        assert!(rules.is_ignored("logs/latest.log"));
    }
}
