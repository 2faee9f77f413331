use once_cell::sync::Lazy;
use regex::Regex;

static PARENTHESIZED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(.*\)").unwrap());
static DASH_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r" - .+").unwrap());
static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z\d]").unwrap());
static DASH_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());

/// Turn a display name into a file-system friendly slug.
///
/// `"Just Enough Items (Forge Edition) - Legacy"` becomes `"just-enough-items"`.
pub fn slugify_name(name: &str) -> String {
    let lower = name.to_lowercase();
    let no_brackets = PARENTHESIZED.replace_all(&lower, "");
    let no_suffix = DASH_SUFFIX.replace_all(&no_brackets, "");
    let limited = NON_ALNUM.replace_all(&no_suffix, "-");
    let collapsed = DASH_RUNS.replace_all(&limited, "-");
    collapsed.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_parentheses_and_dash_suffix() {
        assert_eq!(
            slugify_name("Just Enough Items (Forge Edition) - Legacy"),
            "just-enough-items"
        );
    }

    #[test]
    fn collapses_symbol_runs() {
        assert_eq!(slugify_name("Sodium!!  Extra++"), "sodium-extra");
        assert_eq!(slugify_name("  [EMI]  "), "emi");
    }

    #[test]
    fn keeps_hyphenated_words_without_spaces() {
        assert_eq!(slugify_name("Mod-Menu"), "mod-menu");
    }
}
