//! The key alias table shared by the compactor and the expander.
//!
//! Persisted templates depend on this exact table: entries are append-only
//! and existing pairs must never be reordered or renamed. Aliases follow
//! spreadsheet-column order (`a`..`z`, `aa`..`az`, `ba`..`bz`).

use std::collections::HashMap;
use std::sync::LazyLock;

/// `(canonical key, alias)` pairs of the legacy minifier.
pub const LEGACY_PAIRS: &[(&str, &str)] = &[
    ("title", "a"),
    ("description", "b"),
    ("pages", "c"),
    ("rootId", "d"),
    ("scale", "e"),
    ("clipPath", "f"),
    ("shapeSize", "g"),
    ("viewBox", "h"),
    ("color", "i"),
    ("image", "j"),
    ("url", "k"),
    ("thumb", "l"),
    ("gradientBackground", "m"),
    ("locked", "n"),
    ("name", "o"),
    ("style", "p"),
    ("urls", "q"),
    ("settings", "r"),
    ("offset", "s"),
    ("direction", "t"),
    ("blur", "u"),
    ("transparency", "v"),
    ("thickness", "w"),
    ("border", "x"),
    ("roundedCorners", "y"),
    ("weight", "z"),
    ("letterSpacing", "aa"),
    ("textAlign", "ab"),
    ("isBackground", "ac"),
    ("notes", "ad"),
    ("video", "ae"),
    ("duration", "af"),
    ("stops", "ag"),
    ("angle", "ah"),
    ("strokeWidth", "ai"),
    ("strokeColor", "aj"),
    ("radius", "ak"),
    ("outline", "al"),
    ("fontWeight", "am"),
    ("fontStyle", "an"),
    ("textDecoration", "ao"),
    ("textTransform", "ap"),
    ("createdAt", "aq"),
    ("updatedAt", "ar"),
    ("layers", "as"),
    ("ROOT", "at"),
    ("type", "au"),
    ("resolvedName", "av"),
    ("props", "aw"),
    ("boxSize", "ax"),
    ("flipHorizontal", "ay"),
    ("flipVertical", "az"),
    ("position", "ba"),
    ("rotate", "bb"),
    ("custom", "bc"),
    ("displayName", "bd"),
    ("child", "be"),
    ("parent", "bf"),
    ("hidden", "bg"),
    ("opacity", "bh"),
    ("roundness", "bi"),
    ("text", "bj"),
    ("fonts", "bk"),
    ("fontFamily", "bl"),
    ("fontSize", "bm"),
    ("colors", "bn"),
    ("fontSizes", "bo"),
    ("effect", "bp"),
    ("shadow", "bq"),
    ("lineHeights", "br"),
    ("letterSpacings", "bs"),
    ("alignments", "bt"),
    ("src", "bu"),
    ("width", "bv"),
    ("height", "bw"),
    ("crop", "bx"),
    ("x", "by"),
    ("y", "bz"),
];

/// Keys whose presence on a document's top level marks it as compact.
/// A canonical document never carries any of these as own properties.
pub const PROBE_KEYS: &[&str] = &[
    "a", "b", "c", "aq", "ar", "as", "at", "au", "av", "aw", "ax", "be",
];

static LEGACY: LazyLock<AliasTable> = LazyLock::new(|| AliasTable::new(LEGACY_PAIRS));

/// Immutable bidirectional key ↔ alias map.
#[derive(Debug, Clone)]
pub struct AliasTable {
    pairs: &'static [(&'static str, &'static str)],
    forward: HashMap<&'static str, &'static str>,
    reverse: HashMap<&'static str, &'static str>,
}

impl AliasTable {
    /// Build a table from `(key, alias)` pairs.
    ///
    /// Keys and aliases must each be unique; later duplicates are ignored
    /// so the first mapping always wins.
    pub fn new(pairs: &'static [(&'static str, &'static str)]) -> Self {
        let mut forward = HashMap::with_capacity(pairs.len());
        let mut reverse = HashMap::with_capacity(pairs.len());
        for &(key, alias) in pairs {
            if forward.contains_key(key) || reverse.contains_key(alias) {
                log::warn!("alias table: ignoring duplicate entry {key} → {alias}");
                continue;
            }
            forward.insert(key, alias);
            reverse.insert(alias, key);
        }
        Self {
            pairs,
            forward,
            reverse,
        }
    }

    /// The process-wide legacy table every persisted template was written with.
    pub fn legacy() -> &'static AliasTable {
        &LEGACY
    }

    pub fn alias_of(&self, key: &str) -> Option<&'static str> {
        self.forward.get(key).copied()
    }

    pub fn key_of(&self, alias: &str) -> Option<&'static str> {
        self.reverse.get(alias).copied()
    }

    /// Alias a key, passing unknown keys through unchanged.
    pub fn shorten<'a>(&self, key: &'a str) -> &'a str {
        match self.alias_of(key) {
            Some(alias) => alias,
            None => {
                log::debug!("alias table: no alias for `{key}`, kept as-is");
                key
            }
        }
    }

    /// Restore a key from its alias, passing unknown aliases through unchanged.
    pub fn expand<'a>(&self, alias: &'a str) -> &'a str {
        self.key_of(alias).unwrap_or(alias)
    }

    /// Alias used for the root layer's slot in the layer map.
    pub fn root_alias(&self) -> &'static str {
        self.alias_of(crate::id::ROOT_ID).unwrap_or("at")
    }

    pub fn pairs(&self) -> &'static [(&'static str, &'static str)] {
        self.pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Spreadsheet-column name for a zero-based index.
    fn column(mut n: usize) -> String {
        let mut out = Vec::new();
        loop {
            out.push(b'a' + (n % 26) as u8);
            if n < 26 {
                break;
            }
            n = n / 26 - 1;
        }
        out.reverse();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn aliases_follow_column_order() {
        for (i, (key, alias)) in LEGACY_PAIRS.iter().enumerate() {
            assert_eq!(*alias, column(i), "alias of `{key}` out of sequence");
        }
    }

    #[test]
    fn keys_and_aliases_are_unique() {
        let keys: HashSet<_> = LEGACY_PAIRS.iter().map(|(k, _)| k).collect();
        let aliases: HashSet<_> = LEGACY_PAIRS.iter().map(|(_, a)| a).collect();
        assert_eq!(keys.len(), LEGACY_PAIRS.len());
        assert_eq!(aliases.len(), LEGACY_PAIRS.len());
    }

    #[test]
    fn persisted_anchors_are_stable() {
        let table = AliasTable::legacy();
        for (key, alias) in [
            ("layers", "as"),
            ("ROOT", "at"),
            ("props", "aw"),
            ("boxSize", "ax"),
            ("position", "ba"),
            ("rotate", "bb"),
            ("child", "be"),
            ("parent", "bf"),
            ("text", "bj"),
            ("fonts", "bk"),
            ("colors", "bn"),
            ("fontSizes", "bo"),
            ("effect", "bp"),
            ("width", "bv"),
            ("height", "bw"),
            ("x", "by"),
            ("y", "bz"),
        ] {
            assert_eq!(table.alias_of(key), Some(alias), "alias of `{key}`");
            assert_eq!(table.key_of(alias), Some(key), "key of `{alias}`");
        }
        assert_eq!(table.root_alias(), "at");
    }

    #[test]
    fn probe_keys_are_all_aliases() {
        let table = AliasTable::legacy();
        for probe in PROBE_KEYS {
            assert!(table.key_of(probe).is_some(), "probe `{probe}` is not an alias");
        }
    }

    #[test]
    fn unknown_keys_pass_through() {
        let table = AliasTable::legacy();
        assert_eq!(table.shorten("sparkle"), "sparkle");
        assert_eq!(table.expand("zz"), "zz");
    }

    #[test]
    fn first_duplicate_wins() {
        static PAIRS: &[(&str, &str)] = &[("left", "l"), ("left", "m"), ("right", "l")];
        let table = AliasTable::new(PAIRS);
        assert_eq!(table.alias_of("left"), Some("l"));
        assert_eq!(table.alias_of("right"), None);
        assert_eq!(table.key_of("m"), None);
    }
}
