use crate::backup::result_error::result::Result;

use bon::Builder;
use derive_more::{Display, From};
use getset::Getters;
use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize};

use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::result;

/// A glob pattern wrapper that handles custom deserialization
///
/// Wraps the `globset::Glob` type with custom serde support for
/// deserializing glob patterns from JSON strings. Automatically
/// enables literal separator mode for consistent path matching.
#[derive(Clone, Debug, From, Display, Serialize, Builder, PartialEq, Eq, Getters)]
#[serde(transparent)]
#[getset(get = "pub")]
pub struct CustomDeserializedGlob {
    #[builder(into)]
    glob: Glob,
}

impl CustomDeserializedGlob {
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()?
            .into())
    }
}

struct CustomGlobVisitor;

impl Visitor<'_> for CustomGlobVisitor {
    type Value = CustomDeserializedGlob;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("a glob pattern")
    }

    fn visit_str<E>(self, v: &str) -> result::Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        GlobBuilder::new(v)
            .literal_separator(true)
            .build()
            .map(CustomDeserializedGlob::from)
            .map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for CustomDeserializedGlob {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> result::Result<Self, D::Error> {
        deserializer.deserialize_str(CustomGlobVisitor)
    }
}

/// Compiled exclude patterns of one source entry.
///
/// A path is excluded when any pattern matches its path relative to the
/// entry root, or its bare file name.
#[derive(Clone)]
pub struct ExcludeMatcher {
    set: GlobSet,
}

impl ExcludeMatcher {
    pub fn new<'a, I: IntoIterator<Item = &'a CustomDeserializedGlob>>(globs: I) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for g in globs {
            builder.add(g.glob.clone());
        }
        Ok(Self {
            set: builder.build()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn is_excluded<P: AsRef<Path>>(&self, relative_path: P) -> bool {
        if self.set.is_empty() {
            return false;
        }
        let relative_path = relative_path.as_ref();
        self.set.is_match(relative_path)
            || relative_path
                .file_name()
                .is_some_and(|name| self.set.is_match(name))
    }
}

impl Debug for ExcludeMatcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ExcludeMatcher({} patterns)", self.set.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(patterns: &[&str]) -> ExcludeMatcher {
        let globs: Vec<_> = patterns
            .iter()
            .map(|p| CustomDeserializedGlob::new(p).unwrap())
            .collect();
        ExcludeMatcher::new(&globs).unwrap()
    }

    #[test]
    fn test_custom_deserialized_glob_deserialization() {
        let json = "\"*.txt\"";
        let glob: CustomDeserializedGlob = serde_json::from_str(json).unwrap();
        assert_eq!(glob.to_string(), "*.txt");
    }

    #[test]
    fn test_custom_deserialized_glob_invalid_pattern() {
        let json = "\"[invalid\"";
        let result = serde_json::from_str::<CustomDeserializedGlob>(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_matcher_excludes_nothing() {
        let m = matcher(&[]);
        assert!(m.is_empty());
        assert!(!m.is_excluded("a.txt"));
    }

    #[test]
    fn test_file_name_pattern_matches_at_any_depth() {
        let m = matcher(&["*.log"]);
        assert!(m.is_excluded("a.log"));
        assert!(m.is_excluded("deep/down/b.log"));
        assert!(!m.is_excluded("deep/down/b.txt"));
    }

    #[test]
    fn test_path_pattern_respects_separators() {
        let m = matcher(&["cache/*"]);
        assert!(m.is_excluded("cache/x.bin"));
        assert!(!m.is_excluded("cache/nested/x.bin"));
        assert!(!m.is_excluded("other/cache/x.bin"));

        let m = matcher(&["**/cache/**"]);
        assert!(m.is_excluded("other/cache/nested/x.bin"));
    }
}
