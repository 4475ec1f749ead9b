//! Keeps per-show release word lists consistent with the global lists.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::ReleaseWords;

/// Global ignore/require word lists.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GlobalWords {
    pub ignore: BTreeSet<String>,
    pub require: BTreeSet<String>,
}

impl GlobalWords {
    pub fn is_empty(&self) -> bool {
        self.ignore.is_empty() && self.require.is_empty()
    }
}

/// Drop show words already covered globally and exclusions that no longer
/// point at a global word. Returns `true` when anything changed.
///
/// A regex flag is cleared only when its list changed here and ended up
/// empty.
pub fn reconcile(words: &mut ReleaseWords, global: &GlobalWords) -> bool {
    let mut changed = false;

    if remove_global(&mut words.ignore, &global.ignore) {
        changed = true;
        if words.ignore.is_empty() {
            words.ignore_regex = false;
        }
    }
    if remove_global(&mut words.require, &global.require) {
        changed = true;
        if words.require.is_empty() {
            words.require_regex = false;
        }
    }

    changed |= keep_global(&mut words.global_exclude_ignore, &global.ignore);
    changed |= keep_global(&mut words.global_exclude_require, &global.require);

    changed
}

fn remove_global(own: &mut BTreeSet<String>, global: &BTreeSet<String>) -> bool {
    let before = own.len();
    own.retain(|word| !global.contains(word));
    own.len() != before
}

fn keep_global(excluded: &mut BTreeSet<String>, global: &BTreeSet<String>) -> bool {
    let before = excluded.len();
    excluded.retain(|word| global.contains(word));
    excluded.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn overlap_with_global_is_removed() {
        let global = GlobalWords {
            ignore: set(&["x"]),
            require: BTreeSet::new(),
        };
        let mut words = ReleaseWords {
            ignore: set(&["x", "y"]),
            ignore_regex: true,
            global_exclude_ignore: set(&["x", "z"]),
            ..Default::default()
        };

        assert!(reconcile(&mut words, &global));
        assert_eq!(words.ignore, set(&["y"]));
        assert!(words.ignore_regex, "list is not empty, flag stays");
        assert_eq!(words.global_exclude_ignore, set(&["x"]));
    }

    #[test]
    fn emptied_list_clears_regex_flag() {
        let global = GlobalWords {
            ignore: BTreeSet::new(),
            require: set(&["720p"]),
        };
        let mut words = ReleaseWords {
            require: set(&["720p"]),
            require_regex: true,
            ..Default::default()
        };

        assert!(reconcile(&mut words, &global));
        assert!(words.require.is_empty());
        assert!(!words.require_regex);
    }

    #[test]
    fn untouched_show_reports_no_change() {
        let global = GlobalWords {
            ignore: set(&["x"]),
            require: set(&["y"]),
        };
        // Empty list with regex on is left alone when nothing was removed.
        let mut words = ReleaseWords {
            ignore: BTreeSet::new(),
            ignore_regex: true,
            require: set(&["z"]),
            global_exclude_require: set(&["y"]),
            ..Default::default()
        };
        let before = words.clone();

        assert!(!reconcile(&mut words, &global));
        assert_eq!(words, before);
    }
}
