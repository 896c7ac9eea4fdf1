//! The fact table.

/// An immutable, non-empty list of newline-terminated lines.
///
/// [`FactTable::new`] rejects tables that break these rules, at compile time
/// when used in a `const` or `static` initializer.
pub struct FactTable {
    facts: &'static [&'static str],
}

impl FactTable {
    pub const fn new(facts: &'static [&'static str]) -> FactTable {
        assert!(!facts.is_empty(), "fact table is empty");
        let mut i = 0;
        while i < facts.len() {
            let bytes = facts[i].as_bytes();
            assert!(
                !bytes.is_empty() && bytes[bytes.len() - 1] == b'\n',
                "fact is not newline-terminated"
            );
            let mut j = 0;
            while j < bytes.len() {
                assert!(bytes[j] != 0, "fact contains a NUL byte");
                j += 1;
            }
            i += 1;
        }
        FactTable { facts }
    }

    pub const fn len(&self) -> usize {
        self.facts.len()
    }

    /// Always `false`, tables can't be empty.
    pub const fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'static str> {
        self.facts.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.facts.iter().copied()
    }

    pub fn contains(&self, fact: &[u8]) -> bool {
        self.iter().any(|f| f.as_bytes() == fact)
    }
}

/// The facts served by `/dev/catfacts`.
pub static CAT_FACTS: FactTable = FactTable::new(&[
    "The penalty for killing a cat, 4,000 years ago in Egypt, was death.\n",
    "95% of all cat owners admit they talk to their cats.\n",
    "More cats are left-pawed than right-pawed. Out of 100 cats approximately 40 are left-pawed, 20 are right-pawed, and 40 are ambidextrous.\n",
    "A cat can jump as much as seven times its height.\n",
    "A cat cannot see directly under its nose. This is why the cat cannot seem to find tidbits on the floor.\n",
    "A cat has 230 bones in its body. A human only has 206 bones.\n",
    "A cat has four rows of whiskers.\n",
    "A frightened cat can run at speeds of up to 31 mph (50 km/h), slightly faster than a human sprinter.\n",
    "A cat sees about six times better than a human at night because of the tapetum lucidum, a layer of extra reflecting cells which absorb light.\n",
    "A cat's whiskers, called vibrissae, grow on the cat's face and on the back of its forelegs..\n",
]);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table() {
        assert_eq!(CAT_FACTS.len(), 10);
        assert!(!CAT_FACTS.is_empty());
        assert!(CAT_FACTS.iter().all(|f| f.ends_with('\n') && f.is_ascii()));
        assert_eq!(CAT_FACTS.get(6), Some("A cat has four rows of whiskers.\n"));
        assert_eq!(CAT_FACTS.get(10), None);
    }

    #[test]
    fn contains_matches_whole_entries_only() {
        assert!(CAT_FACTS.contains(b"A cat has four rows of whiskers.\n"));
        assert!(!CAT_FACTS.contains(b"A cat has four rows of whiskers."));
    }

    #[test]
    #[should_panic(expected = "newline-terminated")]
    fn rejects_unterminated_facts() {
        FactTable::new(&["no newline"]);
    }

    #[test]
    #[should_panic(expected = "empty")]
    fn rejects_empty_table() {
        FactTable::new(&[]);
    }

    #[test]
    #[should_panic(expected = "NUL")]
    fn rejects_nul_bytes() {
        FactTable::new(&["a\0b\n"]);
    }
}
