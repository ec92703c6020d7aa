//! Pattern-driven export-symbol matching.
//!
//! Pure and deterministic: the result preserves enumeration order, and a
//! symbol matching several rules appears once.

use kt_common::ExportSymbol;
use kt_config::CompiledRuleSet;

/// Select the subset of `symbols` whose names match any rule.
pub fn match_symbols(symbols: &[ExportSymbol], rules: &CompiledRuleSet) -> Vec<ExportSymbol> {
    symbols
        .iter()
        .filter(|sym| rules.is_match(&sym.name))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kt_config::RuleSet;
    use proptest::prelude::*;

    fn symbols(names: &[&str]) -> Vec<ExportSymbol> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| ExportSymbol::new(*name, 0x1000 + i as u64 * 0x10))
            .collect()
    }

    #[test]
    fn test_match_preserves_order() {
        let rules = RuleSet::builtin().compile().unwrap();
        let syms = symbols(&["zz_lcc9", "malloc", "_oecc07", "free", "oemcrypto_init"]);
        let matched = match_symbols(&syms, &rules);
        let names: Vec<&str> = matched.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["zz_lcc9", "_oecc07", "oemcrypto_init"]);
    }

    #[test]
    fn test_symbol_matching_multiple_rules_appears_once() {
        // "oecclcc" matches both the oecc and lcc rules.
        let rules = RuleSet::builtin().compile().unwrap();
        let syms = symbols(&["oecclcc"]);
        let matched = match_symbols(&syms, &rules);
        assert_eq!(matched.len(), 1);
    }

    #[test]
    fn test_no_match_is_empty() {
        let rules = RuleSet::builtin().compile().unwrap();
        let matched = match_symbols(&symbols(&["malloc", "free"]), &rules);
        assert!(matched.is_empty());
    }

    #[test]
    fn test_empty_input() {
        let rules = RuleSet::builtin().compile().unwrap();
        assert!(match_symbols(&[], &rules).is_empty());
    }

    proptest! {
        /// The result is exactly the matching subset, in input order.
        #[test]
        fn prop_match_is_exact_ordered_subset(names in proptest::collection::vec("[a-z_]{1,12}", 0..40)) {
            let rules = RuleSet::builtin().compile().unwrap();
            let syms: Vec<ExportSymbol> = names
                .iter()
                .enumerate()
                .map(|(i, n)| ExportSymbol::new(n.clone(), i as u64))
                .collect();

            let matched = match_symbols(&syms, &rules);

            // Every returned symbol matches, every omitted one does not.
            let expected: Vec<ExportSymbol> = syms
                .iter()
                .filter(|s| rules.is_match(&s.name))
                .cloned()
                .collect();
            prop_assert_eq!(matched, expected);
        }
    }
}
