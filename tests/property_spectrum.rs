use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

use proptest::prelude::*;
use radcoupler::adapters::handoff::parse_handoff;
use radcoupler::Spectrum;

/// Distinct wavelengths with matching values, in ascending order.
fn samples() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::btree_set(1u32..20_000, 2..40).prop_flat_map(|wavelengths: BTreeSet<u32>| {
        let len = wavelengths.len();
        prop::collection::vec(0.0f64..1e6, len).prop_map(move |values| {
            wavelengths
                .iter()
                .map(|&w| f64::from(w) / 10.0)
                .zip(values)
                .collect()
        })
    })
}

proptest! {
    /// Property: interpolation does not depend on sample order
    #[test]
    fn prop_interpolation_is_order_invariant(
        (sorted, shuffled) in samples().prop_flat_map(|s| (Just(s.clone()), Just(s).prop_shuffle())),
        position in 0.0f64..=1.0,
    ) {
        let a = Spectrum::from_samples(sorted).unwrap();
        let b = Spectrum::from_samples(shuffled).unwrap();
        let (min, max) = a.domain();
        let wavelength = min + position * (max - min);

        prop_assert_eq!(a.interpolate(wavelength).unwrap(), b.interpolate(wavelength).unwrap());
    }

    /// Property: band integration does not depend on sample order
    #[test]
    fn prop_integration_is_order_invariant(
        (sorted, shuffled) in samples().prop_flat_map(|s| (Just(s.clone()), Just(s).prop_shuffle())),
        lower in 0.0f64..0.5,
        upper in 0.5f64..=1.0,
    ) {
        let a = Spectrum::from_samples(sorted).unwrap();
        let b = Spectrum::from_samples(shuffled).unwrap();
        let (min, max) = a.domain();
        let lo = min + lower * (max - min);
        let hi = min + upper * (max - min);
        prop_assume!(lo < hi);

        prop_assert_eq!(a.integrate(lo, hi).unwrap(), b.integrate(lo, hi).unwrap());
    }

    /// Property: a descending handoff file parses to the same curve as an ascending one
    #[test]
    fn prop_handoff_rows_in_either_order(sorted in samples()) {
        let render = |rows: &[(f64, f64)]| {
            let mut text = String::from("# column 1: wavelength (nm)\n# column 2: value\n");
            for (wavelength, value) in rows {
                let _ = writeln!(text, "{wavelength} {value}");
            }
            text
        };
        let descending: Vec<(f64, f64)> = sorted.iter().rev().copied().collect();
        let path = Path::new("zone0.sed");

        let a = parse_handoff(path, &render(&sorted)).unwrap();
        let b = parse_handoff(path, &render(&descending)).unwrap();
        prop_assert_eq!(a, b);
    }
}
