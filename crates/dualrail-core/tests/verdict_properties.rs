use dualrail_core::verdict::{
    evaluate_boolean, evaluate_numeric, BooleanRule, NumericRule, Outcome,
};
use proptest::prelude::*;

fn finite() -> impl Strategy<Value = f64> {
    -1.0e6f64..1.0e6
}

proptest! {
    #[test]
    fn in_between_excludes_both_bounds(a in finite(), b in finite()) {
        let (lower, upper) = if a <= b { (a, b) } else { (b, a) };
        let rule = NumericRule::InBetween { lower, upper };
        prop_assert_eq!(evaluate_numeric(lower, &rule), Outcome::Fail);
        prop_assert_eq!(evaluate_numeric(upper, &rule), Outcome::Fail);

        let mid = lower + (upper - lower) / 2.0;
        if lower < mid && mid < upper {
            prop_assert_eq!(evaluate_numeric(mid, &rule), Outcome::Pass);
        }
    }

    #[test]
    fn one_sided_bounds_include_the_bound(bound in finite(), value in finite()) {
        prop_assert_eq!(
            evaluate_numeric(bound, &NumericRule::GreaterThan { lower: bound }),
            Outcome::Pass
        );
        prop_assert_eq!(
            evaluate_numeric(bound, &NumericRule::LessThan { upper: bound }),
            Outcome::Pass
        );
        let expected = if value >= bound { Outcome::Pass } else { Outcome::Fail };
        prop_assert_eq!(
            evaluate_numeric(value, &NumericRule::GreaterThan { lower: bound }),
            expected
        );
    }

    #[test]
    fn ignore_always_passes(value in any::<f64>(), flag in any::<bool>()) {
        prop_assert_eq!(evaluate_numeric(value, &NumericRule::Ignore), Outcome::Pass);
        prop_assert_eq!(evaluate_boolean(flag, &BooleanRule::Ignore), Outcome::Pass);
    }

    #[test]
    fn verdict_is_never_not_set(value in finite(), lower in finite(), upper in finite()) {
        for rule in [
            NumericRule::EqualTo { value: lower },
            NumericRule::LessThan { upper },
            NumericRule::GreaterThan { lower },
            NumericRule::InBetween { lower, upper },
        ] {
            prop_assert_ne!(evaluate_numeric(value, &rule), Outcome::NotSet);
        }
    }
}
