use super::Factors;

/// Combine factors into a single quality score: the weighted arithmetic mean.
///
/// Non-finite qualities or weights count as zero. With no factors, or a zero total
/// weight, the score is `0.0`.
#[must_use]
pub fn aggregate(factors: &Factors) -> f64 {
    let (weighted_sum, total_weight) = factors.iter().fold((0.0, 0.0), |(sum, total), (_, value)| {
        let quality = finite_or_zero(value.quality);
        let weight = finite_or_zero(value.weight);
        (sum + quality * weight, total + weight)
    });

    if total_weight <= 0.0 {
        return 0.0;
    }

    weighted_sum / total_weight
}

const fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::FactorValue;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn equal_weights_give_plain_mean() {
        let factors = Factors {
            downloads: Some(FactorValue::weighted(0.9)),
            versions: Some(FactorValue::weighted(0.5)),
            ..Factors::default()
        };

        assert!(close(aggregate(&factors), 0.7));
    }

    #[test]
    fn weights_bias_the_mean() {
        let factors = Factors {
            downloads: Some(FactorValue::new(1.0, 3.0)),
            versions: Some(FactorValue::new(0.0, 1.0)),
            ..Factors::default()
        };

        assert!(close(aggregate(&factors), 0.75));
    }

    #[test]
    fn issue_factors_mean() {
        let factors = Factors {
            repo_total_issues: Some(FactorValue::weighted(0.8)),
            repo_open_issues: Some(FactorValue::weighted(1.0)),
            repo_long_open_issues: Some(FactorValue::weighted(1.0)),
            ..Factors::default()
        };

        assert!(close(aggregate(&factors), 2.8 / 3.0));
    }

    #[test]
    fn no_factors_is_zero() {
        assert!(close(aggregate(&Factors::default()), 0.0));
    }

    #[test]
    fn zero_total_weight_is_zero() {
        let factors = Factors {
            downloads: Some(FactorValue::new(0.9, 0.0)),
            ..Factors::default()
        };

        assert!(close(aggregate(&factors), 0.0));
    }

    #[test]
    fn non_finite_values_are_ignored() {
        let factors = Factors {
            downloads: Some(FactorValue::new(f64::NEG_INFINITY, 1.0)),
            versions: Some(FactorValue::new(0.5, f64::NAN)),
            repo_total_issues: Some(FactorValue::weighted(0.8)),
            ..Factors::default()
        };

        // the infinite quality counts as 0 with weight 1, the NaN weight drops out
        assert!(close(aggregate(&factors), 0.4));
    }

    #[test]
    fn bounded_inputs_give_bounded_output() {
        let factors = Factors {
            downloads: Some(FactorValue::new(0.0, 0.3)),
            versions: Some(FactorValue::new(1.0, 2.5)),
            repo_total_issues: Some(FactorValue::new(0.4, 1.0)),
            repo_open_issues: Some(FactorValue::new(0.2, 0.7)),
            repo_long_open_issues: Some(FactorValue::new(1.0, 1.0)),
        };

        let quality = aggregate(&factors);
        assert!((0.0..=1.0).contains(&quality));
    }
}
