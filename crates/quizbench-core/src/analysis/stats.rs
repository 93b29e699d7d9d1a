//! Descriptive statistics over score slices. All functions return `None` for
//! empty input so "no data" stays distinguishable from a zero score.

pub fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    Some(xs.iter().sum::<f64>() / xs.len() as f64)
}

pub fn median(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("scores are finite"));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

pub fn population_std_dev(xs: &[f64]) -> Option<f64> {
    let m = mean(xs)?;
    let variance = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64;
    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_none() {
        assert_eq!(mean(&[]), None);
        assert_eq!(median(&[]), None);
        assert_eq!(population_std_dev(&[]), None);
    }

    #[test]
    fn identical_scores_have_zero_deviation() {
        let xs = [75.0; 6];
        assert_eq!(mean(&xs), Some(75.0));
        assert_eq!(median(&xs), Some(75.0));
        assert_eq!(population_std_dev(&xs), Some(0.0));
    }

    #[test]
    fn median_of_even_count_averages_middle_pair() {
        assert_eq!(median(&[10.0, 20.0, 30.0, 40.0]), Some(25.0));
        assert_eq!(median(&[30.0, 10.0, 20.0]), Some(20.0));
    }

    #[test]
    fn population_std_dev_divides_by_n() {
        // mean 50, squared deviations 2500 + 2500, variance 2500
        let got = population_std_dev(&[0.0, 100.0]).unwrap();
        assert!((got - 50.0).abs() < 1e-9);
    }
}
