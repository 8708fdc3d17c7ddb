pub mod cohort;
pub mod matrices;
pub mod transition;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Split `total` discrete items across buckets proportionally to `weights`
/// using largest-remainder apportionment. The result always sums to `total`;
/// ties go to the earlier bucket.
pub(crate) fn apportion(total: usize, weights: &[Decimal]) -> Vec<usize> {
    if total == 0 || weights.is_empty() {
        return vec![0; weights.len()];
    }
    let weight_sum: Decimal = weights.iter().copied().sum();
    if weight_sum <= Decimal::ZERO {
        let mut counts = vec![0; weights.len()];
        counts[0] = total;
        return counts;
    }

    let total_dec = Decimal::from(total as u64);
    let mut counts = Vec::with_capacity(weights.len());
    let mut remainders: Vec<(usize, Decimal)> = Vec::with_capacity(weights.len());
    let mut assigned = 0usize;

    for (i, w) in weights.iter().enumerate() {
        let exact = total_dec * w / weight_sum;
        let floor = exact.floor();
        let count = floor.to_usize().unwrap_or(0);
        assigned += count;
        counts.push(count);
        remainders.push((i, exact - floor));
    }

    remainders.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let mut leftover = total.saturating_sub(assigned);
    for (i, _) in remainders {
        if leftover == 0 {
            break;
        }
        counts[i] += 1;
        leftover -= 1;
    }

    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_apportion_sums_to_total() {
        let counts = apportion(10, &[dec!(0.5), dec!(0.3), dec!(0.2)]);
        assert_eq!(counts.iter().sum::<usize>(), 10);
        assert_eq!(counts, vec![5, 3, 2]);
    }

    #[test]
    fn test_apportion_largest_remainder() {
        // 7 items over thirds: exact shares 2.33 each, remainder to earliest
        let counts = apportion(7, &[dec!(1), dec!(1), dec!(1)]);
        assert_eq!(counts, vec![3, 2, 2]);
    }

    #[test]
    fn test_apportion_zero_weights_falls_back_to_first() {
        let counts = apportion(4, &[dec!(0), dec!(0)]);
        assert_eq!(counts, vec![4, 0]);
    }

    #[test]
    fn test_apportion_zero_total() {
        assert_eq!(apportion(0, &[dec!(1), dec!(1)]), vec![0, 0]);
    }
}
