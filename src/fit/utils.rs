/// Distance from x to the next representable float above it (the unit in the last place).
fn spacing(x : f64) -> f64 {
    let x = x.abs();
    if !x.is_finite() {
        return f64::NAN;
    }
    f64::from_bits(x.to_bits() + 1) - x
}

/// Decides whether an objective sequence has stabilized: the last two values should
/// differ by no more than tol relative to their mean magnitude. Sequences with fewer than
/// two values never converge. The absolute difference is floored at the float spacing
/// around 1 - tol, so that tolerances below machine precision are never satisfied
/// merely by exact repetition.
pub fn is_converged(tol : f64, values : &[f64]) -> bool {
    match values {
        [.., prev, last] => {
            let delta = (2. * (last - prev).abs()).max(spacing(1. - tol));
            delta <= tol * (last.abs() + prev.abs())
        },
        _ => false
    }
}

/// Partitions values (usually component labels) into groups of equal value. Groups are yielded
/// in ascending order of value; within a group, indices are ascending.
pub fn group_by_value<T>(values : &[T]) -> impl Iterator<Item=(T, Vec<usize>)> + '_
where
    T : Ord + Clone
{
    let mut order : Vec<usize> = (0..values.len()).collect();
    order.sort_by(|a, b| values[*a].cmp(&values[*b]) );
    let mut groups : Vec<(usize, usize)> = Vec::new();
    let mut start = 0;
    for i in 1..=order.len() {
        if i == order.len() || values[order[i]] != values[order[start]] {
            groups.push((start, i));
            start = i;
        }
    }
    groups.into_iter().map(move |(from, to)| {
        (values[order[from]].clone(), order[from..to].to_vec())
    })
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn convergence() {
        assert!(!is_converged(1E-6, &[]));
        assert!(!is_converged(1E-6, &[1.0]));
        assert!(!is_converged(1E-6, &[1.0, 2.0]));
        assert!(is_converged(1E-6, &[5.0, 100.0, 100.00001]));
        assert!(is_converged(1E-3, &[-10.0, -10.001]));

        // Exact repetition does not converge if the tolerance is below the float spacing.
        assert!(!is_converged(0.0, &[1.0, 1.0]));
    }

    #[test]
    fn grouping() {
        let labels = [2, 0, 2, 1, 0, 2];
        let groups : Vec<_> = group_by_value(&labels).collect();
        assert_eq!(groups, vec![(0, vec![1, 4]), (1, vec![3]), (2, vec![0, 2, 5])]);
        let empty : [usize; 0] = [];
        assert_eq!(group_by_value(&empty).count(), 0);
    }

    #[test]
    fn interleaved_groups() {
        let labels : Vec<usize> = (0..200).map(|i| if i % 7 == 0 { 99 } else { i % 3 } ).collect();
        let groups : Vec<_> = group_by_value(&labels).collect();
        let values : Vec<usize> = groups.iter().map(|(v, _)| *v ).collect();
        assert_eq!(values, vec![0, 1, 2, 99]);
        assert_eq!(groups.iter().map(|(_, ix)| ix.len() ).sum::<usize>(), 200);
        let (_, flagged) = &groups[3];
        assert_eq!(flagged, &(0..200).step_by(7).collect::<Vec<_>>());
        for (v, ix) in &groups {
            assert!(ix.windows(2).all(|w| w[0] < w[1] ));
            assert!(ix.iter().all(|i| labels[*i] == *v ));
        }
    }

}
