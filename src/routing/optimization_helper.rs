/// Visiting order for `n` stops between a fixed start and a fixed end.
///
/// Nodes are numbered `0` (start), `1..=n` (stops) and `n + 1` (end); `cost`
/// receives those node numbers. The returned order is 0-based stop indices.
pub fn solve_fixed_endpoint_path<F>(n: usize, cost: F) -> Vec<usize>
where
    F: Fn(usize, usize) -> f64,
{
    let greedy = greedy_path(n, &cost);
    let path = two_opt_path(greedy, &cost);

    path[1..path.len() - 1].iter().map(|node| node - 1).collect()
}

fn greedy_path<F>(n: usize, cost: &F) -> Vec<usize>
where
    F: Fn(usize, usize) -> f64,
{
    let mut remaining: Vec<usize> = (1..=n).collect();
    let mut path = Vec::with_capacity(n + 2);
    path.push(0);

    while !remaining.is_empty() {
        let last = path[path.len() - 1];

        let best_idx = remaining
            .iter()
            .enumerate()
            .map(|(i, &node)| (i, cost(last, node)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);

        path.push(remaining.remove(best_idx));
    }

    path.push(n + 1);
    path
}

fn two_opt_path<F>(mut path: Vec<usize>, cost: &F) -> Vec<usize>
where
    F: Fn(usize, usize) -> f64,
{
    let len = path.len();
    // start, end, and at least two stops
    if len < 4 {
        return path;
    }

    let mut improved = true;

    while improved {
        improved = false;

        for i in 0..len - 3 {
            for j in i + 2..len - 1 {
                let a = path[i];
                let b = path[i + 1];
                let c = path[j];
                let d = path[j + 1];

                let current = cost(a, b) + cost(c, d);
                let swapped = cost(a, c) + cost(b, d);

                if swapped + 1e-9 < current {
                    path[i + 1..=j].reverse();
                    improved = true;
                }
            }
        }
    }

    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_cost(positions: Vec<f64>) -> impl Fn(usize, usize) -> f64 {
        move |a, b| (positions[a] - positions[b]).abs()
    }

    #[test]
    fn test_no_stops() {
        assert!(solve_fixed_endpoint_path(0, |_, _| 1.0).is_empty());
    }

    #[test]
    fn test_orders_stops_along_a_line() {
        // start at 0, end at 10, stops scattered in between
        let order = solve_fixed_endpoint_path(4, line_cost(vec![0.0, 7.0, 2.0, 9.0, 4.0, 10.0]));
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_result_is_a_permutation() {
        let order = solve_fixed_endpoint_path(6, line_cost(vec![0.0, 5.0, 1.0, 8.0, 3.0, 2.0, 7.0, 4.0]));
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..6).collect::<Vec<_>>());
    }
}
