//! Pure record orderings: optimized visiting tour and street order.
//!
//! Both functions are side-effect free, deterministic for a given input
//! order, and return a permutation of input indices — no record is added,
//! dropped, or duplicated. The tour is a bounded local-search heuristic
//! (nearest-neighbor construction, then 2-opt until a full pass finds no
//! strictly improving move), not a global optimum.

use crate::geo::haversine_miles;
use crate::models::GeolocatedRecord;

/// Optimized visiting order over a geolocated record set.
///
/// Builds the full pairwise great-circle distance matrix (O(n²)), constructs
/// an initial tour by nearest-neighbor starting at the first record, then
/// repeatedly reverses segments whose reversal strictly shortens the route.
pub fn order_by_tour(records: &[GeolocatedRecord]) -> Vec<usize> {
    let n = records.len();
    if n < 3 {
        return (0..n).collect();
    }

    let mut dist = vec![0.0f64; n * n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = haversine_miles(records[i].point(), records[j].point());
            dist[i * n + j] = d;
            dist[j * n + i] = d;
        }
    }
    let d = |a: usize, b: usize| dist[a * n + b];

    // Nearest-neighbor construction from record 0.
    let mut tour = Vec::with_capacity(n);
    let mut visited = vec![false; n];
    let mut current = 0usize;
    visited[0] = true;
    tour.push(0);
    for _ in 1..n {
        let mut best = usize::MAX;
        let mut best_d = f64::INFINITY;
        for (j, seen) in visited.iter().enumerate() {
            if !seen && d(current, j) < best_d {
                best = j;
                best_d = d(current, j);
            }
        }
        visited[best] = true;
        tour.push(best);
        current = best;
    }

    // 2-opt: reverse tour[i..=k] when doing so strictly shortens the route.
    // The route is an open path, so a reversal touching either end changes
    // only one edge.
    loop {
        let mut improved = false;
        for i in 0..(n - 1) {
            for k in (i + 1)..n {
                let mut old_len = 0.0;
                let mut new_len = 0.0;
                if i > 0 {
                    old_len += d(tour[i - 1], tour[i]);
                    new_len += d(tour[i - 1], tour[k]);
                }
                if k < n - 1 {
                    old_len += d(tour[k], tour[k + 1]);
                    new_len += d(tour[i], tour[k + 1]);
                }
                if new_len + 1e-10 < old_len {
                    tour[i..=k].reverse();
                    improved = true;
                }
            }
        }
        if !improved {
            break;
        }
    }

    tour
}

/// Total length of a tour over `records`, in miles. Exposed for tests and
/// diagnostics.
pub fn tour_length(records: &[GeolocatedRecord], tour: &[usize]) -> f64 {
    tour.windows(2)
        .map(|w| haversine_miles(records[w[0]].point(), records[w[1]].point()))
        .sum()
}

/// Street order: sort by address with the leading numeric house number
/// stripped (case-insensitive), tie-broken by the house number ascending.
pub fn order_by_street(records: &[GeolocatedRecord]) -> Vec<usize> {
    let keys: Vec<(String, u64)> = records
        .iter()
        .map(|r| street_key(r.record.address.as_deref().unwrap_or("")))
        .collect();

    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by(|&a, &b| keys[a].0.cmp(&keys[b].0).then(keys[a].1.cmp(&keys[b].1)));
    order
}

/// Split an address's first line into (uppercased street remainder, leading
/// house number). Addresses without a leading number sort by full text with
/// house number 0.
fn street_key(address: &str) -> (String, u64) {
    let line = address.lines().next().unwrap_or("").trim();
    let digits: String = line.chars().take_while(|c| c.is_ascii_digit()).collect();
    let house = digits.parse::<u64>().unwrap_or(0);
    let street = line[digits.len()..].trim().to_ascii_uppercase();
    (street, house)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::{CachedRecord, GeolocatedRecord};

    fn record(id: i64, lat: f64, lon: f64, address: &str) -> GeolocatedRecord {
        GeolocatedRecord {
            record: CachedRecord {
                scope: "VOL".to_string(),
                location_id: id,
                record_id: id,
                display_name: None,
                first_name: None,
                last_name: None,
                email: None,
                phone: None,
                birth_date: None,
                category: None,
                address: Some(address.to_string()),
                updated_at: Utc::now(),
            },
            lat,
            lon,
        }
    }

    fn is_permutation(order: &[usize], n: usize) -> bool {
        let mut seen = vec![false; n];
        for &i in order {
            if i >= n || seen[i] {
                return false;
            }
            seen[i] = true;
        }
        order.len() == n
    }

    #[test]
    fn tour_is_a_permutation() {
        let records: Vec<_> = (0..12)
            .map(|i| {
                record(
                    i,
                    29.0 + (i as f64 * 0.7).sin() * 0.01,
                    -81.3 + (i as f64 * 1.3).cos() * 0.01,
                    "1 Main St",
                )
            })
            .collect();
        let tour = order_by_tour(&records);
        assert!(is_permutation(&tour, records.len()));
    }

    #[test]
    fn tour_handles_trivial_inputs() {
        assert!(order_by_tour(&[]).is_empty());
        let one = vec![record(1, 29.0, -81.3, "1 A St")];
        assert_eq!(order_by_tour(&one), vec![0]);
        let two = vec![
            record(1, 29.0, -81.3, "1 A St"),
            record(2, 29.1, -81.2, "2 B St"),
        ];
        assert_eq!(order_by_tour(&two), vec![0, 1]);
    }

    #[test]
    fn tour_never_lengthens_the_nearest_neighbor_route() {
        // A zig-zag layout where raw input order is clearly suboptimal.
        let records = vec![
            record(0, 29.000, -81.300, "a"),
            record(1, 29.010, -81.300, "b"),
            record(2, 29.001, -81.300, "c"),
            record(3, 29.011, -81.300, "d"),
            record(4, 29.002, -81.300, "e"),
            record(5, 29.012, -81.300, "f"),
        ];
        let input_order: Vec<usize> = (0..records.len()).collect();
        let tour = order_by_tour(&records);
        assert!(tour_length(&records, &tour) <= tour_length(&records, &input_order) + 1e-9);
    }

    #[test]
    fn tour_is_two_opt_locally_optimal() {
        let records: Vec<_> = (0..9)
            .map(|i| {
                record(
                    i,
                    29.0 + ((i * 37) % 11) as f64 * 0.003,
                    -81.3 + ((i * 53) % 7) as f64 * 0.004,
                    "x",
                )
            })
            .collect();
        let tour = order_by_tour(&records);
        let n = tour.len();
        let base = tour_length(&records, &tour);
        // No remaining segment reversal may strictly shorten the route.
        for i in 0..(n - 1) {
            for k in (i + 1)..n {
                let mut candidate = tour.clone();
                candidate[i..=k].reverse();
                assert!(
                    tour_length(&records, &candidate) + 1e-10 >= base,
                    "improving move left at ({i}, {k})"
                );
            }
        }
    }

    #[test]
    fn street_order_strips_house_number_and_tie_breaks_numerically() {
        let records = vec![
            record(1, 0.0, 0.0, "120 Grand Ave"),
            record(2, 0.0, 0.0, "99 Grand Ave"),
            record(3, 0.0, 0.0, "15 Apple Rd"),
            record(4, 0.0, 0.0, "7 grand ave"),
        ];
        let order = order_by_street(&records);
        // Apple Rd first; Grand Ave grouped, numbered 7, 99, 120.
        assert_eq!(order, vec![2, 3, 1, 0]);
    }

    #[test]
    fn street_order_uses_first_line_of_multi_line_addresses() {
        let records = vec![
            record(1, 0.0, 0.0, "10 Oak St\nApt 4"),
            record(2, 0.0, 0.0, "2 Oak St\nUnit 9"),
        ];
        assert_eq!(order_by_street(&records), vec![1, 0]);
    }

    #[test]
    fn street_order_is_a_permutation_with_missing_addresses() {
        let mut records = vec![
            record(1, 0.0, 0.0, "5 Elm St"),
            record(2, 0.0, 0.0, ""),
        ];
        records[1].record.address = None;
        let order = order_by_street(&records);
        assert!(is_permutation(&order, 2));
        // Empty address sorts before any named street.
        assert_eq!(order[0], 1);
    }
}
