//! One-dimensional density clustering
//!
//! DBSCAN over scalar points: a point with at least `min_points` neighbours
//! within `eps` (itself included) is a core point; clusters grow from core
//! points, border points join the first cluster that reaches them, and
//! everything else is noise.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Noise,
    Cluster(usize),
}

pub fn dbscan(points: &[f64], eps: f64, min_points: usize) -> Vec<Label> {
    let neighbours = |i: usize| -> Vec<usize> {
        points
            .iter()
            .enumerate()
            .filter(|(_, p)| (*p - points[i]).abs() <= eps)
            .map(|(j, _)| j)
            .collect()
    };

    let mut labels: Vec<Option<Label>> = vec![None; points.len()];
    let mut next_cluster = 0;

    for start in 0..points.len() {
        if labels[start].is_some() {
            continue;
        }
        let seeds = neighbours(start);
        if seeds.len() < min_points {
            labels[start] = Some(Label::Noise);
            continue;
        }

        let cluster = Label::Cluster(next_cluster);
        next_cluster += 1;
        labels[start] = Some(cluster);

        let mut queue = seeds;
        while let Some(j) = queue.pop() {
            match labels[j] {
                // noise reached from a core point becomes a border point
                Some(Label::Noise) => labels[j] = Some(cluster),
                Some(Label::Cluster(_)) => {}
                None => {
                    labels[j] = Some(cluster);
                    let reach = neighbours(j);
                    if reach.len() >= min_points {
                        queue.extend(reach);
                    }
                }
            }
        }
    }

    labels
        .into_iter()
        .map(|l| l.unwrap_or(Label::Noise))
        .collect()
}

/// Members of each cluster, in cluster order
pub fn groups(points: &[f64], labels: &[Label]) -> Vec<Vec<f64>> {
    let count = labels
        .iter()
        .filter_map(|l| match l {
            Label::Cluster(c) => Some(c + 1),
            Label::Noise => None,
        })
        .max()
        .unwrap_or(0);
    let mut out = vec![Vec::new(); count];
    for (point, label) in points.iter().zip(labels) {
        if let Label::Cluster(c) = label {
            out[*c].push(*point);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_dense_groups_and_noise() {
        let points = [10.0, 10.01, 10.02, 50.0, 20.0, 20.01, 20.015];
        let labels = dbscan(&points, 0.02, 3);
        assert_eq!(labels[0], Label::Cluster(0));
        assert_eq!(labels[2], Label::Cluster(0));
        assert_eq!(labels[3], Label::Noise);
        assert_eq!(labels[4], Label::Cluster(1));

        let groups = groups(&points, &labels);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 3);
        assert_eq!(groups[1].len(), 3);
    }

    #[test]
    fn test_chain_of_core_points_joins_one_cluster() {
        let points: Vec<f64> = (0..10).map(|i| 1.0 + i as f64 * 0.01).collect();
        let labels = dbscan(&points, 0.015, 3);
        assert!(labels.iter().all(|l| *l == Label::Cluster(0)));
    }

    #[test]
    fn test_sparse_points_are_noise() {
        let labels = dbscan(&[1.0, 2.0, 3.0], 0.5, 2);
        assert!(labels.iter().all(|l| *l == Label::Noise));
        assert!(groups(&[1.0, 2.0, 3.0], &labels).is_empty());
    }
}
