use super::features::Descriptor;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub query_idx: usize,
    pub train_idx: usize,
    pub distance: f32,
}

/// 暴力 2-NN 匹配 + Lowe ratio test
#[derive(Debug, Clone, Copy)]
pub struct RatioMatcher {
    ratio: f32,
}

impl RatioMatcher {
    pub fn new(ratio: f32) -> Self {
        Self { ratio }
    }

    /// 任一侧少于 2 个描述子时无法做 ratio test，返回空
    pub fn match_descriptors(&self, query: &[Descriptor], train: &[Descriptor]) -> Vec<Match> {
        if query.len() < 2 || train.len() < 2 {
            return Vec::new();
        }

        query
            .iter()
            .enumerate()
            .filter_map(|(query_idx, q)| {
                let (best_idx, best, second) = two_nearest(q, train)?;
                (best < self.ratio * second).then_some(Match {
                    query_idx,
                    train_idx: best_idx,
                    distance: best,
                })
            })
            .collect()
    }

    pub fn count_matches(&self, query: &[Descriptor], train: &[Descriptor]) -> usize {
        self.match_descriptors(query, train).len()
    }
}

fn two_nearest(query: &Descriptor, train: &[Descriptor]) -> Option<(usize, f32, f32)> {
    let mut best = (usize::MAX, f32::INFINITY);
    let mut second = f32::INFINITY;

    for (idx, t) in train.iter().enumerate() {
        let d = squared_distance(query, t);
        if d < best.1 {
            second = best.1;
            best = (idx, d);
        } else if d < second {
            second = d;
        }
    }

    if best.0 == usize::MAX || !second.is_finite() {
        return None;
    }
    Some((best.0, best.1.sqrt(), second.sqrt()))
}

fn squared_distance(a: &Descriptor, b: &Descriptor) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::overlap::features::DESCRIPTOR_LEN;

    fn one_hot(index: usize) -> Descriptor {
        let mut d = [0.0; DESCRIPTOR_LEN];
        d[index] = 1.0;
        d
    }

    #[test]
    fn test_distinct_descriptors_match_themselves() {
        let set: Vec<Descriptor> = (0..5).map(one_hot).collect();
        let matches = RatioMatcher::new(0.75).match_descriptors(&set, &set);
        assert_eq!(matches.len(), 5);
        assert!(matches.iter().all(|m| m.query_idx == m.train_idx && m.distance == 0.0));
    }

    #[test]
    fn test_ambiguous_match_rejected() {
        // 两个候选距离相同
        let query = vec![one_hot(0), one_hot(1)];
        let mut mixed = [0.0; DESCRIPTOR_LEN];
        mixed[2] = 1.0;
        let train = vec![mixed, mixed];
        assert_eq!(RatioMatcher::new(0.75).count_matches(&query, &train), 0);
    }

    #[test]
    fn test_too_few_descriptors() {
        let matcher = RatioMatcher::new(0.75);
        let one = vec![one_hot(0)];
        let many: Vec<Descriptor> = (0..4).map(one_hot).collect();
        assert_eq!(matcher.count_matches(&one, &many), 0);
        assert_eq!(matcher.count_matches(&many, &one), 0);
        assert_eq!(matcher.count_matches(&[], &[]), 0);
    }
}
