//! 회귀 트리 (CART).
//!
//! 분산 감소(제곱오차 합 감소)가 가장 큰 `feature <= threshold` 분할을
//! 재귀적으로 고릅니다. 노드는 하나의 `Vec`에 평탄화해 저장하며
//! 루트는 항상 인덱스 0입니다.
//!
//! 피처 정렬은 트리당 한 번만 합니다. 원-핫 열처럼 0/1 값만 가진 피처는
//! 정렬 없이 값이 1인 표본의 합계만으로 분할 이득을 계산합니다.

use crate::ml::{MlError, MlResult};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// 분할로 인정하는 최소 제곱오차 감소량.
const MIN_GAIN: f64 = 1e-12;

/// 트리 성장 파라미터.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    /// 최대 깊이 (루트 = 0)
    pub max_depth: usize,
    /// 리프 하나가 가져야 하는 최소 샘플 수
    pub min_samples_leaf: usize,
    /// 분할마다 무작위로 고려할 피처 수 (`None` = 전체)
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 10,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// 학습된 회귀 트리.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    n_features: usize,
    /// 피처별 누적 제곱오차 감소량 (정규화 전)
    impurity_decrease: Vec<f64>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// 트리 한 그루를 키우는 동안의 작업 상태.
///
/// 표본은 `indices` 안의 위치(position)로 다룹니다. 0/1 피처는 값이 1인
/// 위치만 모아 두고 정렬 없이 평가하며, 나머지 피처는 학습 시작 시 한 번
/// 정렬한 순서를 자식 노드로 안정 분할해 내려보냅니다.
struct Grower<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    rows: &'a [usize],
    params: &'a TreeParams,
    n_features: usize,
    /// 피처 → 정렬 목록 슬롯 (0/1 피처는 `None`)
    sorted_slot: Vec<Option<usize>>,
    /// 위치별 값이 1인 0/1 피처
    ones: Vec<Vec<usize>>,
    goes_left: Vec<bool>,
    nodes: Vec<Node>,
    impurity_decrease: Vec<f64>,
}

impl<'a> Grower<'a> {
    fn new(
        x: &'a [Vec<f64>],
        y: &'a [f64],
        rows: &'a [usize],
        params: &'a TreeParams,
        n_features: usize,
    ) -> (Self, Vec<Vec<usize>>) {
        let binary: Vec<bool> = (0..n_features)
            .map(|f| rows.iter().all(|&i| x[i][f] == 0.0 || x[i][f] == 1.0))
            .collect();

        let mut sorted_slot = vec![None; n_features];
        let mut sorted = Vec::new();
        for feature in (0..n_features).filter(|&f| !binary[f]) {
            let mut order: Vec<usize> = (0..rows.len()).collect();
            order.sort_by(|&a, &b| x[rows[a]][feature].total_cmp(&x[rows[b]][feature]));
            sorted_slot[feature] = Some(sorted.len());
            sorted.push(order);
        }

        let ones = rows
            .iter()
            .map(|&i| {
                (0..n_features)
                    .filter(|&f| binary[f] && x[i][f] == 1.0)
                    .collect()
            })
            .collect();

        let grower = Self {
            x,
            y,
            rows,
            params,
            n_features,
            sorted_slot,
            ones,
            goes_left: vec![false; rows.len()],
            nodes: Vec::new(),
            impurity_decrease: vec![0.0; n_features],
        };
        (grower, sorted)
    }

    fn target(&self, pos: usize) -> f64 {
        self.y[self.rows[pos]]
    }

    fn value(&self, pos: usize, feature: usize) -> f64 {
        self.x[self.rows[pos]][feature]
    }

    fn grow<R: Rng + ?Sized>(
        &mut self,
        samples: Vec<usize>,
        sorted: Vec<Vec<usize>>,
        depth: usize,
        rng: &mut R,
    ) -> usize {
        let n = samples.len() as f64;
        let (sum, sum_sq) = samples.iter().fold((0.0, 0.0), |(s, ss), &p| {
            let v = self.target(p);
            (s + v, ss + v * v)
        });
        let mean = sum / n;
        let sse = sum_sq - sum * sum / n;

        let node = self.nodes.len();
        self.nodes.push(Node::Leaf { value: mean });

        let min_leaf = self.params.min_samples_leaf.max(1);
        if depth >= self.params.max_depth || samples.len() < 2 * min_leaf || sse <= MIN_GAIN {
            return node;
        }

        let Some(best) = self.best_split(&samples, &sorted, sum, sum_sq, sse, rng) else {
            return node;
        };

        for &p in &samples {
            let left = self.value(p, best.feature) <= best.threshold;
            self.goes_left[p] = left;
        }
        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) =
            samples.into_iter().partition(|&p| self.goes_left[p]);
        let (left_sorted, right_sorted): (Vec<Vec<usize>>, Vec<Vec<usize>>) = sorted
            .into_iter()
            .map(|order| {
                order
                    .into_iter()
                    .partition::<Vec<usize>, _>(|&p| self.goes_left[p])
            })
            .unzip();

        self.impurity_decrease[best.feature] += best.gain;
        let left = self.grow(left_samples, left_sorted, depth + 1, rng);
        let right = self.grow(right_samples, right_sorted, depth + 1, rng);
        self.nodes[node] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        node
    }

    fn best_split<R: Rng + ?Sized>(
        &self,
        samples: &[usize],
        sorted: &[Vec<usize>],
        sum: f64,
        sum_sq: f64,
        sse: f64,
        rng: &mut R,
    ) -> Option<SplitCandidate> {
        let min_leaf = self.params.min_samples_leaf.max(1);
        let n = samples.len();

        let features: Vec<usize> = match self.params.max_features {
            Some(m) if m > 0 && m < self.n_features => {
                let mut picked = rand::seq::index::sample(rng, self.n_features, m).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..self.n_features).collect(),
        };

        // 0/1 피처: 값이 1인 쪽의 (개수, 합, 제곱합)
        let mut one_stats = vec![(0usize, 0.0, 0.0); self.n_features];
        for &p in samples {
            let v = self.target(p);
            for &f in &self.ones[p] {
                let stat = &mut one_stats[f];
                stat.0 += 1;
                stat.1 += v;
                stat.2 += v * v;
            }
        }

        let split_gain = |n_left: usize, left_sum: f64, left_sq: f64| -> Option<f64> {
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                return None;
            }
            let left_sse = left_sq - left_sum * left_sum / n_left as f64;
            let right_sum = sum - left_sum;
            let right_sse = (sum_sq - left_sq) - right_sum * right_sum / n_right as f64;
            Some(sse - left_sse - right_sse)
        };

        let mut best: Option<SplitCandidate> = None;
        let mut consider = |feature: usize, threshold: f64, gain: f64| {
            if gain > MIN_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    gain,
                });
            }
        };

        for feature in features {
            match self.sorted_slot[feature] {
                None => {
                    let (count, one_sum, one_sq) = one_stats[feature];
                    if let Some(gain) = split_gain(n - count, sum - one_sum, sum_sq - one_sq) {
                        consider(feature, 0.5, gain);
                    }
                }
                Some(slot) => {
                    let order = &sorted[slot];
                    let (mut left_sum, mut left_sq) = (0.0, 0.0);
                    for k in 0..n - 1 {
                        let v = self.target(order[k]);
                        left_sum += v;
                        left_sq += v * v;

                        let here = self.value(order[k], feature);
                        let next = self.value(order[k + 1], feature);
                        if here == next {
                            continue;
                        }
                        if let Some(gain) = split_gain(k + 1, left_sum, left_sq) {
                            consider(feature, (here + next) / 2.0, gain);
                        }
                    }
                }
            }
        }

        best
    }
}

impl RegressionTree {
    /// `indices`가 가리키는 행으로 트리를 학습합니다.
    ///
    /// `indices`에는 중복이 있어도 됩니다 (부트스트랩 표본).
    pub fn fit<R: Rng + ?Sized>(
        x: &[Vec<f64>],
        y: &[f64],
        indices: &[usize],
        params: &TreeParams,
        rng: &mut R,
    ) -> MlResult<Self> {
        if x.len() != y.len() {
            return Err(MlError::InvalidInput(format!(
                "{} feature rows but {} targets",
                x.len(),
                y.len()
            )));
        }
        if indices.is_empty() {
            return Err(MlError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }
        if indices.iter().any(|&i| i >= x.len()) {
            return Err(MlError::InvalidInput("sample index out of range".to_string()));
        }

        let n_features = x[indices[0]].len();
        if x.iter().any(|row| row.len() != n_features) {
            return Err(MlError::InvalidInput(
                "feature rows have different lengths".to_string(),
            ));
        }

        let (mut grower, sorted) = Grower::new(x, y, indices, params, n_features);
        grower.grow((0..indices.len()).collect(), sorted, 0, rng);

        Ok(Self {
            nodes: grower.nodes,
            n_features,
            impurity_decrease: grower.impurity_decrease,
        })
    }

    /// 단일 행 예측.
    ///
    /// 학습 때와 길이가 다른 입력의 범위 밖 피처는 0으로 취급합니다.
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = features.get(*feature).copied().unwrap_or(0.0);
                    idx = if value <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// 학습 시 피처 수.
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// 노드 수.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// 트리 깊이 (리프 하나뿐이면 0).
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }

    /// 피처별 제곱오차 감소량 (정규화 전).
    pub fn impurity_decrease(&self) -> &[f64] {
        &self.impurity_decrease
    }

    /// 합이 1이 되도록 정규화한 피처 중요도. 분할이 없으면 모두 0.
    pub fn feature_importances(&self) -> Vec<f64> {
        normalize(&self.impurity_decrease)
    }
}

/// 합이 1이 되도록 정규화. 합이 0이면 그대로 0 벡터.
pub(crate) fn normalize(values: &[f64]) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        values.iter().map(|v| v / total).collect()
    } else {
        vec![0.0; values.len()]
    }
}
