//! 작은 선형 최소제곱 풀이.
//!
//! 시계열 모델의 설계 행렬은 열이 10개 안팎이므로 정규방정식
//! `(XᵀX + λI) β = Xᵀy`를 부분 피벗 가우스 소거로 직접 풉니다.

use crate::ml::{MlError, MlResult};

/// 특이 행렬로 판단하는 피벗 절대값 하한.
const PIVOT_EPSILON: f64 = 1e-12;

/// 릿지 정규화 최소제곱 해 `β`를 구합니다.
///
/// `design`의 각 행은 관측치 하나의 설계 벡터입니다.
pub(crate) fn least_squares(design: &[Vec<f64>], target: &[f64], ridge: f64) -> MlResult<Vec<f64>> {
    if design.len() != target.len() {
        return Err(MlError::InvalidInput(format!(
            "design has {} rows but target has {}",
            design.len(),
            target.len()
        )));
    }
    let p = design.first().map(Vec::len).unwrap_or(0);
    if p == 0 {
        return Err(MlError::Training("empty design matrix".to_string()));
    }

    let mut xtx = vec![vec![0.0; p]; p];
    let mut xty = vec![0.0; p];
    for (row, &y) in design.iter().zip(target) {
        for a in 0..p {
            xty[a] += row[a] * y;
            for b in 0..p {
                xtx[a][b] += row[a] * row[b];
            }
        }
    }
    for (d, row) in xtx.iter_mut().enumerate() {
        row[d] += ridge;
    }

    solve(xtx, xty)
}

/// 가우스-조르당 소거로 `A x = b`를 풉니다.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> MlResult<Vec<f64>> {
    let p = b.len();
    for i in 0..p {
        let pivot_row = (i..p)
            .max_by(|&r, &s| a[r][i].abs().total_cmp(&a[s][i].abs()))
            .unwrap_or(i);
        if pivot_row != i {
            a.swap(i, pivot_row);
            b.swap(i, pivot_row);
        }

        let pivot = a[i][i];
        if !pivot.is_finite() || pivot.abs() < PIVOT_EPSILON {
            return Err(MlError::Training(format!(
                "singular normal equations at column {}",
                i
            )));
        }

        let inv = 1.0 / pivot;
        for value in a[i][i..].iter_mut() {
            *value *= inv;
        }
        b[i] *= inv;

        for r in 0..p {
            if r == i {
                continue;
            }
            let factor = a[r][i];
            if factor == 0.0 {
                continue;
            }
            for j in i..p {
                a[r][j] -= factor * a[i][j];
            }
            b[r] -= factor * b[i];
        }
    }

    if b.iter().all(|v| v.is_finite()) {
        Ok(b)
    } else {
        Err(MlError::Training("non-finite coefficients".to_string()))
    }
}
