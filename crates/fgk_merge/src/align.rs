//! Longest-common-subsequence alignment of two ordered lists.
//!
//! Member and interface tables are order-sensitive, so the merge walks an
//! alignment of the two lists instead of a set union: shared items keep the
//! first list's position, exclusive items stay where their own list put them.

/// One step of an alignment walk. Indices refer back into the input slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Aligned {
    /// Item present in both lists.
    Both(usize, usize),
    /// Item only in the left list.
    Left(usize),
    /// Item only in the right list.
    Right(usize),
}

/// Aligns `left` and `right` along their longest common subsequence.
pub(crate) fn align<K: PartialEq>(left: &[K], right: &[K]) -> Vec<Aligned> {
    let n = left.len();
    let m = right.len();

    // lengths[i][j] = LCS length of left[i..] and right[j..]
    let mut lengths = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lengths[i][j] = if left[i] == right[j] {
                lengths[i + 1][j + 1] + 1
            } else {
                lengths[i + 1][j].max(lengths[i][j + 1])
            };
        }
    }

    let mut steps = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if left[i] == right[j] {
            steps.push(Aligned::Both(i, j));
            i += 1;
            j += 1;
        } else if lengths[i + 1][j] >= lengths[i][j + 1] {
            steps.push(Aligned::Left(i));
            i += 1;
        } else {
            steps.push(Aligned::Right(j));
            j += 1;
        }
    }
    while i < n {
        steps.push(Aligned::Left(i));
        i += 1;
    }
    while j < m {
        steps.push(Aligned::Right(j));
        j += 1;
    }
    steps
}
