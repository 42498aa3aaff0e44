use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;

/// Exclusive upper bound on the X extent of any run.
pub const X_LIMIT: i64 = i32::MAX as i64 + 1;

/// A voxel coordinate in absolute volume space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Point3 {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// A run of `length` voxels starting at `start` and extending along +X.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rle {
    pub start: Point3,
    pub length: u32,
}

impl Rle {
    pub const fn new(start: Point3, length: u32) -> Self {
        Self { start, length }
    }

    /// Shorthand for a run at `(x, y, z)`.
    pub const fn at(x: i32, y: i32, z: i32, length: u32) -> Self {
        Self::new(Point3::new(x, y, z), length)
    }

    /// Exclusive end along X.
    pub fn end_x(&self) -> i64 {
        self.start.x as i64 + self.length as i64
    }

    /// Fails if the run is empty or extends past the i32 X range.
    pub fn check_bounds(&self) -> Result<()> {
        if self.length == 0 {
            return Err(Error::Decode(format!("zero-length run at {self}")));
        }
        if self.end_x() > X_LIMIT {
            return Err(Error::Decode(format!("run {self} extends past x = {X_LIMIT}")));
        }
        Ok(())
    }

    fn same_row(&self, other: &Rle) -> bool {
        self.start.y == other.start.y && self.start.z == other.start.z
    }

    fn with_x_span(&self, beg: i64, end: i64) -> Rle {
        Rle::at(beg as i32, self.start.y, self.start.z, (end - beg) as u32)
    }

    /// Removes the voxels of `cut` from this run.
    ///
    /// Returns `None` when the two runs share no voxel. Otherwise returns the
    /// 0, 1 or 2 fragments of `self` left over, in X order; an empty vector
    /// means the run was removed entirely.
    pub fn excise(&self, cut: &Rle) -> Option<Vec<Rle>> {
        if !self.same_row(cut) {
            return None;
        }
        let (beg, end) = (self.start.x as i64, self.end_x());
        let (cut_beg, cut_end) = (cut.start.x as i64, cut.end_x());
        if cut_end <= beg || cut_beg >= end {
            return None;
        }

        let mut frags = Vec::with_capacity(2);
        if cut_beg > beg {
            frags.push(self.with_x_span(beg, cut_beg));
        }
        if cut_end < end {
            frags.push(self.with_x_span(cut_end, end));
        }
        Some(frags)
    }
}

impl Ord for Rle {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.start.z, self.start.y, self.start.x, self.length).cmp(&(
            other.start.z,
            other.start.y,
            other.start.x,
            other.length,
        ))
    }
}

impl PartialOrd for Rle {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Rle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})+{}",
            self.start.x, self.start.y, self.start.z, self.length
        )
    }
}

/// An ordered list of runs.
///
/// Lists produced by [`Rles::normalized`] and [`Rles::union`] are sorted and
/// coalesced: no two runs on the same row overlap or touch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rles(Vec<Rle>);

impl Rles {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rle> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Rle] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Rle> {
        self.0
    }

    pub fn push(&mut self, rle: Rle) {
        self.0.push(rle);
    }

    pub fn sort(&mut self) {
        self.0.sort_unstable();
    }

    /// Total voxels covered, counting overlaps twice.
    pub fn num_voxels(&self) -> u64 {
        self.0.iter().map(|r| r.length as u64).sum()
    }

    /// Returns a sorted copy with overlapping or adjacent runs on the same row
    /// combined into one.
    ///
    /// A coalesced span longer than `u32::MAX` voxels is kept as two touching
    /// runs. Runs are expected to pass [`Rle::check_bounds`].
    pub fn normalized(&self) -> Rles {
        let mut sorted = self.0.clone();
        sorted.sort_unstable();

        let mut out: Vec<Rle> = Vec::with_capacity(sorted.len());
        for rle in sorted {
            if let Some(last) = out.last_mut() {
                if last.same_row(&rle) && rle.start.x as i64 <= last.end_x() {
                    let beg = last.start.x as i64;
                    let end = last.end_x().max(rle.end_x());
                    let cap = beg + u32::MAX as i64;
                    *last = last.with_x_span(beg, end.min(cap));
                    if end > cap {
                        let rest = last.with_x_span(cap, end);
                        out.push(rest);
                    }
                    continue;
                }
            }
            out.push(rle);
        }
        Rles(out)
    }

    /// Fails on the first run that does not pass [`Rle::check_bounds`].
    pub fn check_bounds(&self) -> Result<()> {
        self.0.iter().try_for_each(Rle::check_bounds)
    }

    /// Union of two run lists as a sorted, coalesced list.
    pub fn union(&self, other: &Rles) -> Rles {
        let mut all = Vec::with_capacity(self.len() + other.len());
        all.extend_from_slice(&self.0);
        all.extend_from_slice(&other.0);
        Rles(all).normalized()
    }

    /// In-place form of [`Rles::union`].
    pub fn add(&mut self, other: &Rles) {
        *self = self.union(other);
    }
}

impl From<Vec<Rle>> for Rles {
    fn from(v: Vec<Rle>) -> Self {
        Self(v)
    }
}

impl FromIterator<Rle> for Rles {
    fn from_iter<I: IntoIterator<Item = Rle>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Rles {
    type Item = Rle;
    type IntoIter = std::vec::IntoIter<Rle>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Rles {
    type Item = &'a Rle;
    type IntoIter = std::slice::Iter<'a, Rle>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
pub(crate) mod strategies {
    use super::*;
    use proptest::prelude::*;

    /// Short runs on a handful of rows, so lists overlap and touch often.
    pub fn small_rle() -> impl Strategy<Value = Rle> {
        (-40i32..40, -2i32..2, -2i32..2, 1u32..24).prop_map(|(x, y, z, n)| Rle::at(x, y, z, n))
    }

    pub fn small_rles() -> impl Strategy<Value = Rles> {
        proptest::collection::vec(small_rle(), 0..12).prop_map(Rles::from)
    }

    /// Any run that passes [`Rle::check_bounds`].
    pub fn any_rle() -> impl Strategy<Value = Rle> {
        (any::<i32>(), any::<i32>(), any::<i32>()).prop_flat_map(|(x, y, z)| {
            let max = (X_LIMIT - x as i64).min(u32::MAX as i64) as u32;
            (1..=max).prop_map(move |n| Rle::at(x, y, z, n))
        })
    }

    /// Sorted, and no two runs on one row overlap or touch.
    pub fn is_canonical(rles: &Rles) -> bool {
        rles.as_slice().windows(2).all(|w| {
            w[0] < w[1]
                && (!w[0].same_row(&w[1]) || w[0].end_x() < w[1].start.x as i64)
        })
    }

    /// Voxels as `(x, y, z)`; only for small inputs.
    pub fn voxels(rles: &Rles) -> std::collections::BTreeSet<(i64, i32, i32)> {
        rles.iter()
            .flat_map(|r| (r.start.x as i64..r.end_x()).map(move |x| (x, r.start.y, r.start.z)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::strategies::*;
    use super::*;
    use proptest::prelude::*;

    fn row(spans: &[(i32, u32)]) -> Rles {
        spans.iter().map(|&(x, n)| Rle::at(x, 0, 0, n)).collect()
    }

    #[test]
    fn excise_reports_no_intersection() {
        let orig = Rle::at(10, 0, 0, 5);
        assert_eq!(orig.excise(&Rle::at(0, 0, 0, 10)), None);
        assert_eq!(orig.excise(&Rle::at(15, 0, 0, 3)), None);
        // Same X span, different row.
        assert_eq!(orig.excise(&Rle::at(10, 1, 0, 5)), None);
        assert_eq!(orig.excise(&Rle::at(10, 0, 1, 5)), None);
    }

    #[test]
    fn excise_full_removal_is_empty_not_none() {
        let orig = Rle::at(10, 2, 3, 5);
        assert_eq!(orig.excise(&orig), Some(vec![]));
        assert_eq!(orig.excise(&Rle::at(0, 2, 3, 100)), Some(vec![]));
    }

    #[test]
    fn excise_middle_leaves_two_fragments() {
        let orig = Rle::at(0, 1, 1, 10);
        let frags = orig.excise(&Rle::at(2, 1, 1, 3)).unwrap();
        assert_eq!(frags, vec![Rle::at(0, 1, 1, 2), Rle::at(5, 1, 1, 5)]);
    }

    #[test]
    fn excise_edges_leave_one_fragment() {
        let orig = Rle::at(0, 0, 0, 10);
        assert_eq!(
            orig.excise(&Rle::at(0, 0, 0, 4)).unwrap(),
            vec![Rle::at(4, 0, 0, 6)]
        );
        assert_eq!(
            orig.excise(&Rle::at(7, 0, 0, 10)).unwrap(),
            vec![Rle::at(0, 0, 0, 7)]
        );
    }

    #[test]
    fn excise_handles_negative_coordinates() {
        let orig = Rle::at(-8, -1, -1, 8);
        assert_eq!(
            orig.excise(&Rle::at(-4, -1, -1, 2)).unwrap(),
            vec![Rle::at(-8, -1, -1, 4), Rle::at(-2, -1, -1, 2)]
        );
    }

    #[test]
    fn ordering_is_z_then_y_then_x() {
        let mut v = vec![
            Rle::at(0, 0, 1, 1),
            Rle::at(5, 1, 0, 1),
            Rle::at(3, 0, 0, 1),
            Rle::at(-2, 1, 0, 1),
        ];
        v.sort();
        assert_eq!(
            v,
            vec![
                Rle::at(3, 0, 0, 1),
                Rle::at(-2, 1, 0, 1),
                Rle::at(5, 1, 0, 1),
                Rle::at(0, 0, 1, 1),
            ]
        );
    }

    #[test]
    fn union_coalesces_adjacent_and_overlapping() {
        let a = row(&[(0, 5), (20, 2)]);
        let b = row(&[(5, 3), (21, 4)]);
        assert_eq!(a.union(&b), row(&[(0, 8), (20, 5)]));
    }

    #[test]
    fn union_keeps_rows_apart() {
        let a: Rles = vec![Rle::at(0, 0, 0, 4)].into();
        let b: Rles = vec![Rle::at(4, 1, 0, 4)].into();
        let u = a.union(&b);
        assert_eq!(u.len(), 2);
        assert_eq!(u.num_voxels(), 8);
    }

    #[test]
    fn span_longer_than_u32_stays_two_runs() {
        let rles: Rles = vec![
            Rle::at(i32::MAX, 0, 0, 1),
            Rle::at(i32::MIN, 0, 0, u32::MAX),
        ]
        .into();
        rles.check_bounds().unwrap();
        let n = rles.normalized();
        assert_eq!(
            n.as_slice(),
            &[Rle::at(i32::MIN, 0, 0, u32::MAX), Rle::at(i32::MAX, 0, 0, 1)]
        );
        assert_eq!(n.num_voxels(), 1u64 << 32);
    }

    #[test]
    fn check_bounds_rejects_empty_and_overlong_runs() {
        assert!(Rle::at(0, 0, 0, 0).check_bounds().is_err());
        assert!(Rle::at(i32::MAX - 1, 0, 0, 4).check_bounds().is_err());
        assert!(Rle::at(i32::MAX - 3, 0, 0, 4).check_bounds().is_ok());
    }

    proptest! {
        #[test]
        fn union_is_commutative(a in small_rles(), b in small_rles()) {
            prop_assert_eq!(a.union(&b), b.union(&a));
        }

        #[test]
        fn union_is_idempotent(a in small_rles()) {
            let n = a.normalized();
            prop_assert_eq!(a.union(&a), n.clone());
            prop_assert_eq!(n.union(&n), n);
        }

        #[test]
        fn union_covers_both_inputs(a in small_rles(), b in small_rles()) {
            let u = a.union(&b);
            prop_assert!(is_canonical(&u));
            let mut want = voxels(&a);
            want.extend(voxels(&b));
            prop_assert_eq!(u.num_voxels(), want.len() as u64);
            prop_assert_eq!(voxels(&u), want);
        }

        #[test]
        fn union_of_disjoint_sums_voxel_counts(a in small_rles(), b in small_rles()) {
            let (a, b) = (a.normalized(), b.normalized());
            // Shift b onto its own slices.
            let b: Rles = b
                .iter()
                .map(|r| Rle::at(r.start.x, r.start.y, r.start.z + 10, r.length))
                .collect();
            prop_assert_eq!(a.union(&b).num_voxels(), a.num_voxels() + b.num_voxels());
        }
    }

    #[test]
    fn add_in_place_matches_union() {
        let mut a = row(&[(0, 5)]);
        a.add(&row(&[(5, 3)]));
        assert_eq!(a, row(&[(0, 8)]));
    }
}
