mod common;

use common::{Fixture, payload};
use labelvol::{Error, MergeOp, Rle, db};

#[test]
fn merge_and_split_persist_across_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let new_label = {
        let fx = Fixture::with(db::open(dir.path()).unwrap(), 8);
        fx.seed(10, vec![Rle::at(0, 0, 0, 12), Rle::at(0, 3, 1, 5)]);
        fx.seed(11, vec![Rle::at(12, 0, 0, 4)]);

        fx.vol.merge_labels(1, &MergeOp::new(10, [11])).unwrap();
        let new_label = fx
            .vol
            .split_labels(1, 10, payload(vec![Rle::at(0, 3, 1, 5)]).as_slice())
            .unwrap();
        assert_eq!(new_label, 12);
        assert!(fx.dirty.is_empty());
        new_label
    };

    let fx = Fixture::with(db::open(dir.path()).unwrap(), 8);
    assert_eq!(fx.runs(10), vec![Rle::at(0, 0, 0, 16)]);
    assert!(fx.runs(11).is_empty());
    assert_eq!(fx.runs(new_label), vec![Rle::at(0, 3, 1, 5)]);
    // Two blocks for label 10, one for the new label.
    assert_eq!(fx.store.count_blocks().unwrap(), 3);
}

#[test]
fn full_split_removes_every_source_block() {
    let dir = tempfile::tempdir().unwrap();
    let fx = Fixture::with(db::open(dir.path()).unwrap(), 8);
    let runs = vec![Rle::at(-4, 0, 0, 8), Rle::at(0, -1, -1, 3)];
    fx.seed(2, runs.clone());

    let new_label = fx.vol.split_labels(1, 2, payload(runs.clone()).as_slice()).unwrap();

    assert!(fx.vol.get_label_rles(1, 2).unwrap().is_empty());
    assert_eq!(fx.runs(new_label), {
        let mut want = runs;
        want.sort();
        want
    });
    assert_eq!(fx.vol.label_size(1, new_label).unwrap(), 11);
}

#[test]
fn dirty_label_reads_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let fx = Fixture::with(db::open(dir.path()).unwrap(), 8);
    fx.seed(4, vec![Rle::at(0, 0, 0, 3)]);

    let ctx = fx.vol.ctx(1);
    let guard = fx.dirty.guard_label(&ctx, 4);
    assert!(matches!(fx.vol.get_sparse_vol(1, 4), Err(Error::LabelDirty(4))));
    drop(guard);

    assert_eq!(
        fx.vol.get_sparse_vol(1, 4).unwrap().into_vec(),
        vec![Rle::at(0, 0, 0, 3)]
    );
}
