//! Staging invariants of `StagedMediaSet`
//!
//! Covers the count invariant over sequences of batch selections, the
//! stage/unstage round trip, `clear`, and the size and count boundaries of
//! the default policy.

mod common;

use common::{blob, blobs, media_set};
use core_media::{StagedMediaSet, ValidationError, ValidationPolicy};

fn staged(details: usize) -> StagedMediaSet {
    StagedMediaSet::new(media_set(details), ValidationPolicy::DEFAULT)
}

#[test]
fn test_effective_count_never_exceeds_limit() {
    let max = ValidationPolicy::DEFAULT.max_detail_images;

    // Every baseline size, removal count and three-step batch sequence
    for baseline in 0..=max {
        for removed in 0..=baseline {
            for a in 0..=7 {
                for b in 0..=7 {
                    for c in 0..=7 {
                        let mut set = staged(baseline);
                        for i in 0..removed {
                            set.stage_removal(&format!("d{i}.jpg")).unwrap();
                        }

                        for batch in [a, b, c] {
                            let before = set.effective_detail_count();
                            match set.stage_detail_images(blobs(batch)) {
                                Ok(_) => assert!(set.effective_detail_count() <= max),
                                Err(ValidationError::TooManyImages { .. }) => {
                                    assert_eq!(set.effective_detail_count(), before)
                                }
                                Err(other) => panic!("unexpected error: {other}"),
                            }
                        }
                    }
                }
            }
        }
    }
}

#[test]
fn test_stage_then_unstage_removal_round_trips() {
    for baseline in 1..=5 {
        let mut set = staged(baseline);
        set.stage_detail_images(blobs(5 - baseline)).unwrap();
        if baseline > 1 {
            set.stage_removal("d0.jpg").unwrap();
        }

        let before_count = set.effective_detail_count();
        let before_active: Vec<String> =
            set.active_detail_refs().into_iter().map(String::from).collect();
        let before_removals = set.staged_removals().to_vec();

        let target = format!("d{}.jpg", baseline - 1);
        set.stage_removal(&target).unwrap();
        set.unstage_removal(&target).unwrap();

        assert_eq!(set.effective_detail_count(), before_count);
        assert_eq!(set.active_detail_refs(), before_active);
        assert_eq!(set.staged_removals(), before_removals.as_slice());
    }
}

#[test]
fn test_clear_always_leaves_nothing_pending() {
    let mut set = staged(4);
    set.stage_main_image(blob("main.jpg", 10)).unwrap();
    set.stage_removal("d1.jpg").unwrap();
    set.stage_removal("d2.jpg").unwrap();
    set.stage_detail_images(blobs(3)).unwrap();
    set.unstage_removal("d1.jpg").ok();
    set.stage_detail_images(blobs(1)).unwrap();

    set.clear();
    assert!(!set.has_pending_changes());
    assert_eq!(set.effective_detail_count(), 4);

    // Clearing an untouched set is fine too
    let mut untouched = staged(0);
    untouched.clear();
    assert!(!untouched.has_pending_changes());
}

#[test]
fn test_file_size_boundary() {
    let mut set = staged(0);

    let err = set
        .stage_main_image(blob("too-big.jpg", 512_001))
        .unwrap_err();
    assert!(matches!(
        err,
        ValidationError::OversizedFile {
            size: 512_001,
            limit: 512_000,
            ..
        }
    ));
    assert!(set.staged_main().is_none());

    let err = set
        .stage_detail_images(vec![blob("ok.jpg", 10), blob("too-big.jpg", 512_001)])
        .unwrap_err();
    assert!(matches!(err, ValidationError::OversizedFile { .. }));
    assert!(set.staged_details().is_empty());

    set.stage_main_image(blob("exact.jpg", 512_000)).unwrap();
    assert_eq!(set.staged_main().unwrap().file().name, "exact.jpg");
    set.stage_detail_images(vec![blob("exact.jpg", 512_000)])
        .unwrap();
    assert_eq!(set.staged_details().len(), 1);
}

#[test]
fn test_detail_count_boundary() {
    let mut set = staged(3);

    let err = set.stage_detail_images(blobs(3)).unwrap_err();
    assert_eq!(
        err,
        ValidationError::TooManyImages {
            requested: 6,
            limit: 5
        }
    );
    assert!(set.staged_details().is_empty());
    assert_eq!(set.effective_detail_count(), 3);

    let requests = set.stage_detail_images(blobs(2)).unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(set.effective_detail_count(), 5);
}

#[test]
fn test_unstage_that_would_exceed_limit_is_rejected() {
    let mut set = staged(5);
    set.stage_removal("d3.jpg").unwrap();
    set.stage_detail_images(blobs(1)).unwrap();

    assert!(matches!(
        set.unstage_removal("d3.jpg"),
        Err(ValidationError::TooManyImages { .. })
    ));
    assert!(set.is_removal_staged("d3.jpg"));

    // Dropping the new batch frees the slot again
    set.stage_detail_images(Vec::new()).unwrap();
    set.unstage_removal("d3.jpg").unwrap();
    assert!(!set.has_pending_changes());
}

#[test]
fn test_custom_policy_applies() {
    let policy = ValidationPolicy::new(2, 100);
    let mut set = StagedMediaSet::new(media_set(1), policy);

    assert!(set.stage_detail_images(blobs(2)).is_err());
    assert!(set.stage_main_image(blob("m.jpg", 101)).is_err());
    set.stage_detail_images(vec![blob("a.jpg", 100)]).unwrap();
    assert_eq!(set.effective_detail_count(), 2);
}
