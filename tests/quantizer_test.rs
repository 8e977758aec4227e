//! End-to-end tests for rhythm quantization and its timeline round trip.

use tactus::{
    rational, Artifact, Event, QuantizeError, QuantizeOptions, RhythmTree, Timeline,
};

fn chord(pitch: u8) -> Artifact {
    Artifact::Chord(vec![pitch])
}

fn timeline(onsets: &[(i64, i64)], start: (i64, i64), end: (i64, i64)) -> Timeline {
    let events = onsets
        .iter()
        .enumerate()
        .map(|(i, &(n, d))| Event::new(rational(n, d), chord(60 + i as u8)))
        .collect();
    Timeline::new(events, rational(start.0, start.1), rational(end.0, end.1))
}

fn options(divisions: &[u32]) -> QuantizeOptions {
    QuantizeOptions {
        divisions: divisions.to_vec(),
        ..QuantizeOptions::default()
    }
}

#[test]
fn triplet_is_one_level_of_three() {
    let tim = timeline(&[(0, 1), (1, 3), (2, 3)], (0, 1), (1, 1));
    let rt = RhythmTree::quantize(&tim, &options(&[2, 3])).unwrap();
    let top = rt.tree().children(rt.tree().root())[0];
    assert_eq!(rt.tree().children(top).len(), 3);
    assert_eq!(rt.leaf_onsets(), vec![rational(0, 1), rational(1, 3), rational(2, 3)]);
}

#[test]
fn plain_half_split_beats_a_triplet_reading() {
    // {0, 1/2} fits both a halving and (wastefully) a triplet; the
    // two-leaf halving must win
    let tim = timeline(&[(0, 1), (1, 2)], (0, 1), (1, 1));
    let rt = RhythmTree::quantize(&tim, &options(&[2, 3])).unwrap();
    assert_eq!(rt.tree().leaves().len(), 2);
    let top = rt.tree().children(rt.tree().root())[0];
    assert_eq!(rt.tree().children(top).len(), 2);
}

#[test]
fn dotted_rhythm_gets_a_continuation_leaf() {
    let tim = timeline(&[(0, 1), (3, 4)], (0, 1), (1, 1));
    let rt = RhythmTree::quantize(&tim, &options(&[2, 3])).unwrap();
    // leaves: onset, sustained half, onset
    assert_eq!(rt.tree().leaves().len(), 3);
    assert_eq!(
        rt.leaf_onsets(),
        vec![rational(0, 1), rational(1, 2), rational(3, 4)]
    );
    // the continuation leaf is dropped on reconstruction
    let back = rt.to_timeline(rational(0, 1), rational(1, 1));
    assert_eq!(back, tim);
}

#[test]
fn quantization_round_trips_over_the_original_span() {
    let tim = timeline(&[(0, 1), (1, 2), (3, 4), (3, 2)], (0, 1), (2, 1));
    let rt = RhythmTree::quantize(&tim, &options(&[2, 3])).unwrap();
    assert_eq!(rt.to_timeline(rational(0, 1), rational(2, 1)), tim);
}

#[test]
fn simultaneous_artifacts_share_a_leaf() {
    let events = vec![
        Event::new(rational(0, 1), chord(60)),
        Event::new(rational(1, 2), chord(64)),
        Event::new(rational(1, 2), chord(67)),
    ];
    let tim = Timeline::new(events, rational(0, 1), rational(1, 1));
    let rt = RhythmTree::quantize(&tim, &options(&[2])).unwrap();
    assert_eq!(rt.tree().leaves().len(), 2);
    let back = rt.to_timeline(rational(0, 1), rational(1, 1));
    assert_eq!(back, tim);
}

#[test]
fn rests_survive_the_round_trip() {
    let events = vec![
        Event::new(rational(0, 1), Artifact::Rest),
        Event::new(rational(1, 2), chord(60)),
    ];
    let tim = Timeline::new(events, rational(0, 1), rational(1, 1));
    let rt = RhythmTree::quantize(&tim, &options(&[2])).unwrap();
    assert_eq!(rt.to_timeline(rational(0, 1), rational(1, 1)), tim);
}

#[test]
fn even_six_without_policy_is_ambiguous() {
    let tim = timeline(
        &[(0, 1), (1, 3), (2, 3), (1, 1), (4, 3), (5, 3)],
        (0, 1),
        (2, 1),
    );
    assert_eq!(
        RhythmTree::quantize(&tim, &options(&[2, 3])),
        Err(QuantizeError::Ambiguous)
    );
}

#[test]
fn tie_break_policy_resolves_even_six() {
    let tim = timeline(
        &[(0, 1), (1, 3), (2, 3), (1, 1), (4, 3), (5, 3)],
        (0, 1),
        (2, 1),
    );
    let opts = QuantizeOptions {
        tie_breaks: Some(vec![3, 2, 2]),
        ..options(&[2, 3])
    };
    let rt = RhythmTree::quantize(&tim, &opts).unwrap();
    let top = rt.tree().children(rt.tree().root())[0];
    assert_eq!(rt.tree().children(top).len(), 3);
    for &third in rt.tree().children(top) {
        assert_eq!(rt.tree().children(third).len(), 2);
    }

    // the policy makes the result reproducible
    let again = RhythmTree::quantize(&tim, &opts).unwrap();
    assert_eq!(rt, again);
}

#[test]
fn unreachable_onset_exhausts_max_depth() {
    let tim = timeline(&[(0, 1), (1, 7)], (0, 1), (1, 1));
    let opts = QuantizeOptions {
        max_depth: 4,
        ..options(&[2, 3])
    };
    assert_eq!(
        RhythmTree::quantize(&tim, &opts),
        Err(QuantizeError::DepthExceeded(4))
    );
}

#[test]
fn septuplets_need_seven_in_the_divisor_set() {
    let tim = timeline(&[(0, 1), (1, 7), (2, 7), (3, 7), (4, 7), (5, 7), (6, 7)], (0, 1), (1, 1));
    assert!(RhythmTree::quantize(&tim, &options(&[2, 3])).is_err());
    let rt = RhythmTree::quantize(&tim, &options(&[2, 3, 5, 7])).unwrap();
    let top = rt.tree().children(rt.tree().root())[0];
    assert_eq!(rt.tree().children(top).len(), 7);
}

#[test]
fn leaf_durations_sum_to_the_whole_measure() {
    let tim = timeline(&[(0, 1), (1, 4), (3, 4)], (0, 1), (1, 1));
    let rt = RhythmTree::quantize(&tim, &options(&[2])).unwrap();
    let total: tactus::Rational = rt
        .tree()
        .leaves()
        .into_iter()
        .map(|leaf| rt.node_duration(leaf).unwrap())
        .sum();
    assert_eq!(total, rational(1, 1));
}
