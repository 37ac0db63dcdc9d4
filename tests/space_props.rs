use doccrack::space::{
    Alphabet, CandidateSpace, CharsetSpace, CompositeSpace, DigitSpace, PasswordSpace,
};
use proptest::prelude::*;

fn mixed_composite() -> CompositeSpace {
    let abc = Alphabet::new("abc").unwrap();
    CompositeSpace::new(vec![
        DigitSpace::new(1).unwrap().into(),
        CharsetSpace::new(2, abc.clone()).unwrap().into(),
        DigitSpace::new(3).unwrap().into(),
        CharsetSpace::new(3, abc).unwrap().into(),
    ])
    .unwrap()
}

proptest! {
    #[test]
    fn digit_positions_round_trip(len in 1usize..=12, seed in any::<u64>()) {
        let space = DigitSpace::new(len).unwrap();
        let pos = seed % space.total_count();
        let candidate = space.position_to_candidate(pos).unwrap();
        prop_assert_eq!(candidate.len(), len);
        prop_assert!(candidate.bytes().all(|b| b.is_ascii_digit()));
        prop_assert_eq!(space.candidate_to_position(&candidate).unwrap(), pos);
    }

    #[test]
    fn charset_batches_match_single_lookups(
        len in 1usize..=4,
        start_seed in any::<u64>(),
        count in 0u64..64,
    ) {
        let alphabet = Alphabet::from_sets(true, false, true, false).unwrap();
        let space = CharsetSpace::new(len, alphabet).unwrap();
        let start = start_seed % (space.total_count() + 1);
        let batch = space.generate_batch(start, count).unwrap();
        prop_assert_eq!(batch.len() as u64, count.min(space.total_count() - start));
        for (i, candidate) in batch.iter().enumerate() {
            let pos = start + i as u64;
            prop_assert_eq!(&space.position_to_candidate(pos).unwrap(), candidate);
            prop_assert_eq!(space.candidate_to_position(candidate).unwrap(), pos);
        }
    }

    #[test]
    fn composite_batches_cross_part_boundaries(start_seed in any::<u64>(), count in 1u64..200) {
        let space = PasswordSpace::from(mixed_composite());
        let total = space.total_count();
        prop_assert_eq!(total, 10 + 9 + 1000 + 27);
        let start = start_seed % total;
        let batch = space.generate_batch(start, count).unwrap();
        for (i, candidate) in batch.iter().enumerate() {
            prop_assert_eq!(space.candidate_to_position(candidate).unwrap(), start + i as u64);
        }
    }

    #[test]
    fn out_of_range_positions_are_rejected(extra in 0u64..1_000) {
        let space = DigitSpace::new(2).unwrap();
        prop_assert!(space.position_to_candidate(100 + extra).is_err());
    }
}
