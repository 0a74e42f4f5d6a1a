use beampack::packer::{pack, FileDescriptor};
use proptest::prelude::*;
use std::path::PathBuf;

fn descriptors(sizes: &[u64]) -> Vec<FileDescriptor> {
    sizes
        .iter()
        .enumerate()
        .map(|(i, &size)| FileDescriptor {
            source: PathBuf::from(format!("f{i}")),
            path:   format!("f{i}"),
            size,
            mtime:  0,
            mode:   0o644,
        })
        .collect()
}

fn capacity_and_sizes() -> impl Strategy<Value = (u64, Vec<u64>)> {
    (1u64..500).prop_flat_map(|cap| (Just(cap), prop::collection::vec(0..=cap, 0..60)))
}

proptest! {
    #[test]
    fn every_block_fits_capacity((cap, sizes) in capacity_and_sizes()) {
        for block in pack(descriptors(&sizes), cap).unwrap() {
            prop_assert!(block.size <= cap);
            prop_assert_eq!(block.size, block.files.iter().map(|f| f.file.size).sum::<u64>());
            prop_assert!(!block.files.is_empty());
        }
    }

    #[test]
    fn offsets_are_contiguous_from_zero((cap, sizes) in capacity_and_sizes()) {
        for block in pack(descriptors(&sizes), cap).unwrap() {
            let mut next = 0;
            for f in &block.files {
                prop_assert_eq!(f.offset, next);
                next += f.file.size;
            }
        }
    }

    #[test]
    fn ids_are_sequential_and_every_file_is_placed_once((cap, sizes) in capacity_and_sizes()) {
        let blocks = pack(descriptors(&sizes), cap).unwrap();
        for (i, b) in blocks.iter().enumerate() {
            prop_assert_eq!(b.id, i as i32 + 1);
        }
        let mut placed: Vec<String> = blocks.iter().flat_map(|b| b.files.iter().map(|f| f.file.path.clone())).collect();
        placed.sort();
        let mut expected: Vec<String> = (0..sizes.len()).map(|i| format!("f{i}")).collect();
        expected.sort();
        prop_assert_eq!(placed, expected);
    }

    #[test]
    fn placement_follows_descending_order((cap, sizes) in capacity_and_sizes()) {
        let placed: Vec<u64> = pack(descriptors(&sizes), cap)
            .unwrap()
            .iter()
            .flat_map(|b| b.files.iter().map(|f| f.file.size))
            .collect();
        prop_assert!(placed.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn packing_is_deterministic((cap, sizes) in capacity_and_sizes()) {
        prop_assert_eq!(pack(descriptors(&sizes), cap).unwrap(), pack(descriptors(&sizes), cap).unwrap());
    }

    #[test]
    fn a_sealed_block_could_not_take_the_next_file((cap, sizes) in capacity_and_sizes()) {
        let blocks = pack(descriptors(&sizes), cap).unwrap();
        for pair in blocks.windows(2) {
            let first_of_next = pair[1].files[0].file.size;
            prop_assert!(pair[0].size + first_of_next > cap);
        }
    }
}
