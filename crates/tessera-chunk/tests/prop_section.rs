use std::collections::HashSet;

use proptest::prelude::*;
use tessera_blocks::Block;
use tessera_chunk::{BuildGuard, ChunkCoord, SECTION_SIZE, Section, World};

fn arb_cell() -> impl Strategy<Value = (usize, usize, usize, u16)> {
    (0..SECTION_SIZE, 0..SECTION_SIZE, 0..SECTION_SIZE, 0u16..8)
}

proptest! {
    // Each write moves the build number by exactly one, whatever it writes.
    #[test]
    fn set_block_k_times_adds_k(cells in prop::collection::vec(arb_cell(), 0..200)) {
        let mut s = Section::new();
        let start = s.build();
        for &(x, y, z, id) in &cells {
            s.set_block(x, y, z, Block::new(id, 0));
        }
        prop_assert_eq!(s.build(), start + cells.len() as u64);
    }

    // The last write to a cell wins and other cells are untouched.
    #[test]
    fn last_write_wins(cells in prop::collection::vec(arb_cell(), 1..100)) {
        let mut s = Section::new();
        let mut expect = std::collections::HashMap::new();
        for &(x, y, z, id) in &cells {
            s.set_block(x, y, z, Block::new(id, 0));
            expect.insert((x, y, z), Block::new(id, 0));
        }
        for y in 0..SECTION_SIZE {
            for z in 0..SECTION_SIZE {
                for x in 0..SECTION_SIZE {
                    let want = expect.get(&(x, y, z)).copied().unwrap_or(Block::AIR);
                    prop_assert_eq!(s.get_local(x, y, z), want);
                }
            }
        }
    }

    // Guard accepts exactly the running maxima of the sequence.
    #[test]
    fn guard_accepts_strict_running_max(builds in prop::collection::vec(0u64..50, 0..64)) {
        let g = BuildGuard::new();
        let mut best: Option<u64> = None;
        for b in builds {
            let expect = best.is_none_or(|m| b > m);
            prop_assert_eq!(g.try_accept(b), expect);
            if expect {
                best = Some(b);
            }
        }
        prop_assert_eq!(g.installed(), best);
    }

    // World writes land in the section that `block_at` reads back from.
    #[test]
    fn world_writes_read_back(wx in -40i32..40, wy in 0i32..256, wz in -40i32..40, id in 1u16..8) {
        let mut world: World = World::new();
        let coord = ChunkCoord::containing(wx, wz);
        let reg = tessera_blocks::BlockRegistry::new(std::sync::Arc::new(tessera_blocks::TextureAtlas::new(16, 16)));
        world.load_chunk(coord, std::iter::empty::<(u8, &[u8])>(), &reg).unwrap();
        let up = world.set_block(wx, wy, wz, Block::new(id, 0)).unwrap();
        prop_assert_eq!(up.key.coord, coord);
        prop_assert_eq!(i32::from(up.key.sy), wy / 16);
        prop_assert_eq!(world.block_at(wx, wy, wz), Block::new(id, 0));
    }
}

#[test]
fn index_layout_is_a_bijection() {
    let mut s = Section::new();
    let mut seen = HashSet::new();
    for y in 0..SECTION_SIZE {
        for z in 0..SECTION_SIZE {
            for x in 0..SECTION_SIZE {
                s.set_block(x, y, z, Block::new(1, 0));
                let i = s.blocks().iter().position(|b| !b.is_air()).unwrap();
                assert_eq!(i, (y * SECTION_SIZE + z) * SECTION_SIZE + x);
                assert!(seen.insert(i));
                s.set_block(x, y, z, Block::AIR);
            }
        }
    }
    assert_eq!(seen.len(), SECTION_SIZE.pow(3));
}
