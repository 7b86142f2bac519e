use tessera_blocks::{Block, Face};
use tessera_chunk::{Neighbor, SECTION_SIZE, SectionSnapshot};

/// A section snapshot together with its six face-adjacent neighbors, indexed by
/// [`Face::index`].
#[derive(Clone, Copy, Debug)]
pub struct Neighborhood<'a> {
    center: &'a SectionSnapshot,
    sides: &'a [Neighbor; 6],
}

impl<'a> Neighborhood<'a> {
    #[inline]
    pub fn new(center: &'a SectionSnapshot, sides: &'a [Neighbor; 6]) -> Self {
        Self { center, sides }
    }

    #[inline]
    pub fn side(&self, face: Face) -> &'a Neighbor {
        &self.sides[face.index()]
    }

    /// Block at section-local coordinates, which may lie one section away along a single
    /// axis. Cells further out (edges, corners) are not known and read as unloaded.
    pub fn get(&self, x: i32, y: i32, z: i32) -> Block {
        if let Some(b) = self.center.get(x, y, z) {
            return b;
        }
        let s = SECTION_SIZE as i32;
        let near = |v: i32| (-s..2 * s).contains(&v);
        if !(near(x) && near(y) && near(z)) {
            return Block::UNLOADED;
        }
        let wrap = |v: i32| v.rem_euclid(s) as usize;
        let out = |v: i32| !(0..s).contains(&v);
        let face = match (out(x), out(y), out(z)) {
            (true, false, false) if x >= s => Face::Left,
            (true, false, false) => Face::Right,
            (false, true, false) if y >= s => Face::Top,
            (false, true, false) => Face::Bottom,
            (false, false, true) if z >= s => Face::Front,
            (false, false, true) => Face::Back,
            _ => return Block::UNLOADED,
        };
        self.side(face).get_local(wrap(x), wrap(y), wrap(z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_chunk::Section;

    #[test]
    fn routes_each_axis() {
        let mut c = Section::new();
        c.set_block(0, 0, 0, Block::new(1, 0));
        let center = c.snapshot();
        let mut above = Section::new();
        above.set_block(4, 0, 4, Block::new(2, 0));
        let mut sides: [Neighbor; 6] = Default::default();
        sides[Face::Top.index()] = Neighbor::Loaded(above.snapshot());
        sides[Face::Bottom.index()] = Neighbor::Empty;
        let n = Neighborhood::new(&center, &sides);

        assert_eq!(n.get(0, 0, 0), Block::new(1, 0));
        assert_eq!(n.get(4, 16, 4), Block::new(2, 0));
        assert_eq!(n.get(4, -1, 4), Block::AIR);
        assert_eq!(n.get(-1, 3, 3), Block::UNLOADED);
        assert_eq!(n.get(16, 16, 0), Block::UNLOADED);
        assert_eq!(n.get(0, 40, 0), Block::UNLOADED);
    }
}
