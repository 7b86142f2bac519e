use tessera_blocks::UvRect;

use crate::geom::Vec3;

/// One vertex/index buffer set.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct MeshBuild {
    pub pos: Vec<f32>,
    pub norm: Vec<f32>,
    pub uv: Vec<f32>,
    pub idx: Vec<u32>,
}

impl MeshBuild {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.idx.is_empty()
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.pos.len() / 3
    }

    #[inline]
    pub fn quad_count(&self) -> usize {
        self.idx.len() / 6
    }

    /// Appends the quad `a b c d` (counter-clockwise in the face plane) as two triangles.
    ///
    /// `a` takes the bottom-left of `tex` and `c` the top-right. Winding is flipped when
    /// needed so the front side faces `n`.
    pub fn add_quad(&mut self, a: Vec3, b: Vec3, c: Vec3, d: Vec3, n: Vec3, tex: UvRect) {
        let base = self.vertex_count() as u32;
        let mut vs = [a, b, c, d];
        let mut uvs = [
            (tex.u0, tex.v1),
            (tex.u1, tex.v1),
            (tex.u1, tex.v0),
            (tex.u0, tex.v0),
        ];
        if (vs[1] - vs[0]).cross(vs[2] - vs[0]).dot(n) < 0.0 {
            vs.swap(1, 3);
            uvs.swap(1, 3);
        }
        for i in 0..4 {
            self.pos.extend_from_slice(&vs[i].to_array());
            self.norm.extend_from_slice(&n.to_array());
            self.uv.extend_from_slice(&[uvs[i].0, uvs[i].1]);
        }
        self.idx
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    /// Raw little-endian dump of every buffer in order: positions, normals, UVs, indices.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            (self.pos.len() + self.norm.len() + self.uv.len()) * 4 + self.idx.len() * 4,
        );
        out.extend_from_slice(bytemuck::cast_slice(&self.pos));
        out.extend_from_slice(bytemuck::cast_slice(&self.norm));
        out.extend_from_slice(bytemuck::cast_slice(&self.uv));
        out.extend_from_slice(bytemuck::cast_slice(&self.idx));
        out
    }
}

/// Finished geometry of one section, split by render layer.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct SectionMesh {
    pub opaque: MeshBuild,
    pub transparent: MeshBuild,
}

impl SectionMesh {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.transparent.is_empty()
    }

    #[inline]
    pub fn quad_count(&self) -> usize {
        self.opaque.quad_count() + self.transparent.quad_count()
    }

    /// Transparent buffer, or `None` when there is no transparent geometry.
    #[inline]
    pub fn transparent(&self) -> Option<&MeshBuild> {
        (!self.transparent.is_empty()).then_some(&self.transparent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winding_follows_normal() {
        let mut m = MeshBuild::default();
        let tex = UvRect {
            u0: 0.0,
            v0: 0.0,
            u1: 1.0,
            v1: 1.0,
        };
        // counter-clockwise seen from +Y is clockwise seen from -Y
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(1.0, 0.0, 0.0);
        let c = Vec3::new(1.0, 0.0, 1.0);
        let d = Vec3::new(0.0, 0.0, 1.0);
        m.add_quad(a, b, c, d, Vec3::new(0.0, -1.0, 0.0), tex);
        assert_eq!(m.quad_count(), 1);
        let p = |i: usize| Vec3::new(m.pos[i * 3], m.pos[i * 3 + 1], m.pos[i * 3 + 2]);
        let facing = (p(1) - p(0)).cross(p(2) - p(0)).y;
        assert!(facing < 0.0);
        assert_eq!(m.to_bytes().len(), (12 + 12 + 8 + 6) * 4);
    }
}
