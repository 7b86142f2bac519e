use std::time::Instant;

use tessera_blocks::model::BLOCK_TEXELS;
use tessera_blocks::{Block, BlockRegistry, Face, ModelFace, RenderLayer};
use tessera_chunk::{Neighbor, SECTION_SIZE, SectionSnapshot};

use crate::geom::Vec3;
use crate::mesh_build::{MeshBuild, SectionMesh};
use crate::neighbors::Neighborhood;

const TEXEL: f32 = 1.0 / BLOCK_TEXELS as f32;

/// Whether `face` of `block` is hidden by `neighbor`.
pub fn is_culled(reg: &BlockRegistry, block: Block, face: &ModelFace, neighbor: Block) -> bool {
    if !face.cullable || face.diagonal {
        return false;
    }
    if neighbor.is_unloaded() || neighbor.is_air() {
        return false;
    }
    if reg.is_full_opaque(neighbor) {
        return true;
    }
    // anything else only seals against the same kind of shape
    if !reg.same_shape(block, neighbor) {
        return false;
    }
    let Some(model) = reg.model(neighbor) else {
        return false;
    };
    let sealing = reg.layer(neighbor) == RenderLayer::Opaque || neighbor.id == block.id;
    sealing && model.seals(face.face.opposite(), face)
}

/// Corners of `face` in block units relative to the block origin, counter-clockwise in the
/// face's own (u, v) space.
fn face_corners(face: &ModelFace) -> [Vec3; 4] {
    if face.diagonal {
        let (x0, z0, x1, z1) = match face.face {
            Face::Front | Face::Back => (0.0, 0.0, 1.0, 1.0),
            _ => (0.0, 1.0, 1.0, 0.0),
        };
        return [
            Vec3::new(x0, 0.0, z0),
            Vec3::new(x1, 0.0, z1),
            Vec3::new(x1, 1.0, z1),
            Vec3::new(x0, 1.0, z0),
        ];
    }
    let u0 = f32::from(face.x) * TEXEL;
    let v0 = f32::from(face.y) * TEXEL;
    let u1 = f32::from(face.x + face.width) * TEXEL;
    let v1 = f32::from(face.y + face.height) * TEXEL;
    let d = f32::from(face.depth) * TEXEL;
    let at = |u: f32, v: f32| match face.face {
        Face::Top | Face::Bottom => Vec3::new(u, d, v),
        Face::Front | Face::Back => Vec3::new(u, v, d),
        Face::Left | Face::Right => Vec3::new(d, v, u),
    };
    [at(u0, v0), at(u1, v0), at(u1, v1), at(u0, v1)]
}

fn face_normal(face: &ModelFace) -> Vec3 {
    if !face.diagonal {
        return Vec3::from(face.face.normal());
    }
    let s = std::f32::consts::FRAC_1_SQRT_2;
    match face.face {
        Face::Front => Vec3::new(-s, 0.0, s),
        Face::Back => Vec3::new(s, 0.0, -s),
        Face::Left => Vec3::new(s, 0.0, s),
        _ => Vec3::new(-s, 0.0, -s),
    }
}

fn emit_face(out: &mut MeshBuild, origin: Vec3, face: &ModelFace) {
    let [a, b, c, d] = face_corners(face).map(|p| p + origin);
    let tex = if face.diagonal {
        face.texture.uv
    } else {
        match face.face {
            Face::Top | Face::Bottom => face.texture.uv.sub(
                f32::from(face.x),
                f32::from(face.y),
                f32::from(face.width),
                f32::from(face.height),
            ),
            // texture rows run downward while side rects are measured upward
            _ => face.texture.uv.sub(
                f32::from(face.x),
                f32::from(BLOCK_TEXELS - face.y - face.height),
                f32::from(face.width),
                f32::from(face.height),
            ),
        }
    };
    out.add_quad(a, b, c, d, face_normal(face), tex);
}

/// Meshes one section against its six neighbors.
///
/// Pure and deterministic: the same snapshot, neighbors and registry always produce the
/// same buffers. Positions are section-local in block units.
pub fn build_section_mesh(
    reg: &BlockRegistry,
    center: &SectionSnapshot,
    neighbors: &[Neighbor; 6],
) -> SectionMesh {
    let mut mesh = SectionMesh::default();
    if center.is_empty() {
        return mesh;
    }
    let t0 = Instant::now();
    let hood = Neighborhood::new(center, neighbors);
    let s = SECTION_SIZE;
    for y in 0..s {
        for z in 0..s {
            for x in 0..s {
                let block = center.get_local(x, y, z);
                if block.is_air() {
                    continue;
                }
                let Some(model) = reg.model(block) else {
                    continue;
                };
                let out = match reg.layer(block) {
                    RenderLayer::Opaque => &mut mesh.opaque,
                    RenderLayer::Transparent => &mut mesh.transparent,
                };
                let origin = Vec3::new(x as f32, y as f32, z as f32);
                for face in model.faces() {
                    let (dx, dy, dz) = face.face.delta();
                    let other = hood.get(x as i32 + dx, y as i32 + dy, z as i32 + dz);
                    if is_culled(reg, block, face, other) {
                        continue;
                    }
                    emit_face(out, origin, face);
                }
            }
        }
    }
    log::trace!(
        "meshed section build {}: {} opaque + {} transparent quads in {:?}",
        center.build(),
        mesh.opaque.quad_count(),
        mesh.transparent.quad_count(),
        t0.elapsed()
    );
    mesh
}
