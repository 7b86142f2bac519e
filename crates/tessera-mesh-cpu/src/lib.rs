//! CPU section mesher: block models in, culled quad buffers out.
#![forbid(unsafe_code)]

pub mod build;
pub mod geom;
pub mod mesh_build;
pub mod neighbors;

pub use build::{build_section_mesh, is_culled};
pub use geom::Vec3;
pub use mesh_build::{MeshBuild, SectionMesh};
pub use neighbors::Neighborhood;
