mod model;
mod types;

pub use model::{BoneTable, Lod, Model, Part, SubMesh, SubMeshGeometry};
pub use types::{compute_bounding_box, BoundingBox, Vertex};
