use crate::Model;

/// 模型顶点格式，与 MDL 顶点元素一一对应
///
/// bitangent 的 xyz 为副切线方向，w 保存手性符号 (±1)
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv0: [f32; 2],
    pub uv1: [f32; 2],
    pub normal: [f32; 3],
    pub bitangent: [f32; 4],
    pub color: [f32; 4],
    pub bone_weight: [f32; 4],
    pub bone_id: [u8; 4],
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            uv0: [0.0; 2],
            uv1: [0.0; 2],
            normal: [0.0, 1.0, 0.0],
            bitangent: [1.0, 0.0, 0.0, 1.0],
            color: [1.0, 1.0, 1.0, 1.0],
            bone_weight: [0.0; 4],
            bone_id: [0; 4],
        }
    }
}

/// 模型包围盒
#[derive(Clone, Debug)]
pub struct BoundingBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl BoundingBox {
    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    pub fn size(&self) -> f32 {
        let dx = self.max[0] - self.min[0];
        let dy = self.max[1] - self.min[1];
        let dz = self.max[2] - self.min[2];
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// 计算某一 LOD 全部顶点的包围盒
pub fn compute_bounding_box(model: &Model, lod: usize) -> BoundingBox {
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    if let Some(lod) = model.lods.get(lod) {
        for part in &lod.parts {
            for v in &part.vertices {
                for i in 0..3 {
                    if v.position[i] < min[i] {
                        min[i] = v.position[i];
                    }
                    if v.position[i] > max[i] {
                        max[i] = v.position[i];
                    }
                }
            }
        }
    }
    if min[0] == f32::MAX {
        return BoundingBox {
            min: [0.0; 3],
            max: [0.0; 3],
        };
    }
    BoundingBox { min, max }
}
