use crate::Vertex;

/// 子网格记录，index_offset 为相对于所在部件合并索引缓冲的偏移
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubMesh {
    pub index_offset: u32,
    pub index_count: u32,
    pub attribute_index_mask: u32,
    pub bone_start_index: u16,
    pub bone_count: u16,
}

/// 替换子网格几何时提供的新 (count, offset) 对
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubMeshGeometry {
    pub index_count: u32,
    pub index_offset: u32,
}

/// 骨骼表：将顶点 blend_index 映射到模型骨骼名称索引
#[derive(Clone, Debug, Default)]
pub struct BoneTable {
    pub bone_indices: Vec<u16>,
}

/// 一个 LOD 内的部件：顶点/索引缓冲 + 子网格划分
#[derive(Clone, Debug, Default)]
pub struct Part {
    pub mesh_index: u16,
    pub material_index: u16,
    pub bone_table_index: u16,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
    pub submeshes: Vec<SubMesh>,
}

#[derive(Clone, Debug, Default)]
pub struct Lod {
    pub parts: Vec<Part>,
}

/// 解析后的模型：LOD → 部件 → 子网格 三层结构
///
/// affected_bone_names 定义了顶点 bone_id 的索引空间，
/// 顺序与文件中保持一致，外部蒙皮数据按名称映射进来。
#[derive(Clone, Debug, Default)]
pub struct Model {
    pub lods: Vec<Lod>,
    pub affected_bone_names: Vec<String>,
    pub material_names: Vec<String>,
    pub bone_tables: Vec<BoneTable>,
}

impl Model {
    /// 骨骼名称在 affected_bone_names 中的下标
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.affected_bone_names.iter().position(|n| n == name)
    }

    /// 整体替换一个部件的顶点/索引缓冲，并原位更新子网格几何。
    ///
    /// 子网格槽位只更新 index_count / index_offset，其余字段
    /// (属性掩码、骨骼区间) 保持不变；槽位数量不增不减。
    /// 提供的几何条目多于现有子网格数时报错，少于时剩余槽位保留旧值。
    pub fn replace_vertices(
        &mut self,
        lod_index: usize,
        part_index: usize,
        vertices: Vec<Vertex>,
        indices: Vec<u16>,
        geometries: &[SubMeshGeometry],
    ) -> Result<(), String> {
        let lod = self
            .lods
            .get_mut(lod_index)
            .ok_or_else(|| format!("LOD {} 不存在", lod_index))?;
        let part = lod
            .parts
            .get_mut(part_index)
            .ok_or_else(|| format!("LOD {} 部件 {} 不存在", lod_index, part_index))?;

        if geometries.len() > part.submeshes.len() {
            return Err(format!(
                "子网格数量超出: 提供 {} 个, 部件只有 {} 个",
                geometries.len(),
                part.submeshes.len()
            ));
        }

        part.vertices = vertices;
        part.indices = indices;
        for (submesh, geometry) in part.submeshes.iter_mut().zip(geometries) {
            submesh.index_count = geometry.index_count;
            submesh.index_offset = geometry.index_offset;
        }

        Ok(())
    }
}
