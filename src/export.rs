use std::borrow::Cow;
use std::collections::BTreeMap;

use glam::Vec3;
use gltf::json::{
    self,
    accessor::{ComponentType, GenericComponentType, Type},
    validation::{Checked, USize64},
};
use orchestrion_model::Model;

/// 将模型的一个 LOD 导出为 glb 二进制。
///
/// 节点按 "<lod> <part>.<submesh>" 约定命名；同一部件的所有子网格
/// 共享该部件的顶点访问器 (即共享缓冲布局，重新导入时索引按原值合并)，
/// 每个子网格只持有自己的索引区段。蒙皮关节按受影响骨骼顺序排列，
/// 因此重新导入时按名称映射会得到相同的骨骼下标。
pub fn export_glb(model: &Model, lod_index: usize) -> Result<Vec<u8>, String> {
    let lod = model
        .lods
        .get(lod_index)
        .ok_or_else(|| format!("LOD {} 不存在", lod_index))?;

    let mut root = json::Root::default();
    root.asset = json::Asset {
        version: "2.0".to_string(),
        generator: Some("orchestrion".to_string()),
        ..Default::default()
    };
    let mut bin: Vec<u8> = Vec::new();

    // 骨骼节点 + 蒙皮，顺序与 affected_bone_names 保持一致
    let mut joints = Vec::new();
    for bone_name in &model.affected_bone_names {
        root.nodes.push(json::Node {
            name: Some(bone_name.clone()),
            ..Default::default()
        });
        joints.push(json::Index::new((root.nodes.len() - 1) as u32));
    }
    let skin = if joints.is_empty() {
        None
    } else {
        root.skins.push(json::Skin {
            extensions: Default::default(),
            extras: Default::default(),
            inverse_bind_matrices: None,
            joints,
            name: None,
            skeleton: None,
        });
        Some(json::Index::new((root.skins.len() - 1) as u32))
    };

    for (part_index, part) in lod.parts.iter().enumerate() {
        if part.vertices.is_empty() || part.submeshes.is_empty() {
            continue;
        }

        let attributes = push_part_attributes(&mut root, &mut bin, part);

        // 部件索引缓冲整体进一个视图，子网格访问器按区段切片
        let index_view = push_view(&mut root, &mut bin, bytemuck::cast_slice(&part.indices));

        for (submesh_index, submesh) in part.submeshes.iter().enumerate() {
            let end = submesh.index_offset as usize + submesh.index_count as usize;
            if end > part.indices.len() {
                eprintln!(
                    "部件 {} 子网格 {} 索引区段越界 ({} > {}), 跳过",
                    part_index,
                    submesh_index,
                    end,
                    part.indices.len()
                );
                continue;
            }

            root.accessors.push(json::Accessor {
                buffer_view: Some(json::Index::new(index_view)),
                byte_offset: Some(USize64::from(submesh.index_offset as usize * 2)),
                count: USize64::from(submesh.index_count as usize),
                component_type: Checked::Valid(GenericComponentType(ComponentType::U16)),
                extensions: Default::default(),
                extras: Default::default(),
                type_: Checked::Valid(Type::Scalar),
                min: None,
                max: None,
                name: None,
                normalized: false,
                sparse: None,
            });
            let index_accessor = json::Index::new((root.accessors.len() - 1) as u32);

            root.meshes.push(json::Mesh {
                extensions: Default::default(),
                extras: Default::default(),
                name: None,
                primitives: vec![json::mesh::Primitive {
                    attributes: attributes.clone(),
                    extensions: Default::default(),
                    extras: Default::default(),
                    indices: Some(index_accessor),
                    material: None,
                    mode: Checked::Valid(json::mesh::Mode::Triangles),
                    targets: None,
                }],
                weights: None,
            });

            root.nodes.push(json::Node {
                mesh: Some(json::Index::new((root.meshes.len() - 1) as u32)),
                name: Some(format!("{} {}.{}", lod_index, part_index, submesh_index)),
                skin,
                ..Default::default()
            });
        }
    }

    let node_indices = (0..root.nodes.len())
        .map(|i| json::Index::new(i as u32))
        .collect();
    root.scenes = vec![json::Scene {
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        nodes: node_indices,
    }];
    root.scene = Some(json::Index::new(0));

    while bin.len() % 4 != 0 {
        bin.push(0);
    }
    root.buffers = vec![json::Buffer {
        byte_length: USize64::from(bin.len()),
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        uri: None,
    }];

    let json_string =
        json::serialize::to_string(&root).map_err(|e| format!("glTF JSON 序列化失败: {}", e))?;
    let glb = gltf::binary::Glb {
        header: gltf::binary::Header {
            magic: *b"glTF",
            version: 2,
            length: 0, // to_writer 会重新计算
        },
        json: Cow::Owned(json_string.into_bytes()),
        bin: Some(Cow::Owned(bin)),
    };
    let mut out = Vec::new();
    glb.to_writer(&mut out)
        .map_err(|e| format!("GLB 写出失败: {}", e))?;
    Ok(out)
}

type Attributes = BTreeMap<Checked<json::mesh::Semantic>, json::Index<json::Accessor>>;

/// 写出部件全部顶点属性，返回供该部件所有子网格共享的属性访问器表
fn push_part_attributes(root: &mut json::Root, bin: &mut Vec<u8>, part: &orchestrion_model::Part) -> Attributes {
    use json::mesh::Semantic;

    let n = part.vertices.len();
    let mut map = Attributes::new();

    let positions: Vec<[f32; 3]> = part.vertices.iter().map(|v| v.position).collect();
    let (min, max) = position_bounds(&positions);
    let view = push_view(root, bin, bytemuck::cast_slice(&positions));
    let accessor = push_accessor(root, view, n, ComponentType::F32, Type::Vec3, false);
    if let Some(pushed) = root.accessors.last_mut() {
        pushed.min = Some(serde_json::json!(min));
        pushed.max = Some(serde_json::json!(max));
    }
    map.insert(Checked::Valid(Semantic::Positions), accessor);

    let normals: Vec<[f32; 3]> = part.vertices.iter().map(|v| v.normal).collect();
    let view = push_view(root, bin, bytemuck::cast_slice(&normals));
    let accessor = push_accessor(root, view, n, ComponentType::F32, Type::Vec3, false);
    map.insert(Checked::Valid(Semantic::Normals), accessor);

    for (set, pick) in [(0u32, 0usize), (1, 1)] {
        let uvs: Vec<[f32; 2]> = part
            .vertices
            .iter()
            .map(|v| if pick == 0 { v.uv0 } else { v.uv1 })
            .collect();
        let view = push_view(root, bin, bytemuck::cast_slice(&uvs));
        let accessor = push_accessor(root, view, n, ComponentType::F32, Type::Vec2, false);
        map.insert(Checked::Valid(Semantic::TexCoords(set)), accessor);
    }

    // 模型只存副切线+手性，切线由 副切线 × 法线 · 手性 还原
    let tangents: Vec<[f32; 4]> = part
        .vertices
        .iter()
        .map(|v| {
            let handedness = v.bitangent[3];
            let tangent = Vec3::new(v.bitangent[0], v.bitangent[1], v.bitangent[2])
                .cross(Vec3::from(v.normal))
                * handedness;
            [tangent.x, tangent.y, tangent.z, handedness]
        })
        .collect();
    let view = push_view(root, bin, bytemuck::cast_slice(&tangents));
    let accessor = push_accessor(root, view, n, ComponentType::F32, Type::Vec4, false);
    map.insert(Checked::Valid(Semantic::Tangents), accessor);

    let colors: Vec<[f32; 4]> = part.vertices.iter().map(|v| v.color).collect();
    let view = push_view(root, bin, bytemuck::cast_slice(&colors));
    let accessor = push_accessor(root, view, n, ComponentType::F32, Type::Vec4, false);
    map.insert(Checked::Valid(Semantic::Colors(0)), accessor);

    let weights: Vec<[f32; 4]> = part.vertices.iter().map(|v| v.bone_weight).collect();
    let view = push_view(root, bin, bytemuck::cast_slice(&weights));
    let accessor = push_accessor(root, view, n, ComponentType::F32, Type::Vec4, false);
    map.insert(Checked::Valid(Semantic::Weights(0)), accessor);

    let bone_ids: Vec<[u8; 4]> = part.vertices.iter().map(|v| v.bone_id).collect();
    let view = push_view(root, bin, bytemuck::cast_slice(&bone_ids));
    let accessor = push_accessor(root, view, n, ComponentType::U8, Type::Vec4, false);
    map.insert(Checked::Valid(Semantic::Joints(0)), accessor);

    map
}

fn position_bounds(positions: &[[f32; 3]]) -> ([f32; 3], [f32; 3]) {
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for p in positions {
        for i in 0..3 {
            min[i] = min[i].min(p[i]);
            max[i] = max[i].max(p[i]);
        }
    }
    if positions.is_empty() {
        return ([0.0; 3], [0.0; 3]);
    }
    (min, max)
}

fn push_view(root: &mut json::Root, bin: &mut Vec<u8>, data: &[u8]) -> u32 {
    while bin.len() % 4 != 0 {
        bin.push(0);
    }
    let offset = bin.len();
    bin.extend_from_slice(data);
    root.buffer_views.push(json::buffer::View {
        buffer: json::Index::new(0),
        byte_length: USize64::from(data.len()),
        byte_offset: Some(USize64::from(offset)),
        byte_stride: None,
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        target: None,
    });
    (root.buffer_views.len() - 1) as u32
}

fn push_accessor(
    root: &mut json::Root,
    view: u32,
    count: usize,
    component_type: ComponentType,
    type_: Type,
    normalized: bool,
) -> json::Index<json::Accessor> {
    root.accessors.push(json::Accessor {
        buffer_view: Some(json::Index::new(view)),
        byte_offset: Some(USize64(0)),
        count: USize64::from(count),
        component_type: Checked::Valid(GenericComponentType(component_type)),
        extensions: Default::default(),
        extras: Default::default(),
        type_: Checked::Valid(type_),
        min: None,
        max: None,
        name: None,
        normalized,
        sparse: None,
    });
    json::Index::new((root.accessors.len() - 1) as u32)
}
