use std::path::Path;

use glam::Vec3;
use gltf::mesh::util::ReadColors;
use orchestrion_model::{Model, SubMeshGeometry, Vertex};

/// 一次导入中单个 glTF 节点的处理结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeOutcome {
    Imported {
        name: String,
        lod: usize,
        part: usize,
        submesh: usize,
        vertex_count: usize,
        index_count: usize,
        /// 顶点缓冲视图已被同部件先前的子网格使用，本节点未贡献新顶点
        shared_buffer: bool,
    },
    Skipped { name: String, reason: SkipReason },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// 节点名不符合 "<lod> <part>.<submesh>" 约定
    BadName,
    LodOutOfRange(usize),
    PartOutOfRange { lod: usize, part: usize },
    SubmeshOutOfRange { lod: usize, part: usize, submesh: usize },
    MissingAttribute(&'static str),
}

impl SkipReason {
    pub fn describe(&self) -> String {
        match self {
            Self::BadName => "节点名不符合 \"<lod> <part>.<submesh>\" 约定".to_string(),
            Self::LodOutOfRange(lod) => format!("LOD {} 超出模型范围", lod),
            Self::PartOutOfRange { lod, part } => {
                format!("LOD {} 中不存在部件 {}", lod, part)
            }
            Self::SubmeshOutOfRange { lod, part, submesh } => {
                format!("LOD {} 部件 {} 中不存在子网格 {}", lod, part, submesh)
            }
            Self::MissingAttribute(attr) => format!("缺少 {} 数据", attr),
        }
    }
}

/// 成功替换的部件统计
#[derive(Clone, Debug)]
pub struct ReplacedPart {
    pub lod: usize,
    pub part: usize,
    pub vertex_count: usize,
    pub index_count: usize,
    pub submesh_count: usize,
    pub shared_buffer: bool,
}

/// 整次导入的结果：每个网格节点一条结论 + 每个部件一条替换记录
#[derive(Clone, Debug, Default)]
pub struct ImportReport {
    pub nodes: Vec<NodeOutcome>,
    pub replaced_parts: Vec<ReplacedPart>,
}

impl ImportReport {
    pub fn imported_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, NodeOutcome::Imported { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.nodes.len() - self.imported_count()
    }
}

/// 解析 "<lod> <part>.<submesh>" 节点名，返回 (lod, part, submesh)
///
/// 末尾空白分隔段为 "part.submesh"，其前一段为 lod，
/// 更靠前的段 (如导出器添加的前缀) 忽略。
fn parse_node_name(name: &str) -> Option<(usize, usize, usize)> {
    let mut tokens = name.split_whitespace().rev();
    let part_submesh = tokens.next()?;
    let lod: usize = tokens.next()?.parse().ok()?;
    let (part, submesh) = part_submesh.split_once('.')?;
    Some((lod, part.parse().ok()?, submesh.parse().ok()?))
}

/// 按子网格下标聚合的待合并几何
struct ProcessedSubMesh {
    submesh_index: usize,
    vertices: Vec<Vertex>,
    indices: Vec<u16>,
}

/// 节点遍历顺序不保证 (0.1 可能在 1.0 之后)，先按 (lod, 部件) 聚合再合并
struct ProcessedPart {
    lod: usize,
    part_index: usize,
    /// 已贡献过顶点数据的 position 缓冲视图
    consumed_views: Vec<usize>,
    shared_buffer: bool,
    submeshes: Vec<ProcessedSubMesh>,
}

/// 从 glb 文件导入模型几何，按节点名约定替换既有部件的顶点/索引缓冲
pub fn import_glb(model: &mut Model, path: &Path) -> Result<ImportReport, String> {
    let (document, buffers, _images) =
        gltf::import(path).map_err(|e| format!("glTF 加载失败: {}", e))?;
    import_document(model, &document, &buffers)
}

/// 同 import_glb，但从内存中的 glb 数据读取
pub fn import_bytes(model: &mut Model, bytes: &[u8]) -> Result<ImportReport, String> {
    let (document, buffers, _images) =
        gltf::import_slice(bytes).map_err(|e| format!("glTF 解析失败: {}", e))?;
    import_document(model, &document, &buffers)
}

pub fn import_document(
    model: &mut Model,
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
) -> Result<ImportReport, String> {
    // 蒙皮关节顺序 → 节点名，导出工具 (如 Blender) 可能重排过节点
    let joint_names: Vec<String> = document
        .skins()
        .next()
        .map(|skin| {
            skin.joints()
                .map(|joint| joint.name().unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default();

    let mut report = ImportReport::default();
    let mut parts: Vec<ProcessedPart> = Vec::new();

    for node in document.nodes() {
        let Some(mesh) = node.mesh() else {
            continue;
        };
        let name = node.name().unwrap_or_default().to_string();
        println!("正在导入节点 {}", name);

        let outcome = process_node(model, &mesh, &name, &joint_names, buffers, &mut parts);
        if let NodeOutcome::Skipped { reason, .. } = &outcome {
            println!("- 跳过: {}", reason.describe());
        }
        report.nodes.push(outcome);
    }

    // 合并阶段：每个部件内子网格按下标升序拼接，一次 replace 提交
    for mut part in parts {
        part.submeshes.sort_by_key(|s| s.submesh_index);

        let mut combined_vertices: Vec<Vertex> = Vec::new();
        let mut combined_indices: Vec<u16> = Vec::new();
        let mut geometries: Vec<SubMeshGeometry> = Vec::new();
        let mut index_offset: u32 = 0;

        for submesh in &part.submeshes {
            let vertex_offset = combined_vertices.len() as u16;
            combined_vertices.extend_from_slice(&submesh.vertices);

            for &index in &submesh.indices {
                // 共享缓冲时索引已指向合并后的位置，不再加偏移
                if part.shared_buffer {
                    combined_indices.push(index);
                } else {
                    combined_indices.push(index + vertex_offset);
                }
            }

            geometries.push(SubMeshGeometry {
                index_count: submesh.indices.len() as u32,
                index_offset,
            });
            index_offset += submesh.indices.len() as u32;
        }

        model.replace_vertices(
            part.lod,
            part.part_index,
            combined_vertices,
            combined_indices,
            &geometries,
        )?;

        let committed = &model.lods[part.lod].parts[part.part_index];
        report.replaced_parts.push(ReplacedPart {
            lod: part.lod,
            part: part.part_index,
            vertex_count: committed.vertices.len(),
            index_count: committed.indices.len(),
            submesh_count: geometries.len(),
            shared_buffer: part.shared_buffer,
        });
    }

    println!(
        "导入完成: {} 个节点, {} 个跳过, {} 个部件被替换",
        report.nodes.len(),
        report.skipped_count(),
        report.replaced_parts.len()
    );

    Ok(report)
}

fn skip(name: &str, reason: SkipReason) -> NodeOutcome {
    NodeOutcome::Skipped {
        name: name.to_string(),
        reason,
    }
}

fn process_node(
    model: &Model,
    mesh: &gltf::Mesh,
    name: &str,
    joint_names: &[String],
    buffers: &[gltf::buffer::Data],
    parts: &mut Vec<ProcessedPart>,
) -> NodeOutcome {
    let Some((lod, part_index, submesh_index)) = parse_node_name(name) else {
        return skip(name, SkipReason::BadName);
    };

    // 只替换既有槽位，越界的 (lod, 部件, 子网格) 一律跳过
    let Some(target_lod) = model.lods.get(lod) else {
        return skip(name, SkipReason::LodOutOfRange(lod));
    };
    let Some(target_part) = target_lod.parts.get(part_index) else {
        return skip(
            name,
            SkipReason::PartOutOfRange {
                lod,
                part: part_index,
            },
        );
    };
    if submesh_index >= target_part.submeshes.len() {
        return skip(
            name,
            SkipReason::SubmeshOutOfRange {
                lod,
                part: part_index,
                submesh: submesh_index,
            },
        );
    }

    let Some(primitive) = mesh.primitives().next() else {
        return skip(name, SkipReason::MissingAttribute("primitive"));
    };

    let reader = primitive.reader(|b| buffers.get(b.index()).map(|d| d.0.as_slice()));

    let Some(positions) = reader.read_positions().map(|it| it.collect::<Vec<_>>()) else {
        return skip(name, SkipReason::MissingAttribute("POSITION"));
    };
    let Some(normals) = reader.read_normals().map(|it| it.collect::<Vec<_>>()) else {
        return skip(name, SkipReason::MissingAttribute("NORMAL"));
    };
    let Some(uv0) = reader
        .read_tex_coords(0)
        .map(|tc| tc.into_f32().collect::<Vec<_>>())
    else {
        return skip(name, SkipReason::MissingAttribute("TEXCOORD_0"));
    };
    let Some(uv1) = reader
        .read_tex_coords(1)
        .map(|tc| tc.into_f32().collect::<Vec<_>>())
    else {
        return skip(name, SkipReason::MissingAttribute("TEXCOORD_1"));
    };
    let Some(weights) = reader
        .read_weights(0)
        .map(|w| w.into_f32().collect::<Vec<_>>())
    else {
        return skip(name, SkipReason::MissingAttribute("WEIGHTS_0"));
    };
    let Some(joints) = reader
        .read_joints(0)
        .map(|j| j.into_u16().collect::<Vec<_>>())
    else {
        return skip(name, SkipReason::MissingAttribute("JOINTS_0"));
    };
    let Some(tangents) = reader.read_tangents().map(|it| it.collect::<Vec<_>>()) else {
        return skip(name, SkipReason::MissingAttribute("TANGENT"));
    };
    let colors = match reader.read_colors(0) {
        // 16 位无符号通道按 /65535 归一化到 [0, 1]
        Some(ReadColors::RgbaU16(it)) => it
            .map(|c| {
                [
                    c[0] as f32 / u16::MAX as f32,
                    c[1] as f32 / u16::MAX as f32,
                    c[2] as f32 / u16::MAX as f32,
                    c[3] as f32 / u16::MAX as f32,
                ]
            })
            .collect::<Vec<_>>(),
        Some(ReadColors::RgbaF32(it)) => it.collect(),
        Some(other) => other.into_rgba_f32().collect(),
        None => return skip(name, SkipReason::MissingAttribute("COLOR_0")),
    };
    let Some(indices) = reader
        .read_indices()
        .map(|it| it.into_u32().map(|i| i as u16).collect::<Vec<_>>())
    else {
        return skip(name, SkipReason::MissingAttribute("indices"));
    };

    println!(
        "- 网格: {} 个顶点, {} 个索引 → LOD {} 部件 {} 子网格 {}",
        positions.len(),
        indices.len(),
        lod,
        part_index,
        submesh_index
    );

    let mut vertices = Vec::with_capacity(positions.len());
    for i in 0..positions.len() {
        let normal = normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]);
        let tangent = tangents.get(i).copied().unwrap_or([1.0, 0.0, 0.0, 1.0]);

        // glTF 不携带副切线，由法线 × 切线导出，手性取切线 w 分量
        let handedness = tangent[3];
        let bitangent = Vec3::from(normal)
            .cross(Vec3::new(tangent[0], tangent[1], tangent[2]))
            * handedness;

        let mut bone_id = [0u8; 4];
        let joint4 = joints.get(i).copied().unwrap_or_default();
        for (slot, &joint) in bone_id.iter_mut().zip(joint4.iter()) {
            *slot = joint_names
                .get(joint as usize)
                .and_then(|joint_name| model.bone_index(joint_name))
                .unwrap_or(0) as u8;
        }

        vertices.push(Vertex {
            position: positions[i],
            uv0: uv0.get(i).copied().unwrap_or_default(),
            uv1: uv1.get(i).copied().unwrap_or_default(),
            normal,
            bitangent: [bitangent.x, bitangent.y, bitangent.z, handedness],
            color: colors.get(i).copied().unwrap_or([1.0; 4]),
            bone_weight: weights.get(i).copied().unwrap_or_default(),
            bone_id,
        });
    }

    let position_view = primitive
        .get(&gltf::Semantic::Positions)
        .and_then(|accessor| accessor.view())
        .map(|view| view.index());

    let part = match parts
        .iter_mut()
        .find(|p| p.lod == lod && p.part_index == part_index)
    {
        Some(part) => part,
        None => {
            parts.push(ProcessedPart {
                lod,
                part_index,
                consumed_views: Vec::new(),
                shared_buffer: false,
                submeshes: Vec::new(),
            });
            parts.last_mut().unwrap()
        }
    };

    // 同一顶点缓冲视图被多个子网格复用时 (Novus 导出的共享缓冲)，
    // 只有第一次出现贡献顶点数据，该部件的索引整体按原值提交
    let vertex_count = vertices.len();
    let mut contributed = true;
    match position_view {
        Some(view) if part.consumed_views.contains(&view) => {
            part.shared_buffer = true;
            contributed = false;
        }
        Some(view) => part.consumed_views.push(view),
        None => {}
    }

    let index_count = indices.len();
    part.submeshes.push(ProcessedSubMesh {
        submesh_index,
        vertices: if contributed { vertices } else { Vec::new() },
        indices,
    });

    NodeOutcome::Imported {
        name: name.to_string(),
        lod,
        part: part_index,
        submesh: submesh_index,
        vertex_count,
        index_count,
        shared_buffer: !contributed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testgltf::GlbBuilder;
    use orchestrion_model::{Lod, Part, SubMesh};

    fn empty_part(submesh_count: usize) -> Part {
        Part {
            submeshes: vec![SubMesh::default(); submesh_count],
            ..Default::default()
        }
    }

    fn target_model(parts_per_lod: &[usize]) -> Model {
        Model {
            lods: vec![Lod {
                parts: parts_per_lod.iter().map(|&n| empty_part(n)).collect(),
            }],
            affected_bone_names: vec![
                "n_root".to_string(),
                "j_kosi".to_string(),
                "j_sebo_a".to_string(),
            ],
            ..Default::default()
        }
    }

    fn quad_positions() -> Vec<[f32; 3]> {
        vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
        ]
    }

    #[test]
    fn parse_node_name_convention() {
        assert_eq!(parse_node_name("0 2.1"), Some((0, 2, 1)));
        assert_eq!(parse_node_name("1 0.3"), Some((1, 0, 3)));
        // 导出器前缀段被忽略
        assert_eq!(parse_node_name("Mesh 0 2.1"), Some((0, 2, 1)));
        assert_eq!(parse_node_name("2.1"), None);
        assert_eq!(parse_node_name("0 21"), None);
        assert_eq!(parse_node_name("0 a.b"), None);
        assert_eq!(parse_node_name(""), None);
    }

    #[test]
    fn node_merges_into_named_part_and_submesh() {
        let mut model = target_model(&[1, 1, 2]);
        let mut builder = GlbBuilder::new();
        builder.add_skin(&["n_root"]);
        builder.add_submesh_node("0 2.1", &quad_positions(), &[0, 1, 2, 2, 1, 3], false);

        let report = import_bytes(&mut model, &builder.build()).unwrap();

        assert_eq!(report.imported_count(), 1);
        assert_eq!(report.replaced_parts.len(), 1);
        assert_eq!(report.replaced_parts[0].lod, 0);
        assert_eq!(report.replaced_parts[0].part, 2);

        let part = &model.lods[0].parts[2];
        assert_eq!(part.vertices.len(), 4);
        assert_eq!(part.indices, vec![0, 1, 2, 2, 1, 3]);
        // 子网格 0 未提供几何，槽位保留默认值
        assert_eq!(part.submeshes[0].index_count, 3);
        assert_eq!(part.submeshes[0].index_offset, 0);
    }

    #[test]
    fn submeshes_commit_in_ascending_order_regardless_of_traversal() {
        let mut model = target_model(&[3]);
        let mut builder = GlbBuilder::new();
        builder.add_skin(&["n_root"]);
        // 故意乱序添加 0.2, 0.0, 0.1
        builder.add_submesh_node(
            "0 0.2",
            &[[2.0, 0.0, 0.0], [2.0, 1.0, 0.0], [2.0, 0.0, 1.0]],
            &[0, 1, 2],
            false,
        );
        builder.add_submesh_node(
            "0 0.0",
            &[[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            &[0, 2, 1],
            false,
        );
        builder.add_submesh_node(
            "0 0.1",
            &[[1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [1.0, 0.0, 1.0]],
            &[1, 0, 2],
            false,
        );

        import_bytes(&mut model, &builder.build()).unwrap();

        let part = &model.lods[0].parts[0];
        assert_eq!(part.vertices.len(), 9);
        // 顶点按子网格下标升序拼接: x 坐标 0,0,0, 1,1,1, 2,2,2
        let xs: Vec<f32> = part.vertices.iter().map(|v| v.position[0]).collect();
        assert_eq!(xs, vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        // 索引按运行顶点数偏移
        assert_eq!(part.indices, vec![0, 2, 1, 4, 3, 5, 6, 7, 8]);
        // 子网格几何记录各自在合并索引缓冲中的区段
        assert_eq!(part.submeshes[0].index_offset, 0);
        assert_eq!(part.submeshes[1].index_offset, 3);
        assert_eq!(part.submeshes[2].index_offset, 6);
        assert!(part.submeshes.iter().all(|s| s.index_count == 3));
    }

    #[test]
    fn shared_buffer_view_contributes_once_and_keeps_indices_unmodified() {
        let mut model = target_model(&[2]);
        let mut builder = GlbBuilder::new();
        builder.add_skin(&["n_root"]);
        // 两个子网格共享同一顶点缓冲视图，索引已指向合并后的位置
        builder.add_submesh_node("0 0.0", &quad_positions(), &[0, 1, 2], false);
        builder.add_submesh_node("0 0.1", &[], &[2, 1, 3], true);

        let report = import_bytes(&mut model, &builder.build()).unwrap();

        let shared_flags: Vec<bool> = report
            .nodes
            .iter()
            .map(|n| match n {
                NodeOutcome::Imported { shared_buffer, .. } => *shared_buffer,
                _ => panic!("节点不应被跳过"),
            })
            .collect();
        assert_eq!(shared_flags, vec![false, true]);

        let part = &model.lods[0].parts[0];
        // 只有第一个子网格贡献顶点
        assert_eq!(part.vertices.len(), 4);
        // 两个子网格的索引均按原值提交，无偏移
        assert_eq!(part.indices, vec![0, 1, 2, 2, 1, 3]);
        assert_eq!(part.submeshes[0].index_count, 3);
        assert_eq!(part.submeshes[0].index_offset, 0);
        assert_eq!(part.submeshes[1].index_count, 3);
        assert_eq!(part.submeshes[1].index_offset, 3);
    }

    #[test]
    fn joints_remap_by_bone_name_and_unresolved_maps_to_zero() {
        let mut model = target_model(&[1]);
        let mut builder = GlbBuilder::new();
        // 蒙皮关节顺序与模型骨骼顺序不同; j_unknown 不在受影响骨骼表中
        builder.add_skin(&["j_sebo_a", "j_unknown", "j_kosi"]);
        builder.set_joints(&[[0, 1, 2, 0]]);
        builder.add_submesh_node("0 0.0", &[[0.0, 0.0, 0.0]], &[0], false);

        import_bytes(&mut model, &builder.build()).unwrap();

        let vertex = &model.lods[0].parts[0].vertices[0];
        // j_sebo_a → 2, j_unknown → 0, j_kosi → 1
        assert_eq!(vertex.bone_id, [2, 0, 1, 2]);
    }

    #[test]
    fn out_of_range_targets_skip_without_mutation() {
        let mut model = target_model(&[1]);
        let before = model.clone();
        let mut builder = GlbBuilder::new();
        builder.add_skin(&["n_root"]);
        builder.add_submesh_node("0 5.0", &quad_positions(), &[0, 1, 2], false);
        builder.add_submesh_node("0 0.7", &quad_positions(), &[0, 1, 2], false);
        builder.add_submesh_node("3 0.0", &quad_positions(), &[0, 1, 2], false);
        builder.add_submesh_node("not a mesh name", &quad_positions(), &[0, 1, 2], false);

        let report = import_bytes(&mut model, &builder.build()).unwrap();

        assert_eq!(report.imported_count(), 0);
        assert_eq!(report.skipped_count(), 4);
        assert!(report.replaced_parts.is_empty());

        let reasons: Vec<&SkipReason> = report
            .nodes
            .iter()
            .map(|n| match n {
                NodeOutcome::Skipped { reason, .. } => reason,
                _ => panic!("不应有导入成功的节点"),
            })
            .collect();
        assert_eq!(
            reasons[0],
            &SkipReason::PartOutOfRange { lod: 0, part: 5 }
        );
        assert_eq!(
            reasons[1],
            &SkipReason::SubmeshOutOfRange {
                lod: 0,
                part: 0,
                submesh: 7
            }
        );
        assert_eq!(reasons[2], &SkipReason::LodOutOfRange(3));
        assert_eq!(reasons[3], &SkipReason::BadName);

        // 目标模型完全未被修改
        assert_eq!(model.lods[0].parts[0].vertices.len(), before.lods[0].parts[0].vertices.len());
        assert_eq!(model.lods[0].parts[0].indices, before.lods[0].parts[0].indices);
    }

    #[test]
    fn u16_colors_normalize_to_unit_interval() {
        let mut model = target_model(&[1]);
        let mut builder = GlbBuilder::new();
        builder.add_skin(&["n_root"]);
        builder.set_colors_u16(&[[0, 65535, 32768, 65535]]);
        builder.add_submesh_node("0 0.0", &[[0.0, 0.0, 0.0]], &[0], false);

        import_bytes(&mut model, &builder.build()).unwrap();

        let color = model.lods[0].parts[0].vertices[0].color;
        assert_eq!(color[0], 0.0);
        assert_eq!(color[1], 1.0);
        assert!((color[2] - 32768.0 / 65535.0).abs() < 1e-6);
        assert_eq!(color[3], 1.0);
    }

    #[test]
    fn bitangent_derived_from_normal_cross_tangent_with_handedness() {
        for handedness in [1.0f32, -1.0] {
            let mut model = target_model(&[1]);
            let mut builder = GlbBuilder::new();
            builder.add_skin(&["n_root"]);
            // 法线 +Y, 切线 +X → 副切线 ±Z (随手性翻转)
            builder.set_tangents(&[[1.0, 0.0, 0.0, handedness]]);
            builder.add_submesh_node("0 0.0", &[[0.0, 0.0, 0.0]], &[0], false);

            import_bytes(&mut model, &builder.build()).unwrap();

            let bitangent = model.lods[0].parts[0].vertices[0].bitangent;
            assert_eq!(bitangent[0], 0.0);
            assert_eq!(bitangent[1], 0.0);
            // Y × X = -Z，再乘手性
            assert_eq!(bitangent[2], -handedness);
            assert_eq!(bitangent[3], handedness);
        }
    }

    #[test]
    fn missing_attribute_reports_named_skip() {
        let mut model = target_model(&[1]);
        let mut builder = GlbBuilder::new();
        builder.add_skin(&["n_root"]);
        builder.omit_tangents();
        builder.add_submesh_node("0 0.0", &[[0.0, 0.0, 0.0]], &[0], false);

        let report = import_bytes(&mut model, &builder.build()).unwrap();

        assert_eq!(report.imported_count(), 0);
        assert!(matches!(
            &report.nodes[0],
            NodeOutcome::Skipped {
                reason: SkipReason::MissingAttribute("TANGENT"),
                ..
            }
        ));
        assert!(model.lods[0].parts[0].vertices.is_empty());
    }
}
