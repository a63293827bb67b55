use std::io::{Cursor, Read, Seek, SeekFrom};

use orchestrion_model::{BoneTable, Lod, Model, Part, SubMesh, Vertex};

use crate::game::GameData;

/// 从游戏档案加载 MDL 并解析为完整模型 (支持 v5/v6 Dawntrail 格式)
pub fn load_mdl(game: &GameData, path: &str) -> Result<Model, String> {
    let data = game.read_file(path)?;
    parse_mdl(&data)
}

// ---- 二进制读取工具 ----

fn read_u8(c: &mut Cursor<&[u8]>) -> Result<u8, String> {
    let mut b = [0u8; 1];
    c.read_exact(&mut b).map_err(|e| format!("read_u8: {e}"))?;
    Ok(b[0])
}
fn read_u16(c: &mut Cursor<&[u8]>) -> Result<u16, String> {
    let mut b = [0u8; 2];
    c.read_exact(&mut b).map_err(|e| format!("read_u16: {e}"))?;
    Ok(u16::from_le_bytes(b))
}
fn read_u32(c: &mut Cursor<&[u8]>) -> Result<u32, String> {
    let mut b = [0u8; 4];
    c.read_exact(&mut b).map_err(|e| format!("read_u32: {e}"))?;
    Ok(u32::from_le_bytes(b))
}
fn read_f32(c: &mut Cursor<&[u8]>) -> Result<f32, String> {
    let mut b = [0u8; 4];
    c.read_exact(&mut b).map_err(|e| format!("read_f32: {e}"))?;
    Ok(f32::from_le_bytes(b))
}
fn skip(c: &mut Cursor<&[u8]>, n: i64) -> Result<(), String> {
    c.seek(SeekFrom::Current(n))
        .map_err(|e| format!("skip: {e}"))?;
    Ok(())
}

// ---- 顶点声明 ----

const VERTEX_ELEMENT_SLOTS: usize = 17;

#[derive(Clone, Copy, Debug)]
struct VertexElement {
    stream: u8,
    offset: u8,
    format: u8, // 1=Single2, 2=Single3, 3=Single4, 5=Byte4, 8=ByteFloat4, 13=Half2, 14=Half4
    usage: u8,  // 0=Position, 1=BlendWeight, 2=BlendIndex, 3=Normal, 4=UV, 6=BiTangent, 7=Color
    usage_index: u8,
}

fn read_vertex_declarations(
    c: &mut Cursor<&[u8]>,
    count: u16,
) -> Result<Vec<Vec<VertexElement>>, String> {
    let mut decls = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let mut elements = Vec::new();
        for slot in 0..VERTEX_ELEMENT_SLOTS {
            let stream = read_u8(c)?;
            let offset = read_u8(c)?;
            let format = read_u8(c)?;
            let usage = read_u8(c)?;
            let usage_index = read_u8(c)?;
            skip(c, 3)?; // padding
            if stream == 0xFF {
                // 0xFF 标记后的 slot 全部跳过
                let remaining = VERTEX_ELEMENT_SLOTS - slot - 1;
                skip(c, remaining as i64 * 8)?;
                break;
            }
            elements.push(VertexElement {
                stream,
                offset,
                format,
                usage,
                usage_index,
            });
        }
        decls.push(elements);
    }
    Ok(decls)
}

// ---- MDL 结构 ----

struct MdlMesh {
    vertex_count: u16,
    index_count: u32,
    start_index: u32,
    material_index: u16,
    submesh_index: u16,
    submesh_count: u16,
    bone_table_index: u16,
    vertex_buffer_offset: [u32; 3],
    vertex_buffer_stride: [u8; 3],
}

struct MdlLod {
    mesh_index: u16,
    mesh_count: u16,
    vertex_data_offset: u32,
    index_data_offset: u32,
}

/// 在字符串块中按偏移查找 null 结尾字符串
fn string_at_offset(block: &[u8], offset: u32) -> String {
    let start = offset as usize;
    if start >= block.len() {
        return String::new();
    }
    let end = block[start..]
        .iter()
        .position(|&b| b == 0)
        .map(|p| start + p)
        .unwrap_or(block.len());
    std::str::from_utf8(&block[start..end])
        .unwrap_or("")
        .to_string()
}

/// 子网格索引偏移是全局 (LOD 索引缓冲) 的，入 Part 时换算为部件内偏移
fn rebase_submesh(raw: &RawSubMesh, mesh_start_index: u32) -> SubMesh {
    SubMesh {
        index_offset: raw.index_offset.saturating_sub(mesh_start_index),
        index_count: raw.index_count,
        attribute_index_mask: raw.attribute_index_mask,
        bone_start_index: raw.bone_start_index,
        bone_count: raw.bone_count,
    }
}

#[derive(Clone, Copy)]
struct RawSubMesh {
    index_offset: u32,
    index_count: u32,
    attribute_index_mask: u32,
    bone_start_index: u16,
    bone_count: u16,
}

pub fn parse_mdl(data: &[u8]) -> Result<Model, String> {
    let mut c = Cursor::new(data);

    // ---- File Header (68 bytes) ----
    let version = read_u32(&mut c)?;
    let _stack_size = read_u32(&mut c)?;
    let _runtime_size = read_u32(&mut c)?;
    let vertex_decl_count = read_u16(&mut c)?;
    let _material_count = read_u16(&mut c)?;
    skip(&mut c, 12 + 12 + 12 + 12)?; // vertex_offsets, index_offsets, vertex/index_buffer_size
    skip(&mut c, 4)?; // lod_count + 3 bools/padding

    // ---- Vertex Declarations ----
    let decls = read_vertex_declarations(&mut c, vertex_decl_count)?;

    // ---- Strings ----
    let _string_count = read_u16(&mut c)?;
    skip(&mut c, 2)?; // padding
    let string_size = read_u32(&mut c)?;
    let string_start = c.position();
    let string_end = string_start + string_size as u64;
    if string_end as usize > data.len() {
        return Err("字符串块超出文件末尾".to_string());
    }
    let string_block = data[string_start as usize..string_end as usize].to_vec();
    c.seek(SeekFrom::Start(string_end))
        .map_err(|e| format!("seek past strings: {e}"))?;

    // ---- Model Header ----
    let _radius = read_f32(&mut c)?;
    let mesh_count = read_u16(&mut c)?;
    let attribute_count = read_u16(&mut c)?;
    let submesh_count = read_u16(&mut c)?;
    let material_count = read_u16(&mut c)?;
    let bone_count = read_u16(&mut c)?;
    let bone_table_count = read_u16(&mut c)?;
    let _shape_count = read_u16(&mut c)?;
    let _shape_mesh_count = read_u16(&mut c)?;
    let _shape_value_count = read_u16(&mut c)?;
    let _lod_count = read_u8(&mut c)?;
    let _flags1 = read_u8(&mut c)?;
    let element_id_count = read_u16(&mut c)?;
    let terrain_shadow_mesh_count = read_u8(&mut c)?;
    let flags2 = read_u8(&mut c)?;
    skip(&mut c, 4 + 4)?; // clip distances
    let _unknown4 = read_u16(&mut c)?;
    let terrain_shadow_submesh_count = read_u16(&mut c)?;
    skip(&mut c, 1 + 1 + 1 + 1 + 2 + 2 + 2 + 6)?; // unknowns + padding

    // ---- Element IDs ----
    skip(&mut c, element_id_count as i64 * 32)?;

    // ---- LODs (3) ----
    let mut lods = Vec::new();
    for _ in 0..3 {
        let mesh_index = read_u16(&mut c)?;
        let mesh_count_lod = read_u16(&mut c)?;
        skip(&mut c, 4 + 4)?; // lod ranges
        skip(&mut c, 2 * 8)?; // water/shadow/terrain/fog mesh index+count
        skip(&mut c, 4 + 4 + 4 + 4)?; // edge_geometry + polygon_count + unknown
        skip(&mut c, 4 + 4)?; // vertex/index buffer size
        let vertex_data_offset = read_u32(&mut c)?;
        let index_data_offset = read_u32(&mut c)?;
        lods.push(MdlLod {
            mesh_index,
            mesh_count: mesh_count_lod,
            vertex_data_offset,
            index_data_offset,
        });
    }

    // ---- Extra LODs (optional) ----
    let extra_lod_enabled = (flags2 & 0x10) != 0;
    if extra_lod_enabled {
        skip(&mut c, 3 * 32)?; // 3 ExtraLod structs, 16 u16 each = 32 bytes
    }

    // ---- Meshes ----
    let mut meshes = Vec::with_capacity(mesh_count as usize);
    for _ in 0..mesh_count {
        let vertex_count = read_u16(&mut c)?;
        skip(&mut c, 2)?; // padding
        let index_count = read_u32(&mut c)?;
        let material_index = read_u16(&mut c)?;
        let submesh_index = read_u16(&mut c)?;
        let submesh_count_mesh = read_u16(&mut c)?;
        let bone_table_index = read_u16(&mut c)?;
        let start_index = read_u32(&mut c)?;
        let vbo0 = read_u32(&mut c)?;
        let vbo1 = read_u32(&mut c)?;
        let vbo2 = read_u32(&mut c)?;
        let vbs0 = read_u8(&mut c)?;
        let vbs1 = read_u8(&mut c)?;
        let vbs2 = read_u8(&mut c)?;
        let _stream_count = read_u8(&mut c)?;
        meshes.push(MdlMesh {
            vertex_count,
            index_count,
            start_index,
            material_index,
            submesh_index,
            submesh_count: submesh_count_mesh,
            bone_table_index,
            vertex_buffer_offset: [vbo0, vbo1, vbo2],
            vertex_buffer_stride: [vbs0, vbs1, vbs2],
        });
    }

    // ---- 属性名偏移 / 地形阴影网格 ----
    skip(&mut c, attribute_count as i64 * 4)?;
    skip(&mut c, terrain_shadow_mesh_count as i64 * 20)?;

    // ---- 子网格表 (每个 16 字节) ----
    let mut submeshes = Vec::with_capacity(submesh_count as usize);
    for _ in 0..submesh_count {
        let index_offset = read_u32(&mut c)?;
        let index_count = read_u32(&mut c)?;
        let attribute_index_mask = read_u32(&mut c)?;
        let bone_start_index = read_u16(&mut c)?;
        let bone_count_submesh = read_u16(&mut c)?;
        submeshes.push(RawSubMesh {
            index_offset,
            index_count,
            attribute_index_mask,
            bone_start_index,
            bone_count: bone_count_submesh,
        });
    }

    skip(&mut c, terrain_shadow_submesh_count as i64 * 12)?;

    // ---- 名称偏移 ----
    let mut material_name_offsets = Vec::with_capacity(material_count as usize);
    for _ in 0..material_count {
        material_name_offsets.push(read_u32(&mut c)?);
    }

    let mut bone_name_offsets = Vec::with_capacity(bone_count as usize);
    for _ in 0..bone_count {
        bone_name_offsets.push(read_u32(&mut c)?);
    }

    // ---- 骨骼表 ----
    let bone_tables = if version <= 0x1000005 {
        // V1: 固定 132 字节 = [u16; 64](128B) + u8 count + 3B padding
        let mut tables = Vec::with_capacity(bone_table_count as usize);
        for _ in 0..bone_table_count {
            let mut indices = [0u16; 64];
            for idx in &mut indices {
                *idx = read_u16(&mut c)?;
            }
            let count = read_u8(&mut c)?;
            skip(&mut c, 3)?; // padding
            tables.push(BoneTable {
                bone_indices: indices[..count as usize].to_vec(),
            });
        }
        tables
    } else {
        // V2: 可变长度
        let mut offset_counts = Vec::with_capacity(bone_table_count as usize);
        for _ in 0..bone_table_count {
            let _offset = read_u16(&mut c)?;
            let count = read_u16(&mut c)?;
            offset_counts.push(count);
        }
        let mut tables = Vec::with_capacity(bone_table_count as usize);
        for &count in &offset_counts {
            let mut indices = Vec::with_capacity(count as usize);
            for _ in 0..count {
                indices.push(read_u16(&mut c)?);
            }
            // 4 字节对齐
            let pos = c.position() as i64;
            let padding = if pos % 4 == 0 { 0 } else { 4 - (pos % 4) };
            if padding > 0 {
                skip(&mut c, padding)?;
            }
            tables.push(BoneTable {
                bone_indices: indices,
            });
        }
        tables
    };

    // 从偏移量解析名称
    let material_names: Vec<String> = material_name_offsets
        .iter()
        .map(|&off| string_at_offset(&string_block, off))
        .collect();

    let bone_names: Vec<String> = bone_name_offsets
        .iter()
        .map(|&off| string_at_offset(&string_block, off))
        .collect();

    // ---- 提取各 LOD 的网格数据 ----
    let mut model_lods = Vec::with_capacity(lods.len());
    for lod in &lods {
        let mut parts = Vec::with_capacity(lod.mesh_count as usize);

        for mi in lod.mesh_index..(lod.mesh_index + lod.mesh_count) {
            let mesh = match meshes.get(mi as usize) {
                Some(m) => m,
                None => break,
            };
            let decl = match decls.get(mi as usize) {
                Some(d) => d,
                None => break,
            };

            let mut vertices = vec![Vertex::default(); mesh.vertex_count as usize];

            for (k, vertex) in vertices.iter_mut().enumerate() {
                for elem in decl {
                    let abs_offset = lod.vertex_data_offset
                        + mesh.vertex_buffer_offset[elem.stream as usize]
                        + elem.offset as u32
                        + mesh.vertex_buffer_stride[elem.stream as usize] as u32 * k as u32;

                    c.seek(SeekFrom::Start(abs_offset as u64))
                        .map_err(|e| format!("seek vertex: {e}"))?;

                    decode_element(&mut c, elem, vertex)?;
                }
            }

            // 读取索引 (16 位)
            let idx_offset = lod.index_data_offset + mesh.start_index * 2;
            c.seek(SeekFrom::Start(idx_offset as u64))
                .map_err(|e| format!("seek index: {e}"))?;
            let mut indices = Vec::with_capacity(mesh.index_count as usize);
            for _ in 0..mesh.index_count {
                indices.push(read_u16(&mut c)?);
            }

            let submesh_start = mesh.submesh_index as usize;
            let submesh_end = submesh_start + mesh.submesh_count as usize;
            let part_submeshes = submeshes
                .get(submesh_start..submesh_end)
                .unwrap_or(&[])
                .iter()
                .map(|raw| rebase_submesh(raw, mesh.start_index))
                .collect();

            parts.push(Part {
                mesh_index: mi,
                material_index: mesh.material_index,
                bone_table_index: mesh.bone_table_index,
                vertices,
                indices,
                submeshes: part_submeshes,
            });
        }

        model_lods.push(Lod { parts });
    }

    Ok(Model {
        lods: model_lods,
        affected_bone_names: bone_names,
        material_names,
        bone_tables,
    })
}

/// 按声明解码单个顶点元素，写入对应字段
fn decode_element(
    c: &mut Cursor<&[u8]>,
    elem: &VertexElement,
    vertex: &mut Vertex,
) -> Result<(), String> {
    match (elem.usage, elem.format) {
        // Position
        (0, 2) | (0, 3) => {
            // Single3 / Single4 (取前 3 分量)
            vertex.position = [read_f32(c)?, read_f32(c)?, read_f32(c)?];
        }
        (0, 14) => {
            // Half4
            let v = read_half4(c)?;
            vertex.position = [v[0], v[1], v[2]];
        }
        // BlendWeight
        (1, 8) | (1, 5) => {
            // ByteFloat4 or Byte4
            vertex.bone_weight = read_byte_float4(c)?;
        }
        // BlendIndex
        (2, 5) => {
            // Byte4 (4 raw u8)
            vertex.bone_id = [read_u8(c)?, read_u8(c)?, read_u8(c)?, read_u8(c)?];
        }
        // Normal
        (3, 2) | (3, 3) => {
            vertex.normal = [read_f32(c)?, read_f32(c)?, read_f32(c)?];
        }
        (3, 14) => {
            let v = read_half4(c)?;
            vertex.normal = [v[0], v[1], v[2]];
        }
        (3, 8) => {
            // ByteFloat4 (packed normal)
            let v = read_byte_float4(c)?;
            vertex.normal = [v[0] * 2.0 - 1.0, v[1] * 2.0 - 1.0, v[2] * 2.0 - 1.0];
        }
        // UV: 4 分量时 xy 为 uv0, zw 为 uv1; usage_index 1 为第二组
        (4, 1) => {
            let uv = [read_f32(c)?, read_f32(c)?];
            if elem.usage_index == 0 {
                vertex.uv0 = uv;
            } else {
                vertex.uv1 = uv;
            }
        }
        (4, 13) => {
            let uv = read_half2(c)?;
            if elem.usage_index == 0 {
                vertex.uv0 = uv;
            } else {
                vertex.uv1 = uv;
            }
        }
        (4, 3) => {
            let v = [read_f32(c)?, read_f32(c)?, read_f32(c)?, read_f32(c)?];
            vertex.uv0 = [v[0], v[1]];
            vertex.uv1 = [v[2], v[3]];
        }
        (4, 14) => {
            let v = read_half4(c)?;
            vertex.uv0 = [v[0], v[1]];
            vertex.uv1 = [v[2], v[3]];
        }
        // Color
        (7, 8) => {
            if elem.usage_index == 0 {
                vertex.color = read_byte_float4(c)?;
            }
        }
        // BiTangent
        (6, 14) => {
            // Half4 (已在 [-1,1] 区间)
            vertex.bitangent = read_half4(c)?;
        }
        (6, 8) => {
            // ByteFloat4 ([0,1] → [-1,1])
            let v = read_byte_float4(c)?;
            vertex.bitangent = [
                v[0] * 2.0 - 1.0,
                v[1] * 2.0 - 1.0,
                v[2] * 2.0 - 1.0,
                v[3] * 2.0 - 1.0,
            ];
        }
        _ => {} // 跳过其他属性
    }
    Ok(())
}

// ---- Half-float 读取 ----

fn read_half2(c: &mut Cursor<&[u8]>) -> Result<[f32; 2], String> {
    let a = read_u16(c)?;
    let b = read_u16(c)?;
    Ok([half_to_f32(a), half_to_f32(b)])
}

fn read_half4(c: &mut Cursor<&[u8]>) -> Result<[f32; 4], String> {
    let a = read_u16(c)?;
    let b = read_u16(c)?;
    let cc = read_u16(c)?;
    let d = read_u16(c)?;
    Ok([
        half_to_f32(a),
        half_to_f32(b),
        half_to_f32(cc),
        half_to_f32(d),
    ])
}

fn read_byte_float4(c: &mut Cursor<&[u8]>) -> Result<[f32; 4], String> {
    Ok([
        read_u8(c)? as f32 / 255.0,
        read_u8(c)? as f32 / 255.0,
        read_u8(c)? as f32 / 255.0,
        read_u8(c)? as f32 / 255.0,
    ])
}

fn half_to_f32(h: u16) -> f32 {
    let sign = ((h >> 15) & 1) as u32;
    let exp = ((h >> 10) & 0x1F) as u32;
    let mant = (h & 0x3FF) as u32;
    if exp == 0 {
        if mant == 0 {
            return if sign == 1 { -0.0 } else { 0.0 };
        }
        // subnormal
        let v = mant as f32 / 1024.0 * (2.0f32).powi(-14);
        return if sign == 1 { -v } else { v };
    }
    if exp == 31 {
        return if mant == 0 {
            if sign == 1 {
                f32::NEG_INFINITY
            } else {
                f32::INFINITY
            }
        } else {
            f32::NAN
        };
    }
    let bits = (sign << 31) | ((exp + 112) << 23) | (mant << 13);
    f32::from_bits(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_float_decodes_common_values() {
        assert_eq!(half_to_f32(0x0000), 0.0);
        assert_eq!(half_to_f32(0x3C00), 1.0);
        assert_eq!(half_to_f32(0xBC00), -1.0);
        assert_eq!(half_to_f32(0x4000), 2.0);
        assert_eq!(half_to_f32(0x3800), 0.5);
        assert!(half_to_f32(0x7C00).is_infinite());
        assert!(half_to_f32(0x7C01).is_nan());
        // 次正规数
        assert!((half_to_f32(0x0001) - 5.960_464_5e-8).abs() < 1e-12);
    }

    #[test]
    fn string_block_lookup_is_offset_based() {
        let block = b"mt_c0201e0633_top_a\0j_kosi\0".to_vec();
        assert_eq!(string_at_offset(&block, 0), "mt_c0201e0633_top_a");
        assert_eq!(string_at_offset(&block, 20), "j_kosi");
        // 越界偏移得到空串
        assert_eq!(string_at_offset(&block, 100), "");
    }

    #[test]
    fn submesh_offsets_rebase_to_part_range() {
        let raw = RawSubMesh {
            index_offset: 300,
            index_count: 120,
            attribute_index_mask: 0b11,
            bone_start_index: 4,
            bone_count: 9,
        };
        let rebased = rebase_submesh(&raw, 270);
        assert_eq!(rebased.index_offset, 30);
        assert_eq!(rebased.index_count, 120);
        assert_eq!(rebased.attribute_index_mask, 0b11);
        assert_eq!(rebased.bone_start_index, 4);
        assert_eq!(rebased.bone_count, 9);

        // 起点早于网格起点时不下溢
        let clamped = rebase_submesh(&raw, 400);
        assert_eq!(clamped.index_offset, 0);
    }

    #[test]
    fn byte_float4_normalizes_channels() {
        let data = [0u8, 255, 128, 64];
        let mut c = Cursor::new(&data[..]);
        let v = read_byte_float4(&mut c).unwrap();
        assert_eq!(v[0], 0.0);
        assert_eq!(v[1], 1.0);
        assert!((v[2] - 128.0 / 255.0).abs() < 1e-6);
        assert!((v[3] - 64.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn truncated_file_reports_error() {
        assert!(parse_mdl(&[0u8; 16]).is_err());
        assert!(parse_mdl(&[]).is_err());
    }
}
