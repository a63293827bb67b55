//! 测试用 GLB 构造器：按最小结构拼装 glTF JSON + 二进制块，
//! 供导入/导出测试生成可控的场景数据。

use std::borrow::Cow;
use std::collections::BTreeMap;

use gltf::json::{
    self,
    accessor::{ComponentType, GenericComponentType, Type},
    validation::{Checked, USize64},
};

type Attributes = BTreeMap<Checked<json::mesh::Semantic>, json::Index<json::Accessor>>;

pub struct GlbBuilder {
    root: json::Root,
    bin: Vec<u8>,
    last_attributes: Option<Attributes>,
    next_joints: Option<Vec<[u16; 4]>>,
    next_colors_u16: Option<Vec<[u16; 4]>>,
    next_tangents: Option<Vec<[f32; 4]>>,
    skip_tangents: bool,
}

impl GlbBuilder {
    pub fn new() -> Self {
        let mut root = json::Root::default();
        root.asset = json::Asset {
            version: "2.0".to_string(),
            generator: Some("orchestrion-test".to_string()),
            ..Default::default()
        };
        Self {
            root,
            bin: Vec::new(),
            last_attributes: None,
            next_joints: None,
            next_colors_u16: None,
            next_tangents: None,
            skip_tangents: false,
        }
    }

    /// 下一个子网格的关节索引 (默认全 0)
    pub fn set_joints(&mut self, joints: &[[u16; 4]]) {
        self.next_joints = Some(joints.to_vec());
    }

    /// 下一个子网格使用 u16 顶点色
    pub fn set_colors_u16(&mut self, colors: &[[u16; 4]]) {
        self.next_colors_u16 = Some(colors.to_vec());
    }

    /// 下一个子网格的切线 (默认 +X, 手性 +1)
    pub fn set_tangents(&mut self, tangents: &[[f32; 4]]) {
        self.next_tangents = Some(tangents.to_vec());
    }

    /// 下一个子网格不写 TANGENT 属性
    pub fn omit_tangents(&mut self) {
        self.skip_tangents = true;
    }

    pub fn add_skin(&mut self, joint_names: &[&str]) {
        let mut joints = Vec::new();
        for name in joint_names {
            self.root.nodes.push(json::Node {
                name: Some((*name).to_string()),
                ..Default::default()
            });
            joints.push(json::Index::new((self.root.nodes.len() - 1) as u32));
        }
        self.root.skins.push(json::Skin {
            extensions: Default::default(),
            extras: Default::default(),
            inverse_bind_matrices: None,
            joints,
            name: None,
            skeleton: None,
        });
    }

    /// 追加一个网格节点。share_with_previous 为 true 时复用上一个
    /// 子网格的全部顶点属性访问器 (同一缓冲视图)，只新建索引访问器。
    pub fn add_submesh_node(
        &mut self,
        name: &str,
        positions: &[[f32; 3]],
        indices: &[u16],
        share_with_previous: bool,
    ) {
        let attributes = if share_with_previous {
            self.last_attributes
                .clone()
                .expect("没有可共享属性的前一个子网格")
        } else {
            self.build_vertex_attributes(positions)
        };
        self.last_attributes = Some(attributes.clone());

        let index_view = self.push_view(bytemuck::cast_slice(indices));
        let index_accessor =
            self.push_accessor(index_view, indices.len(), ComponentType::U16, Type::Scalar, false);

        self.root.meshes.push(json::Mesh {
            extensions: Default::default(),
            extras: Default::default(),
            name: None,
            primitives: vec![json::mesh::Primitive {
                attributes,
                extensions: Default::default(),
                extras: Default::default(),
                indices: Some(index_accessor),
                material: None,
                mode: Checked::Valid(json::mesh::Mode::Triangles),
                targets: None,
            }],
            weights: None,
        });

        self.root.nodes.push(json::Node {
            mesh: Some(json::Index::new((self.root.meshes.len() - 1) as u32)),
            name: Some(name.to_string()),
            ..Default::default()
        });
    }

    fn build_vertex_attributes(&mut self, positions: &[[f32; 3]]) -> Attributes {
        use json::mesh::Semantic;

        let n = positions.len();
        let mut map = Attributes::new();

        let view = self.push_view(bytemuck::cast_slice(positions));
        let accessor = self.push_accessor(view, n, ComponentType::F32, Type::Vec3, false);
        map.insert(Checked::Valid(Semantic::Positions), accessor);

        let normals = vec![[0.0f32, 1.0, 0.0]; n];
        let view = self.push_view(bytemuck::cast_slice(&normals));
        let accessor = self.push_accessor(view, n, ComponentType::F32, Type::Vec3, false);
        map.insert(Checked::Valid(Semantic::Normals), accessor);

        let uvs = vec![[0.0f32, 0.0]; n];
        for set in 0..2 {
            let view = self.push_view(bytemuck::cast_slice(&uvs));
            let accessor = self.push_accessor(view, n, ComponentType::F32, Type::Vec2, false);
            map.insert(Checked::Valid(Semantic::TexCoords(set)), accessor);
        }

        let weights = vec![[1.0f32, 0.0, 0.0, 0.0]; n];
        let view = self.push_view(bytemuck::cast_slice(&weights));
        let accessor = self.push_accessor(view, n, ComponentType::F32, Type::Vec4, false);
        map.insert(Checked::Valid(Semantic::Weights(0)), accessor);

        let mut joints = self.next_joints.take().unwrap_or_default();
        joints.resize(n, [0u16; 4]);
        let view = self.push_view(bytemuck::cast_slice(&joints));
        let accessor = self.push_accessor(view, n, ComponentType::U16, Type::Vec4, false);
        map.insert(Checked::Valid(Semantic::Joints(0)), accessor);

        if !self.skip_tangents {
            let mut tangents = self.next_tangents.take().unwrap_or_default();
            tangents.resize(n, [1.0f32, 0.0, 0.0, 1.0]);
            let view = self.push_view(bytemuck::cast_slice(&tangents));
            let accessor = self.push_accessor(view, n, ComponentType::F32, Type::Vec4, false);
            map.insert(Checked::Valid(Semantic::Tangents), accessor);
        }
        self.skip_tangents = false;

        if let Some(mut colors) = self.next_colors_u16.take() {
            colors.resize(n, [u16::MAX; 4]);
            let view = self.push_view(bytemuck::cast_slice(&colors));
            let accessor = self.push_accessor(view, n, ComponentType::U16, Type::Vec4, true);
            map.insert(Checked::Valid(Semantic::Colors(0)), accessor);
        } else {
            let colors = vec![[1.0f32; 4]; n];
            let view = self.push_view(bytemuck::cast_slice(&colors));
            let accessor = self.push_accessor(view, n, ComponentType::F32, Type::Vec4, false);
            map.insert(Checked::Valid(Semantic::Colors(0)), accessor);
        }

        map
    }

    fn push_view(&mut self, data: &[u8]) -> u32 {
        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }
        let offset = self.bin.len();
        self.bin.extend_from_slice(data);
        self.root.buffer_views.push(json::buffer::View {
            buffer: json::Index::new(0),
            byte_length: USize64::from(data.len()),
            byte_offset: Some(USize64::from(offset)),
            byte_stride: None,
            extensions: Default::default(),
            extras: Default::default(),
            name: None,
            target: None,
        });
        (self.root.buffer_views.len() - 1) as u32
    }

    fn push_accessor(
        &mut self,
        view: u32,
        count: usize,
        component_type: ComponentType,
        type_: Type,
        normalized: bool,
    ) -> json::Index<json::Accessor> {
        self.root.accessors.push(json::Accessor {
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
        json::Index::new((self.root.accessors.len() - 1) as u32)
    }

    pub fn build(mut self) -> Vec<u8> {
        let node_indices = (0..self.root.nodes.len())
            .map(|i| json::Index::new(i as u32))
            .collect();
        self.root.scenes = vec![json::Scene {
            extensions: Default::default(),
            extras: Default::default(),
            name: None,
            nodes: node_indices,
        }];
        self.root.scene = Some(json::Index::new(0));

        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }
        self.root.buffers = vec![json::Buffer {
            byte_length: USize64::from(self.bin.len()),
            extensions: Default::default(),
            extras: Default::default(),
            name: None,
            uri: None,
        }];

        let json_string =
            json::serialize::to_string(&self.root).expect("glTF JSON 序列化失败");
        let glb = gltf::binary::Glb {
            header: gltf::binary::Header {
                magic: *b"glTF",
                version: 2,
                length: 0, // to_writer 会重新计算
            },
            json: Cow::Owned(json_string.into_bytes()),
            bin: Some(Cow::Owned(self.bin)),
        };
        let mut out = Vec::new();
        glb.to_writer(&mut out).expect("GLB 写出失败");
        out
    }
}
