use std::collections::HashMap;

use glam::{Mat4, Quat, Vec3};
use physis::skeleton::Skeleton;

/// 从 physis 骨骼提取的本地变换，parent_index 为 -1 时是根骨骼
#[derive(Clone, Debug)]
pub struct BonePose {
    pub name: String,
    pub parent_index: i32,
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

pub fn bone_poses(skeleton: &Skeleton) -> Vec<BonePose> {
    skeleton
        .bones
        .iter()
        .map(|bone| BonePose {
            name: bone.name.clone(),
            parent_index: bone.parent_index,
            position: bone.position,
            rotation: bone.rotation,
            scale: bone.scale,
        })
        .collect()
}

/// 按父子顺序累乘本地变换，得到每根骨骼的绑定姿态世界矩阵
pub fn compute_bind_pose_matrices(bones: &[BonePose]) -> HashMap<String, Mat4> {
    let bone_count = bones.len();
    let mut world_matrices = vec![Mat4::IDENTITY; bone_count];
    let mut result = HashMap::with_capacity(bone_count);

    for (i, bone) in bones.iter().enumerate() {
        let position = Vec3::new(bone.position[0], bone.position[1], bone.position[2]);
        let rotation = Quat::from_xyzw(
            bone.rotation[0],
            bone.rotation[1],
            bone.rotation[2],
            bone.rotation[3],
        );
        let scale = Vec3::new(bone.scale[0], bone.scale[1], bone.scale[2]);
        let local = Mat4::from_scale_rotation_translation(scale, rotation, position);

        let world = if bone.parent_index >= 0 && (bone.parent_index as usize) < bone_count {
            world_matrices[bone.parent_index as usize] * local
        } else {
            local
        };

        world_matrices[i] = world;
        result.insert(bone.name.clone(), world);
    }

    result
}

/// 骨骼树的文本形式：每行缩进表示层级，附世界坐标
pub fn bone_tree_lines(bones: &[BonePose]) -> Vec<String> {
    let bind = compute_bind_pose_matrices(bones);
    let mut lines = Vec::with_capacity(bones.len());
    for (i, bone) in bones.iter().enumerate() {
        if bone.parent_index < 0 {
            push_bone_lines(bones, &bind, i, 0, &mut lines);
        }
    }
    lines
}

fn push_bone_lines(
    bones: &[BonePose],
    bind: &HashMap<String, Mat4>,
    index: usize,
    depth: usize,
    lines: &mut Vec<String>,
) {
    let bone = &bones[index];
    let world = bind
        .get(&bone.name)
        .map(|m| m.w_axis)
        .unwrap_or(glam::Vec4::ZERO);
    lines.push(format!(
        "{}{} ({:.3}, {:.3}, {:.3})",
        "  ".repeat(depth),
        bone.name,
        world.x,
        world.y,
        world.z
    ));
    for (child, _) in bones
        .iter()
        .enumerate()
        .filter(|(_, b)| b.parent_index == index as i32)
    {
        push_bone_lines(bones, bind, child, depth + 1, lines);
    }
}
