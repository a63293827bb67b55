use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use orchestrion::domain::ALL_SLOTS;
use orchestrion::game::{self, skeleton, tex, GameData};
use orchestrion::{config, export, import, schema, sheets, NodeOutcome};
use orchestrion_model::compute_bounding_box;

const USAGE: &str = "用法: orchestrion [游戏目录] <操作> [参数]

游戏目录只需在首次运行时给出，之后会从配置中读取。

操作:
  model <路径>              显示模型的 LOD/部件/子网格/骨骼概要
  export <路径> <out.glb>   将模型 LOD 0 导出为 glb
  import <路径> <in.glb>    将 glb 几何导入模型并打印逐节点报告
  items                     列出全部装备物品
  sheets                    列出全部 EXD 表名
  sheet <表名>              按 schema 列名转储整张表
  definitions [表名…]       下载/更新表定义 (无参数时更新全部缓存)
  extract <游戏路径> <输出>  提取档案中的原始文件
  tex <游戏路径> <out.png>  解码纹理并保存为 PNG
  skeleton <种族代码>       显示骨骼树 (如 c0201)
  check-paths <清单文件>    检查路径清单中的文件是否存在于档案";

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // 首个参数若是目录则视为游戏目录 (每个工具的唯一位置参数)，
    // 其余情况从配置读取上次记录的目录
    let (explicit_dir, rest) = match args.first() {
        Some(first) if Path::new(first).is_dir() => {
            (Some(PathBuf::from(first)), &args[1..])
        }
        _ => (None, &args[..]),
    };

    let Some(command) = rest.first() else {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    };
    let params = &rest[1..];

    match command.as_str() {
        // definitions 不需要游戏数据
        "definitions" => {
            if params.is_empty() {
                let count = schema::update_all_schemas();
                println!("已更新 {} 份缓存定义", count);
            } else {
                for name in params {
                    schema::update_schema(name).map_err(anyhow::Error::msg)?;
                }
            }
            return Ok(());
        }
        _ => {}
    }

    let install_dir = resolve_install_dir(explicit_dir.as_deref())?;
    let game = GameData::new(&install_dir);

    match command.as_str() {
        "model" => {
            let [path] = params else {
                bail!("model 需要一个模型路径参数");
            };
            let model = game::load_mdl(&game, path).map_err(anyhow::Error::msg)?;
            print_model_summary(path, &model);
        }
        "export" => {
            let [path, out] = params else {
                bail!("export 需要模型路径与输出文件两个参数");
            };
            let model = game::load_mdl(&game, path).map_err(anyhow::Error::msg)?;
            let glb = export::export_glb(&model, 0).map_err(anyhow::Error::msg)?;
            std::fs::write(out, &glb).with_context(|| format!("写入 {} 失败", out))?;
            println!("已导出 {} ({} 字节)", out, glb.len());
        }
        "import" => {
            let [path, input] = params else {
                bail!("import 需要模型路径与 glb 文件两个参数");
            };
            let mut model = game::load_mdl(&game, path).map_err(anyhow::Error::msg)?;
            let report =
                import::import_glb(&mut model, Path::new(input)).map_err(anyhow::Error::msg)?;
            print_import_report(&report);
            if report.imported_count() == 0 {
                bail!("没有任何节点被导入");
            }
        }
        "items" => {
            let items = game.load_all_items();
            let equipment: Vec<_> = items.iter().filter(|i| i.is_equipment()).collect();
            for item in &equipment {
                let slot = item.equip_slot().map(|s| s.slot_abbr()).unwrap_or("???");
                println!(
                    "[{}] {} (e{:04} v{:02}, 图标 {}) {}",
                    slot,
                    item.name,
                    item.set_id(),
                    item.variant_id(),
                    item.icon_id,
                    item.model_paths().first().cloned().unwrap_or_default()
                );
            }
            for slot in &ALL_SLOTS {
                let count = equipment
                    .iter()
                    .filter(|i| i.equip_slot() == Some(*slot))
                    .count();
                println!("{}: {} 件", slot.display_name(), count);
            }
            println!("共 {} 件装备", equipment.len());
        }
        "sheets" => {
            let mut names = game.get_all_sheet_names();
            names.sort();
            for name in &names {
                println!("{}", name);
            }
            println!("共 {} 张表", names.len());
        }
        "sheet" => {
            let [name] = params else {
                bail!("sheet 需要一个表名参数");
            };
            let dump = sheets::dump_sheet(&game, name).map_err(anyhow::Error::msg)?;
            println!("ID\t{}", dump.headers.join("\t"));
            for (row_id, columns) in &dump.rows {
                println!("{}\t{}", row_id, columns.join("\t"));
            }
            println!("{}: {} 行", dump.name, dump.rows.len());
        }
        "extract" => {
            let [path, out] = params else {
                bail!("extract 需要游戏路径与输出文件两个参数");
            };
            let data = game.read_file(path).map_err(anyhow::Error::msg)?;
            std::fs::write(out, &data).with_context(|| format!("写入 {} 失败", out))?;
            println!("已保存 {} ({} 字节)", out, data.len());
        }
        "tex" => {
            let [path, out] = params else {
                bail!("tex 需要游戏路径与输出文件两个参数");
            };
            let texture = game
                .parsed_tex(path)
                .with_context(|| format!("无法解析纹理: {}", path))?;
            tex::save_png(&texture, Path::new(out)).map_err(anyhow::Error::msg)?;
            println!("已保存 {} ({}x{})", out, texture.width, texture.height);
        }
        "skeleton" => {
            let [race_code] = params else {
                bail!("skeleton 需要一个种族代码参数 (如 c0201)");
            };
            let parsed = game
                .load_skeleton(race_code)
                .with_context(|| format!("无法加载 {} 的骨骼", race_code))?;
            let bones = skeleton::bone_poses(&parsed);
            for line in skeleton::bone_tree_lines(&bones) {
                println!("{}", line);
            }
            println!("共 {} 根骨骼", bones.len());
        }
        "check-paths" => {
            let [list_file] = params else {
                bail!("check-paths 需要一个清单文件参数");
            };
            let content = std::fs::read_to_string(list_file)
                .with_context(|| format!("读取 {} 失败", list_file))?;
            let mut found = 0;
            let mut missing = 0;
            for path in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
                if game.exists(path) {
                    found += 1;
                } else {
                    println!("缺失: {}", path);
                    missing += 1;
                }
            }
            println!("{} 个存在, {} 个缺失", found, missing);
        }
        other => {
            eprintln!("未知操作: {}\n\n{}", other, USAGE);
            std::process::exit(1);
        }
    }

    Ok(())
}

/// 校验并记住游戏目录；未显式给出时回退到配置
fn resolve_install_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(dir) => {
            game::validate_install_dir(dir).map_err(anyhow::Error::msg)?;
            let mut cfg = config::load_config();
            if cfg.game_install_dir.as_deref() != Some(dir) {
                cfg.game_install_dir = Some(dir.to_path_buf());
                if let Err(e) = config::save_config(&cfg) {
                    eprintln!("保存配置失败: {}", e);
                }
            }
            Ok(dir.to_path_buf())
        }
        None => {
            let cfg = config::load_config();
            let dir = cfg
                .game_install_dir
                .context("未指定游戏目录，且配置中没有记录；请将游戏目录作为第一个参数传入")?;
            game::validate_install_dir(&dir).map_err(anyhow::Error::msg)?;
            Ok(dir)
        }
    }
}

fn print_model_summary(path: &str, model: &orchestrion_model::Model) {
    println!("{}", path);
    for (li, lod) in model.lods.iter().enumerate() {
        let vertex_total: usize = lod.parts.iter().map(|p| p.vertices.len()).sum();
        let index_total: usize = lod.parts.iter().map(|p| p.indices.len()).sum();
        println!(
            "LOD {}: {} 个部件, {} 顶点, {} 索引",
            li,
            lod.parts.len(),
            vertex_total,
            index_total
        );
        for (pi, part) in lod.parts.iter().enumerate() {
            println!(
                "  部件 {} (网格 {}): {} 顶点, {} 索引, {} 子网格 (材质 {}, 骨骼表 {})",
                pi,
                part.mesh_index,
                part.vertices.len(),
                part.indices.len(),
                part.submeshes.len(),
                part.material_index,
                part.bone_table_index
            );
            for (si, submesh) in part.submeshes.iter().enumerate() {
                println!(
                    "    子网格 {}: 索引 {} + {}",
                    si, submesh.index_offset, submesh.index_count
                );
            }
        }
    }
    println!("材质: {:?}", model.material_names);
    println!(
        "受影响骨骼 ({}): {}",
        model.affected_bone_names.len(),
        model.affected_bone_names.join(", ")
    );
    println!("骨骼表: {} 张", model.bone_tables.len());
    let bbox = compute_bounding_box(model, 0);
    println!(
        "包围盒: min {:?} max {:?} (中心 {:?}, 尺寸 {:.3})",
        bbox.min,
        bbox.max,
        bbox.center(),
        bbox.size()
    );
}

fn print_import_report(report: &import::ImportReport) {
    for outcome in &report.nodes {
        match outcome {
            NodeOutcome::Imported {
                name,
                lod,
                part,
                submesh,
                vertex_count,
                index_count,
                shared_buffer,
            } => {
                println!(
                    "导入 {}: LOD {} 部件 {} 子网格 {} ({} 顶点, {} 索引{})",
                    name,
                    lod,
                    part,
                    submesh,
                    vertex_count,
                    index_count,
                    if *shared_buffer { ", 共享缓冲" } else { "" }
                );
            }
            NodeOutcome::Skipped { name, reason } => {
                println!("跳过 {}: {}", name, reason.describe());
            }
        }
    }
    for part in &report.replaced_parts {
        println!(
            "部件 {}.{} 已替换: {} 顶点, {} 索引, {} 子网格",
            part.lod, part.part, part.vertex_count, part.index_count, part.submesh_count
        );
    }
}
