pub mod mdl;
pub mod skeleton;
pub mod tex;

pub use mdl::{load_mdl, parse_mdl};
pub use tex::TextureData;

use std::cell::RefCell;
use std::path::Path;

use physis::excel::{Field, Row};
use physis::resource::{Resource as _, SqPackResource};
use physis::Language;

use crate::domain::GameItem;

pub fn validate_install_dir(install_dir: &Path) -> Result<(), String> {
    let sqpack = install_dir.join("game").join("sqpack");
    if !sqpack.is_dir() {
        return Err(format!("未找到 sqpack 目录: {}", sqpack.display()));
    }
    Ok(())
}

/// 游戏数据访问层，档案/表格/纹理/骨骼解析全部委托给 physis
pub struct GameData {
    physis: RefCell<SqPackResource>,
}

impl GameData {
    pub fn new(install_dir: &Path) -> Self {
        let game_dir = install_dir.join("game");
        let physis = RefCell::new(SqPackResource::from_existing(game_dir.to_str().unwrap()));
        Self { physis }
    }

    pub fn read_file(&self, path: &str) -> Result<Vec<u8>, String> {
        self.physis
            .borrow_mut()
            .read(path)
            .ok_or_else(|| format!("physis 无法读取: {}", path))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.physis.borrow_mut().exists(path)
    }

    pub fn parsed_tex(&self, path: &str) -> Option<TextureData> {
        let tex: physis::tex::Texture = self.physis.borrow_mut().parsed(path).ok()?;
        Some(TextureData {
            rgba: tex.rgba.into(),
            width: tex.width,
            height: tex.height,
        })
    }

    pub fn load_skeleton(&self, race_code: &str) -> Option<physis::skeleton::Skeleton> {
        let path = format!(
            "chara/human/{}/skeleton/base/b0001/skl_{}b0001.sklb",
            race_code, race_code
        );
        self.physis.borrow_mut().parsed(&path).ok()
    }

    pub fn get_all_sheet_names(&self) -> Vec<String> {
        self.physis
            .borrow_mut()
            .get_all_sheet_names()
            .unwrap_or_default()
    }

    pub fn read_excel_header(&self, name: &str) -> Option<physis::exh::EXH> {
        self.physis.borrow_mut().read_excel_sheet_header(name).ok()
    }

    pub fn read_excel_sheet(
        &self,
        exh: &physis::exh::EXH,
        name: &str,
        language: Language,
    ) -> Option<physis::excel::Sheet> {
        self.physis
            .borrow_mut()
            .read_excel_sheet(exh, name, language)
            .ok()
    }

    /// 一次性加载 Item 表全部物品
    pub fn load_all_items(&self) -> Vec<GameItem> {
        let mut physis = self.physis.borrow_mut();

        let exh = match physis.read_excel_sheet_header("Item") {
            Ok(h) => h,
            Err(e) => {
                eprintln!("无法加载 Item 表头: {}", e);
                return Vec::new();
            }
        };

        let sheet = match physis.read_excel_sheet(&exh, "Item", Language::ChineseSimplified) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("无法加载 Item 表: {}", e);
                return Vec::new();
            }
        };

        let mut items = Vec::new();
        for page in &sheet.pages {
            for (row_id, row) in page.into_iter().flatten_subrows() {
                if let Some(item) = Self::parse_item_row(row_id, row) {
                    items.push(item);
                }
            }
        }
        items
    }

    fn parse_item_row(row_id: u32, row: &Row) -> Option<GameItem> {
        // Item 表列索引 (基于 EXDSchema)
        const COL_NAME: usize = 0;
        const COL_ICON: usize = 10;
        const COL_EQUIP_SLOT_CATEGORY: usize = 17;
        const COL_MODEL_MAIN: usize = 47;

        let name = match row.columns.get(COL_NAME)? {
            Field::String(s) => {
                if s.is_empty() {
                    return None;
                }
                s.clone()
            }
            _ => return None,
        };

        let icon_id = match row.columns.get(COL_ICON) {
            Some(Field::UInt16(v)) => *v as u32,
            Some(Field::UInt32(v)) => *v,
            _ => 0,
        };

        let equip_slot_category = match row.columns.get(COL_EQUIP_SLOT_CATEGORY) {
            Some(Field::UInt8(v)) => *v,
            _ => 0,
        };

        let model_main = match row.columns.get(COL_MODEL_MAIN) {
            Some(Field::UInt64(v)) => *v,
            _ => 0,
        };

        Some(GameItem {
            row_id,
            name,
            icon_id,
            equip_slot_category,
            model_main,
        })
    }
}
