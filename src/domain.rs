// ── 装备槽位 ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EquipSlot {
    Head,
    Body,
    Gloves,
    Legs,
    Feet,
}

impl EquipSlot {
    pub fn from_category(cat: u8) -> Option<Self> {
        match cat {
            3 => Some(Self::Head),
            4 => Some(Self::Body),
            5 => Some(Self::Gloves),
            7 => Some(Self::Legs),
            8 => Some(Self::Feet),
            _ => None,
        }
    }

    pub fn slot_abbr(&self) -> &'static str {
        match self {
            Self::Head => "met",
            Self::Body => "top",
            Self::Gloves => "glv",
            Self::Legs => "dwn",
            Self::Feet => "sho",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Head => "头部",
            Self::Body => "身体",
            Self::Gloves => "手部",
            Self::Legs => "腿部",
            Self::Feet => "脚部",
        }
    }
}

pub const ALL_SLOTS: [EquipSlot; 5] = [
    EquipSlot::Head,
    EquipSlot::Body,
    EquipSlot::Gloves,
    EquipSlot::Legs,
    EquipSlot::Feet,
];

/// 模型路径回退顺序 (Hyur Male 优先)
pub const RACE_CODES: &[&str] = &[
    "c0201", "c0101", "c0401", "c0301", "c0801", "c0701", "c0601", "c0501", "c1401", "c1301",
    "c1201", "c1101", "c1001", "c0901", "c1801", "c1701", "c1501",
];

// ── 物品 ──

/// Item 表中一行的展平视图
#[derive(Debug, Clone)]
pub struct GameItem {
    pub row_id: u32,
    pub name: String,
    pub icon_id: u32,
    pub equip_slot_category: u8,
    /// 打包的模型 ID: 低 16 位 set_id, 其次 16 位 variant_id
    pub model_main: u64,
}

impl GameItem {
    pub fn equip_slot(&self) -> Option<EquipSlot> {
        EquipSlot::from_category(self.equip_slot_category)
    }

    pub fn set_id(&self) -> u16 {
        (self.model_main & 0xFFFF) as u16
    }

    pub fn variant_id(&self) -> u16 {
        ((self.model_main >> 16) & 0xFFFF) as u16
    }

    pub fn is_equipment(&self) -> bool {
        self.equip_slot().is_some() && self.set_id() != 0
    }

    pub fn model_path_for_race(&self, race_code: &str) -> Option<String> {
        let slot = self.equip_slot()?;
        Some(format!(
            "chara/equipment/e{:04}/model/{}e{:04}_{}.mdl",
            self.set_id(),
            race_code,
            self.set_id(),
            slot.slot_abbr()
        ))
    }

    /// 候选模型路径列表，按 RACE_CODES 顺序回退
    pub fn model_paths(&self) -> Vec<String> {
        RACE_CODES
            .iter()
            .filter_map(|rc| self.model_path_for_race(rc))
            .collect()
    }
}
