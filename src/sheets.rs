use physis::excel::Field;
use physis::exh::{ColumnDataType, EXH};
use physis::Language;

use crate::game::GameData;
use crate::schema;

/// 供文本输出的表格快照：表头 + (row_id, 各列文本)
pub struct SheetDump {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<(u32, Vec<String>)>,
}

/// 读取整张表并展平为文本行。列名优先取 EXDSchema 定义，
/// 取不到时退化为 "[offset] type #n" 形式。
pub fn dump_sheet(game: &GameData, name: &str) -> Result<SheetDump, String> {
    let exh = game
        .read_excel_header(name)
        .ok_or_else(|| format!("无法加载 {} 表头", name))?;

    let sheet = game
        .read_excel_sheet(&exh, name, Language::ChineseSimplified)
        .or_else(|| game.read_excel_sheet(&exh, name, Language::None))
        .ok_or_else(|| format!("无法加载 {} 表", name))?;

    let schema_columns = match schema::load_schema(name) {
        Ok(columns) => columns,
        Err(e) => {
            eprintln!("{} 的 schema 不可用: {}", name, e);
            Vec::new()
        }
    };
    let headers = column_headers(&exh, &schema_columns);

    let mut rows = Vec::new();
    for page in &sheet.pages {
        for (row_id, row) in page.into_iter().flatten_subrows() {
            let columns = row.columns.iter().map(format_field).collect();
            rows.push((row_id, columns));
        }
    }

    Ok(SheetDump {
        name: name.to_string(),
        headers,
        rows,
    })
}

/// "Name [offset] type" 风格的列标题
pub fn column_headers(exh: &EXH, schema_columns: &[String]) -> Vec<String> {
    exh.column_definitions
        .iter()
        .enumerate()
        .map(|(i, def)| {
            let type_short = column_type_short(def.data_type);
            match schema_columns.get(i) {
                Some(name) => format!("{} [{}] {}", name, def.offset, type_short),
                None => format!("[{}] {} #{}", def.offset, type_short, i),
            }
        })
        .collect()
}

pub fn column_type_short(dt: ColumnDataType) -> &'static str {
    match dt {
        ColumnDataType::String => "str",
        ColumnDataType::Bool
        | ColumnDataType::PackedBool0
        | ColumnDataType::PackedBool1
        | ColumnDataType::PackedBool2
        | ColumnDataType::PackedBool3
        | ColumnDataType::PackedBool4
        | ColumnDataType::PackedBool5
        | ColumnDataType::PackedBool6
        | ColumnDataType::PackedBool7 => "bool",
        ColumnDataType::Int8 => "i8",
        ColumnDataType::UInt8 => "u8",
        ColumnDataType::Int16 => "i16",
        ColumnDataType::UInt16 => "u16",
        ColumnDataType::Int32 => "i32",
        ColumnDataType::UInt32 => "u32",
        ColumnDataType::Float32 => "f32",
        ColumnDataType::Int64 => "i64",
        ColumnDataType::UInt64 => "u64",
    }
}

pub fn format_field(field: &Field) -> String {
    match field {
        Field::String(s) => {
            if s.chars().count() > 30 {
                let truncated: String = s.chars().take(30).collect();
                format!("{}…", truncated)
            } else {
                s.clone()
            }
        }
        Field::Bool(b) => (if *b { "true" } else { "false" }).to_string(),
        Field::UInt64(v) => format!("{} (0x{:X})", v, v),
        Field::Float32(v) => format!("{:.2}", v),
        Field::Int8(v) => v.to_string(),
        Field::UInt8(v) => v.to_string(),
        Field::Int16(v) => v.to_string(),
        Field::UInt16(v) => v.to_string(),
        Field::Int32(v) => v.to_string(),
        Field::UInt32(v) => v.to_string(),
        Field::Int64(v) => v.to_string(),
    }
}
