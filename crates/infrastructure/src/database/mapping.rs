//! 行映射辅助函数：UUID 与状态枚举以文本存储，参与方编号以整数存储

use portal_errors::{PortalError, PortalResult};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

pub struct MappingHelpers;

impl MappingHelpers {
    pub fn uuid(row: &SqliteRow, column: &str) -> PortalResult<Uuid> {
        let text: String = row.try_get(column)?;
        Uuid::parse_str(&text)
            .map_err(|e| PortalError::Serialization(format!("解析字段 {column} 失败: {e}")))
    }

    pub fn enum_value<T>(row: &SqliteRow, column: &str) -> PortalResult<T>
    where
        T: FromStr<Err = PortalError>,
    {
        let text: String = row.try_get(column)?;
        text.parse()
    }

    pub fn optional_enum_value<T>(row: &SqliteRow, column: &str) -> PortalResult<Option<T>>
    where
        T: FromStr<Err = PortalError>,
    {
        let text: Option<String> = row.try_get(column)?;
        text.filter(|t| !t.is_empty()).map(|t| t.parse()).transpose()
    }

    pub fn party_id(row: &SqliteRow, column: &str) -> PortalResult<u64> {
        let value: i64 = row.try_get(column)?;
        u64::try_from(value)
            .map_err(|e| PortalError::Serialization(format!("解析字段 {column} 失败: {e}")))
    }

    pub fn party_id_param(party_id: u64) -> PortalResult<i64> {
        i64::try_from(party_id)
            .map_err(|e| PortalError::validation_error(format!("参与方编号超出范围: {e}")))
    }
}
