// ==========================================
// 科研成果评估系统 - 列值编解码
// ==========================================
// 定点小数 / 枚举 / 时间统一以 TEXT 存储
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rust_decimal::Decimal;
use std::fmt::Display;
use std::str::FromStr;

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

/// 读取 Decimal 列
pub fn decimal_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(raw.trim()).map_err(|e| conversion_error(idx, format!("{}: {}", raw, e)))
}

/// 读取可空 Decimal 列
pub fn optional_decimal_column(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<Decimal>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(s) if !s.trim().is_empty() => Decimal::from_str(s.trim())
            .map(Some)
            .map_err(|e| conversion_error(idx, format!("{}: {}", s, e))),
        _ => Ok(None),
    }
}

/// 读取枚举列（FromStr<Err = String>）
pub fn enum_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| conversion_error(idx, e.to_string()))
}

pub fn datetime_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, DATETIME_FORMAT)
        .map_err(|e| conversion_error(idx, format!("{}: {}", raw, e)))
}

pub fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}
