use bigdecimal::BigDecimal;
use serde::{Serialize, Serializer};
use std::str::FromStr;

/// 金额输出为 JSON 数字, 保留原始小数位 (serde_json arbitrary_precision)
pub fn serialize<S: Serializer>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error> {
    serde_json::Number::from_str(&value.to_string())
        .map_err(serde::ser::Error::custom)?
        .serialize(serializer)
}
