//! 与 Python `json` 模块兼容的 JSON 读写.
//!
//! Python 写出的评分文件中, `hd95` / `assd` 可能是裸 `Infinity` / `NaN` 记号,
//! 这并不是标准 JSON, `serde_json` 也无法直接读写. 这里的做法是:
//!
//! 1. 读入前, 将字符串之外的裸记号替换为带私用区前缀 [`MARK`] 的字符串;
//! 2. 在 [`Value`] 层面, 非有限浮点数始终以带前缀的字符串表示;
//! 3. 写出后, 再将带前缀的字符串还原为裸记号.
//!
//! 因此, 由本 crate 写出的评分文件与原有 Python 工具链可以互相读取.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Number, Value};

/// 非有限浮点数在 [`Value`] 中的前缀 (Unicode 私用区字符).
pub const MARK: char = '\u{E000}';

const NAN: &str = "NaN";
const POS_INF: &str = "Infinity";
const NEG_INF: &str = "-Infinity";

/// 非有限浮点数对应的 Python 记号.
#[inline]
fn token_of(v: f64) -> &'static str {
    if v.is_nan() {
        NAN
    } else if v > 0.0 {
        POS_INF
    } else {
        NEG_INF
    }
}

/// 将浮点数转换为 [`Value`]. 非有限值会被编码为带前缀的字符串.
pub fn f64_to_value(v: f64) -> Value {
    match Number::from_f64(v) {
        Some(n) => Value::Number(n),
        None => Value::String(format!("{MARK}{}", token_of(v))),
    }
}

/// 将 [`Value`] 解释为浮点数.
///
/// 接受数值, 带前缀的非有限记号, 以及 `null` (视作 `NaN`, 即 `serde_json`
/// 对非有限值的默认写法). 其他值返回 `None`.
pub fn value_to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::Null => Some(f64::NAN),
        Value::String(s) => match s.strip_prefix(MARK)? {
            NAN => Some(f64::NAN),
            POS_INF => Some(f64::INFINITY),
            NEG_INF => Some(f64::NEG_INFINITY),
            _ => None,
        },
        _ => None,
    }
}

/// 将字符串之外的裸 `NaN` / `Infinity` / `-Infinity` 记号替换为带前缀的字符串.
///
/// 字符串内部 (包括转义序列) 原样保留.
pub fn decode_non_finite(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            rest = &rest[c.len_utf8()..];
            continue;
        }

        // `-Infinity` 要先于 `Infinity` 判断.
        if let Some(token) = [NEG_INF, POS_INF, NAN]
            .into_iter()
            .find(|t| rest.starts_with(t))
        {
            out.push('"');
            out.push(MARK);
            out.push_str(token);
            out.push('"');
            rest = &rest[token.len()..];
            continue;
        }

        if c == '"' {
            in_string = true;
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

/// [`decode_non_finite`] 的逆操作.
pub fn encode_non_finite(text: &str) -> String {
    let mut out = text.to_owned();
    for token in [NEG_INF, POS_INF, NAN] {
        let quoted = format!("\"{MARK}{token}\"");
        if out.contains(&quoted) {
            out = out.replace(&quoted, token);
        }
    }
    out
}

/// 解析可能含有裸非有限记号的 JSON 文本.
pub fn from_str<T: DeserializeOwned>(text: &str) -> serde_json::Result<T> {
    serde_json::from_str(&decode_non_finite(text))
}

/// 以 4 空格缩进写出 JSON, 非有限值写为裸记号. 与 `json.dumps(d, indent=4)` 一致.
pub fn to_string_pretty<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let mut buf = Vec::with_capacity(4096);
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    // `serde_json` 只会写出合法 UTF-8.
    let text = String::from_utf8_lossy(&buf);
    Ok(encode_non_finite(&text))
}
