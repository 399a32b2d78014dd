use chrono::{DateTime, Local};

use super::config::{FilenameStyle, MESSAGE_PREFIX_LEN, TIMESTAMP_FORMAT};

/// Текущее локальное время в формате `YYYYmmdd_HHMMSS`.
pub fn timestamp_now() -> String {
    format_timestamp(&Local::now())
}

pub fn format_timestamp(at: &DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Фрагмент сообщения для имени файла: буквы, цифры, пробелы, `_`;
/// хвостовые пробелы срезаются, затем обрезка до 20 символов.
pub fn message_fragment(message: &str) -> String {
    let clean: String = message
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '_')
        .collect();
    clean.trim_end().chars().take(MESSAGE_PREFIX_LEN).collect()
}

/// Id версии приходит с сервера; в имя файла пускаем только безопасные символы.
fn safe_id(id: &str) -> String {
    id.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

/// Базовое имя без расширения: `backup_{ts}_{version}[_{msg}]`.
pub fn backup_stem(style: FilenameStyle, timestamp: &str, version_id: &str, message: Option<&str>) -> String {
    let mut stem = format!("backup_{timestamp}_{}", safe_id(version_id));
    if style == FilenameStyle::VersionAndMessage {
        let fragment = message.map(message_fragment).unwrap_or_default();
        if !fragment.is_empty() {
            stem.push('_');
            stem.push_str(&fragment);
        }
    }
    stem
}

/// `{stem}.json` или `{stem}-{n}.json` для n > 0.
pub(crate) fn with_suffix(stem: &str, n: u32) -> String {
    if n == 0 {
        format!("{stem}.json")
    } else {
        format!("{stem}-{n}.json")
    }
}
