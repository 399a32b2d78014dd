// ════════════════════════════════════════════════════════════════
//  Configuration
// ════════════════════════════════════════════════════════════════

/// Схема имени файла бэкапа.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FilenameStyle {
    /// `backup_{YYYYmmdd_HHMMSS}_{version}.json`
    #[default]
    Version,
    /// `backup_{YYYYmmdd_HHMMSS}_{version}_{message[..20]}.json`
    VersionAndMessage,
}

impl std::str::FromStr for FilenameStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "version" => Ok(FilenameStyle::Version),
            "version_and_message" => Ok(FilenameStyle::VersionAndMessage),
            other => Err(format!(
                "unknown filename style '{other}' (expected version | version_and_message)"
            )),
        }
    }
}

/// Формат метки времени в имени файла и в `backupTimestamp`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Максимальная длина фрагмента сообщения в имени файла (в символах).
pub const MESSAGE_PREFIX_LEN: usize = 20;

/// Сколько суффиксов `-N` пробовать при коллизии имени.
pub(crate) const MAX_COLLISION_SUFFIX: u32 = 1000;
