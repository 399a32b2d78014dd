use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use backup_store::FilenameStyle;
use speckle_graphql::{DEFAULT_CHANNEL_BUFFER, DEFAULT_SERVER, ServerEndpoint, SubscriptionClient, WsProtocol};
use workflow::ReconnectPolicy;
use workflow::annotate::{AnnotateRequest, AnnotateRules, DEFAULT_VERSION_MESSAGE};

use crate::error::CliError;

pub const DEFAULT_CONFIG: &str = "speckle-sync.toml";
pub const DEFAULT_BACKUP_DIR: &str = "backups";
pub const DEFAULT_EXPORT_FILE: &str = "object_data.json";
pub const TOKEN_ENV: &str = "SPECKLE_TOKEN";

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Parser)]
#[command(name = "speckle-sync", about = "Подписка на версии Speckle, бэкапы, экспорт и правка объектов")]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Печатать уведомления о новых версиях проекта
    Watch,
    /// Сохранять каждую новую версию в JSON-файл
    Backup(BackupArgs),
    /// Выгрузить данные одного объекта в файл
    Export(ExportArgs),
    /// Дописать свойства в версию и опубликовать новую
    Annotate(AnnotateArgs),
}

#[derive(Args, Clone, Debug)]
pub struct CommonArgs {
    /// Путь к TOML конфиг файлу
    #[arg(long, global = true, default_value = DEFAULT_CONFIG, env = "SPECKLE_SYNC_CONFIG")]
    pub config: String,

    /// Сервер Speckle: хост или URL со схемой
    #[arg(long, global = true, env = "SPECKLE_SERVER")]
    pub server: Option<String>,

    /// Id проекта
    #[arg(long = "project", global = true, env = "SPECKLE_PROJECT_ID")]
    pub project_id: Option<String>,

    /// Диалект GraphQL поверх WebSocket: graphql_ws | graphql_transport_ws
    #[arg(long, global = true)]
    pub ws_protocol: Option<WsProtocol>,

    /// Таймаут HTTP-запроса и рукопожатия WebSocket, секунды
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,
}

#[derive(Args, Clone, Debug, Default)]
pub struct BackupArgs {
    /// Каталог для файлов бэкапа
    #[arg(long)]
    pub backup_dir: Option<PathBuf>,

    /// Схема имени файла: version | version_and_message
    #[arg(long)]
    pub filename_style: Option<FilenameStyle>,

    /// Сколько раз переподключаться после обрыва (0 = не переподключаться)
    #[arg(long)]
    pub reconnect_attempts: Option<u32>,
}

#[derive(Args, Clone, Debug)]
pub struct ExportArgs {
    /// Id объекта
    #[arg(long = "object")]
    pub object_id: Option<String>,

    /// Файл результата
    #[arg(long, default_value = DEFAULT_EXPORT_FILE)]
    pub output: PathBuf,
}

#[derive(Args, Clone, Debug, Default)]
pub struct AnnotateArgs {
    /// Id модели, в которую публикуется новая версия
    #[arg(long = "model")]
    pub model_id: Option<String>,

    /// Id исходной версии
    #[arg(long = "version")]
    pub version_id: Option<String>,

    /// Сообщение новой версии
    #[arg(long)]
    pub message: Option<String>,
}

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub server: Option<String>,
    pub project_id: Option<String>,
    pub model_id: Option<String>,
    pub version_id: Option<String>,
    pub object_id: Option<String>,
    pub backup_dir: Option<PathBuf>,
    pub filename_style: Option<FilenameStyle>,
    pub ws_protocol: Option<WsProtocol>,
    pub request_timeout_secs: Option<u64>,
    pub channel_buffer: Option<usize>,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub annotate: AnnotateConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReconnectConfig {
    pub max_attempts: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnnotateConfig {
    pub message: Option<String>,
    /// Заменяет набор полей корня по умолчанию целиком.
    pub root_fields: Option<BTreeMap<String, serde_json::Value>>,
    pub identity_paths: Option<Vec<String>>,
    /// Значение `Identity.Module` → имя для `Identity.Designer`.
    /// Без `[annotate.designers]` подстановка выключена.
    #[serde(default)]
    pub designers: BTreeMap<String, String>,
}

impl Config {
    pub fn parse(content: &str, origin: &str) -> Result<Self, CliError> {
        toml::from_str(content).map_err(|e| CliError::Config(format!("bad config '{origin}': {e}")))
    }

    /// Отсутствующий файл по пути по умолчанию → пустой конфиг.
    /// Явно указанный, но нечитаемый или битый файл → ошибка.
    pub fn load(path: &str) -> Result<Self, CliError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && path == DEFAULT_CONFIG => {
                tracing::debug!(config = path, "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(CliError::Config(format!("cannot read config '{path}': {e}"))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Settings: merged config: config.toml < env/CLI
// ═══════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct Settings {
    pub endpoint: ServerEndpoint,
    pub project_id: String,
    pub ws_protocol: WsProtocol,
    pub channel_buffer: usize,
    file: Config,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackupSettings {
    pub dir: PathBuf,
    pub style: FilenameStyle,
    pub reconnect: ReconnectPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    pub object_id: String,
    pub output: PathBuf,
}

impl Settings {
    pub fn load(common: &CommonArgs, token: Option<String>) -> Result<Self, CliError> {
        let file = Config::load(&common.config)?;
        Self::new(common, file, token)
    }

    pub fn new(common: &CommonArgs, file: Config, token: Option<String>) -> Result<Self, CliError> {
        let token = token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| CliError::Config(format!("{TOKEN_ENV} is not set")))?;

        let server = common
            .server
            .clone()
            .or_else(|| file.server.clone())
            .unwrap_or_else(|| DEFAULT_SERVER.to_string());

        let project_id = common
            .project_id
            .clone()
            .or_else(|| file.project_id.clone())
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| CliError::Config("project id is required (--project or project_id)".into()))?;

        let mut endpoint = ServerEndpoint::new(server, token)?;
        if let Some(secs) = common.timeout_secs.or(file.request_timeout_secs) {
            endpoint = endpoint.with_timeout(Duration::from_secs(secs.max(1)));
        }

        Ok(Self {
            endpoint,
            project_id,
            ws_protocol: common.ws_protocol.or(file.ws_protocol).unwrap_or_default(),
            channel_buffer: file.channel_buffer.unwrap_or(DEFAULT_CHANNEL_BUFFER),
            file,
        })
    }

    pub fn subscriber(&self) -> SubscriptionClient {
        SubscriptionClient::new(self.endpoint.clone(), self.ws_protocol).with_buffer(self.channel_buffer)
    }

    pub fn backup(&self, args: &BackupArgs) -> BackupSettings {
        let defaults = ReconnectPolicy::default();
        let rc = &self.file.reconnect;
        BackupSettings {
            dir: args
                .backup_dir
                .clone()
                .or_else(|| self.file.backup_dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_DIR)),
            style: args.filename_style.or(self.file.filename_style).unwrap_or_default(),
            reconnect: ReconnectPolicy {
                max_attempts: args
                    .reconnect_attempts
                    .or(rc.max_attempts)
                    .unwrap_or(defaults.max_attempts),
                initial_delay: rc
                    .initial_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.initial_delay),
                max_delay: rc
                    .max_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.max_delay),
            },
        }
    }

    pub fn export(&self, args: &ExportArgs) -> Result<ExportSettings, CliError> {
        let object_id = required(args.object_id.as_ref().or(self.file.object_id.as_ref()), "object id (--object or object_id)")?;
        Ok(ExportSettings {
            object_id,
            output: args.output.clone(),
        })
    }

    pub fn annotate(&self, args: &AnnotateArgs) -> Result<AnnotateRequest, CliError> {
        let model_id = required(args.model_id.as_ref().or(self.file.model_id.as_ref()), "model id (--model or model_id)")?;
        let version_id = required(
            args.version_id.as_ref().or(self.file.version_id.as_ref()),
            "version id (--version or version_id)",
        )?;

        let cfg = &self.file.annotate;
        let mut rules = AnnotateRules::default();
        if let Some(fields) = &cfg.root_fields {
            rules.root_fields = fields.clone();
        }
        if let Some(paths) = &cfg.identity_paths {
            rules.identity_paths = paths.clone();
        }
        rules.designers = cfg.designers.clone();

        Ok(AnnotateRequest {
            project_id: self.project_id.clone(),
            model_id,
            version_id,
            message: args
                .message
                .clone()
                .or_else(|| cfg.message.clone())
                .unwrap_or_else(|| DEFAULT_VERSION_MESSAGE.to_string()),
            rules,
        })
    }
}

fn required(value: Option<&String>, what: &str) -> Result<String, CliError> {
    value
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or_else(|| CliError::Config(format!("{what} is required")))
}
