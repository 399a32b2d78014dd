/// Категория ошибки. Позволяет вызывающему коду решать:
/// завершить процесс, пропустить уведомление или переподключиться.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Нет токена, битый конфиг: фатально на старте.
    Config,
    /// Сеть, WebSocket, HTTP статус: обрыв соединения.
    Transport,
    /// GraphQL вернул `errors` или ответ неожиданной формы.
    Query,
    /// Объект есть, но `data` пустая: предупреждение, не сбой.
    Empty,
    /// Локальная файловая система.
    Io,
    /// Сериализация / парсинг JSON.
    Format,
    /// Отмена (Ctrl+C, CancellationToken).
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Config => f.write_str("config"),
            ErrorKind::Transport => f.write_str("transport"),
            ErrorKind::Query => f.write_str("query"),
            ErrorKind::Empty => f.write_str("empty"),
            ErrorKind::Io => f.write_str("io"),
            ErrorKind::Format => f.write_str("format"),
            ErrorKind::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Единый тип ошибки для клиентов, хранилища бэкапов и workflow.
///
/// Несёт `ErrorKind` для классификации и человекочитаемое сообщение.
/// `From` impls проставляют kind автоматически, чтобы работал `?`.
#[derive(Clone, PartialEq, Eq)]
pub struct SyncError {
    kind: ErrorKind,
    message: String,
}

impl SyncError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, message: msg.into() }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, msg)
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, msg)
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Query, msg)
    }

    pub fn empty(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Empty, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, msg)
    }

    pub fn format_err(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Format, msg)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "cancelled")
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Ошибка уровня соединения: подписку после неё не продолжить.
    pub fn is_connection_level(&self) -> bool {
        matches!(self.kind, ErrorKind::Transport | ErrorKind::Config)
    }
}

impl std::fmt::Debug for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for SyncError {}

impl From<std::io::Error> for SyncError {
    fn from(e: std::io::Error) -> Self { Self::io(e.to_string()) }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self { Self::format_err(e.to_string()) }
}
