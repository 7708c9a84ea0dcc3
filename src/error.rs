use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GenerateError {
    #[error("Некорректное имя wheel-файла {}: ожидается {{distribution}}-{{version}}-...", path.display())]
    MalformedPackageName { path: PathBuf },

    #[error("Не удалось прочитать метаданные {}: {reason}", path.display())]
    MetadataUnreadable { path: PathBuf, reason: String },

    #[error("Некорректный environment marker '{marker}': {reason}")]
    InvalidMarker { marker: String, reason: String },

    #[error("Некорректное описание зависимости '{requirement}': {reason}")]
    InvalidRequirement { requirement: String, reason: String },

    #[error("Некорректное описание окружения: {reason}")]
    InvalidEnvironment { reason: String },

    #[error(
        "Идентификатор репозитория '{id}' получается сразу из {} и {}",
        first.display(),
        second.display()
    )]
    DuplicateRepositoryIdentifier {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error(
        "Пакет '{name}' представлен несколькими wheel-файлами: {} и {}",
        first.display(),
        second.display()
    )]
    DuplicateDistribution {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Could not find pip-provided {table}: '{requested}'; available: {available:?}")]
    UnknownCapability {
        table: &'static str,
        requested: String,
        available: Vec<String>,
    },

    #[error("Пространство имён для генерируемых репозиториев не может быть пустым")]
    EmptyNamespace,

    #[error("Для {repository} не вычислен набор доступных extras")]
    MissingFeasibility { repository: String },
}
