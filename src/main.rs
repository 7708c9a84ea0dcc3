mod app;
mod config;
mod declarations;
mod error;
mod files;
mod marker;
mod metadata;
mod model;
mod naming;
mod render;
mod requirement;
mod resolver;
#[cfg(test)]
mod testing;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::app::CliCommand;
use crate::config::{EnvironmentOptions, PYTHON_VERSION_ENV};

#[derive(Parser)]
#[command(name = "pip-bzl")]
#[command(about = "Генерирует Bazel-объявления для набора скачанных Python wheel-пакетов")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    environment: EnvironmentArgs,

    /// Подробный вывод (уровень debug).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct EnvironmentArgs {
    /// JSON-файл с описанием окружения для environment markers.
    #[arg(long, global = true)]
    environment: Option<PathBuf>,

    /// Интерпретатор Python, у которого запрашивается окружение.
    #[arg(long, global = true)]
    python: Option<String>,

    /// Версия Python для окружения текущей машины.
    #[arg(long, global = true, env = PYTHON_VERSION_ENV)]
    python_version: Option<String>,
}

#[derive(Args)]
struct WheelSource {
    /// Каталог, в котором рекурсивно ищутся .whl файлы.
    #[arg(long)]
    directory: Option<PathBuf>,

    /// Отдельный .whl файл (можно указывать несколько раз).
    #[arg(long = "whl")]
    wheels: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Создаёт requirements.bzl с репозиториями и таблицами зависимостей.
    Generate {
        /// Пространство имён импорта.
        #[arg(long)]
        name: String,

        /// requirements.txt, из которого получены wheel-файлы.
        #[arg(long)]
        input: Option<String>,

        /// Путь к создаваемому requirements.bzl.
        #[arg(long)]
        output: PathBuf,

        #[command(flatten)]
        source: WheelSource,
    },

    /// Распаковывает wheel-файлы и пишет рядом BUILD.
    Expand {
        /// Распаковываемые .whl файлы.
        #[arg(long = "whl", required = true)]
        wheels: Vec<PathBuf>,

        /// Каталог распаковки.
        #[arg(long, default_value = ".")]
        directory: PathBuf,

        /// Метка requirements.bzl, из которого берутся зависимости.
        #[arg(long)]
        requirements: Option<String>,

        /// Extras, для которых создаются отдельные цели.
        #[arg(long = "extras")]
        extras: Vec<String>,

        /// Добавлять зависимости пакета в цели BUILD.
        #[arg(long)]
        track_deps: bool,
    },

    /// Показывает цель, в которую разрешается имя зависимости.
    Query {
        /// Пространство имён импорта.
        #[arg(long)]
        name: String,

        /// Искать среди filegroup-целей с wheel-файлами.
        #[arg(long)]
        files: bool,

        #[command(flatten)]
        source: WheelSource,

        /// Имя зависимости, например requests[socks].
        requirement: String,
    },

    /// Печатает или сохраняет описание окружения для environment markers.
    Environment {
        /// Файл, в который сохраняется описание.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    if let Err(error) = run_main() {
        eprintln!("Ошибка: {error:#}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("pip_bzl=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn run_main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = EnvironmentOptions {
        file: cli.environment.environment,
        python: cli.environment.python,
        python_version: cli.environment.python_version,
    };

    let command = match cli.command {
        Commands::Generate {
            name,
            input,
            output,
            source,
        } => CliCommand::Generate {
            name,
            input,
            output,
            directory: source.directory,
            wheels: source.wheels,
        },
        Commands::Expand {
            wheels,
            directory,
            requirements,
            extras,
            track_deps,
        } => CliCommand::Expand {
            wheels,
            directory,
            requirements,
            extras,
            track_deps,
        },
        Commands::Query {
            name,
            files,
            source,
            requirement,
        } => CliCommand::Query {
            name,
            directory: source.directory,
            wheels: source.wheels,
            requirement,
            files,
        },
        Commands::Environment { output } => CliCommand::Environment { output },
    };

    app::run(&options, command, &mut io::stdout())
}
