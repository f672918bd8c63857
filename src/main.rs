use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use taskdock::config::Config;
use taskdock::services::{
    create_tool_runner, detect_active_theme, ApplicationCatalog, IconResolver, WindowEnumerator,
    WindowFilter, WindowMatcher, WindowService,
};
use taskdock::utils::SessionInfo;

#[derive(Parser, Debug)]
#[command(name = "taskdock")]
#[command(about = "Обнаружение окон и сопоставление их с приложениями для док-панели")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "taskdock.toml")]
    config: String,

    /// Режим сухого запуска (утилиты эмулируются)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования (по умолчанию из конфигурации)
    #[arg(long)]
    log_level: Option<String>,

    /// Один проход перечисления, вывод результата и выход
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Загрузка конфигурации
    let config = Config::load(&args.config)?;

    // Инициализация системы логирования
    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    init_tracing(level, &config.logging.format)?;

    info!("Запуск taskdock v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {}", args.config);

    if args.dry_run {
        warn!("Режим сухого запуска - внешние утилиты не вызываются");
    }

    let session = SessionInfo::detect();
    session.log_summary();

    // Инициализация компонентов
    let runner = create_tool_runner(&config, args.dry_run);
    let active_theme = detect_active_theme(runner.as_ref()).await;
    let icons = Arc::new(IconResolver::from_config(&config.icons, active_theme));
    let catalog = Arc::new(
        ApplicationCatalog::from_config(&config.catalog, session).with_icon_resolver(icons.clone()),
    );
    let enumerator = WindowEnumerator::new(runner, WindowFilter::from_config(&config.filter));
    let matcher = WindowMatcher::from_config(&config.matcher, Some(icons));
    let service = WindowService::new(enumerator, matcher, catalog, config.poll_interval());

    info!("Все компоненты инициализированы");

    if args.once {
        let list = service.poll_now().await.unwrap_or_else(|| service.current());
        for result in list.iter() {
            let icon = result
                .resolved_icon_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("{}\t{}", result, icon);
        }
        return Ok(());
    }

    let mut updates = service.subscribe();
    service.start()?;

    let printer_handle = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(list) => {
                    info!("Окон в доке: {}", list.len());
                    for result in list.iter() {
                        let marker = if result.window.is_focused { "*" } else { " " };
                        debug!("{} {}", marker, result);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Пропущено обновлений списка окон: {}", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    info!("Все сервисы запущены");

    // Ожидание сигнала завершения
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Получен сигнал завершения (Ctrl+C)");
        }
        Err(err) => {
            error!("Ошибка при ожидании сигнала завершения: {}", err);
        }
    }

    info!("Завершение работы...");
    service.stop();

    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    match tokio::time::timeout(shutdown_timeout, printer_handle).await {
        Ok(_) => info!("Все сервисы завершили работу корректно"),
        Err(_) => warn!("Таймаут при завершении сервисов"),
    }

    info!("taskdock завершил работу");
    Ok(())
}

fn init_tracing(level: &str, format: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        "pretty" => registry.with(tracing_subscriber::fmt::layer()).init(),
        _ => registry.with(tracing_subscriber::fmt::layer().compact()).init(),
    }

    Ok(())
}
