//! Coldflow server binary: wire config, stores, scheduler, and the HTTP API.

use std::sync::Arc;

use miette::IntoDiagnostic;
use tracing::{info, warn};

use coldflow::compiler::CompileOptions;
use coldflow::config::AppConfig;
use coldflow::mailer::{HttpMailer, MailTransport, MemoryMailer, SEND_EMAIL_KIND, SendEmailHandler};
use coldflow::scheduler::{JobScheduler, SqliteJobStore};
use coldflow::server::{self, AppState};
use coldflow::store_sqlite::SqliteSequenceStore;
use coldflow::{db, telemetry};

#[tokio::main]
async fn main() -> miette::Result<()> {
    telemetry::init_tracing();
    telemetry::init_miette();

    let config = AppConfig::from_env();
    let pool = db::connect(&config.database_url).await?;
    info!(database_url = %config.database_url, "database ready");

    let sequences = Arc::new(SqliteSequenceStore::new(pool.clone()));
    let jobs = Arc::new(SqliteJobStore::new(pool));

    let mailer: Arc<dyn MailTransport> = match &config.mail.api_url {
        Some(url) => {
            let mut mailer = HttpMailer::new(url, &config.mail.from);
            if let Some(token) = &config.mail.api_token {
                mailer = mailer.with_token(token);
            }
            Arc::new(mailer)
        }
        None => {
            warn!("MAIL_API_URL not set; outbound mail is recorded in memory only");
            Arc::new(MemoryMailer::new())
        }
    };

    let scheduler =
        Arc::new(JobScheduler::new(jobs).with_poll_interval(config.poll_interval));
    scheduler.define(SEND_EMAIL_KIND, Arc::new(SendEmailHandler::new(mailer)));
    let scheduler_handle = scheduler.clone().start();

    let state = AppState {
        sequences,
        scheduler,
        compile_options: CompileOptions {
            delay_mode: config.delay_mode,
        },
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .into_diagnostic()?;
    info!(addr = %config.bind_addr, "server listening");

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;

    scheduler_handle.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
}
