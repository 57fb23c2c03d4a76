use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use esther_mail::{spawn_dispatcher, Mailer, MemoryTransport, SmtpConfig, SmtpTransport};
use esther_payments::{PayPalOrders, StripeCheckout};
use esther_server::config::Config;
use esther_server::db::{self, SqliteRecordStore};
use esther_server::dedup::MemoryDedupSet;
use esther_server::intents::{FileBackedIntentStore, IntentStore};
use esther_server::notify::EmailNotifier;
use esther_server::reconcile::ReconciliationEngine;
use esther_server::routes;
use esther_server::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    let pool = db::init_pool(&config.database_url).await?;
    let records = Arc::new(SqliteRecordStore::new(pool));

    let stripe = Arc::new(
        StripeCheckout::new(config.stripe_secret_key.clone())
            .with_webhook_secret(config.stripe_webhook_secret.clone()),
    );
    let paypal = {
        let adapter = PayPalOrders::new(
            config.paypal_client_id.clone(),
            config.paypal_client_secret.clone(),
        );
        Arc::new(if config.paypal_sandbox {
            adapter
        } else {
            adapter.production()
        })
    };

    let mailer = if config.smtp_username.is_empty() {
        warn!("SMTP_USER not set; emails will be recorded in memory, not delivered");
        Mailer::new(MemoryTransport::new())
    } else {
        let smtp = SmtpConfig::new(config.smtp_host.clone())
            .port(config.smtp_port)
            .credentials(config.smtp_username.clone(), config.smtp_password.clone());
        Mailer::new(SmtpTransport::new(smtp)?)
    }
    .default_from(config.email_from.clone());
    let dispatcher = spawn_dispatcher(mailer);
    let notifier = Arc::new(EmailNotifier::new(dispatcher, config.admin_email.clone()));

    let intents: Arc<FileBackedIntentStore> = Arc::new(FileBackedIntentStore::new(
        config.pending_intents_file.clone().map(PathBuf::from),
        config.intent_cooldown_secs,
    ));
    spawn_intent_sweeper(intents.clone(), config.intent_ttl_secs);

    let engine = Arc::new(ReconciliationEngine::new(
        records.clone(),
        intents.clone(),
        Arc::new(MemoryDedupSet::new()),
        notifier.clone(),
    ));

    let state = AppState {
        config: config.clone(),
        stripe,
        paypal,
        intents,
        engine,
        records,
        notifier,
    };

    let addr = format!("0.0.0.0:{}", config.api_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Feast of Esther API listening");
    axum::serve(listener, routes::router(state)).await?;

    Ok(())
}

/// Periodically drop intents that will never be confirmed, so abandoned
/// checkouts do not pin draft data in memory forever.
fn spawn_intent_sweeper(intents: Arc<dyn IntentStore>, ttl_secs: i64) {
    tokio::spawn(async move {
        let period = Duration::from_secs((ttl_secs.max(60) as u64) / 4);
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            intents.sweep_expired(ttl_secs).await;
        }
    });
}
