/// Application context and dependency injection
use crate::{
    account::AccountManager,
    activity::ActivityLog,
    auth::SessionIssuer,
    config::ServerConfig,
    db,
    error::PantryResult,
    family::FamilyManager,
    insights::{GeminiClient, InsightProvider, InsightService},
    ledger::{GroceryStore, MealStore, PantryStore},
    mailer::Mailer,
    outbox::Outbox,
    rate_limit::RateLimiter,
};
use sqlx::SqlitePool;
use std::{sync::Arc, time::Duration};

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub sessions: SessionIssuer,
    pub accounts: Arc<AccountManager>,
    pub family: Arc<FamilyManager>,
    pub activity: ActivityLog,
    // Ownership ledger
    pub pantry: PantryStore,
    pub grocery: GroceryStore,
    pub meals: MealStore,
    // Email
    pub outbox: Arc<Outbox>,
    pub mailer: Arc<Mailer>,
    pub insights: Arc<InsightService>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> PantryResult<Self> {
        config.validate()?;

        if !config.storage.data_directory.exists() {
            tokio::fs::create_dir_all(&config.storage.data_directory).await?;
        }

        let db = db::create_pool(
            &config.storage.database,
            db::DatabaseOptions {
                max_connections: config.storage.max_connections,
                ..Default::default()
            },
        )
        .await?;

        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        let provider: Arc<dyn InsightProvider> = Arc::new(GeminiClient::new(&config.insights)?);
        if !provider.is_configured() {
            tracing::warn!("No insight provider key configured, serving static suggestions");
        }

        Self::from_parts(config, db, provider)
    }

    /// Assemble the services over an existing pool and insight provider
    pub fn from_parts(
        config: ServerConfig,
        db: SqlitePool,
        provider: Arc<dyn InsightProvider>,
    ) -> PantryResult<Self> {
        let sessions = SessionIssuer::new(
            &config.authentication.jwt_secret,
            config.authentication.session_ttl_days,
        );

        let mailer = Arc::new(Mailer::new(config.email.clone())?);
        if !mailer.is_configured() {
            tracing::warn!("Email not configured, outgoing mail will be logged only");
        }

        let outbox = Arc::new(Outbox::new(db.clone(), config.outbox.clone()));
        let activity = ActivityLog::new(db.clone());

        let accounts = Arc::new(AccountManager::new(db.clone(), sessions.clone(), outbox.clone()));
        let family = Arc::new(FamilyManager::new(
            db.clone(),
            outbox.clone(),
            activity.clone(),
            &config.service.public_url,
            &config.service.frontend_url,
        ));

        let pantry = PantryStore::new(db.clone(), activity.clone());
        let grocery = GroceryStore::new(db.clone(), activity.clone());
        let meals = MealStore::new(db.clone(), activity.clone());

        let insights = Arc::new(InsightService::new(
            provider,
            Duration::from_secs(config.insights.timeout_secs),
        ));
        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));

        Ok(Self {
            config: Arc::new(config),
            db,
            sessions,
            accounts,
            family,
            activity,
            pantry,
            grocery,
            meals,
            outbox,
            mailer,
            insights,
            rate_limiter,
        })
    }

    /// Address the server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.config.service.hostname, self.config.service.port)
    }
}
