/// Background task implementations
use crate::{context::AppContext, error::PantryResult, outbox::DeliveryReport};

/// Deliver every due outbox message through the configured mailer
pub async fn deliver_outbox(ctx: &AppContext) -> PantryResult<DeliveryReport> {
    ctx.outbox.deliver_due(ctx.mailer.as_ref()).await
}

/// Remove finished outbox messages past retention
pub async fn purge_outbox(ctx: &AppContext) -> PantryResult<u64> {
    ctx.outbox.purge().await
}

/// Health check - verify the database is reachable
pub async fn health_check(ctx: &AppContext) -> PantryResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ServerConfig, db, insights::GeminiClient, mailer::verification_code_email};
    use std::{path::PathBuf, sync::Arc};

    async fn context() -> AppContext {
        let config = ServerConfig::for_testing(PathBuf::from(":memory:"));
        let provider = Arc::new(GeminiClient::new(&config.insights).unwrap());
        AppContext::from_parts(config, db::create_memory_pool().await.unwrap(), provider).unwrap()
    }

    #[tokio::test]
    async fn test_delivery_with_unconfigured_mailer_marks_delivered() {
        let ctx = context().await;
        ctx.outbox
            .enqueue(&verification_code_email("a@x.com", "123456"))
            .await
            .unwrap();

        let report = deliver_outbox(&ctx).await.unwrap();
        assert_eq!(report.delivered, 1);

        // Fresh messages are inside the retention window
        assert_eq!(purge_outbox(&ctx).await.unwrap(), 0);
        health_check(&ctx).await.unwrap();
    }
}
