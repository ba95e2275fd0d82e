use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use accounts::{
    AppState,
    blacklist::{MemoryBlacklist, RedisBlacklist, TokenBlacklist},
    database,
    jwt::{JwtConfig, TokenService},
    repositories::{
        MemoryStore, PgRoleRepository, PgUserRepository, RoleRepository, UserRepository,
    },
    routes,
    settings::{RevocationBackend, ServerSettings, StorageBackend},
};
use common::{
    cache::{RedisConfig, RedisPool},
    database::{DatabaseConfig, health_check, init_pool},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

    info!("Starting account service");

    let settings = ServerSettings::from_env()?;

    let (users, roles): (Arc<dyn UserRepository>, Arc<dyn RoleRepository>) =
        match settings.storage {
            StorageBackend::Postgres => {
                let db_config = DatabaseConfig::from_env()?;
                let pool = init_pool(&db_config).await?;

                if !health_check(&pool).await? {
                    anyhow::bail!("Failed to connect to database");
                }

                database::run_migrations(&pool).await?;

                (
                    Arc::new(PgUserRepository::new(pool.clone())),
                    Arc::new(PgRoleRepository::new(pool)),
                )
            }
            StorageBackend::Memory => {
                info!("Using in-memory credential store; data is lost on restart");
                let store = Arc::new(MemoryStore::new());
                (store.clone(), store)
            }
        };

    database::seed_roles(roles.as_ref()).await?;

    if let Some(admin) = settings.bootstrap_admin() {
        database::ensure_bootstrap_admin(users.as_ref(), roles.as_ref(), &admin).await?;
    }

    let blacklist: Arc<dyn TokenBlacklist> = match settings.revocation {
        RevocationBackend::Redis => {
            let redis_config = RedisConfig::from_env()?;
            let redis_pool = RedisPool::new(&redis_config).await?;

            if !redis_pool.health_check().await? {
                anyhow::bail!("Failed to connect to Redis");
            }

            Arc::new(RedisBlacklist::new(redis_pool))
        }
        RevocationBackend::Memory => {
            info!("Using in-memory revocation list");
            Arc::new(MemoryBlacklist::new())
        }
    };

    let jwt_config = JwtConfig::from_env()?;
    let tokens = TokenService::new(jwt_config, blacklist)?;

    let state = AppState::new(users, roles, tokens);
    let app = routes::create_router(state, &settings.cors_origins());

    let address = settings.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Account service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
