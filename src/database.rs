use std::time::Duration;

use futures::{
    FutureExt, TryStreamExt,
    future::{BoxFuture, Shared},
};
use mongodb::{
    Client, Collection, IndexModel,
    bson::{Bson, doc},
    error::{Error as MongoError, ErrorKind},
    options::{ClientOptions, IndexOptions},
};
use parking_lot::Mutex;

use crate::{config::AppConfig, error::RepositoryError, models::Member};

// Server error code for "ns does not exist" (listIndexes on a fresh collection).
const NAMESPACE_NOT_FOUND: i32 = 26;

/// MongoSettings
///
/// Everything the gateway needs to open a connection.
#[derive(Debug, Clone)]
pub struct MongoSettings {
    pub uri: String,
    pub database: String,
    pub collection: String,
    pub server_selection_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_pool_size: u32,
}

impl MongoSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            uri: config.mongo_uri.clone(),
            database: config.db_name.clone(),
            collection: config.members_collection.clone(),
            server_selection_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            max_pool_size: 10,
        }
    }
}

#[derive(Clone)]
struct Connection {
    client: Client,
    members: Collection<Member>,
}

type PendingConnection = Shared<BoxFuture<'static, Result<Connection, RepositoryError>>>;

enum Phase {
    Idle,
    Connecting { attempt: u64, pending: PendingConnection },
    Ready { attempt: u64, conn: Connection },
}

struct GatewayState {
    phase: Phase,
    attempts: u64,
}

/// MongoGateway
///
/// Owns the process-wide MongoDB client and hands out the members collection.
///
/// The first `collection()` call connects, pings the server and makes sure the
/// unique index on `user_id` exists. Callers arriving while that is in flight
/// await the same attempt and all see its result. A failed attempt leaves the
/// gateway idle so the next call starts over. An attempt overtaken by
/// `release()` is closed by the releaser and its waiters get `Unavailable`.
pub struct MongoGateway {
    settings: MongoSettings,
    state: Mutex<GatewayState>,
}

impl MongoGateway {
    pub fn new(settings: MongoSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(GatewayState {
                phase: Phase::Idle,
                attempts: 0,
            }),
        }
    }

    /// Returns the members collection, connecting first if needed.
    pub async fn collection(&self) -> Result<Collection<Member>, RepositoryError> {
        let (attempt, pending) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            match &state.phase {
                Phase::Ready { conn, .. } => return Ok(conn.members.clone()),
                Phase::Connecting { attempt, pending } => (*attempt, pending.clone()),
                Phase::Idle => {
                    state.attempts += 1;
                    let attempt = state.attempts;
                    let pending = connect(self.settings.clone()).boxed().shared();
                    state.phase = Phase::Connecting {
                        attempt,
                        pending: pending.clone(),
                    };
                    (attempt, pending)
                }
            }
        };

        let outcome = pending.await;

        let mut guard = self.state.lock();
        let state = &mut *guard;
        match &state.phase {
            // First waiter back moves the gateway on.
            Phase::Connecting { attempt: current, .. } if *current == attempt => {
                state.phase = match &outcome {
                    Ok(conn) => Phase::Ready {
                        attempt,
                        conn: conn.clone(),
                    },
                    Err(_) => Phase::Idle,
                };
            }
            Phase::Ready { attempt: current, .. } if *current == attempt => {}
            // release() ran while this attempt was in flight and owns its client.
            _ if outcome.is_ok() => {
                return Err(RepositoryError::Unavailable(
                    "MongoDB connection was released while connecting".to_string(),
                ));
            }
            _ => {}
        }

        outcome.map(|conn| conn.members)
    }

    /// Shuts the client down and forgets it. Safe to call when never connected.
    /// An attempt still in flight is awaited and its client closed as well.
    pub async fn release(&self) {
        let previous = std::mem::replace(&mut self.state.lock().phase, Phase::Idle);
        let conn = match previous {
            Phase::Ready { conn, .. } => conn,
            Phase::Connecting { pending, .. } => match pending.await {
                Ok(conn) => conn,
                Err(_) => return,
            },
            Phase::Idle => return,
        };
        conn.client.shutdown().await;
        tracing::info!("MongoDB connection closed");
    }

    /// Whether a live connection is currently cached.
    pub fn is_connected(&self) -> bool {
        matches!(self.state.lock().phase, Phase::Ready { .. })
    }

    /// Number of connection attempts started so far.
    pub fn connection_attempts(&self) -> u64 {
        self.state.lock().attempts
    }
}

async fn connect(settings: MongoSettings) -> Result<Connection, RepositoryError> {
    tracing::info!(database = %settings.database, "connecting to MongoDB");

    let mut options = ClientOptions::parse(&settings.uri)
        .await
        .map_err(unavailable)?;
    options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
    options.server_selection_timeout = Some(settings.server_selection_timeout);
    options.connect_timeout = Some(settings.connect_timeout);
    options.max_pool_size = Some(settings.max_pool_size);
    // Single-attempt semantics: failures go back to the caller untouched.
    options.retry_reads = Some(false);
    options.retry_writes = Some(false);

    let client = Client::with_options(options).map_err(unavailable)?;
    client
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await
        .map_err(unavailable)?;

    let members = client
        .database(&settings.database)
        .collection::<Member>(&settings.collection);
    ensure_user_id_index(&members).await?;

    tracing::info!(
        database = %settings.database,
        collection = %settings.collection,
        "connected to MongoDB"
    );
    Ok(Connection { client, members })
}

async fn ensure_user_id_index(members: &Collection<Member>) -> Result<(), RepositoryError> {
    let indexes: Vec<IndexModel> = match members.list_indexes().await {
        Ok(cursor) => cursor.try_collect().await.map_err(unavailable)?,
        Err(err) if command_code(&err) == Some(NAMESPACE_NOT_FOUND) => Vec::new(),
        Err(err) => return Err(unavailable(err)),
    };

    if indexes.iter().any(is_unique_user_id_index) {
        tracing::debug!("unique index on user_id already present");
        return Ok(());
    }

    let model = IndexModel::builder()
        .keys(doc! { "user_id": 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build();
    members.create_index(model).await.map_err(unavailable)?;
    tracing::info!("created unique index on user_id");
    Ok(())
}

fn is_unique_user_id_index(index: &IndexModel) -> bool {
    let ascending = match index.keys.get("user_id") {
        Some(Bson::Int32(1)) | Some(Bson::Int64(1)) => true,
        Some(Bson::Double(direction)) => *direction == 1.0,
        _ => false,
    };
    let unique = index
        .options
        .as_ref()
        .and_then(|options| options.unique)
        .unwrap_or(false);
    ascending && unique
}

fn command_code(err: &MongoError) -> Option<i32> {
    match err.kind.as_ref() {
        ErrorKind::Command(command) => Some(command.code),
        _ => None,
    }
}

fn unavailable(err: MongoError) -> RepositoryError {
    RepositoryError::Unavailable(err.to_string())
}
