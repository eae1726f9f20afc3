//! The database client: connection pool, per-entity repositories,
//! transactions and raw escape hatches.
//!
//! A [`Client`] owns a SQLite pool and a shared [`EventSink`]. Entity
//! accessors hand out lightweight [`Repository`] handles; each operation
//! checks a connection out of the pool for its duration. Interactive
//! transactions and [`Client::batch`] run their whole body on a single
//! dedicated connection.

use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, pool::PoolConnection};
use tracing::info;

use crate::config::{ClientOptions, IsolationLevel, TransactionOptions};
use crate::entities::{
    Account, Article, Attachment, Entreprise, EntrepriseObjet, Objet, Secteur, Session, Task,
    User, UserPermission, VerificationToken,
};
use crate::error::{DataError, ErrorCode, Result};
use crate::events::{EventSink, LogEvent, QueryEvent};
use crate::orm::ops::{
    self, AggregateArgs, AggregateResult, CountResult, FindManyArgs, GroupByArgs, GroupByRow,
};
use crate::orm::traits::{DatabaseEntity, SqlValue};
use crate::orm::{Conn, codec};
use crate::schema;

/// One queued operation for [`Client::batch`]. The closure receives the
/// transaction's execution handle and resolves to a JSON value so
/// heterogeneous operations can share a result vector.
pub type BatchOp =
    Box<dyn for<'a, 'c> FnOnce(&'a mut Conn<'c>) -> BoxFuture<'a, Result<Value>> + Send>;

/// Handle to a GMAO database.
#[derive(Clone)]
pub struct Client {
    pool: SqlitePool,
    options: ClientOptions,
    sink: Arc<EventSink>,
}

impl Client {
    /// Open the pool, enforce foreign keys, and sync the schema.
    ///
    /// In-memory URLs are forced to a single connection: every new
    /// `:memory:` connection would otherwise be a fresh empty database.
    pub async fn connect(options: ClientOptions) -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str(&options.datasource_url)
            .map_err(|e| {
                DataError::Initialization(format!(
                    "invalid datasource url {:?}: {e}",
                    options.datasource_url
                ))
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = options.datasource_url.contains(":memory:")
            || options.datasource_url.contains("mode=memory");
        let max_connections = if in_memory { 1 } else { options.max_connections };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(options.transaction_options.max_wait)
            .connect_with(connect_options)
            .await
            .map_err(|e| {
                DataError::Initialization(format!(
                    "failed to open {:?}: {e}",
                    options.datasource_url
                ))
            })?;

        let sync = schema::sync_all(&pool)
            .await
            .map_err(|e| DataError::Initialization(format!("schema sync failed: {e}")))?;
        if !sync.errors.is_empty() {
            return Err(DataError::Initialization(format!(
                "schema sync failed: {}",
                sync.errors.join("; ")
            )));
        }

        info!(url = %options.datasource_url, max_connections, "database client connected");
        let sink = Arc::new(EventSink::from_options(&options));
        Ok(Self {
            pool,
            options,
            sink,
        })
    }

    /// Shorthand for `connect(ClientOptions::from_env()?)`.
    pub async fn connect_from_env() -> Result<Self> {
        Self::connect(ClientOptions::from_env()?).await
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Close the pool; in-flight operations finish first.
    pub async fn disconnect(&self) {
        self.pool.close().await;
    }

    /// Cheap liveness probe.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(DataError::from_sqlx)?;
        Ok(())
    }

    /// Register a callback for executed statements. Only fires when the
    /// client was configured with a `Query`/`Event` log definition.
    pub fn on_query(&self, listener: impl Fn(&QueryEvent) + Send + Sync + 'static) {
        self.sink.on_query(listener);
    }

    pub fn on_log(&self, listener: impl Fn(&LogEvent) + Send + Sync + 'static) {
        self.sink.on_log(listener);
    }

    async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        self.pool.acquire().await.map_err(DataError::from_sqlx)
    }

    // Entity accessors.

    pub fn users(&self) -> Repository<'_, User> {
        Repository::new(self)
    }

    pub fn entreprises(&self) -> Repository<'_, Entreprise> {
        Repository::new(self)
    }

    pub fn entreprise_objets(&self) -> Repository<'_, EntrepriseObjet> {
        Repository::new(self)
    }

    pub fn user_permissions(&self) -> Repository<'_, UserPermission> {
        Repository::new(self)
    }

    pub fn objets(&self) -> Repository<'_, Objet> {
        Repository::new(self)
    }

    pub fn secteurs(&self) -> Repository<'_, Secteur> {
        Repository::new(self)
    }

    pub fn articles(&self) -> Repository<'_, Article> {
        Repository::new(self)
    }

    pub fn tasks(&self) -> Repository<'_, Task> {
        Repository::new(self)
    }

    pub fn attachments(&self) -> Repository<'_, Attachment> {
        Repository::new(self)
    }

    pub fn accounts(&self) -> Repository<'_, Account> {
        Repository::new(self)
    }

    pub fn sessions(&self) -> Repository<'_, Session> {
        Repository::new(self)
    }

    pub fn verification_tokens(&self) -> Repository<'_, VerificationToken> {
        Repository::new(self)
    }

    // Raw escape hatches.

    /// Run a parameterized SELECT and decode each row to JSON.
    pub async fn query_raw(&self, sql: &str, params: Vec<SqlValue>) -> Result<Vec<Value>> {
        let mut conn = self.acquire().await?;
        let mut cx = Conn::with_sink(&mut conn, &self.sink);
        let rows = cx.fetch_all_rows(sql, &params, "raw").await?;
        rows.iter()
            .map(|row| codec::row_to_json(row).map_err(DataError::from_sqlx))
            .collect()
    }

    /// Run a parameterized statement and return the affected-row count.
    pub async fn execute_raw(&self, sql: &str, params: Vec<SqlValue>) -> Result<u64> {
        let mut conn = self.acquire().await?;
        let mut cx = Conn::with_sink(&mut conn, &self.sink);
        Ok(cx.execute(sql, &params, "raw").await?.rows_affected())
    }

    /// [`query_raw`](Self::query_raw) without parameters, for SQL assembled
    /// by the caller. The caller is responsible for escaping.
    pub async fn query_raw_unsafe(&self, sql: &str) -> Result<Vec<Value>> {
        self.query_raw(sql, Vec::new()).await
    }

    /// [`execute_raw`](Self::execute_raw) without parameters.
    pub async fn execute_raw_unsafe(&self, sql: &str) -> Result<u64> {
        self.execute_raw(sql, Vec::new()).await
    }

    // Transactions.

    /// Run the queued operations sequentially inside one transaction.
    /// All succeed and commit together, or the first failure rolls
    /// everything back.
    pub async fn batch(&self, operations: Vec<BatchOp>) -> Result<Vec<Value>> {
        let options = self.options.transaction_options.clone();
        self.transaction_with_options(&options, move |cx| {
            Box::pin(async move {
                let mut results = Vec::with_capacity(operations.len());
                for op in operations {
                    results.push(op(&mut cx.reborrow()).await?);
                }
                Ok(results)
            })
        })
        .await
    }

    /// Run `f` inside an interactive transaction with the client's default
    /// [`TransactionOptions`]. The closure must box its future:
    ///
    /// ```ignore
    /// let user = client
    ///     .transaction(|cx| {
    ///         Box::pin(async move {
    ///             let user = ops::create::<User>(cx, &input, None).await?;
    ///             ops::create::<Session>(cx, &session_for(&user), None).await?;
    ///             Ok(user)
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub async fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        T: Send,
        F: for<'a, 'c> FnOnce(&'a mut Conn<'c>) -> BoxFuture<'a, Result<T>> + Send,
    {
        let options = self.options.transaction_options.clone();
        self.transaction_with_options(&options, f).await
    }

    /// Like [`transaction`](Self::transaction) with per-call timeouts and
    /// isolation level.
    pub async fn transaction_with_options<T, F>(
        &self,
        options: &TransactionOptions,
        f: F,
    ) -> Result<T>
    where
        T: Send,
        F: for<'a, 'c> FnOnce(&'a mut Conn<'c>) -> BoxFuture<'a, Result<T>> + Send,
    {
        let mut tx = tokio::time::timeout(options.max_wait, self.pool.begin())
            .await
            .map_err(|_| timeout_error(ErrorCode::PoolTimeout, options.max_wait))?
            .map_err(DataError::from_sqlx)?;

        if options.isolation_level == IsolationLevel::ReadUncommitted {
            sqlx::query("PRAGMA read_uncommitted = 1")
                .execute(&mut *tx)
                .await
                .map_err(DataError::from_sqlx)?;
        }

        let outcome = {
            let mut cx = Conn::with_sink(&mut tx, &self.sink);
            tokio::time::timeout(options.timeout, f(&mut cx)).await
        };
        match outcome {
            Ok(Ok(value)) => {
                tx.commit().await.map_err(DataError::from_sqlx)?;
                Ok(value)
            }
            Ok(Err(err)) => {
                let _ = tx.rollback().await;
                Err(err)
            }
            Err(_) => {
                let _ = tx.rollback().await;
                Err(timeout_error(ErrorCode::TransactionTimeout, options.timeout))
            }
        }
    }
}

fn timeout_error(code: ErrorCode, limit: Duration) -> DataError {
    DataError::Known {
        code,
        message: format!("exceeded the configured limit of {limit:?}"),
    }
}

/// Pool-backed operation handle for one entity. Cheap to create; every
/// call checks out its own connection.
pub struct Repository<'a, E: DatabaseEntity> {
    client: &'a Client,
    _entity: PhantomData<E>,
}

impl<'a, E: DatabaseEntity> Repository<'a, E> {
    fn new(client: &'a Client) -> Self {
        Self {
            client,
            _entity: PhantomData,
        }
    }

    async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        self.client.acquire().await
    }

    pub async fn find_unique(
        &self,
        unique: &E::WhereUnique,
        include: Option<&E::Include>,
    ) -> Result<Option<E>> {
        let mut conn = self.acquire().await?;
        let mut cx = Conn::with_sink(&mut conn, &self.client.sink);
        ops::find_unique(&mut cx, unique, include).await
    }

    pub async fn find_unique_or_throw(
        &self,
        unique: &E::WhereUnique,
        include: Option<&E::Include>,
    ) -> Result<E> {
        let mut conn = self.acquire().await?;
        let mut cx = Conn::with_sink(&mut conn, &self.client.sink);
        ops::find_unique_or_throw(&mut cx, unique, include).await
    }

    pub async fn find_first(&self, args: FindManyArgs<E>) -> Result<Option<E>> {
        let mut conn = self.acquire().await?;
        let mut cx = Conn::with_sink(&mut conn, &self.client.sink);
        ops::find_first(&mut cx, args).await
    }

    pub async fn find_first_or_throw(&self, args: FindManyArgs<E>) -> Result<E> {
        let mut conn = self.acquire().await?;
        let mut cx = Conn::with_sink(&mut conn, &self.client.sink);
        ops::find_first_or_throw(&mut cx, args).await
    }

    pub async fn find_many(&self, args: FindManyArgs<E>) -> Result<Vec<E>> {
        let mut conn = self.acquire().await?;
        let mut cx = Conn::with_sink(&mut conn, &self.client.sink);
        ops::find_many(&mut cx, args).await
    }

    /// `find_many` plus scalar projection: per-call `select`/`omit` and the
    /// client-level default omit for this table, applied to the JSON shape.
    pub async fn find_many_projected(&self, args: FindManyArgs<E>) -> Result<Vec<Value>> {
        let global_omit = self
            .client
            .options
            .omit
            .get(E::TABLE_NAME)
            .cloned()
            .unwrap_or_default();
        let mut conn = self.acquire().await?;
        let mut cx = Conn::with_sink(&mut conn, &self.client.sink);
        ops::find_many_projected(&mut cx, args, &global_omit).await
    }

    pub async fn create(&self, data: &E::Create, include: Option<&E::Include>) -> Result<E> {
        let mut conn = self.acquire().await?;
        let mut cx = Conn::with_sink(&mut conn, &self.client.sink);
        ops::create(&mut cx, data, include).await
    }

    /// Chunked multi-row insert; returns the number of rows written.
    pub async fn create_many(&self, data: &[E::Create], skip_duplicates: bool) -> Result<u64> {
        let mut conn = self.acquire().await?;
        let mut cx = Conn::with_sink(&mut conn, &self.client.sink);
        ops::create_many::<E>(&mut cx, data, skip_duplicates).await
    }

    pub async fn create_many_and_return(
        &self,
        data: &[E::Create],
        skip_duplicates: bool,
    ) -> Result<Vec<E>> {
        let mut conn = self.acquire().await?;
        let mut cx = Conn::with_sink(&mut conn, &self.client.sink);
        ops::create_many_and_return::<E>(&mut cx, data, skip_duplicates).await
    }

    pub async fn update(
        &self,
        unique: &E::WhereUnique,
        data: &E::Update,
        include: Option<&E::Include>,
    ) -> Result<E> {
        let mut conn = self.acquire().await?;
        let mut cx = Conn::with_sink(&mut conn, &self.client.sink);
        ops::update(&mut cx, unique, data, include).await
    }

    pub async fn update_many(
        &self,
        filter: &E::Where,
        data: &E::Update,
        limit: Option<i64>,
    ) -> Result<u64> {
        let mut conn = self.acquire().await?;
        let mut cx = Conn::with_sink(&mut conn, &self.client.sink);
        ops::update_many::<E>(&mut cx, filter, data, limit).await
    }

    pub async fn update_many_and_return(
        &self,
        filter: &E::Where,
        data: &E::Update,
        limit: Option<i64>,
    ) -> Result<Vec<E>> {
        let mut conn = self.acquire().await?;
        let mut cx = Conn::with_sink(&mut conn, &self.client.sink);
        ops::update_many_and_return::<E>(&mut cx, filter, data, limit).await
    }

    pub async fn upsert(
        &self,
        unique: &E::WhereUnique,
        create: &E::Create,
        update: &E::Update,
        include: Option<&E::Include>,
    ) -> Result<E> {
        let mut conn = self.acquire().await?;
        let mut cx = Conn::with_sink(&mut conn, &self.client.sink);
        ops::upsert(&mut cx, unique, create, update, include).await
    }

    pub async fn delete(&self, unique: &E::WhereUnique, include: Option<&E::Include>) -> Result<E> {
        let mut conn = self.acquire().await?;
        let mut cx = Conn::with_sink(&mut conn, &self.client.sink);
        ops::delete(&mut cx, unique, include).await
    }

    pub async fn delete_many(&self, filter: &E::Where, limit: Option<i64>) -> Result<u64> {
        let mut conn = self.acquire().await?;
        let mut cx = Conn::with_sink(&mut conn, &self.client.sink);
        ops::delete_many::<E>(&mut cx, filter, limit).await
    }

    pub async fn count(&self, filter: Option<&E::Where>) -> Result<i64> {
        let mut conn = self.acquire().await?;
        let mut cx = Conn::with_sink(&mut conn, &self.client.sink);
        ops::count::<E>(&mut cx, filter).await
    }

    /// Per-field non-null counts alongside the total.
    pub async fn count_select(
        &self,
        filter: Option<&E::Where>,
        fields: &[E::Field],
    ) -> Result<CountResult> {
        let mut conn = self.acquire().await?;
        let mut cx = Conn::with_sink(&mut conn, &self.client.sink);
        ops::count_select::<E>(&mut cx, filter, fields).await
    }

    pub async fn aggregate(&self, args: AggregateArgs<E>) -> Result<AggregateResult> {
        let mut conn = self.acquire().await?;
        let mut cx = Conn::with_sink(&mut conn, &self.client.sink);
        ops::aggregate(&mut cx, args).await
    }

    pub async fn group_by(&self, args: GroupByArgs<E>) -> Result<Vec<GroupByRow>> {
        let mut conn = self.acquire().await?;
        let mut cx = Conn::with_sink(&mut conn, &self.client.sink);
        ops::group_by(&mut cx, args).await
    }
}
