use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Error;
use log::{error, info};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio::time;
use tokio_postgres::Client;

struct CommonPool<C> {
    /// pool name
    name: String,
    /// idle connections, handed out in a FIFO manner
    connections: Mutex<VecDeque<C>>,
    /// one permit per idle connection
    available: Arc<Semaphore>,
}

/// Fixed-size connection pool. Cloning shares the same connections.
pub struct Pool<C>(Arc<CommonPool<C>>);

impl<C> Clone for Pool<C> {
    fn clone(&self) -> Pool<C> {
        Pool(self.0.clone())
    }
}

/// A checked-out connection, returned to its pool on drop.
pub struct Connection<C> {
    /// `Some` for the whole life of the connection. `Drop` takes it to hand the
    /// client back, so it is never observed empty through `Deref`.
    client: Option<C>,
    pool: Pool<C>,
    _permit: OwnedSemaphorePermit,
}

impl<C> Deref for Connection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.client.as_ref().expect("client is present until drop")
    }
}

impl<C> DerefMut for Connection<C> {
    fn deref_mut(&mut self) -> &mut C {
        self.client.as_mut().expect("client is present until drop")
    }
}

impl<C> Drop for Connection<C> {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.pool.push(client);
        }
        // the permit is released after the client is back in the queue
    }
}

impl<C> Pool<C> {
    pub const DEFAULT_SIZE: usize = 10;

    /// create an empty pool
    pub fn new(name: &str) -> Self {
        Self(Arc::new(CommonPool {
            name: name.to_string(),
            connections: Mutex::new(VecDeque::with_capacity(Self::DEFAULT_SIZE)),
            available: Arc::new(Semaphore::new(0)),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    fn push(&self, client: C) {
        self.0
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(client);
    }

    /// Hand a new connection to the pool.
    pub fn add(&self, client: C) {
        self.push(client);
        self.0.available.add_permits(1);
    }

    pub fn idle(&self) -> usize {
        self.0.connections.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// acquire a connection, bail out if none frees up within `timeout`.
    pub async fn acquire(&self, timeout: Duration) -> Option<Connection<C>> {
        let sleep = time::sleep(timeout);
        tokio::pin!(sleep);
        tokio::select! {
            permit = self.0.available.clone().acquire_owned() => {
                let permit = permit.ok()?;
                let client = self.0.connections.lock().unwrap_or_else(PoisonError::into_inner).pop_front()?;
                Some(Connection { client: Some(client), pool: self.clone(), _permit: permit })
            },
            _ = &mut sleep => {
                error!("timed out acquiring a connection from pool={} after {:?}", self.0.name, timeout);
                None
            },
        }
    }
}

pub mod connect_util {
    use anyhow::Context;
    use log::error;
    use tokio_postgres::{Client, NoTls};

    pub async fn connect(conn_str: &str) -> Result<Client, anyhow::Error> {
        let (client, conn) = tokio_postgres::connect(conn_str, NoTls)
            .await
            .context("failed to create connection")?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                error!("connection returned error and aborted, {}", e);
            }
        });
        Ok(client)
    }
}

impl Pool<Client> {
    /// Open `size` connections concurrently. Fails if none could be opened.
    pub async fn connect(name: &str, conn_str: &str, size: usize) -> Result<Self, Error> {
        let pool = Self::new(name);
        let mut set = JoinSet::new();
        for _ in 0..size {
            let conn_str = conn_str.to_string();
            set.spawn(async move { connect_util::connect(&conn_str).await });
        }
        while let Some(res) = set.join_next().await {
            match res {
                Ok(Ok(client)) => {
                    info!("connection created for pool={}", name);
                    pool.add(client);
                }
                Ok(Err(e)) => error!("failed to connect for pool={}, {:#}", name, e),
                Err(e) => error!("join_next failed when joining, {}", e),
            };
        }
        if pool.idle() == 0 {
            anyhow::bail!("pool={} could not open any connection", name);
        }
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn empty_pool_times_out() {
        let pool = Pool::<u8>::new("test");
        assert!(pool.acquire(SHORT).await.is_none());
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let pool = Pool::<u8>::new("test");
        pool.add(7);
        {
            let conn = match pool.acquire(SHORT).await {
                Some(conn) => conn,
                None => panic!("should get some"),
            };
            assert_eq!(*conn, 7);
            assert!(pool.acquire(SHORT).await.is_none());
        } // conn drops here, and is released automatically

        assert!(pool.acquire(SHORT).await.is_some());
        assert!(pool.acquire(SHORT).await.is_some());
        assert_eq!(pool.idle(), 1);
    }

    #[tokio::test]
    async fn waiter_gets_released_connection() {
        let pool = Pool::<u8>::new("test");
        pool.add(1);
        let held = pool.acquire(SHORT).await.unwrap();
        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire(Duration::from_secs(5)).await.map(|c| *c) })
        };
        time::sleep(Duration::from_millis(20)).await;
        drop(held);
        assert_eq!(waiter.await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn fifo_order() {
        let pool = Pool::<u8>::new("test");
        pool.add(1);
        pool.add(2);
        let first = pool.acquire(SHORT).await.unwrap();
        assert_eq!(*first, 1);
        let second = pool.acquire(SHORT).await.unwrap();
        assert_eq!(*second, 2);
    }
}
