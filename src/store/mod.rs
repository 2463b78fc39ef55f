//! SQLite-backed document store for the three entity collections.
//!
//! `insert_*` reports a primary-key collision as [`StoreError::Duplicate`]
//! instead of failing hard: the uniqueness constraint is the arbitration
//! point that resolves concurrent cache hydrations without a process-wide
//! lock. Losers of the race discard their hydrated value and re-read.

use crate::errors::StoreError;
use crate::pools::Pool;
use crate::positions::Position;
use crate::tokens::Token;
use alloy_primitives::{Address, U256};
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, Row};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct Store {
    connection: Arc<Mutex<Connection>>,
}

/// Configure a connection for concurrent access
fn configure_connection(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.pragma_update(None, "journal_mode", "WAL")?;
    connection.pragma_update(None, "synchronous", "NORMAL")?;
    connection.pragma_update(None, "temp_store", "memory")?;
    connection.busy_timeout(std::time::Duration::from_millis(30_000))?;
    Ok(())
}

impl Store {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let connection = Connection::open(path)?;
        configure_connection(&connection)?;
        Self::bootstrap(&connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Private in-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory()?;
        Self::bootstrap(&connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn bootstrap(connection: &Connection) -> Result<(), StoreError> {
        connection.execute(
            "CREATE TABLE IF NOT EXISTS tokens (
                id TEXT PRIMARY KEY,
                chain_id TEXT NOT NULL,
                address TEXT NOT NULL,
                symbol TEXT NOT NULL,
                decimals INTEGER NOT NULL,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;

        connection.execute(
            "CREATE TABLE IF NOT EXISTS pools (
                id TEXT PRIMARY KEY,
                chain_id TEXT NOT NULL,
                address TEXT NOT NULL,
                token0_id TEXT NOT NULL,
                token1_id TEXT NOT NULL,
                fee INTEGER NOT NULL,
                tick_spacing INTEGER NOT NULL,
                sqrt_price_x96 TEXT NOT NULL,
                tick INTEGER NOT NULL,
                liquidity TEXT NOT NULL,
                last_price TEXT,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        connection.execute(
            "CREATE TABLE IF NOT EXISTS positions (
                id TEXT PRIMARY KEY,
                chain_id TEXT NOT NULL,
                manager TEXT NOT NULL,
                token_id INTEGER NOT NULL,
                owner TEXT NOT NULL,
                pool_id TEXT NOT NULL,
                tick_lower INTEGER NOT NULL,
                tick_upper INTEGER NOT NULL,
                liquidity TEXT NOT NULL,
                is_staked INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        connection.execute(
            "CREATE INDEX IF NOT EXISTS idx_pools_pair ON pools(token0_id, token1_id)",
            [],
        )?;
        connection.execute(
            "CREATE INDEX IF NOT EXISTS idx_positions_owner ON positions(owner)",
            [],
        )?;
        connection.execute(
            "CREATE INDEX IF NOT EXISTS idx_positions_pool ON positions(pool_id)",
            [],
        )?;

        Ok(())
    }

    // =========================================================================
    // TOKENS
    // =========================================================================

    pub fn insert_token(&self, token: &Token) -> Result<(), StoreError> {
        let connection = self.connection.lock().unwrap();
        connection
            .execute(
                "INSERT INTO tokens (id, chain_id, address, symbol, decimals, name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    token.id,
                    token.chain_id,
                    format!("{:#x}", token.address),
                    token.symbol,
                    token.decimals,
                    token.name,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| map_insert_error(&token.id, e))?;
        Ok(())
    }

    pub fn get_token(&self, id: &str) -> Result<Option<Token>, StoreError> {
        let connection = self.connection.lock().unwrap();
        let mut statement = connection.prepare(
            "SELECT id, chain_id, address, symbol, decimals, name FROM tokens WHERE id = ?1",
        )?;
        let mut rows = statement.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(token_from_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn count_tokens(&self) -> Result<usize, StoreError> {
        let connection = self.connection.lock().unwrap();
        let count: i64 =
            connection.query_row("SELECT COUNT(*) FROM tokens", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Explicit cache-clear; the only way token records leave the store.
    pub fn clear_tokens(&self) -> Result<(), StoreError> {
        let connection = self.connection.lock().unwrap();
        connection.execute("DELETE FROM tokens", [])?;
        Ok(())
    }

    #[cfg(test)]
    pub fn delete_token(&self, id: &str) -> Result<(), StoreError> {
        let connection = self.connection.lock().unwrap();
        connection.execute("DELETE FROM tokens WHERE id = ?1", params![id])?;
        Ok(())
    }

    // =========================================================================
    // POOLS
    // =========================================================================

    pub fn insert_pool(&self, pool: &Pool) -> Result<(), StoreError> {
        let connection = self.connection.lock().unwrap();
        connection
            .execute(
                "INSERT INTO pools (id, chain_id, address, token0_id, token1_id, fee,
                    tick_spacing, sqrt_price_x96, tick, liquidity, last_price, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    pool.id,
                    pool.chain_id,
                    format!("{:#x}", pool.address),
                    pool.token0_id,
                    pool.token1_id,
                    pool.fee,
                    pool.tick_spacing,
                    pool.sqrt_price_x96.to_string(),
                    pool.tick,
                    pool.liquidity.to_string(),
                    pool.last_price.map(|p| p.to_string()),
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| map_insert_error(&pool.id, e))?;
        Ok(())
    }

    pub fn get_pool(&self, id: &str) -> Result<Option<Pool>, StoreError> {
        let connection = self.connection.lock().unwrap();
        let mut statement = connection.prepare(
            "SELECT id, chain_id, address, token0_id, token1_id, fee, tick_spacing,
                    sqrt_price_x96, tick, liquidity, last_price
             FROM pools WHERE id = ?1",
        )?;
        let mut rows = statement.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(pool_from_row(row)?)),
            None => Ok(None),
        }
    }

    #[cfg(test)]
    pub fn delete_pool(&self, id: &str) -> Result<(), StoreError> {
        let connection = self.connection.lock().unwrap();
        connection.execute("DELETE FROM pools WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Market-state update applied on every observed swap.
    pub fn update_pool_market(
        &self,
        id: &str,
        sqrt_price_x96: U256,
        tick: i32,
        liquidity: Option<u128>,
        last_price: Option<Decimal>,
    ) -> Result<(), StoreError> {
        let connection = self.connection.lock().unwrap();
        match liquidity {
            Some(liquidity) => {
                connection.execute(
                    "UPDATE pools SET sqrt_price_x96 = ?2, tick = ?3, liquidity = ?4,
                        last_price = ?5, updated_at = ?6 WHERE id = ?1",
                    params![
                        id,
                        sqrt_price_x96.to_string(),
                        tick,
                        liquidity.to_string(),
                        last_price.map(|p| p.to_string()),
                        Utc::now().to_rfc3339(),
                    ],
                )?;
            }
            None => {
                connection.execute(
                    "UPDATE pools SET sqrt_price_x96 = ?2, tick = ?3, last_price = ?4,
                        updated_at = ?5 WHERE id = ?1",
                    params![
                        id,
                        sqrt_price_x96.to_string(),
                        tick,
                        last_price.map(|p| p.to_string()),
                        Utc::now().to_rfc3339(),
                    ],
                )?;
            }
        }
        Ok(())
    }

    pub fn get_pools_for_pair(
        &self,
        token0_id: &str,
        token1_id: &str,
    ) -> Result<Vec<Pool>, StoreError> {
        let connection = self.connection.lock().unwrap();
        let mut statement = connection.prepare(
            "SELECT id, chain_id, address, token0_id, token1_id, fee, tick_spacing,
                    sqrt_price_x96, tick, liquidity, last_price
             FROM pools WHERE token0_id = ?1 AND token1_id = ?2 ORDER BY fee",
        )?;
        let mut rows = statement.query(params![token0_id, token1_id])?;
        let mut pools = Vec::new();
        while let Some(row) = rows.next()? {
            pools.push(pool_from_row(row)?);
        }
        Ok(pools)
    }

    pub fn count_pools(&self) -> Result<usize, StoreError> {
        let connection = self.connection.lock().unwrap();
        let count: i64 =
            connection.query_row("SELECT COUNT(*) FROM pools", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // =========================================================================
    // POSITIONS
    // =========================================================================

    pub fn insert_position(&self, position: &Position) -> Result<(), StoreError> {
        let connection = self.connection.lock().unwrap();
        connection
            .execute(
                "INSERT INTO positions (id, chain_id, manager, token_id, owner, pool_id,
                    tick_lower, tick_upper, liquidity, is_staked, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    position.id,
                    position.chain_id,
                    format!("{:#x}", position.manager),
                    position.token_id,
                    format!("{:#x}", position.owner),
                    position.pool_id,
                    position.tick_lower,
                    position.tick_upper,
                    position.liquidity.to_string(),
                    position.is_staked,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| map_insert_error(&position.id, e))?;
        Ok(())
    }

    pub fn get_position(&self, id: &str) -> Result<Option<Position>, StoreError> {
        let connection = self.connection.lock().unwrap();
        let mut statement = connection.prepare(
            "SELECT id, chain_id, manager, token_id, owner, pool_id, tick_lower,
                    tick_upper, liquidity, is_staked
             FROM positions WHERE id = ?1",
        )?;
        let mut rows = statement.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(position_from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Refresh the mutable fields (liquidity, staking flag, boundary
    /// correction for a stale earlier read).
    pub fn update_position(&self, position: &Position) -> Result<(), StoreError> {
        let connection = self.connection.lock().unwrap();
        connection.execute(
            "UPDATE positions SET owner = ?2, pool_id = ?3, tick_lower = ?4,
                tick_upper = ?5, liquidity = ?6, is_staked = ?7, updated_at = ?8
             WHERE id = ?1",
            params![
                position.id,
                format!("{:#x}", position.owner),
                position.pool_id,
                position.tick_lower,
                position.tick_upper,
                position.liquidity.to_string(),
                position.is_staked,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_positions_by_owner(
        &self,
        chain_id: &str,
        owner: Address,
    ) -> Result<Vec<Position>, StoreError> {
        let connection = self.connection.lock().unwrap();
        let mut statement = connection.prepare(
            "SELECT id, chain_id, manager, token_id, owner, pool_id, tick_lower,
                    tick_upper, liquidity, is_staked
             FROM positions WHERE chain_id = ?1 AND owner = ?2 ORDER BY token_id",
        )?;
        let mut rows = statement.query(params![chain_id, format!("{:#x}", owner)])?;
        let mut positions = Vec::new();
        while let Some(row) = rows.next()? {
            positions.push(position_from_row(row)?);
        }
        Ok(positions)
    }

    pub fn get_positions_by_pool(&self, pool_id: &str) -> Result<Vec<Position>, StoreError> {
        let connection = self.connection.lock().unwrap();
        let mut statement = connection.prepare(
            "SELECT id, chain_id, manager, token_id, owner, pool_id, tick_lower,
                    tick_upper, liquidity, is_staked
             FROM positions WHERE pool_id = ?1 ORDER BY token_id",
        )?;
        let mut rows = statement.query(params![pool_id])?;
        let mut positions = Vec::new();
        while let Some(row) = rows.next()? {
            positions.push(position_from_row(row)?);
        }
        Ok(positions)
    }

    pub fn count_positions(&self) -> Result<usize, StoreError> {
        let connection = self.connection.lock().unwrap();
        let count: i64 =
            connection.query_row("SELECT COUNT(*) FROM positions", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn map_insert_error(id: &str, error: rusqlite::Error) -> StoreError {
    match &error {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            StoreError::Duplicate(id.to_string())
        }
        _ => StoreError::Sqlite(error),
    }
}

fn parse_address(id: &str, raw: String) -> Result<Address, StoreError> {
    Address::from_str(&raw).map_err(|_| StoreError::Corrupt {
        id: id.to_string(),
        reason: format!("bad address column: {}", raw),
    })
}

fn token_from_row(row: &Row<'_>) -> Result<Token, StoreError> {
    let id: String = row.get(0)?;
    let address: String = row.get(2)?;
    Ok(Token {
        address: parse_address(&id, address)?,
        id,
        chain_id: row.get(1)?,
        symbol: row.get(3)?,
        decimals: row.get(4)?,
        name: row.get(5)?,
    })
}

fn pool_from_row(row: &Row<'_>) -> Result<Pool, StoreError> {
    let id: String = row.get(0)?;
    let address: String = row.get(2)?;
    let sqrt_price: String = row.get(7)?;
    let liquidity: String = row.get(9)?;
    let last_price: Option<String> = row.get(10)?;

    let sqrt_price_x96 =
        U256::from_str_radix(&sqrt_price, 10).map_err(|_| StoreError::Corrupt {
            id: id.clone(),
            reason: format!("bad sqrt_price_x96 column: {}", sqrt_price),
        })?;
    let liquidity = liquidity.parse::<u128>().map_err(|_| StoreError::Corrupt {
        id: id.clone(),
        reason: format!("bad liquidity column: {}", liquidity),
    })?;
    let last_price = match last_price {
        Some(raw) => Some(Decimal::from_str(&raw).map_err(|_| StoreError::Corrupt {
            id: id.clone(),
            reason: format!("bad last_price column: {}", raw),
        })?),
        None => None,
    };

    Ok(Pool {
        address: parse_address(&id, address)?,
        id,
        chain_id: row.get(1)?,
        token0_id: row.get(3)?,
        token1_id: row.get(4)?,
        fee: row.get(5)?,
        tick_spacing: row.get(6)?,
        sqrt_price_x96,
        tick: row.get(8)?,
        liquidity,
        last_price,
    })
}

fn position_from_row(row: &Row<'_>) -> Result<Position, StoreError> {
    let id: String = row.get(0)?;
    let manager: String = row.get(2)?;
    let owner: String = row.get(4)?;
    let liquidity: String = row.get(8)?;

    let liquidity = liquidity.parse::<u128>().map_err(|_| StoreError::Corrupt {
        id: id.clone(),
        reason: format!("bad liquidity column: {}", liquidity),
    })?;

    Ok(Position {
        manager: parse_address(&id, manager)?,
        owner: parse_address(&id, owner)?,
        id,
        chain_id: row.get(1)?,
        token_id: row.get(3)?,
        pool_id: row.get(5)?,
        tick_lower: row.get(6)?,
        tick_upper: row.get(7)?,
        liquidity,
        is_staked: row.get(9)?,
    })
}
