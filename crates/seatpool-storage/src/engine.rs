//! `SqliteSeatStore` — SQLite adapter implementing every seatpool store trait.
//!
//! Reads go through `with_reader()`, commits and admin writes through
//! `with_writer()`. No code outside this module touches a raw `&Connection`
//! for seatpool.db operations.

use std::path::Path;
use std::time::Duration;

use tracing::debug;

use seatpool_core::config::SeatPoolConfig;
use seatpool_core::errors::StoreResult;
use seatpool_core::models::{
    License, LicenseFilter, LicenseId, Member, MemberId, OrgId, ReconcileReport, Role, Tier,
};
use seatpool_core::traits::{
    ILicensePool, IMemberDirectory, IReconcileLog, ISeatAdmin, ISeatStore, ITierSource,
    PoolView, WriteBatch,
};

use crate::migrations;
use crate::pool::ConnectionPool;
use crate::queries::{batch_ops, license_ops, member_ops, org_ops, pool_ops, report_ops};

/// SQLite-backed store: single write connection + read pool, migrated on open.
pub struct SqliteSeatStore {
    pool: ConnectionPool,
}

impl SqliteSeatStore {
    /// Open a file-backed store. Runs migrations and applies pragmas.
    pub fn open(path: &Path, read_pool_size: usize, busy_timeout: Duration) -> StoreResult<Self> {
        let pool = ConnectionPool::open(path, read_pool_size, busy_timeout)?;
        pool.with_writer(|conn| migrations::migrate(conn).map(|_| ()))?;
        debug!(path = %path.display(), readers = pool.reader_count(), "Opened seatpool store");
        Ok(Self { pool })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let pool = ConnectionPool::open_in_memory(Duration::from_secs(5))?;
        pool.with_writer(|conn| migrations::migrate(conn).map(|_| ()))?;
        Ok(Self { pool })
    }

    /// Open per `[storage]`, with the engine's store timeout as busy timeout.
    pub fn from_config(config: &SeatPoolConfig) -> StoreResult<Self> {
        match &config.storage.db_path {
            Some(path) => Self::open(
                Path::new(path),
                config.storage.read_pool_size,
                config.engine.store_timeout(),
            ),
            None => {
                let pool = ConnectionPool::open_in_memory(config.engine.store_timeout())?;
                pool.with_writer(|conn| migrations::migrate(conn).map(|_| ()))?;
                Ok(Self { pool })
            }
        }
    }

    pub fn schema_version(&self) -> StoreResult<u32> {
        self.pool.with_reader(migrations::get_schema_version)
    }

    pub fn is_wal_mode(&self) -> bool {
        self.pool.is_wal_mode()
    }
}

impl ILicensePool for SqliteSeatStore {
    fn get_license(&self, org: &OrgId, id: LicenseId) -> StoreResult<Option<License>> {
        self.pool.with_reader(|conn| license_ops::get_license(conn, org, id))
    }

    fn list_licenses(&self, org: &OrgId, filter: LicenseFilter) -> StoreResult<Vec<License>> {
        self.pool
            .with_reader(|conn| license_ops::list_licenses(conn, org, filter))
    }
}

impl IMemberDirectory for SqliteSeatStore {
    fn get_member(&self, org: &OrgId, id: MemberId) -> StoreResult<Option<Member>> {
        self.pool.with_reader(|conn| member_ops::get_member(conn, org, id))
    }

    fn list_members(&self, org: &OrgId) -> StoreResult<Vec<Member>> {
        self.pool.with_reader(|conn| member_ops::list_members(conn, org))
    }
}

impl ISeatStore for SqliteSeatStore {
    fn commit(&self, batch: &WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.pool.with_writer(|conn| batch_ops::apply_batch(conn, batch))
    }

    fn read_pool(&self, org: &OrgId) -> StoreResult<PoolView> {
        self.pool.with_reader(|conn| pool_ops::read_pool(conn, org))
    }
}

impl ITierSource for SqliteSeatStore {
    fn tier_for(&self, org: &OrgId) -> StoreResult<Option<String>> {
        self.pool.with_reader(|conn| org_ops::get_tier(conn, org))
    }
}

impl ISeatAdmin for SqliteSeatStore {
    fn upsert_organization(&self, org: &OrgId, tier: Tier) -> StoreResult<()> {
        self.pool
            .with_writer(|conn| org_ops::upsert_organization(conn, org, tier))
    }

    fn issue_license(&self, org: &OrgId, tier: Tier) -> StoreResult<LicenseId> {
        self.pool
            .with_writer(|conn| license_ops::insert_license(conn, org, tier))
    }

    fn revoke_license(&self, org: &OrgId, id: LicenseId) -> StoreResult<()> {
        self.pool
            .with_writer(|conn| license_ops::revoke_license(conn, org, id))
    }

    fn create_member(&self, org: &OrgId, email: &str, role: Role) -> StoreResult<MemberId> {
        self.pool
            .with_writer(|conn| member_ops::insert_member(conn, org, email, &role))
    }

    fn force_put_license(&self, license: &License) -> StoreResult<()> {
        self.pool
            .with_writer(|conn| license_ops::force_put_license(conn, license))
    }

    fn force_put_member(&self, member: &Member) -> StoreResult<()> {
        self.pool
            .with_writer(|conn| member_ops::force_put_member(conn, member))
    }
}

impl IReconcileLog for SqliteSeatStore {
    fn record_report(&self, report: &ReconcileReport) -> StoreResult<()> {
        self.pool
            .with_writer(|conn| report_ops::insert_report(conn, report))
    }

    fn recent_reports(&self, org: &OrgId, limit: usize) -> StoreResult<Vec<ReconcileReport>> {
        self.pool
            .with_reader(|conn| report_ops::recent_reports(conn, org, limit))
    }
}
