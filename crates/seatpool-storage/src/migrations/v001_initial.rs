//! v1: organizations, licenses, members, reconcile_runs.
//!
//! No foreign keys between licenses and members: drift (dangling
//! references) has to be storable so the scanner can find and heal it.

pub const SCHEMA_V1: &str = "
    CREATE TABLE IF NOT EXISTS organizations (
        org_id TEXT PRIMARY KEY NOT NULL,
        tier TEXT NOT NULL,
        updated_at INTEGER NOT NULL DEFAULT (unixepoch())
    ) STRICT;

    CREATE TABLE IF NOT EXISTS licenses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        org_id TEXT NOT NULL,
        tier TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'active',
        assigned_member_id INTEGER,
        assigned_at INTEGER,
        release_history TEXT NOT NULL DEFAULT '[]',
        version INTEGER NOT NULL DEFAULT 1,
        created_at INTEGER NOT NULL DEFAULT (unixepoch())
    ) STRICT;

    CREATE TABLE IF NOT EXISTS members (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        org_id TEXT NOT NULL,
        email TEXT NOT NULL,
        role TEXT NOT NULL,
        assigned_license_id INTEGER,
        version INTEGER NOT NULL DEFAULT 1,
        created_at INTEGER NOT NULL DEFAULT (unixepoch())
    ) STRICT;

    CREATE TABLE IF NOT EXISTS reconcile_runs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        scan_id TEXT NOT NULL,
        org_id TEXT NOT NULL,
        incomplete INTEGER NOT NULL,
        anomalies_found INTEGER NOT NULL,
        anomalies_healed INTEGER NOT NULL,
        report TEXT NOT NULL,
        created_at INTEGER NOT NULL DEFAULT (unixepoch())
    ) STRICT;

    CREATE INDEX IF NOT EXISTS idx_licenses_org ON licenses(org_id, status);
    CREATE INDEX IF NOT EXISTS idx_licenses_member ON licenses(assigned_member_id);
    CREATE INDEX IF NOT EXISTS idx_members_org ON members(org_id);
    CREATE INDEX IF NOT EXISTS idx_reconcile_runs_org ON reconcile_runs(org_id);
";

/// Tables created by v1.
pub const TABLE_NAMES: [&str; 4] = ["organizations", "licenses", "members", "reconcile_runs"];
