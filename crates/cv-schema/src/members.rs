//! Repository over the cluster membership table.
//!
//! Every method borrows a [`Connection`] and runs inside whatever transaction
//! the caller has open, so membership writes can share a transaction with
//! schema updates.

use crate::error::{SchemaError, SchemaResult};
use chrono::{DateTime, SubsecRound, Utc};
use cv_core::{ExtensionSet, Role};
use duckdb::{Connection, ToSql};
use serde::{Deserialize, Serialize};

/// Name of the membership table.
pub const MEMBERS_TABLE: &str = "internal_cluster_members";

const MEMBER_COLUMNS: &str = "id, name, address, certificate, \"schema\", epoch_us(heartbeat), \
                              role, internal_api_extensions, external_api_extensions";

/// One row of the membership table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterMember {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub certificate: String,
    pub schema_version: u32,
    /// Comma-joined internal extensions; `None` for rows written before
    /// extensions were tracked.
    pub internal_api_extensions: Option<String>,
    pub external_api_extensions: Option<String>,
    pub heartbeat: DateTime<Utc>,
    pub role: Role,
}

impl ClusterMember {
    /// A member not yet stored (`id` 0), carrying `extensions` in storage form.
    ///
    /// The heartbeat is truncated to the microsecond precision the table
    /// keeps, so a stored member reads back equal.
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        certificate: impl Into<String>,
        schema_version: u32,
        extensions: &ExtensionSet,
        heartbeat: DateTime<Utc>,
        role: Role,
    ) -> Self {
        let (internal, external) = extensions.serialize_for_storage();
        Self {
            id: 0,
            name: name.into(),
            address: address.into(),
            certificate: certificate.into(),
            schema_version,
            internal_api_extensions: Some(internal),
            external_api_extensions: Some(external),
            heartbeat: heartbeat.trunc_subsecs(6),
            role,
        }
    }

    /// Parse the stored extension columns. NULL columns read as empty.
    pub fn extensions(&self) -> SchemaResult<ExtensionSet> {
        ExtensionSet::parse_from_storage(
            self.internal_api_extensions.as_deref().unwrap_or_default(),
            self.external_api_extensions.as_deref().unwrap_or_default(),
        )
        .map_err(|source| SchemaError::InvalidExtensions {
            address: self.address.clone(),
            source,
        })
    }

    /// API representation, with both extension columns merged into one list.
    pub fn to_api(&self) -> SchemaResult<ClusterMemberInfo> {
        Ok(ClusterMemberInfo {
            name: self.name.clone(),
            address: self.address.clone(),
            certificate: self.certificate.clone(),
            schema_version: self.schema_version,
            extensions: self.extensions()?.serialize_for_wire(),
            heartbeat: self.heartbeat,
            role: self.role.clone(),
        })
    }
}

/// Member as exposed to API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMemberInfo {
    pub name: String,
    pub address: String,
    pub certificate: String,
    pub schema_version: u32,
    pub extensions: Vec<String>,
    pub heartbeat: DateTime<Utc>,
    pub role: Role,
}

/// Optional equality filters for [`MemberStore::list`].
#[derive(Debug, Clone, Default)]
pub struct MemberFilter {
    pub address: Option<String>,
    pub name: Option<String>,
}

impl MemberFilter {
    pub fn by_address(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            name: None,
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            address: None,
            name: Some(name.into()),
        }
    }
}

/// The part of a member row compared across the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersioningInfo {
    pub schema_version: u32,
    pub extensions: ExtensionSet,
}

/// [`VersioningInfo`] of one member, keyed by its address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberVersioningInfo {
    pub address: String,
    pub info: VersioningInfo,
}

/// Membership table accessors over a borrowed connection.
pub struct MemberStore<'a> {
    conn: &'a Connection,
}

impl<'a> MemberStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Members matching `filter`, in insertion order.
    pub fn list(&self, filter: &MemberFilter) -> SchemaResult<Vec<ClusterMember>> {
        let mut clauses = Vec::new();
        let mut params: Vec<&dyn ToSql> = Vec::new();
        if let Some(address) = &filter.address {
            clauses.push("address = ?");
            params.push(address);
        }
        if let Some(name) = &filter.name {
            clauses.push("name = ?");
            params.push(name);
        }

        let mut sql = format!("SELECT {MEMBER_COLUMNS} FROM {MEMBERS_TABLE}");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(duckdb::params_from_iter(params), |row| {
                Ok(RawMember {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    address: row.get(2)?,
                    certificate: row.get(3)?,
                    schema: row.get(4)?,
                    heartbeat_us: row.get(5)?,
                    role: row.get(6)?,
                    internal_api_extensions: row.get(7)?,
                    external_api_extensions: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(RawMember::decode).collect()
    }

    /// The member stored under `address`.
    pub fn get(&self, address: &str) -> SchemaResult<ClusterMember> {
        self.list(&MemberFilter::by_address(address))?
            .into_iter()
            .next()
            .ok_or_else(|| SchemaError::NotFound {
                table: MEMBERS_TABLE,
                key: format!("address {address:?}"),
            })
    }

    pub fn exists(&self, address: &str) -> SchemaResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM internal_cluster_members WHERE address = ?",
            duckdb::params![address],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Insert `member`, returning the id assigned to it.
    pub fn create(&self, member: &ClusterMember) -> SchemaResult<i64> {
        let id = self.conn.query_row(
            "INSERT INTO internal_cluster_members
                 (name, address, certificate, \"schema\", heartbeat, role,
                  internal_api_extensions, external_api_extensions)
             VALUES (?, ?, ?, ?, make_timestamp(?), ?, ?, ?)
             RETURNING id",
            duckdb::params![
                member.name,
                member.address,
                member.certificate,
                i64::from(member.schema_version),
                member.heartbeat.timestamp_micros(),
                member.role.as_str(),
                member.internal_api_extensions,
                member.external_api_extensions,
            ],
            |row| row.get(0),
        )?;
        log::debug!("Created cluster member {} ({}) with id {id}", member.name, member.address);
        Ok(id)
    }

    /// Rewrite the mutable columns of the member with `member.id`.
    ///
    /// Name and address identify a member and are left as stored.
    pub fn update(&self, member: &ClusterMember) -> SchemaResult<()> {
        let affected = self.conn.execute(
            "UPDATE internal_cluster_members
             SET certificate = ?, \"schema\" = ?, heartbeat = make_timestamp(?), role = ?,
                 internal_api_extensions = ?, external_api_extensions = ?
             WHERE id = ?",
            duckdb::params![
                member.certificate,
                i64::from(member.schema_version),
                member.heartbeat.timestamp_micros(),
                member.role.as_str(),
                member.internal_api_extensions,
                member.external_api_extensions,
                member.id,
            ],
        )?;
        expect_one_row(affected, format!("id {}", member.id))
    }

    pub fn delete_by_address(&self, address: &str) -> SchemaResult<()> {
        let affected = self.conn.execute(
            "DELETE FROM internal_cluster_members WHERE address = ?",
            duckdb::params![address],
        )?;
        expect_one_row(affected, format!("address {address:?}"))
    }

    /// Write only the schema version of the member at `address`.
    ///
    /// Works on a table that predates the extension columns.
    pub fn update_schema_version(&self, address: &str, schema_version: u32) -> SchemaResult<()> {
        let affected = self.conn.execute(
            "UPDATE internal_cluster_members SET \"schema\" = ? WHERE address = ?",
            duckdb::params![i64::from(schema_version), address],
        )?;
        expect_one_row(affected, format!("address {address:?}"))
    }

    /// Record the schema version and extensions of the member at `address`.
    pub fn update_versioning_info(
        &self,
        address: &str,
        schema_version: u32,
        extensions: &ExtensionSet,
    ) -> SchemaResult<()> {
        let (internal, external) = extensions.serialize_for_storage();
        let affected = self.conn.execute(
            "UPDATE internal_cluster_members
             SET \"schema\" = ?, internal_api_extensions = ?, external_api_extensions = ?
             WHERE address = ?",
            duckdb::params![i64::from(schema_version), internal, external, address],
        )?;
        expect_one_row(affected, format!("address {address:?}"))
    }

    /// Versioning info of every member whose role is not pending.
    pub fn list_versioning_info(&self) -> SchemaResult<Vec<MemberVersioningInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT address, \"schema\", internal_api_extensions, external_api_extensions
             FROM internal_cluster_members
             WHERE role <> ?
             ORDER BY id",
        )?;
        let rows = stmt
            .query_map(duckdb::params![Role::PENDING], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(address, schema, internal, external)| {
                let extensions = ExtensionSet::parse_from_storage(
                    internal.as_deref().unwrap_or_default(),
                    external.as_deref().unwrap_or_default(),
                )
                .map_err(|source| SchemaError::InvalidExtensions {
                    address: address.clone(),
                    source,
                })?;
                Ok(MemberVersioningInfo {
                    info: VersioningInfo {
                        schema_version: decode_version(schema)?,
                        extensions,
                    },
                    address,
                })
            })
            .collect()
    }
}

struct RawMember {
    id: i64,
    name: String,
    address: String,
    certificate: String,
    schema: i64,
    heartbeat_us: i64,
    role: String,
    internal_api_extensions: Option<String>,
    external_api_extensions: Option<String>,
}

impl RawMember {
    fn decode(self) -> SchemaResult<ClusterMember> {
        let heartbeat = DateTime::from_timestamp_micros(self.heartbeat_us).ok_or_else(|| {
            SchemaError::Decode {
                table: MEMBERS_TABLE,
                column: "heartbeat",
                message: format!("{} microseconds is out of range", self.heartbeat_us),
            }
        })?;

        Ok(ClusterMember {
            id: self.id,
            name: self.name,
            address: self.address,
            certificate: self.certificate,
            schema_version: decode_version(self.schema)?,
            internal_api_extensions: self.internal_api_extensions,
            external_api_extensions: self.external_api_extensions,
            heartbeat,
            role: Role::new(self.role),
        })
    }
}

fn decode_version(schema: i64) -> SchemaResult<u32> {
    u32::try_from(schema).map_err(|e| SchemaError::Decode {
        table: MEMBERS_TABLE,
        column: "schema",
        message: e.to_string(),
    })
}

fn expect_one_row(affected: usize, key: String) -> SchemaResult<()> {
    if affected != 1 {
        return Err(SchemaError::RowCount {
            table: MEMBERS_TABLE,
            key,
            affected,
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "members_test.rs"]
mod tests;
