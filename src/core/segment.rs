use super::error::{ReconcileError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type Dbid = i32;
pub type ContentId = i32;

/// Content id shared by the coordinator and its standby.
pub const COORDINATOR_CONTENT_ID: ContentId = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SegmentRole {
    Primary,
    Mirror,
}

impl SegmentRole {
    pub fn code(self) -> char {
        match self {
            Self::Primary => 'p',
            Self::Mirror => 'm',
        }
    }
}

impl FromStr for SegmentRole {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "p" => Ok(Self::Primary),
            "m" => Ok(Self::Mirror),
            other => Err(ReconcileError::InvalidSegment(format!(
                "Invalid role '{}'",
                other
            ))),
        }
    }
}

/// Replication state of a segment as recorded in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentMode {
    Synchronized,
    NotInSync,
    Resync,
    ChangeTracking,
}

impl SegmentMode {
    pub fn code(self) -> char {
        match self {
            Self::Synchronized => 's',
            Self::NotInSync => 'n',
            Self::Resync => 'r',
            Self::ChangeTracking => 'c',
        }
    }
}

impl FromStr for SegmentMode {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "s" => Ok(Self::Synchronized),
            "n" => Ok(Self::NotInSync),
            "r" => Ok(Self::Resync),
            "c" => Ok(Self::ChangeTracking),
            other => Err(ReconcileError::InvalidSegment(format!(
                "Invalid mode '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentStatus {
    Up,
    Down,
}

impl SegmentStatus {
    pub fn code(self) -> char {
        match self {
            Self::Up => 'u',
            Self::Down => 'd',
        }
    }
}

impl FromStr for SegmentStatus {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "u" => Ok(Self::Up),
            "d" => Ok(Self::Down),
            other => Err(ReconcileError::InvalidSegment(format!(
                "Invalid status '{}'",
                other
            ))),
        }
    }
}

/// A segment configuration row as it comes out of the catalog, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRow {
    pub dbid: i64,
    pub content: i64,
    pub role: String,
    pub preferred_role: String,
    pub mode: String,
    pub status: String,
    pub hostname: String,
    pub address: String,
    pub port: i64,
    pub datadir: String,
}

/// Configuration of a single database instance (coordinator, standby, primary or mirror).
///
/// Values are immutable once built; the `with_*` methods return modified copies.
/// Deserialization goes through [`Segment::from_row`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "SegmentRow", into = "SegmentRow")]
pub struct Segment {
    dbid: Dbid,
    content_id: ContentId,
    role: SegmentRole,
    preferred_role: SegmentRole,
    mode: SegmentMode,
    status: SegmentStatus,
    hostname: String,
    address: String,
    port: u16,
    data_directory: String,
}

impl Segment {
    /// Builds a segment from a catalog row, rejecting malformed fields up front.
    pub fn from_row(row: SegmentRow) -> Result<Self> {
        let dbid = Dbid::try_from(row.dbid)
            .ok()
            .filter(|dbid| *dbid >= 1)
            .ok_or_else(|| {
                ReconcileError::InvalidSegment(format!("Invalid dbid {}", row.dbid))
            })?;
        let content_id = ContentId::try_from(row.content)
            .ok()
            .filter(|content| *content >= COORDINATOR_CONTENT_ID)
            .ok_or_else(|| {
                ReconcileError::InvalidSegment(format!(
                    "Invalid content id {} for dbid {}",
                    row.content, dbid
                ))
            })?;
        let port = u16::try_from(row.port)
            .ok()
            .filter(|port| *port != 0)
            .ok_or_else(|| {
                ReconcileError::InvalidSegment(format!(
                    "Invalid port {} for dbid {}",
                    row.port, dbid
                ))
            })?;

        let hostname = text_field(dbid, "hostname", &row.hostname)?;
        if hostname.is_empty() {
            return Err(ReconcileError::InvalidSegment(format!(
                "hostname must not be empty for dbid {}",
                dbid
            )));
        }
        let data_directory = text_field(dbid, "data directory", &row.datadir)?;
        if data_directory.is_empty() {
            return Err(ReconcileError::InvalidSegment(format!(
                "data directory must not be empty for dbid {}",
                dbid
            )));
        }
        let address = match text_field(dbid, "address", &row.address)? {
            address if address.is_empty() => hostname.clone(),
            address => address,
        };

        Ok(Self {
            dbid,
            content_id,
            role: row.role.parse()?,
            preferred_role: row.preferred_role.parse()?,
            mode: row.mode.parse()?,
            status: row.status.parse()?,
            hostname,
            address,
            port,
            data_directory,
        })
    }

    /// Parses the pipe-delimited line format produced by [`Segment::to_line`]:
    /// `dbid|content|role|preferred_role|mode|status|hostname|address|port|datadir`.
    pub fn parse_line(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.trim().split('|').collect();
        if fields.len() != 10 {
            return Err(ReconcileError::InvalidSegment(format!(
                "Segment unknown input format: {}",
                line.trim()
            )));
        }

        let int_field = |name: &str, value: &str| -> Result<i64> {
            value.trim().parse::<i64>().map_err(|_| {
                ReconcileError::InvalidSegment(format!("Invalid {} '{}'", name, value.trim()))
            })
        };

        Self::from_row(SegmentRow {
            dbid: int_field("dbid", fields[0])?,
            content: int_field("content id", fields[1])?,
            role: fields[2].to_string(),
            preferred_role: fields[3].to_string(),
            mode: fields[4].to_string(),
            status: fields[5].to_string(),
            hostname: fields[6].to_string(),
            address: fields[7].to_string(),
            port: int_field("port", fields[8])?,
            datadir: fields[9].to_string(),
        })
    }

    pub fn to_line(&self) -> String {
        self.to_string()
    }

    pub fn dbid(&self) -> Dbid {
        self.dbid
    }

    pub fn content_id(&self) -> ContentId {
        self.content_id
    }

    /// Role the instance currently has; may differ from the preferred role after failover.
    pub fn role(&self) -> SegmentRole {
        self.role
    }

    pub fn preferred_role(&self) -> SegmentRole {
        self.preferred_role
    }

    pub fn mode(&self) -> SegmentMode {
        self.mode
    }

    pub fn status(&self) -> SegmentStatus {
        self.status
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Network address used to reach the segment (the NIC address).
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn data_directory(&self) -> &str {
        &self.data_directory
    }

    /// Parent of the data directory, i.e. the root the per-content directory lives in.
    pub fn data_directory_prefix(&self) -> &str {
        match self.data_directory.rfind('/') {
            Some(idx) => &self.data_directory[..idx],
            None => "",
        }
    }

    /// Coordinator or standby.
    pub fn is_query_dispatcher(&self) -> bool {
        self.content_id < 0
    }

    pub fn is_coordinator(&self) -> bool {
        self.is_query_dispatcher() && self.preferred_role == SegmentRole::Primary
    }

    pub fn is_standby(&self) -> bool {
        self.is_query_dispatcher() && self.preferred_role == SegmentRole::Mirror
    }

    /// Primary segment (not the coordinator). Uses the preferred role unless `current_role`.
    pub fn is_primary(&self, current_role: bool) -> bool {
        let role = if current_role { self.role } else { self.preferred_role };
        !self.is_query_dispatcher() && role == SegmentRole::Primary
    }

    /// Mirror segment (not the standby). Uses the preferred role unless `current_role`.
    pub fn is_mirror(&self, current_role: bool) -> bool {
        let role = if current_role { self.role } else { self.preferred_role };
        !self.is_query_dispatcher() && role == SegmentRole::Mirror
    }

    pub fn is_up(&self) -> bool {
        self.status == SegmentStatus::Up
    }

    pub fn is_synchronized(&self) -> bool {
        self.mode == SegmentMode::Synchronized
    }

    /// Current role has drifted from the preferred role, e.g. after a failover.
    pub fn is_unbalanced(&self) -> bool {
        self.role != self.preferred_role
    }

    /// True when the two records agree on every attribute except mode and status.
    ///
    /// Mode and status are the only attributes that can be patched in place;
    /// any other difference needs the segment removed and re-added.
    pub fn equal_ignoring_mode_and_status(&self, other: &Segment) -> bool {
        self.dbid == other.dbid
            && self.content_id == other.content_id
            && self.role == other.role
            && self.preferred_role == other.preferred_role
            && self.hostname == other.hostname
            && self.address == other.address
            && self.port == other.port
            && self.data_directory == other.data_directory
    }

    pub fn with_mode(&self, mode: SegmentMode) -> Self {
        Self {
            mode,
            ..self.clone()
        }
    }

    pub fn with_status(&self, status: SegmentStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    pub fn with_role(&self, role: SegmentRole) -> Self {
        Self {
            role,
            ..self.clone()
        }
    }

    /// Copy of this segment relocated to another host, port and data directory.
    pub fn with_location(
        &self,
        hostname: impl Into<String>,
        address: impl Into<String>,
        port: u16,
        data_directory: impl Into<String>,
    ) -> Result<Self> {
        Self::from_row(SegmentRow {
            hostname: hostname.into(),
            address: address.into(),
            port: port as i64,
            datadir: data_directory.into(),
            ..SegmentRow::from(self)
        })
    }
}

/// Trims a text field and rejects characters that would break the line format.
fn text_field(dbid: Dbid, name: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.contains(['|', '\n', '\r']) {
        return Err(ReconcileError::InvalidSegment(format!(
            "{} for dbid {} may not contain '|' or line breaks: {:?}",
            name, dbid, value
        )));
    }
    Ok(value.to_string())
}

impl TryFrom<SegmentRow> for Segment {
    type Error = ReconcileError;

    fn try_from(row: SegmentRow) -> Result<Self> {
        Self::from_row(row)
    }
}

impl From<&Segment> for SegmentRow {
    fn from(seg: &Segment) -> Self {
        Self {
            dbid: seg.dbid as i64,
            content: seg.content_id as i64,
            role: seg.role.code().to_string(),
            preferred_role: seg.preferred_role.code().to_string(),
            mode: seg.mode.code().to_string(),
            status: seg.status.code().to_string(),
            hostname: seg.hostname.clone(),
            address: seg.address.clone(),
            port: seg.port as i64,
            datadir: seg.data_directory.clone(),
        }
    }
}

impl From<Segment> for SegmentRow {
    fn from(seg: Segment) -> Self {
        Self::from(&seg)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.dbid,
            self.content_id,
            self.role.code(),
            self.preferred_role.code(),
            self.mode.code(),
            self.status.code(),
            self.hostname,
            self.address,
            self.port,
            self.data_directory
        )
    }
}
