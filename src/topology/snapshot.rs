use crate::core::{
    ContentId, Dbid, ReconcileError, Result, Segment, SegmentMode, SegmentStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// (primary status, primary mode, mirror status, mirror mode) combinations a
/// primary/mirror pair may legitimately be in. Roles here are current roles.
const VALID_PAIR_STATES: [(SegmentStatus, SegmentMode, SegmentStatus, SegmentMode); 3] = [
    (
        SegmentStatus::Up,
        SegmentMode::Synchronized,
        SegmentStatus::Up,
        SegmentMode::Synchronized,
    ),
    (
        SegmentStatus::Up,
        SegmentMode::NotInSync,
        SegmentStatus::Up,
        SegmentMode::NotInSync,
    ),
    (
        SegmentStatus::Up,
        SegmentMode::NotInSync,
        SegmentStatus::Down,
        SegmentMode::NotInSync,
    ),
];

/// Immutable view of a cluster's segment configuration, keyed by dbid.
///
/// Two snapshots take part in every reconciliation: the one loaded from the
/// catalog and the goal built by the caller. Iteration is ordered by dbid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Segment>", into = "Vec<Segment>")]
pub struct TopologySnapshot {
    segments: BTreeMap<Dbid, Segment>,
}

impl TryFrom<Vec<Segment>> for TopologySnapshot {
    type Error = ReconcileError;

    fn try_from(segments: Vec<Segment>) -> Result<Self> {
        Self::from_segments(segments)
    }
}

impl From<TopologySnapshot> for Vec<Segment> {
    fn from(snapshot: TopologySnapshot) -> Self {
        snapshot.segments.into_values().collect()
    }
}

impl TopologySnapshot {
    /// Builds a snapshot, rejecting duplicate dbids.
    pub fn from_segments(segments: impl IntoIterator<Item = Segment>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for segment in segments {
            let dbid = segment.dbid();
            if map.insert(dbid, segment).is_some() {
                return Err(ReconcileError::InvalidTopology(format!(
                    "dbid {} appears more than once",
                    dbid
                )));
            }
        }
        Ok(Self { segments: map })
    }

    pub fn get(&self, dbid: Dbid) -> Option<&Segment> {
        self.segments.get(&dbid)
    }

    pub fn contains(&self, dbid: Dbid) -> bool {
        self.segments.contains_key(&dbid)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }

    pub fn dbids(&self) -> impl Iterator<Item = Dbid> + '_ {
        self.segments.keys().copied()
    }

    /// New snapshot with `segment` inserted, replacing any record with the same dbid.
    pub fn with_segment(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.insert(segment.dbid(), segment);
        Self { segments }
    }

    /// New snapshot without `dbid`.
    pub fn without(&self, dbid: Dbid) -> Self {
        let mut segments = self.segments.clone();
        segments.remove(&dbid);
        Self { segments }
    }

    /// Checks there is exactly one coordinator and at most one standby.
    pub fn check_dispatchers(&self) -> Result<()> {
        let coordinators: Vec<Dbid> = self
            .iter()
            .filter(|seg| seg.is_coordinator())
            .map(Segment::dbid)
            .collect();
        match coordinators.len() {
            0 => {
                return Err(ReconcileError::InvalidTopology(
                    "no coordinator defined".to_string(),
                ));
            }
            1 => {}
            _ => {
                return Err(ReconcileError::InvalidTopology(format!(
                    "multiple coordinators defined: dbids {:?}",
                    coordinators
                )));
            }
        }

        let standbys: Vec<Dbid> = self
            .iter()
            .filter(|seg| seg.is_standby())
            .map(Segment::dbid)
            .collect();
        if standbys.len() > 1 {
            return Err(ReconcileError::InvalidTopology(format!(
                "multiple standby coordinators defined: dbids {:?}",
                standbys
            )));
        }
        Ok(())
    }

    pub fn coordinator(&self) -> Option<&Segment> {
        self.iter().find(|seg| seg.is_coordinator())
    }

    pub fn standby(&self) -> Option<&Segment> {
        self.iter().find(|seg| seg.is_standby())
    }

    /// Segments grouped by content id, each group ordered by dbid.
    pub fn segments_by_content(&self) -> BTreeMap<ContentId, Vec<&Segment>> {
        let mut groups: BTreeMap<ContentId, Vec<&Segment>> = BTreeMap::new();
        for seg in self.iter() {
            groups.entry(seg.content_id()).or_default().push(seg);
        }
        groups
    }

    pub fn segments_by_host(&self) -> BTreeMap<&str, Vec<&Segment>> {
        group_by_host(self.iter())
    }

    /// Host names in the cluster, coordinator and standby hosts first, without duplicates.
    pub fn hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = Vec::new();
        let dispatchers = self.coordinator().into_iter().chain(self.standby());
        for seg in dispatchers.chain(self.iter()) {
            if !hosts.iter().any(|host| host == seg.hostname()) {
                hosts.push(seg.hostname().to_string());
            }
        }
        hosts
    }

    /// The other member of `dbid`'s content pair, if it has one.
    ///
    /// Fails when a content id holds more than two segments.
    pub fn peer_of(&self, dbid: Dbid) -> Result<Option<&Segment>> {
        let Some(segment) = self.get(dbid) else {
            return Ok(None);
        };
        let members: Vec<&Segment> = self
            .iter()
            .filter(|seg| seg.content_id() == segment.content_id())
            .collect();
        if members.len() > 2 {
            return Err(ReconcileError::InvalidTopology(format!(
                "Content {} has more than two segments",
                segment.content_id()
            )));
        }
        Ok(members.into_iter().find(|seg| seg.dbid() != dbid))
    }

    /// True when any primary segment has a configured mirror.
    pub fn mirroring_enabled(&self) -> bool {
        self.iter().any(|seg| seg.is_mirror(false))
    }

    pub fn max_dbid(&self) -> Dbid {
        self.dbids().max().unwrap_or(0)
    }

    pub fn max_content_id(&self) -> ContentId {
        self.iter().map(Segment::content_id).max().unwrap_or(0).max(0)
    }

    /// Segments whose current role differs from their preferred role.
    pub fn unbalanced_segments(&self) -> Vec<&Segment> {
        self.iter()
            .filter(|seg| !seg.is_query_dispatcher() && seg.is_unbalanced())
            .collect()
    }

    /// Unbalanced segments that are back up and synchronized, i.e. ready to
    /// be returned to their preferred role.
    pub fn recovered_segments(&self) -> Vec<&Segment> {
        self.unbalanced_segments()
            .into_iter()
            .filter(|seg| seg.is_synchronized() && seg.is_up())
            .collect()
    }

    /// Content ids whose primary/mirror pair is in a state the cluster does not accept.
    ///
    /// A primary without a mirror is judged as if its mirror were down and not in sync.
    pub fn invalid_pairs(&self) -> Vec<ContentId> {
        let mut invalid = Vec::new();
        for (content_id, members) in self.segments_by_content() {
            if content_id < 0 {
                continue;
            }
            let Some(primary) = members.iter().find(|seg| seg.is_primary(true)) else {
                invalid.push(content_id);
                continue;
            };
            let (mirror_status, mirror_mode) = members
                .iter()
                .find(|seg| seg.is_mirror(true))
                .map(|seg| (seg.status(), seg.mode()))
                .unwrap_or((SegmentStatus::Down, SegmentMode::NotInSync));
            let state = (primary.status(), primary.mode(), mirror_status, mirror_mode);
            if !VALID_PAIR_STATES.contains(&state) {
                invalid.push(content_id);
            }
        }
        invalid
    }
}

impl<'a> IntoIterator for &'a TopologySnapshot {
    type Item = &'a Segment;
    type IntoIter = std::collections::btree_map::Values<'a, Dbid, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.values()
    }
}

pub(crate) fn group_by_host<'a>(
    segments: impl IntoIterator<Item = &'a Segment>,
) -> BTreeMap<&'a str, Vec<&'a Segment>> {
    let mut groups: BTreeMap<&str, Vec<&Segment>> = BTreeMap::new();
    for seg in segments {
        groups.entry(seg.hostname()).or_default().push(seg);
    }
    groups
}
