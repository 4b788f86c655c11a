// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Query parameters for the bookkeeper's hierarchical task listing: the
//! queue view promotes a study or patient that never reached its
//! configured trigger into view a fixed window before and after its last
//! receive time, so an operator watching the queue sees it without
//! waiting for `study_complete_trigger_seconds` to elapse.

use chrono::Duration;

/// How long before a unit's last-receive time it starts showing up in a
/// "pending" queue view, ahead of completion.
pub const ORPHAN_PROMOTION_PRE_WINDOW: Duration = Duration::minutes(10);

/// How long after a unit's last-receive time it keeps showing up, giving an
/// operator a chance to notice and force-complete it.
pub const ORPHAN_PROMOTION_POST_WINDOW: Duration = Duration::minutes(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Series,
    Study,
    Patient,
}

/// Mirrors the grouping and pagination knobs the original queue view
/// exposed, translated into a typed query the HTTP client can build a
/// request from.
#[derive(Debug, Clone)]
pub struct HierarchicalQuery {
    pub group_by: GroupBy,
    pub folder: Option<String>,
    pub limit: usize,
    pub offset: usize,
    pub include_orphan_promoted: bool,
}

impl HierarchicalQuery {
    pub fn new(group_by: GroupBy) -> Self {
        HierarchicalQuery { group_by, folder: None, limit: 100, offset: 0, include_orphan_promoted: true }
    }

    pub fn in_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    pub fn paginated(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}
