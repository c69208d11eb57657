use std::collections::BTreeMap;
use std::fmt;

use registrar_core::{multi_wkt, Polygon};

use crate::model::{Decision, DecisionAction};

/// Key for one aggregated geometry group: an existing patch id, or the
/// name of a patch to be created.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum TargetKey {
    Existing(String),
    New(String),
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Existing(id) => write!(f, "{id}"),
            Self::New(name) => write!(f, "new:{name}"),
        }
    }
}

#[derive(Debug, Default)]
pub struct AggregateOutput {
    pub groups: BTreeMap<TargetKey, Vec<Polygon>>,
    /// Labels of records whose polygon had no resolved target (pending or
    /// skipped); surfaced so no geometry silently disappears.
    pub ungrouped: Vec<String>,
}

/// Group each record's polygon by its resolved target.
///
/// Keys come only from decisions; name matching already happened
/// upstream. Insertion order within a group follows record order, and
/// every polygon lands in exactly one group (a record with several targets
/// follows its first, primary target).
pub fn aggregate(
    decisions: &[Decision],
    polygons: &BTreeMap<usize, Polygon>,
) -> AggregateOutput {
    let mut out = AggregateOutput::default();

    for decision in decisions {
        let Some(polygon) = polygons.get(&decision.ordinal) else {
            continue;
        };
        match decision.action {
            DecisionAction::UseExisting => {
                let target = decision
                    .target_ids
                    .first()
                    .expect("use_existing decisions carry at least one target");
                out.groups
                    .entry(TargetKey::Existing(target.clone()))
                    .or_default()
                    .push(polygon.clone());
            }
            DecisionAction::CreateNew => {
                out.groups
                    .entry(TargetKey::New(decision.record_name.clone()))
                    .or_default()
                    .push(polygon.clone());
            }
            DecisionAction::Pending | DecisionAction::Skip => {
                out.ungrouped.push(decision.label());
            }
        }
    }

    out
}

/// Render each group as one storage MULTIPOLYGON, preserving group and
/// polygon order.
pub fn groups_to_wkt(groups: &BTreeMap<TargetKey, Vec<Polygon>>) -> BTreeMap<TargetKey, String> {
    groups
        .iter()
        .map(|(key, polygons)| (key.clone(), multi_wkt(polygons)))
        .collect()
}
