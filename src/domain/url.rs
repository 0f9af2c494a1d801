//! REST paths of structure nodes, derived from their ancestor chain

use generational_arena::Index;

use crate::domain::arena::TreeArena;
use crate::domain::entities::{ContainerVariant, LeafVariant, NodeKind};
use crate::domain::error::{TreeError, TreeResult};

/// Path of a node below `base`.
///
/// Sections and playbooks nest under their parent's path (or `base` at root
/// level). Procedures hang off their playbook, vulnerabilities off their
/// report section.
pub fn node_url(arena: &TreeArena, idx: Index, base: &str) -> TreeResult<String> {
    let node = arena.node(idx)?;
    let id = &node.id;
    let missing = |ancestor| TreeError::MissingAncestor {
        id: id.clone(),
        ancestor,
    };

    match &node.kind {
        NodeKind::Container(c) => match c.variant {
            ContainerVariant::ReportSection | ContainerVariant::TemplateProcedureSection => {
                Ok(format!("{}/sections/{id}", parent_or_base(arena, node.parent, base)?))
            }
            ContainerVariant::Playbook => {
                Ok(format!("{}/playbooks/{id}", parent_or_base(arena, node.parent, base)?))
            }
            ContainerVariant::ProcedureSection => {
                let parent = node.parent.ok_or_else(|| missing("playbook"))?;
                Ok(format!("{}/sections/{id}", node_url(arena, parent, base)?))
            }
            ContainerVariant::Section => {
                Ok(format!("{}/nodes/{id}", parent_or_base(arena, node.parent, base)?))
            }
        },
        NodeKind::Leaf(l) => match &l.variant {
            LeafVariant::Procedure(_) => {
                let guide = arena
                    .ancestor_of_variant(idx, ContainerVariant::Playbook)?
                    .ok_or_else(|| missing("playbook"))?;
                Ok(format!("{}/procedures/{id}", node_url(arena, guide, base)?))
            }
            LeafVariant::Vulnerability(_) => {
                let section = arena
                    .ancestor_of_variant(idx, ContainerVariant::ReportSection)?
                    .ok_or_else(|| missing("report section"))?;
                Ok(format!("{}/vulnerabilities/{id}", node_url(arena, section, base)?))
            }
            LeafVariant::TemplateProcedure(_) => {
                Ok(format!("{}/procedures/{id}", parent_or_base(arena, node.parent, base)?))
            }
            LeafVariant::Item => {
                Ok(format!("{}/nodes/{id}", parent_or_base(arena, node.parent, base)?))
            }
        },
    }
}

fn parent_or_base(arena: &TreeArena, parent: Option<Index>, base: &str) -> TreeResult<String> {
    match parent {
        Some(parent) => node_url(arena, parent, base),
        None => Ok(base.trim_end_matches('/').to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::TreeModel;
    use crate::domain::provider::{ReportStructureProvider, TestGuideProvider};
    use serde_json::json;

    fn report() -> TreeModel<ReportStructureProvider> {
        TreeModel::from_document(
            ReportStructureProvider::default(),
            &json!([
                {"id": "s1", "type": "reportSection", "info": {}, "children": [
                    {"id": "pb", "type": "playbook", "info": {}, "children": [
                        {"id": "ps", "type": "container", "info": {}, "children": [
                            {"id": "p1", "type": "procedure"}
                        ]}
                    ]},
                    {"id": "v1", "type": "vulnerability"}
                ]},
                {"id": "orphan", "type": "procedure"}
            ]),
        )
        .unwrap()
    }

    #[test]
    fn given_nested_procedure_when_building_url_then_hangs_off_playbook() {
        let m = report();
        let p1 = m.lookup("p1").unwrap();
        assert_eq!(
            node_url(m.arena(), p1, "/api/").unwrap(),
            "/api/sections/s1/playbooks/pb/procedures/p1"
        );
        let ps = m.lookup("ps").unwrap();
        assert_eq!(
            node_url(m.arena(), ps, "/api").unwrap(),
            "/api/sections/s1/playbooks/pb/sections/ps"
        );
    }

    #[test]
    fn given_vulnerability_when_building_url_then_hangs_off_report_section() {
        let m = report();
        let v1 = m.lookup("v1").unwrap();
        assert_eq!(
            node_url(m.arena(), v1, "/api").unwrap(),
            "/api/sections/s1/vulnerabilities/v1"
        );
    }

    #[test]
    fn given_procedure_without_playbook_when_building_url_then_fails() {
        let m = report();
        let orphan = m.lookup("orphan").unwrap();
        let err = node_url(m.arena(), orphan, "/api").unwrap_err();
        assert!(matches!(err, TreeError::MissingAncestor { ancestor: "playbook", .. }));
    }

    #[test]
    fn given_template_structure_when_building_url_then_nests_sections() {
        let m = TreeModel::from_document(
            TestGuideProvider::default(),
            &json!([{"id": "t", "type": "container", "info": {}, "children": [
                {"id": "tp", "type": "procedure"}
            ]}]),
        )
        .unwrap();
        let tp = m.lookup("tp").unwrap();
        assert_eq!(
            node_url(m.arena(), tp, "/templates").unwrap(),
            "/templates/sections/t/procedures/tp"
        );
    }
}
