//! The catalog and its dependency DAG.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::RwLock;
use vigil_audit::{AuditEvent, AuditSink, ResourceKind};
use vigil_core::{ServiceId, UserId};

use crate::error::ServiceError;
use crate::service::{Service, ServiceStatus};

/// Depth cap for subgraph queries.
const MAX_GRAPH_DEPTH: usize = 20;
/// Node cap for subgraph queries.
const MAX_GRAPH_NODES: usize = 100;

#[derive(Debug, Default)]
struct CatalogState {
    services: HashMap<ServiceId, Service>,
    /// `depends_on[a]` holds every `b` with an edge `a -> b`
    /// ("a depends on b").
    depends_on: HashMap<ServiceId, IndexSet<ServiceId>>,
    /// Reverse adjacency: `depended_by[b]` holds every `a` above.
    depended_by: HashMap<ServiceId, IndexSet<ServiceId>>,
}

/// A bounded subgraph around one service.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphView {
    /// Services reached, including the root.
    pub services: Vec<Service>,
    /// Edges among the reached services, as `(from, to)` dependency pairs.
    pub edges: Vec<(ServiceId, ServiceId)>,
    /// True when the node cap cut the exploration short.
    pub truncated: bool,
}

/// The service catalog: entries plus the dependency DAG.
pub struct ServiceCatalog {
    state: RwLock<CatalogState>,
    audit: Arc<dyn AuditSink>,
}

impl ServiceCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self {
            state: RwLock::new(CatalogState::default()),
            audit,
        }
    }

    /// Register a service; routing keys are unique catalog-wide.
    pub async fn register(&self, service: Service) -> Result<ServiceId, ServiceError> {
        {
            let mut state = self.state.write();
            if state
                .services
                .values()
                .any(|s| s.routing_key == service.routing_key)
            {
                return Err(ServiceError::DuplicateRoutingKey(service.routing_key));
            }
            state.services.insert(service.id, service.clone());
        }
        self.audit
            .append(
                AuditEvent::new("service.created", ResourceKind::Service, service.id.to_string())
                    .for_team(service.team_id),
            )
            .await?;
        Ok(service.id)
    }

    /// Fetch a service by id.
    #[must_use]
    pub fn get(&self, id: ServiceId) -> Option<Service> {
        self.state.read().services.get(&id).cloned()
    }

    /// Change a service's lifecycle status.
    pub fn set_status(&self, id: ServiceId, status: ServiceStatus) -> Result<(), ServiceError> {
        let mut state = self.state.write();
        let service = state
            .services
            .get_mut(&id)
            .ok_or(ServiceError::NotFound(id))?;
        service.status = status;
        Ok(())
    }

    /// Record that `from` depends on `to`.
    ///
    /// Rejects self-edges, archived endpoints, and any edge that would
    /// close a cycle. The cycle test walks dependencies from `to` with an
    /// iterative DFS; reaching `from` means the proposed edge closes a
    /// loop. Traversal is capped at the service count, so even corrupt
    /// adjacency data terminates.
    pub async fn add_dependency(
        &self,
        from: ServiceId,
        to: ServiceId,
        user: UserId,
    ) -> Result<(), ServiceError> {
        {
            let mut state = self.state.write();
            if from == to {
                return Err(ServiceError::SelfDependency(from));
            }
            for id in [from, to] {
                let service = state.services.get(&id).ok_or(ServiceError::NotFound(id))?;
                if service.status == ServiceStatus::Archived {
                    return Err(ServiceError::Archived(id));
                }
            }
            if reaches(&state.depends_on, to, from, state.services.len()) {
                return Err(ServiceError::Cycle { from, to });
            }

            state.depends_on.entry(from).or_default().insert(to);
            state.depended_by.entry(to).or_default().insert(from);
        }

        self.audit
            .append(
                AuditEvent::new("service.dependency.added", ResourceKind::Service, from.to_string())
                    .by_user(user)
                    .with_meta("dependsOn", to.to_string()),
            )
            .await?;
        tracing::debug!(from = %from, to = %to, "dependency added");
        Ok(())
    }

    /// Remove a dependency edge; idempotent.
    pub async fn remove_dependency(
        &self,
        from: ServiceId,
        to: ServiceId,
        user: UserId,
    ) -> Result<(), ServiceError> {
        let removed = {
            let mut state = self.state.write();
            let removed = state
                .depends_on
                .get_mut(&from)
                .is_some_and(|deps| deps.shift_remove(&to));
            if let Some(back) = state.depended_by.get_mut(&to) {
                back.shift_remove(&from);
            }
            removed
        };
        if removed {
            self.audit
                .append(
                    AuditEvent::new(
                        "service.dependency.removed",
                        ResourceKind::Service,
                        from.to_string(),
                    )
                    .by_user(user)
                    .with_meta("dependsOn", to.to_string()),
                )
                .await?;
        }
        Ok(())
    }

    /// Services `id` directly depends on.
    #[must_use]
    pub fn upstream(&self, id: ServiceId) -> Vec<ServiceId> {
        self.state
            .read()
            .depends_on
            .get(&id)
            .map(|deps| deps.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Services directly depending on `id`.
    #[must_use]
    pub fn downstream(&self, id: ServiceId) -> Vec<ServiceId> {
        self.state
            .read()
            .depended_by
            .get(&id)
            .map(|deps| deps.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The connected subgraph around `root`, exploring both directions
    /// breadth-first up to `max_depth` (capped at 20) and 100 nodes.
    pub fn graph(&self, root: ServiceId, max_depth: usize) -> Result<GraphView, ServiceError> {
        let state = self.state.read();
        if !state.services.contains_key(&root) {
            return Err(ServiceError::NotFound(root));
        }
        let max_depth = max_depth.min(MAX_GRAPH_DEPTH);

        let mut seen: HashSet<ServiceId> = HashSet::from([root]);
        let mut queue: VecDeque<(ServiceId, usize)> = VecDeque::from([(root, 0)]);
        let mut truncated = false;

        while let Some((node, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let neighbors = state
                .depends_on
                .get(&node)
                .into_iter()
                .flatten()
                .chain(state.depended_by.get(&node).into_iter().flatten());
            for &next in neighbors {
                if seen.contains(&next) {
                    continue;
                }
                if seen.len() >= MAX_GRAPH_NODES {
                    truncated = true;
                    break;
                }
                seen.insert(next);
                queue.push_back((next, depth + 1));
            }
        }

        let mut services: Vec<Service> = seen
            .iter()
            .filter_map(|id| state.services.get(id).cloned())
            .collect();
        services.sort_by(|a, b| a.routing_key.cmp(&b.routing_key));

        let mut edges: Vec<(ServiceId, ServiceId)> = state
            .depends_on
            .iter()
            .flat_map(|(&from, deps)| deps.iter().map(move |&to| (from, to)))
            .filter(|(from, to)| seen.contains(from) && seen.contains(to))
            .collect();
        edges.sort_by_key(|(from, to)| (from.to_string(), to.to_string()));

        Ok(GraphView {
            services,
            edges,
            truncated,
        })
    }
}

/// Iterative DFS: can `start` reach `goal` along dependency edges?
/// `node_budget` bounds the walk even if the adjacency data is corrupt.
fn reaches(
    depends_on: &HashMap<ServiceId, IndexSet<ServiceId>>,
    start: ServiceId,
    goal: ServiceId,
    node_budget: usize,
) -> bool {
    let mut stack = vec![start];
    let mut visited: HashSet<ServiceId> = HashSet::new();

    while let Some(node) = stack.pop() {
        if node == goal {
            return true;
        }
        if !visited.insert(node) || visited.len() > node_budget {
            continue;
        }
        if let Some(nexts) = depends_on.get(&node) {
            stack.extend(nexts.iter().copied());
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vigil_audit::MemoryAuditSink;
    use vigil_core::TeamId;

    async fn catalog_with(n: usize) -> (ServiceCatalog, Vec<ServiceId>) {
        let catalog = ServiceCatalog::new(Arc::new(MemoryAuditSink::new()));
        let mut ids = Vec::new();
        for i in 0..n {
            let service =
                Service::create(format!("svc-{i}"), format!("svc-{i}"), TeamId::v4()).unwrap();
            ids.push(catalog.register(service).await.unwrap());
        }
        (catalog, ids)
    }

    #[tokio::test]
    async fn duplicate_routing_key_conflicts() {
        let (catalog, _) = catalog_with(0).await;
        let a = Service::create("a", "payments", TeamId::v4()).unwrap();
        let b = Service::create("b", "payments", TeamId::v4()).unwrap();
        catalog.register(a).await.unwrap();
        assert!(matches!(
            catalog.register(b).await,
            Err(ServiceError::DuplicateRoutingKey(_))
        ));
    }

    #[tokio::test]
    async fn self_dependency_is_rejected() {
        let (catalog, ids) = catalog_with(1).await;
        assert!(matches!(
            catalog.add_dependency(ids[0], ids[0], UserId::v4()).await,
            Err(ServiceError::SelfDependency(_))
        ));
    }

    #[tokio::test]
    async fn chain_cycle_is_rejected_and_graph_unchanged() {
        let (catalog, ids) = catalog_with(3).await;
        let user = UserId::v4();
        catalog.add_dependency(ids[0], ids[1], user).await.unwrap();
        catalog.add_dependency(ids[1], ids[2], user).await.unwrap();

        let err = catalog.add_dependency(ids[2], ids[0], user).await.unwrap_err();
        assert!(matches!(err, ServiceError::Cycle { .. }));

        // The rejected edge left no trace.
        assert!(catalog.upstream(ids[2]).is_empty());
        assert_eq!(catalog.downstream(ids[0]), Vec::<ServiceId>::new());
        assert_eq!(catalog.upstream(ids[0]), vec![ids[1]]);
    }

    #[tokio::test]
    async fn direct_two_node_cycle_is_rejected() {
        let (catalog, ids) = catalog_with(2).await;
        let user = UserId::v4();
        catalog.add_dependency(ids[0], ids[1], user).await.unwrap();
        assert!(matches!(
            catalog.add_dependency(ids[1], ids[0], user).await,
            Err(ServiceError::Cycle { .. })
        ));
    }

    #[tokio::test]
    async fn diamond_is_allowed() {
        // a -> b -> d and a -> c -> d: multi-parent, still acyclic.
        let (catalog, ids) = catalog_with(4).await;
        let user = UserId::v4();
        catalog.add_dependency(ids[0], ids[1], user).await.unwrap();
        catalog.add_dependency(ids[0], ids[2], user).await.unwrap();
        catalog.add_dependency(ids[1], ids[3], user).await.unwrap();
        catalog.add_dependency(ids[2], ids[3], user).await.unwrap();
        assert_eq!(catalog.downstream(ids[3]).len(), 2);
    }

    #[tokio::test]
    async fn archived_services_cannot_join_edges() {
        let (catalog, ids) = catalog_with(2).await;
        catalog.set_status(ids[1], ServiceStatus::Archived).unwrap();
        assert!(matches!(
            catalog.add_dependency(ids[0], ids[1], UserId::v4()).await,
            Err(ServiceError::Archived(_))
        ));
    }

    #[tokio::test]
    async fn remove_dependency_is_idempotent() {
        let (catalog, ids) = catalog_with(2).await;
        let user = UserId::v4();
        catalog.add_dependency(ids[0], ids[1], user).await.unwrap();
        catalog.remove_dependency(ids[0], ids[1], user).await.unwrap();
        catalog.remove_dependency(ids[0], ids[1], user).await.unwrap();
        assert!(catalog.upstream(ids[0]).is_empty());

        // Removing re-opens the reverse direction.
        catalog.add_dependency(ids[1], ids[0], user).await.unwrap();
    }

    #[tokio::test]
    async fn graph_view_explores_both_directions_with_depth_cap() {
        // chain: 0 -> 1 -> 2 -> 3
        let (catalog, ids) = catalog_with(4).await;
        let user = UserId::v4();
        for pair in ids.windows(2) {
            catalog.add_dependency(pair[0], pair[1], user).await.unwrap();
        }

        let view = catalog.graph(ids[1], 1).unwrap();
        let got: HashSet<ServiceId> = view.services.iter().map(|s| s.id).collect();
        assert_eq!(got, HashSet::from([ids[0], ids[1], ids[2]]));
        assert!(!view.truncated);
        assert_eq!(view.edges.len(), 2);

        let full = catalog.graph(ids[1], 20).unwrap();
        assert_eq!(full.services.len(), 4);
    }

    #[tokio::test]
    async fn graph_view_caps_node_count() {
        // Star: one hub depending on 150 leaves.
        let (catalog, ids) = catalog_with(151).await;
        let user = UserId::v4();
        for &leaf in &ids[1..] {
            catalog.add_dependency(ids[0], leaf, user).await.unwrap();
        }
        let view = catalog.graph(ids[0], 5).unwrap();
        assert_eq!(view.services.len(), MAX_GRAPH_NODES);
        assert!(view.truncated);
    }
}
