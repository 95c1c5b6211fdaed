//! Full-loop lifecycle tests: incident state machine → event bus →
//! bridge → escalation scheduler and workflow engine.

use std::sync::Arc;

use chrono::Utc;
use vigil_audit::{AuditSink, MemoryAuditSink};
use vigil_core::{Priority, TeamId, UserId};
use vigil_engine::{LifecycleBridge, WorkflowEngine};
use vigil_escalation::{
    EscalationLevel, EscalationPolicy, EscalationScheduler, LevelTarget, MemoryEscalationStore,
    MemoryPolicyStore, PolicyStore,
};
use vigil_eventbus::EventBus;
use vigil_execution::MemoryExecutionStore;
use vigil_incident::{
    IncidentMachine, IncidentStatus, IncidentStore, MemoryIncidentStore, NewIncident,
    TransitionRequest,
};
use vigil_queue::{JobState, MemoryJobStore, Queue, Topic};
use vigil_workflow::{
    MemoryWorkflowStore, Node, NodeKind, Position, Scope, Settings, StateTransition, TriggerConfig,
    TriggerKind, Workflow, WorkflowDefinition, WorkflowStore,
};

struct World {
    machine: IncidentMachine,
    bridge: Arc<LifecycleBridge>,
    bus: Arc<EventBus>,
    policies: Arc<MemoryPolicyStore>,
    escalation_jobs: Arc<MemoryEscalationStore>,
    executions: Arc<MemoryExecutionStore>,
    workflows: Arc<MemoryWorkflowStore>,
    queue_store: Arc<MemoryJobStore>,
    audit: Arc<MemoryAuditSink>,
}

fn world() -> World {
    let incidents = Arc::new(MemoryIncidentStore::new());
    let audit = Arc::new(MemoryAuditSink::new());
    let bus = Arc::new(EventBus::new());
    let queue_store = Arc::new(MemoryJobStore::new());
    let queue = Queue::new(queue_store.clone());

    let policies = Arc::new(MemoryPolicyStore::new());
    let escalation_jobs = Arc::new(MemoryEscalationStore::new());
    let scheduler = Arc::new(EscalationScheduler::new(
        queue.clone(),
        escalation_jobs.clone(),
        policies.clone(),
        incidents.clone(),
        audit.clone(),
    ));

    let workflows = Arc::new(MemoryWorkflowStore::new());
    let executions = Arc::new(MemoryExecutionStore::new());
    let engine = Arc::new(WorkflowEngine::new(
        workflows.clone(),
        executions.clone(),
        incidents.clone(),
        queue.clone(),
    ));
    let machine = IncidentMachine::new(incidents.clone(), audit.clone(), bus.clone());
    let bridge = Arc::new(LifecycleBridge::new(
        bus.clone(),
        engine,
        scheduler,
        incidents,
    ));

    World {
        machine,
        bridge,
        bus,
        policies,
        escalation_jobs,
        executions,
        workflows,
        queue_store,
        audit,
    }
}

impl World {
    /// Pump every event currently on the bus through the bridge.
    async fn pump(&self, rx: &mut tokio::sync::broadcast::Receiver<vigil_eventbus::LifecycleEvent>) {
        while let Ok(event) = rx.try_recv() {
            self.bridge.dispatch(event).await;
        }
    }
}

async fn seed_policy(world: &World, team: TeamId) -> EscalationPolicy {
    let policy = EscalationPolicy::new(
        team,
        "standard",
        1,
        vec![
            EscalationLevel {
                number: 1,
                target: LevelTarget::User {
                    user_id: UserId::v4(),
                },
                timeout_minutes: 5,
            },
            EscalationLevel {
                number: 2,
                target: LevelTarget::User {
                    user_id: UserId::v4(),
                },
                timeout_minutes: 10,
            },
        ],
    )
    .unwrap();
    world.policies.upsert(policy.clone()).await.unwrap();
    policy
}

#[tokio::test]
async fn incident_creation_starts_escalation_through_the_bridge() {
    let world = world();
    let team = TeamId::v4();
    let policy = seed_policy(&world, team).await;
    let mut rx = world.bus.subscribe();

    world
        .machine
        .create(NewIncident {
            title: "db down".into(),
            priority: Priority::Critical,
            team_id: team,
            policy_id: Some(policy.id),
            metadata: serde_json::Map::new(),
        })
        .await
        .unwrap();
    world.pump(&mut rx).await;

    // Level 1 is scheduled at now.
    let records = world.escalation_jobs.all();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].level, 1);
    assert_eq!(world.audit.with_action("escalation.started").len(), 1);
}

#[tokio::test]
async fn acknowledgement_cancels_pending_escalation() {
    let world = world();
    let team = TeamId::v4();
    let policy = seed_policy(&world, team).await;
    let mut rx = world.bus.subscribe();

    let incident = world
        .machine
        .create(NewIncident {
            title: "db down".into(),
            priority: Priority::High,
            team_id: team,
            policy_id: Some(policy.id),
            metadata: serde_json::Map::new(),
        })
        .await
        .unwrap();
    world.pump(&mut rx).await;

    let acked = world
        .machine
        .transition(
            incident.id,
            TransitionRequest::Acknowledge {
                user_id: UserId::v4(),
                note: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(acked.status, IncidentStatus::Acknowledged);
    world.pump(&mut rx).await;

    // The escalation record is closed and the queue job cancelled.
    assert!(world.escalation_jobs.all().iter().all(|j| j.completed));
    assert!(
        world
            .queue_store
            .all()
            .iter()
            .filter(|j| j.topic == Topic::Escalation)
            .all(|j| j.state == JobState::Cancelled)
    );
}

#[tokio::test]
async fn acknowledgement_fires_matching_workflows_via_the_bridge() {
    let world = world();
    let team = TeamId::v4();
    let mut rx = world.bus.subscribe();

    // An ack-triggered workflow, trigger node only.
    let mut trigger = TriggerConfig::of_kind(TriggerKind::StateChanged);
    trigger.state_transition = Some(StateTransition {
        from: None,
        to: Some("ACKNOWLEDGED".into()),
    });
    let definition = WorkflowDefinition {
        trigger,
        nodes: vec![Node {
            id: vigil_core::NodeId::v4(),
            kind: NodeKind::Trigger { name: "t".into() },
            position: Position::default(),
        }],
        edges: vec![],
        settings: Settings::default(),
    };
    let workflow =
        Workflow::create("on ack", "", Scope::Global, definition, UserId::v4()).unwrap();
    world.workflows.save(workflow).await.unwrap();

    let incident = world
        .machine
        .create(NewIncident {
            title: "checkout errors".into(),
            priority: Priority::High,
            team_id: team,
            policy_id: None,
            metadata: serde_json::Map::new(),
        })
        .await
        .unwrap();
    world.pump(&mut rx).await;
    assert!(world.executions.all().is_empty());

    world
        .machine
        .transition(
            incident.id,
            TransitionRequest::Acknowledge {
                user_id: UserId::v4(),
                note: None,
            },
        )
        .await
        .unwrap();
    world.pump(&mut rx).await;

    let executions = world.executions.all();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].incident_id, incident.id);
    assert_eq!(
        executions[0].trigger_event.as_deref(),
        Some("incident.state_changed")
    );

    // One pending workflow job waits for a worker.
    assert_eq!(
        world
            .queue_store
            .all()
            .iter()
            .filter(|j| j.topic == Topic::Workflow && j.state == JobState::Pending)
            .count(),
        1
    );
}

#[tokio::test]
async fn automation_core_starts_and_shuts_down_cleanly() {
    use async_trait::async_trait;
    use vigil_engine::{
        ActionRunner, AgePoller, AutomationCore, CoreDeps, IntegrationConfig, WorkflowWorker,
    };
    use vigil_escalation::{
        EscalationWorker, MemoryNotifySink, StaticDirectory,
    };
    use vigil_http::HttpClient;
    use vigil_queue::{HandlerError, Job, JobHandler, LeaderLock, WorkerConfig};

    struct NoopHandler;

    #[async_trait]
    impl JobHandler for NoopHandler {
        async fn handle(&self, _job: &Job) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    let incidents = Arc::new(MemoryIncidentStore::new());
    let audit = Arc::new(MemoryAuditSink::new());
    let bus = Arc::new(EventBus::new());
    let queue_store = Arc::new(MemoryJobStore::new());
    let queue = Queue::new(queue_store.clone());

    let policies = Arc::new(MemoryPolicyStore::new());
    let escalation_jobs = Arc::new(MemoryEscalationStore::new());
    let scheduler = Arc::new(EscalationScheduler::new(
        queue.clone(),
        escalation_jobs.clone(),
        policies.clone(),
        incidents.clone(),
        audit.clone(),
    ));
    let escalation_worker = Arc::new(EscalationWorker::new(
        scheduler.clone(),
        escalation_jobs,
        policies,
        incidents.clone(),
        Arc::new(StaticDirectory::new()),
        Arc::new(MemoryNotifySink::new()),
        audit.clone(),
        bus.clone(),
    ));

    let workflows = Arc::new(MemoryWorkflowStore::new());
    let executions = Arc::new(MemoryExecutionStore::new());
    let engine = Arc::new(WorkflowEngine::new(
        workflows.clone(),
        executions.clone(),
        incidents.clone(),
        queue.clone(),
    ));
    let runner = Arc::new(ActionRunner::new(
        Arc::new(HttpClient::new(true)),
        IntegrationConfig::default(),
    ));
    let workflow_worker = Arc::new(WorkflowWorker::new(
        executions.clone(),
        runner,
        queue.clone(),
        audit.clone(),
    ));
    let poller = Arc::new(AgePoller::new(
        engine.clone(),
        workflows,
        incidents.clone(),
        executions,
        LeaderLock::new(),
    ));
    let bridge = Arc::new(LifecycleBridge::new(
        bus,
        engine,
        scheduler.clone(),
        incidents,
    ));

    let core = AutomationCore::new(CoreDeps {
        queue: queue.clone(),
        workflow_worker,
        escalation: scheduler,
        escalation_worker,
        runbook_worker: Arc::new(NoopHandler),
        poller,
        bridge,
        audit,
        audit_retention_days: 90,
        worker_config: WorkerConfig::default(),
    });

    core.start().await.unwrap();

    // The daily maintenance schedule is seeded exactly once.
    let sweeps = queue_store
        .all()
        .into_iter()
        .filter(|j| j.topic == Topic::System)
        .count();
    assert_eq!(sweeps, 1);

    core.shutdown().await;
    core.shutdown().await; // idempotent
}

#[tokio::test]
async fn workflow_failure_never_touches_the_incident() {
    let world = world();
    let team = TeamId::v4();
    let mut rx = world.bus.subscribe();

    let incident = world
        .machine
        .create(NewIncident {
            title: "t".into(),
            priority: Priority::Low,
            team_id: team,
            policy_id: None,
            metadata: serde_json::Map::new(),
        })
        .await
        .unwrap();
    world.pump(&mut rx).await;

    // Pretend a workflow execution failed; the incident row is whatever
    // the state machine last committed.
    let reloaded = world.machine.store().get(incident.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, IncidentStatus::Open);
    assert_eq!(reloaded.version, incident.version);

    // Timeline still groups by execution id regardless of outcome.
    let timeline = vigil_audit::group_timeline(
        world.audit.for_incident(incident.id).await.unwrap(),
    );
    assert!(!timeline.is_empty());
}
